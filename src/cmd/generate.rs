use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use codepilot::config::PilotConfig;
use codepilot::credentials::CredentialStore;
use codepilot::gateway::{CodeGenerator, GeminiClient};
use codepilot::prompt::{self, GenerationRequest};

pub async fn cmd_generate(
    config: &PilotConfig,
    prompt_text: &str,
    files: &[PathBuf],
    mobile: bool,
    out: Option<&Path>,
) -> Result<()> {
    if prompt_text.trim().is_empty() {
        anyhow::bail!("Prompt must not be empty");
    }

    let mut uploaded = Vec::with_capacity(files.len());
    for path in files {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        uploaded.push(content);
    }

    let store = CredentialStore::from_env(config.credentials.resolved_store_path());
    let credential = store.resolve();
    let generator = CodeGenerator::new(Arc::new(GeminiClient::new(&config.llm)?));

    let result = if mobile {
        let request =
            GenerationRequest::new(prompt::wrap_mobile_request(prompt_text.trim())).with_files(uploaded);
        generator.generate_mobile(&request, &credential).await?
    } else {
        let request = GenerationRequest::new(prompt_text).with_files(uploaded);
        generator.generate(&request, &credential).await?
    };

    if result.regenerated {
        eprintln!("First answer contained web code; regenerated once.");
    }

    match out {
        Some(path) => {
            std::fs::write(path, &result.generated_code)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {} (suggested name: {})", path.display(), result.filename);
        }
        None => {
            eprintln!("Suggested file name: {}", result.filename);
            println!("{}", result.generated_code);
        }
    }
    Ok(())
}
