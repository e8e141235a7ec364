use std::path::Path;

use anyhow::{Context, Result};
use codepilot::config::PilotConfig;
use codepilot::packaging::{Packager, SourceFile};

pub async fn cmd_build(config: &PilotConfig, source: &Path) -> Result<()> {
    let bytes = std::fs::read(source)
        .with_context(|| format!("Failed to read {}", source.display()))?;
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let source = SourceFile::new(name, bytes)?;

    let packager = Packager::new(config.packaging.clone());
    match packager.build(&source).await {
        Ok(artifact) => {
            println!("Executable: {}", artifact.executable_path.display());
            if let Some(project) = &artifact.project_dir {
                println!("Android project: {}", project.display());
            }
            if !artifact.logs.trim().is_empty() {
                println!();
                println!("{}", artifact.logs.trim_end());
            }
            Ok(())
        }
        Err(e) => {
            if !e.logs().trim().is_empty() {
                eprintln!("{}", e.logs().trim_end());
            }
            Err(e.into())
        }
    }
}
