use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use codepilot::config::PilotConfig;
use codepilot::github::{GitHubApi, GitHubClient, Importer, PublishRequest, Publisher};

fn client(config: &PilotConfig) -> Result<Arc<dyn GitHubApi>> {
    Ok(Arc::new(GitHubClient::new(&config.github)?))
}

pub async fn cmd_publish(
    config: &PilotConfig,
    repo_url: String,
    branch: String,
    commit_message: String,
    token: Option<String>,
    content_file: &Path,
) -> Result<()> {
    let content = std::fs::read_to_string(content_file)
        .with_context(|| format!("Failed to read {}", content_file.display()))?;

    let publisher = Publisher::new(
        client(config)?,
        config.github.commit_path.clone(),
        config.github.token.clone(),
    );
    let outcome = publisher
        .publish(&PublishRequest {
            repo_url,
            branch,
            commit_message,
            content,
            token,
        })
        .await?;

    println!("Committed {} to {}", outcome.commit_sha, publisher.commit_path());
    println!("{}", outcome.commit_url);
    Ok(())
}

pub async fn cmd_import(config: &PilotConfig, repo_url: &str, out: Option<&Path>) -> Result<()> {
    let importer = Importer::new(client(config)?, config.github.token.clone());
    let files = importer.import(repo_url).await?;

    if let Some(dir) = out {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    for file in &files {
        println!("{} ({} bytes)", file.path, file.content.len());
        if let Some(dir) = out {
            // Root listing entries are plain names; anything else is skipped.
            if file.path.contains('/') || file.path.contains('\\') || file.path == ".." {
                continue;
            }
            let target = dir.join(&file.path);
            std::fs::write(&target, &file.content)
                .with_context(|| format!("Failed to write {}", target.display()))?;
        }
    }
    println!("Imported {} file(s)", files.len());
    Ok(())
}
