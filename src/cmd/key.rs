use anyhow::Result;
use codepilot::config::PilotConfig;
use codepilot::credentials::{CredentialSource, CredentialStore, KeyStatus};
use codepilot::gateway::{CodeModel, GeminiClient};

use super::super::KeyCommands;

pub async fn cmd_key(config: &PilotConfig, command: KeyCommands) -> Result<()> {
    let store = CredentialStore::from_env(config.credentials.resolved_store_path());

    match command {
        KeyCommands::Set { value } => {
            store.save(&value)?;
            if value.trim().is_empty() {
                println!("Cleared stored API key at {}", store.path().display());
            } else {
                println!("Saved API key to {}", store.path().display());
            }
            let credential = store.resolve();
            if credential.source == CredentialSource::Environment {
                println!("Note: an environment key is set and takes precedence.");
            }
        }
        KeyCommands::Show => {
            let credential = store.resolve();
            if credential.is_present() {
                println!("{} ({})", credential.masked(), credential.source);
            } else {
                println!("No API key configured");
            }
        }
        KeyCommands::Check => {
            let credential = store.resolve();
            if !credential.is_present() {
                anyhow::bail!("No API key configured");
            }
            let client = GeminiClient::new(&config.llm)?;
            let status = client.check_key(&credential.value).await;
            let label = match status {
                KeyStatus::Valid => "valid",
                KeyStatus::Invalid => "invalid",
                KeyStatus::Unchecked => "unchecked (provider unreachable)",
            };
            println!("{} ({}): {}", credential.masked(), credential.source, label);
            if status == KeyStatus::Invalid {
                anyhow::bail!("API key was rejected by the provider");
            }
        }
    }
    Ok(())
}
