//! Configuration view and validation commands: `codepilot config`.

use anyhow::{Context, Result};
use codepilot::config::PilotConfig;

use super::super::ConfigCommands;

pub fn cmd_config(config: &PilotConfig, command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            let mut shown = config.clone();
            if shown.github.token.is_some() {
                shown.github.token = Some("********".to_string());
            }
            let rendered =
                toml::to_string_pretty(&shown).context("Failed to render configuration")?;
            println!("{}", rendered.trim_end());
            println!();
            println!(
                "credentials file = \"{}\"",
                config.credentials.resolved_store_path().display()
            );
        }
        Some(ConfigCommands::Validate) => {
            let problems = config.validate();
            if problems.is_empty() {
                println!("Configuration is valid.");
            } else {
                for problem in &problems {
                    println!("  - {}", problem);
                }
                anyhow::bail!("{} configuration problem(s) found", problems.len());
            }
        }
    }
    Ok(())
}
