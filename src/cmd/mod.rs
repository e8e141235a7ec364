//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module     | Commands handled       |
//! |------------|------------------------|
//! | `serve`    | `Serve`                |
//! | `generate` | `Generate`             |
//! | `build`    | `Build`                |
//! | `github`   | `Publish`, `Import`    |
//! | `key`      | `Key`                  |
//! | `config`   | `Config`               |

pub mod build;
pub mod config;
pub mod generate;
pub mod github;
pub mod key;
pub mod serve;

use std::path::Path;

use anyhow::{Context, Result};
use codepilot::config::PilotConfig;

pub use build::cmd_build;
pub use config::cmd_config;
pub use generate::cmd_generate;
pub use github::{cmd_import, cmd_publish};
pub use key::cmd_key;
pub use serve::cmd_serve;

/// Load `codepilot.toml` (explicit path or the working directory) and apply
/// environment overrides.
pub fn load_config(explicit: Option<&Path>) -> Result<PilotConfig> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let mut config = PilotConfig::load_or_default(explicit, &cwd)?;
    config.apply_process_env()?;
    Ok(config)
}
