//! Layered configuration for CodePilot.
//!
//! Values are resolved in this order, later sources winning:
//! built-in defaults → `codepilot.toml` → environment variables → CLI flags.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 9002
//! allowed_origins = ["https://*.replit.dev", "http://localhost:9002"]
//!
//! [llm]
//! model = "gemini-2.0-flash"
//! timeout_secs = 120
//!
//! [packaging]
//! program = "python"
//! args = ["-m", "PyInstaller", "--onefile", "--distpath", "dist", "{file}"]
//! timeout_secs = 300
//! work_root = "temp"
//!
//! [github]
//! commit_path = "generated-code.txt"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "codepilot.toml";

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Browser origins admitted by the CORS layer. Entries may hold one `*` wildcard.
    pub allowed_origins: Vec<String>,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9002,
            allowed_origins: Vec::new(),
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

/// Hosted LLM settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: f64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.0-flash".to_string(),
            timeout_secs: 120,
            temperature: 0.2,
        }
    }
}

/// Packaging tool invocation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PackagingConfig {
    /// Executable to run.
    pub program: String,
    /// Arguments; `{file}` and `{stem}` are replaced with the uploaded file name and its stem.
    pub args: Vec<String>,
    /// Directory, relative to the job directory, where the tool writes its output.
    pub dist_dir: String,
    pub timeout_secs: u64,
    /// Parent of the per-request job directories.
    pub work_root: PathBuf,
    /// Extension of the produced executable, without the dot. Empty means none.
    pub artifact_extension: String,
    /// Also write the Android/Kivy companion project next to the artifact.
    pub android_skeleton: bool,
}

impl Default for PackagingConfig {
    fn default() -> Self {
        Self {
            program: "python".to_string(),
            args: ["-m", "PyInstaller", "--onefile", "--distpath", "dist", "{file}"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            dist_dir: "dist".to_string(),
            timeout_secs: 300,
            work_root: PathBuf::from("temp"),
            artifact_extension: std::env::consts::EXE_EXTENSION.to_string(),
            android_skeleton: true,
        }
    }
}

/// GitHub API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    pub api_base: String,
    /// Fallback token when a request does not carry its own.
    pub token: Option<String>,
    /// Repository path the published content is written to.
    pub commit_path: String,
    pub user_agent: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            token: None,
            commit_path: "generated-code.txt".to_string(),
            user_agent: "codepilot".to_string(),
        }
    }
}

/// Credential store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Override for the persisted key file.
    pub store_path: Option<PathBuf>,
}

impl CredentialsConfig {
    /// Where the user-supplied API key is persisted.
    pub fn resolved_store_path(&self) -> PathBuf {
        if let Some(path) = &self.store_path {
            return path.clone();
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("codepilot")
            .join("credentials.json")
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PilotConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub packaging: PackagingConfig,
    pub github: GitHubConfig,
    pub credentials: CredentialsConfig,
}

impl PilotConfig {
    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse codepilot.toml")
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Load from an explicit path, or from `codepilot.toml` in `dir` when present.
    /// Missing default file yields defaults; a missing explicit file is an error.
    pub fn load_or_default(explicit: Option<&Path>, dir: &Path) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let path = dir.join(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::load(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(token) = non_empty("GITHUB_TOKEN") {
            self.github.token = Some(token.trim().to_string());
        }
        if let Some(origins) = non_empty("ALLOWED_DEV_ORIGINS") {
            self.server.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(port) = non_empty("CODEPILOT_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("CODEPILOT_PORT is not a valid port: {}", port))?;
        }
        if let Some(root) = non_empty("CODEPILOT_WORK_ROOT") {
            self.packaging.work_root = PathBuf::from(root);
        }
        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn apply_process_env(&mut self) -> Result<()> {
        self.apply_env(|name| std::env::var(name).ok())
    }

    /// Validate the configuration, returning a list of problems.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.server.port == 0 {
            errors.push("server.port must be greater than 0".to_string());
        }
        if self.packaging.program.trim().is_empty() {
            errors.push("packaging.program must not be empty".to_string());
        }
        if self.packaging.timeout_secs == 0 {
            errors.push("packaging.timeout_secs must be greater than 0".to_string());
        }
        if self.llm.model.trim().is_empty() {
            errors.push("llm.model must not be empty".to_string());
        }
        errors
    }
}
