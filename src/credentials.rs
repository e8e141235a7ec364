//! Credential store for the LLM API key.
//!
//! The key is resolved with a fixed precedence: the environment-provided value
//! (`GOOGLE_API_KEY`, then `GOOGLE_GENAI_API_KEY`), else the value the user saved,
//! else nothing. Callers resolve once per request and pass the resulting
//! [`Credential`] explicitly to the gateway.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variables consulted for the API key, in order.
pub const API_KEY_ENV_VARS: &[&str] = &["GOOGLE_API_KEY", "GOOGLE_GENAI_API_KEY"];

/// Where a resolved credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    Environment,
    Persisted,
    None,
}

impl std::fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Persisted => write!(f, "persisted"),
            CredentialSource::None => write!(f, "none"),
        }
    }
}

/// A resolved API key together with its origin.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub value: String,
    pub source: CredentialSource,
}

impl Credential {
    pub fn none() -> Self {
        Self {
            value: String::new(),
            source: CredentialSource::None,
        }
    }

    pub fn is_present(&self) -> bool {
        !self.value.is_empty()
    }

    /// Display form that reveals at most the last four characters.
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.value.chars().collect();
        if chars.is_empty() {
            return String::new();
        }
        if chars.len() <= 8 {
            return "*".repeat(chars.len());
        }
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}{}", "*".repeat(chars.len() - 4), tail)
    }
}

// Keep the raw key out of logs.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("value", &self.masked())
            .field("source", &self.source)
            .finish()
    }
}

/// Advisory classification of an API key. Never blocks gateway calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStatus {
    Valid,
    Invalid,
    Unchecked,
}

/// On-disk layout of the persisted key.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredCredentials {
    #[serde(default)]
    gemini_api_key: String,
}

/// Holds the environment key and the persisted user key.
pub struct CredentialStore {
    env_value: Option<String>,
    path: PathBuf,
    persisted: RwLock<Option<String>>,
}

impl CredentialStore {
    /// Create a store from an explicit environment value and a persistence path.
    /// The persisted file is read once here; an unreadable file counts as empty.
    pub fn new(env_value: Option<String>, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let persisted = match read_persisted(&path) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(path = %path.display(), "Ignoring unreadable credential file: {e:#}");
                None
            }
        };
        Self {
            env_value: env_value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            path,
            persisted: RwLock::new(persisted),
        }
    }

    /// Create a store reading the environment key from the process environment.
    pub fn from_env(path: impl AsRef<Path>) -> Self {
        let env_value = API_KEY_ENV_VARS
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|v| !v.trim().is_empty());
        Self::new(env_value, path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve the key: environment > persisted > none.
    pub fn resolve(&self) -> Credential {
        if let Some(value) = &self.env_value {
            return Credential {
                value: value.clone(),
                source: CredentialSource::Environment,
            };
        }
        let persisted = self
            .persisted
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_default();
        match persisted {
            Some(value) => Credential {
                value,
                source: CredentialSource::Persisted,
            },
            None => Credential::none(),
        }
    }

    /// Persist a user-supplied key and update the in-memory copy.
    /// An empty value clears the stored key.
    pub fn save(&self, value: &str) -> Result<()> {
        let value = value.trim().to_string();
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create credential directory {}", parent.display())
                })?;
            }
        }
        let stored = StoredCredentials {
            gemini_api_key: value.clone(),
        };
        let content =
            serde_json::to_string_pretty(&stored).context("Failed to serialize credentials")?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        restrict_to_owner(&self.path)?;

        let mut guard = self
            .persisted
            .write()
            .map_err(|_| anyhow::anyhow!("Credential lock poisoned"))?;
        *guard = if value.is_empty() { None } else { Some(value) };
        tracing::info!(path = %self.path.display(), "Saved API key");
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_to_owner(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .with_context(|| format!("Failed to set permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn restrict_to_owner(_path: &Path) -> Result<()> {
    Ok(())
}

fn read_persisted(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let stored: StoredCredentials = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    let value = stored.gemini_api_key.trim().to_string();
    Ok(if value.is_empty() { None } else { Some(value) })
}
