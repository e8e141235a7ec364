//! Typed error hierarchy for CodePilot.
//!
//! One enum per subsystem:
//! - `ValidationError`: missing or malformed caller input, raised before any side effect
//! - `GatewayError`: LLM gateway failures
//! - `BuildError`: packaging pipeline failures, always carrying captured logs
//! - `PublishError`: repository publishing failures
//! - `ImportError`: repository import failures

use std::path::PathBuf;

use thiserror::Error;

/// Missing or malformed caller input. Terminal, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("Invalid repository URL: {0}")]
    InvalidRepoUrl(String),

    #[error("Invalid file name '{0}'")]
    InvalidFileName(String),
}

/// Errors from the hosted LLM gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("No API key configured for the LLM gateway")]
    MissingApiKey,

    #[error("LLM request failed: {0}")]
    Request(String),

    #[error("LLM API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse LLM response: {0}")]
    Parse(String),

    #[error("LLM returned no text")]
    EmptyResponse,
}

/// Errors from the packaging pipeline.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Failed to prepare build directory {path}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to spawn packaging tool '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Packaging tool timed out after {secs} seconds")]
    TimedOut { secs: u64, logs: String },

    #[error("Artifact not produced at {path}. Check your source for errors.")]
    ArtifactMissing { path: PathBuf, logs: String },

    #[error("Failed to write companion project at {path}: {source}")]
    Skeleton {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BuildError {
    /// Output captured from the packaging tool before the failure, if any.
    pub fn logs(&self) -> &str {
        match self {
            BuildError::TimedOut { logs, .. } | BuildError::ArtifactMissing { logs, .. } => logs,
            _ => "",
        }
    }
}

/// Errors from publishing content to a GitHub branch.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("GitHub API error: {0}")]
    GitHub(String),
}

/// Errors from importing a GitHub repository.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("Failed to fetch repository: {0}")]
    Upstream(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_names_the_missing_field() {
        let err = ValidationError::Missing("Prompt");
        assert_eq!(err.to_string(), "Prompt is required");
    }

    #[test]
    fn build_error_timed_out_carries_logs() {
        let err = BuildError::TimedOut {
            secs: 300,
            logs: "partial output".to_string(),
        };
        assert_eq!(err.logs(), "partial output");
        assert!(err.to_string().contains("300"));
    }

    #[test]
    fn build_error_artifact_missing_carries_path_and_logs() {
        let err = BuildError::ArtifactMissing {
            path: PathBuf::from("/tmp/1/dist/app.exe"),
            logs: "ERROR: syntax error".to_string(),
        };
        match &err {
            BuildError::ArtifactMissing { path, logs } => {
                assert_eq!(path, &PathBuf::from("/tmp/1/dist/app.exe"));
                assert!(logs.contains("syntax error"));
            }
            _ => panic!("Expected ArtifactMissing"),
        }
        assert!(err.to_string().contains("/tmp/1/dist/app.exe"));
    }

    #[test]
    fn build_error_spawn_has_no_logs() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "python not found");
        let err = BuildError::Spawn {
            program: "python".to_string(),
            source: io_err,
        };
        assert_eq!(err.logs(), "");
        assert!(err.to_string().contains("python"));
    }

    #[test]
    fn publish_error_converts_from_validation_error() {
        let err: PublishError = ValidationError::InvalidRepoUrl("nope".into()).into();
        match &err {
            PublishError::Invalid(ValidationError::InvalidRepoUrl(url)) => assert_eq!(url, "nope"),
            _ => panic!("Expected PublishError::Invalid"),
        }
        assert_eq!(err.to_string(), "Invalid repository URL: nope");
    }

    #[test]
    fn gateway_error_status_display_includes_body() {
        let err = GatewayError::Status {
            status: 403,
            body: "API key not valid".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("403"));
        assert!(msg.contains("API key not valid"));
    }
}
