use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{GitHubApi, RepoSlug, TreeEntry};
use crate::errors::{PublishError, ValidationError};

/// Content to commit onto a branch.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    #[serde(default)]
    pub repo_url: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub commit_message: String,
    #[serde(default)]
    pub content: String,
    /// Personal access token; falls back to the configured token.
    #[serde(default, rename = "pat")]
    pub token: Option<String>,
}

/// The commit a publish produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishOutcome {
    pub commit_sha: String,
    pub commit_url: String,
}

/// Commits content to a fixed path on a branch via the Git Data API.
#[derive(Clone)]
pub struct Publisher {
    api: Arc<dyn GitHubApi>,
    commit_path: String,
    default_token: Option<String>,
}

impl Publisher {
    pub fn new(
        api: Arc<dyn GitHubApi>,
        commit_path: impl Into<String>,
        default_token: Option<String>,
    ) -> Self {
        Self {
            api,
            commit_path: commit_path.into(),
            default_token,
        }
    }

    pub fn commit_path(&self) -> &str {
        &self.commit_path
    }

    /// Publish `req.content` as one new commit on `req.branch`.
    ///
    /// All input validation happens before the first GitHub call. The branch
    /// is moved with a non-force update, so a concurrent push makes this fail
    /// instead of discarding the other commit. Not idempotent: every call
    /// creates a new commit.
    pub async fn publish(&self, req: &PublishRequest) -> Result<PublishOutcome, PublishError> {
        let repo = RepoSlug::parse(&req.repo_url)?;
        let branch = req.branch.trim();
        if branch.is_empty() {
            return Err(ValidationError::Missing("branch").into());
        }
        if req.commit_message.trim().is_empty() {
            return Err(ValidationError::Missing("commitMessage").into());
        }
        let token = req
            .token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .or(self.default_token.as_deref())
            .ok_or(ValidationError::Missing("pat"))?;

        let gh = |e: anyhow::Error| PublishError::GitHub(format!("{:#}", e));
        let api = &self.api;

        let head = api.branch_head(&repo, branch, Some(token)).await.map_err(gh)?;
        let base_tree = api.commit_tree(&repo, &head, Some(token)).await.map_err(gh)?;
        let blob = api.create_blob(&repo, &req.content, Some(token)).await.map_err(gh)?;
        let entries = [TreeEntry::file(&self.commit_path, blob)];
        let tree = api
            .create_tree(&repo, &base_tree, &entries, Some(token))
            .await
            .map_err(gh)?;
        let commit = api
            .create_commit(&repo, &req.commit_message, &tree, &[head.clone()], Some(token))
            .await
            .map_err(gh)?;
        api.update_ref(&repo, branch, &commit.sha, false, Some(token))
            .await
            .map_err(gh)?;

        tracing::info!(repo = %repo, branch, commit = %commit.sha, parent = %head, "Published commit");
        Ok(PublishOutcome {
            commit_sha: commit.sha,
            commit_url: commit.html_url,
        })
    }
}
