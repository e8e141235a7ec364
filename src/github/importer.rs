use std::sync::Arc;

use futures::future::try_join_all;
use serde::Serialize;

use super::{GitHubApi, RepoSlug};
use crate::errors::{ImportError, ValidationError};

/// A file pulled from a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoFile {
    pub path: String,
    pub content: String,
}

/// Imports the top-level files of a GitHub repository.
#[derive(Clone)]
pub struct Importer {
    api: Arc<dyn GitHubApi>,
    token: Option<String>,
}

impl Importer {
    pub fn new(api: Arc<dyn GitHubApi>, token: Option<String>) -> Self {
        Self { api, token }
    }

    /// Fetch every regular file in the repository root. Directories and
    /// entries without a download URL are skipped; listing order is kept.
    pub async fn import(&self, repo_url: &str) -> Result<Vec<RepoFile>, ImportError> {
        if repo_url.trim().is_empty() {
            return Err(ValidationError::Missing("repoUrl").into());
        }
        let repo = RepoSlug::parse(repo_url)?;
        let token = self.token.as_deref();

        let entries = self
            .api
            .list_contents(&repo, token)
            .await
            .map_err(|e| ImportError::Upstream(format!("{:#}", e)))?;

        let downloads = entries
            .into_iter()
            .filter(|e| e.kind == "file")
            .filter_map(|e| e.download_url.map(|url| (e.path, url)))
            .map(|(path, url)| async move {
                let content = self.api.download(&url, token).await?;
                Ok::<_, anyhow::Error>(RepoFile { path, content })
            });

        let files = try_join_all(downloads)
            .await
            .map_err(|e| ImportError::Upstream(format!("{:#}", e)))?;
        tracing::info!(repo = %repo, files = files.len(), "Imported repository");
        Ok(files)
    }
}
