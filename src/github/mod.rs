//! GitHub integration: publish generated content as a commit, import a
//! repository's top-level files.
//!
//! | Module     | Responsibility                                          |
//! |------------|---------------------------------------------------------|
//! | `client`   | `GitHubClient`: reqwest client for the REST API         |
//! | `publish`  | `Publisher`: blob, tree, commit, fast-forward ref       |
//! | `importer` | `Importer`: root listing plus concurrent raw downloads  |
//!
//! Both flows talk to GitHub only through the [`GitHubApi`] trait so they can
//! be tested without the network.

pub mod client;
pub mod importer;
pub mod publish;

use std::sync::LazyLock;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

pub use client::GitHubClient;
pub use importer::{Importer, RepoFile};
pub use publish::{PublishOutcome, PublishRequest, Publisher};

static REPO_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"github\.com/([^/]+)/([^/.]+)").expect("valid regex"));

/// Owner and repository name parsed from a GitHub URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoSlug {
    pub owner: String,
    pub repo: String,
}

impl RepoSlug {
    /// Parse `github.com/<owner>/<repo>` out of `url`.
    ///
    /// Handles:
    /// - `https://github.com/owner/repo`
    /// - `https://github.com/owner/repo.git`
    /// - `https://github.com/owner/repo/tree/main/src`
    /// - `github.com/owner/repo`
    pub fn parse(url: &str) -> Result<Self, ValidationError> {
        let url = url.trim();
        let caps = REPO_URL_RE
            .captures(url)
            .ok_or_else(|| ValidationError::InvalidRepoUrl(url.to_string()))?;
        Ok(Self {
            owner: caps[1].to_string(),
            repo: caps[2].to_string(),
        })
    }
}

impl std::fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// One entry of a tree to create on top of a base tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeEntry {
    pub path: String,
    pub mode: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub sha: String,
}

impl TreeEntry {
    /// A regular (non-executable) file blob.
    pub fn file(path: impl Into<String>, blob_sha: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: "100644".to_string(),
            kind: "blob".to_string(),
            sha: blob_sha.into(),
        }
    }
}

/// A commit created through the Git Data API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommitInfo {
    pub sha: String,
    pub html_url: String,
}

/// One entry of a repository directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContentEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub path: String,
    pub download_url: Option<String>,
}

/// The GitHub REST operations used by publishing and importing.
#[async_trait]
pub trait GitHubApi: Send + Sync {
    /// Commit SHA the branch currently points to.
    async fn branch_head(&self, repo: &RepoSlug, branch: &str, token: Option<&str>) -> Result<String>;

    /// Tree SHA of a commit.
    async fn commit_tree(&self, repo: &RepoSlug, commit_sha: &str, token: Option<&str>) -> Result<String>;

    async fn create_blob(&self, repo: &RepoSlug, content: &str, token: Option<&str>) -> Result<String>;

    async fn create_tree(
        &self,
        repo: &RepoSlug,
        base_tree: &str,
        entries: &[TreeEntry],
        token: Option<&str>,
    ) -> Result<String>;

    async fn create_commit(
        &self,
        repo: &RepoSlug,
        message: &str,
        tree: &str,
        parents: &[String],
        token: Option<&str>,
    ) -> Result<CommitInfo>;

    /// Move a branch to `sha`. With `force = false` GitHub rejects non-fast-forward updates.
    async fn update_ref(
        &self,
        repo: &RepoSlug,
        branch: &str,
        sha: &str,
        force: bool,
        token: Option<&str>,
    ) -> Result<()>;

    /// Entries of the repository root on the default branch.
    async fn list_contents(&self, repo: &RepoSlug, token: Option<&str>) -> Result<Vec<ContentEntry>>;

    /// Fetch a raw file as text.
    async fn download(&self, url: &str, token: Option<&str>) -> Result<String>;
}
