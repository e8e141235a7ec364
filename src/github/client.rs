use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{CommitInfo, ContentEntry, GitHubApi, RepoSlug, TreeEntry};
use crate::config::GitHubConfig;

#[derive(Debug, Deserialize)]
struct RefResponse {
    object: RefObject,
}

#[derive(Debug, Deserialize)]
struct RefObject {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    tree: ShaOnly,
}

#[derive(Debug, Deserialize)]
struct ShaOnly {
    sha: String,
}

/// reqwest-backed GitHub REST client.
pub struct GitHubClient {
    client: reqwest::Client,
    api_base: String,
    user_agent: String,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create GitHub HTTP client")?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            user_agent: config.user_agent.clone(),
        })
    }

    fn repo_url(&self, repo: &RepoSlug, path: &str) -> String {
        format!("{}/repos/{}/{}/{}", self.api_base, repo.owner, repo.repo, path)
    }

    fn request(
        &self,
        method: reqwest::Method,
        url: &str,
        token: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .header("User-Agent", &self.user_agent);
        match token {
            Some(token) => builder.header("Authorization", format!("Bearer {}", token)),
            None => builder,
        }
    }

    /// Send a request, fail on non-success status with the response body, and decode JSON.
    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<T> {
        let resp = send_checked(builder, what).await?;
        resp.json::<T>()
            .await
            .with_context(|| format!("Failed to parse {} response from GitHub", what))
    }
}

async fn send_checked(builder: reqwest::RequestBuilder, what: &str) -> Result<reqwest::Response> {
    let resp = builder
        .send()
        .await
        .with_context(|| format!("Failed to send {} request to GitHub", what))?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("GitHub {} returned {}: {}", what, status, body.trim());
    }
    Ok(resp)
}

#[async_trait]
impl GitHubApi for GitHubClient {
    async fn branch_head(&self, repo: &RepoSlug, branch: &str, token: Option<&str>) -> Result<String> {
        let url = self.repo_url(repo, &format!("git/ref/heads/{}", branch));
        let resp: RefResponse = self
            .send_json(self.request(reqwest::Method::GET, &url, token), "get ref")
            .await?;
        Ok(resp.object.sha)
    }

    async fn commit_tree(&self, repo: &RepoSlug, commit_sha: &str, token: Option<&str>) -> Result<String> {
        let url = self.repo_url(repo, &format!("git/commits/{}", commit_sha));
        let resp: CommitResponse = self
            .send_json(self.request(reqwest::Method::GET, &url, token), "get commit")
            .await?;
        Ok(resp.tree.sha)
    }

    async fn create_blob(&self, repo: &RepoSlug, content: &str, token: Option<&str>) -> Result<String> {
        let url = self.repo_url(repo, "git/blobs");
        let body = serde_json::json!({ "content": content, "encoding": "utf-8" });
        let resp: ShaOnly = self
            .send_json(
                self.request(reqwest::Method::POST, &url, token).json(&body),
                "create blob",
            )
            .await?;
        Ok(resp.sha)
    }

    async fn create_tree(
        &self,
        repo: &RepoSlug,
        base_tree: &str,
        entries: &[TreeEntry],
        token: Option<&str>,
    ) -> Result<String> {
        let url = self.repo_url(repo, "git/trees");
        let body = serde_json::json!({ "base_tree": base_tree, "tree": entries });
        let resp: ShaOnly = self
            .send_json(
                self.request(reqwest::Method::POST, &url, token).json(&body),
                "create tree",
            )
            .await?;
        Ok(resp.sha)
    }

    async fn create_commit(
        &self,
        repo: &RepoSlug,
        message: &str,
        tree: &str,
        parents: &[String],
        token: Option<&str>,
    ) -> Result<CommitInfo> {
        let url = self.repo_url(repo, "git/commits");
        let body = serde_json::json!({ "message": message, "tree": tree, "parents": parents });
        self.send_json(
            self.request(reqwest::Method::POST, &url, token).json(&body),
            "create commit",
        )
        .await
    }

    async fn update_ref(
        &self,
        repo: &RepoSlug,
        branch: &str,
        sha: &str,
        force: bool,
        token: Option<&str>,
    ) -> Result<()> {
        let url = self.repo_url(repo, &format!("git/refs/heads/{}", branch));
        let body = serde_json::json!({ "sha": sha, "force": force });
        send_checked(
            self.request(reqwest::Method::PATCH, &url, token).json(&body),
            "update ref",
        )
        .await?;
        Ok(())
    }

    async fn list_contents(&self, repo: &RepoSlug, token: Option<&str>) -> Result<Vec<ContentEntry>> {
        let url = self.repo_url(repo, "contents");
        self.send_json(self.request(reqwest::Method::GET, &url, token), "list contents")
            .await
    }

    async fn download(&self, url: &str, token: Option<&str>) -> Result<String> {
        let resp = send_checked(self.request(reqwest::Method::GET, url, token), "download").await?;
        resp.text()
            .await
            .with_context(|| format!("Failed to read {}", url))
    }
}
