//! End-to-end tests of the GitHub client, publisher and importer against an
//! in-process fake of the GitHub REST API.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use codepilot::config::GitHubConfig;
use codepilot::errors::{ImportError, PublishError};
use codepilot::github::{GitHubApi, GitHubClient, Importer, PublishRequest, Publisher};

const TOKEN: &str = "ghp_fake_token";

#[derive(Default)]
struct FakeRepo {
    base_url: String,
    head: String,
    /// commit sha -> (tree sha, parents)
    commits: HashMap<String, (String, Vec<String>)>,
    /// tree sha -> file paths it adds
    trees: HashMap<String, Vec<String>>,
    blobs: HashMap<String, String>,
    counter: u32,
    reject_updates: bool,
}

impl FakeRepo {
    fn next(&mut self, prefix: &str) -> String {
        self.counter += 1;
        format!("{}{:04}", prefix, self.counter)
    }
}

type Shared = Arc<Mutex<FakeRepo>>;

fn authorized(headers: &HeaderMap) -> bool {
    let expected = format!("Bearer {}", TOKEN);
    headers.get("authorization").and_then(|v| v.to_str().ok()) == Some(expected.as_str())
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({"message": "Bad credentials"})),
    )
        .into_response()
}

async fn get_ref(
    State(repo): State<Shared>,
    headers: HeaderMap,
    Path((_owner, _name, branch)): Path<(String, String, String)>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    if branch != "main" {
        return (StatusCode::NOT_FOUND, Json(serde_json::json!({"message": "Not Found"}))).into_response();
    }
    let head = repo.lock().unwrap().head.clone();
    Json(serde_json::json!({"ref": "refs/heads/main", "object": {"sha": head, "type": "commit"}})).into_response()
}

async fn get_commit(
    State(repo): State<Shared>,
    Path((_owner, _name, sha)): Path<(String, String, String)>,
) -> Response {
    let repo = repo.lock().unwrap();
    match repo.commits.get(&sha) {
        Some((tree, _)) => Json(serde_json::json!({"sha": sha, "tree": {"sha": tree}})).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn create_blob(
    State(repo): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let mut repo = repo.lock().unwrap();
    let sha = repo.next("blob");
    let content = body["content"].as_str().unwrap_or_default().to_string();
    repo.blobs.insert(sha.clone(), content);
    (StatusCode::CREATED, Json(serde_json::json!({"sha": sha}))).into_response()
}

async fn create_tree(State(repo): State<Shared>, Json(body): Json<serde_json::Value>) -> Response {
    let mut repo = repo.lock().unwrap();
    let base = body["base_tree"].as_str().unwrap_or_default();
    if !repo.commits.values().any(|(tree, _)| tree == base) {
        return (StatusCode::UNPROCESSABLE_ENTITY, "base_tree is not a tree").into_response();
    }
    let paths = body["tree"]
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .filter_map(|e| e["path"].as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();
    let sha = repo.next("tree");
    repo.trees.insert(sha.clone(), paths);
    (StatusCode::CREATED, Json(serde_json::json!({"sha": sha}))).into_response()
}

async fn create_commit(State(repo): State<Shared>, Json(body): Json<serde_json::Value>) -> Response {
    let mut repo = repo.lock().unwrap();
    let tree = body["tree"].as_str().unwrap_or_default().to_string();
    let parents: Vec<String> = body["parents"]
        .as_array()
        .map(|p| p.iter().filter_map(|s| s.as_str().map(String::from)).collect())
        .unwrap_or_default();
    let sha = repo.next("commit");
    repo.commits.insert(sha.clone(), (tree, parents));
    let html_url = format!("{}/octo/hello/commit/{}", repo.base_url, sha);
    (
        StatusCode::CREATED,
        Json(serde_json::json!({"sha": sha, "html_url": html_url})),
    )
        .into_response()
}

async fn update_ref(
    State(repo): State<Shared>,
    Path((_owner, _name, _branch)): Path<(String, String, String)>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let mut repo = repo.lock().unwrap();
    let sha = body["sha"].as_str().unwrap_or_default().to_string();
    let force = body["force"].as_bool().unwrap_or(false);
    let fast_forward = repo
        .commits
        .get(&sha)
        .is_some_and(|(_, parents)| parents.contains(&repo.head));
    if repo.reject_updates || (!force && !fast_forward) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({"message": "Update is not a fast forward"})),
        )
            .into_response();
    }
    repo.head = sha.clone();
    Json(serde_json::json!({"object": {"sha": sha}})).into_response()
}

async fn list_contents(State(repo): State<Shared>) -> Response {
    let base = repo.lock().unwrap().base_url.clone();
    Json(serde_json::json!([
        {"type": "file", "path": "README.md", "download_url": format!("{}/raw/README.md", base)},
        {"type": "dir", "path": "src", "download_url": null},
        {"type": "file", "path": "main.py", "download_url": format!("{}/raw/main.py", base)}
    ]))
    .into_response()
}

async fn raw_file(Path(name): Path<String>) -> Response {
    match name.as_str() {
        "README.md" => "# Hello\n".into_response(),
        "main.py" => "print('hello')\n".into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

fn fake_github(repo: Shared) -> Router {
    Router::new()
        .route("/repos/{owner}/{name}/git/ref/heads/{branch}", get(get_ref))
        .route("/repos/{owner}/{name}/git/commits/{sha}", get(get_commit))
        .route("/repos/{owner}/{name}/git/blobs", post(create_blob))
        .route("/repos/{owner}/{name}/git/trees", post(create_tree))
        .route("/repos/{owner}/{name}/git/commits", post(create_commit))
        .route("/repos/{owner}/{name}/git/refs/heads/{branch}", patch(update_ref))
        .route("/repos/{owner}/{name}/contents", get(list_contents))
        .route("/raw/{name}", get(raw_file))
        .with_state(repo)
}

/// Start the fake and return its shared state and a client pointed at it.
/// Returns `None` when binding a local port is not permitted.
async fn start_fake() -> Option<(Shared, Arc<dyn GitHubApi>)> {
    let listener = match tokio::net::TcpListener::bind("127.0.0.1:0").await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Skipping fake GitHub test (bind failed): {}", e);
            return None;
        }
    };
    let base_url = format!("http://{}", listener.local_addr().ok()?);

    let mut repo = FakeRepo {
        base_url: base_url.clone(),
        head: "commit0000".to_string(),
        ..FakeRepo::default()
    };
    repo.commits
        .insert("commit0000".to_string(), ("tree0000".to_string(), Vec::new()));
    let repo = Arc::new(Mutex::new(repo));

    let app = fake_github(Arc::clone(&repo));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let client = GitHubClient::new(&GitHubConfig {
        api_base: base_url,
        ..GitHubConfig::default()
    })
    .ok()?;
    Some((repo, Arc::new(client)))
}

fn publish_request(content: &str) -> PublishRequest {
    PublishRequest {
        repo_url: "https://github.com/octo/hello".to_string(),
        branch: "main".to_string(),
        commit_message: "Add generated code".to_string(),
        content: content.to_string(),
        token: Some(TOKEN.to_string()),
    }
}

#[tokio::test]
async fn test_publish_fast_forwards_branch() {
    let Some((repo, api)) = start_fake().await else { return };
    let publisher = Publisher::new(api, "generated-code.txt", None);

    let outcome = publisher.publish(&publish_request("print(1)")).await.unwrap();

    let repo = repo.lock().unwrap();
    assert_eq!(repo.head, outcome.commit_sha);
    assert!(outcome.commit_url.ends_with(&outcome.commit_sha));

    let (tree, parents) = &repo.commits[&outcome.commit_sha];
    assert_eq!(parents, &vec!["commit0000".to_string()]);
    assert_eq!(repo.trees[tree], vec!["generated-code.txt".to_string()]);
    assert!(repo.blobs.values().any(|b| b == "print(1)"));
}

#[tokio::test]
async fn test_repeated_publishes_chain_commits() {
    let Some((repo, api)) = start_fake().await else { return };
    let publisher = Publisher::new(api, "generated-code.txt", None);

    let first = publisher.publish(&publish_request("same")).await.unwrap();
    let second = publisher.publish(&publish_request("same")).await.unwrap();
    assert_ne!(first.commit_sha, second.commit_sha);

    let repo = repo.lock().unwrap();
    assert_eq!(repo.head, second.commit_sha);
    assert_eq!(repo.commits[&second.commit_sha].1, vec![first.commit_sha.clone()]);
}

#[tokio::test]
async fn test_rejected_update_leaves_branch_untouched() {
    let Some((repo, api)) = start_fake().await else { return };
    repo.lock().unwrap().reject_updates = true;
    let publisher = Publisher::new(api, "generated-code.txt", None);

    let err = publisher.publish(&publish_request("x")).await.unwrap_err();
    match err {
        PublishError::GitHub(msg) => assert!(msg.contains("422"), "unexpected: {}", msg),
        other => panic!("Expected GitHub error, got {:?}", other),
    }
    assert_eq!(repo.lock().unwrap().head, "commit0000");
}

#[tokio::test]
async fn test_bad_token_is_github_error() {
    let Some((repo, api)) = start_fake().await else { return };
    let publisher = Publisher::new(api, "generated-code.txt", None);

    let mut req = publish_request("x");
    req.token = Some("ghp_wrong".to_string());
    let err = publisher.publish(&req).await.unwrap_err();
    match err {
        PublishError::GitHub(msg) => assert!(msg.contains("401"), "unexpected: {}", msg),
        other => panic!("Expected GitHub error, got {:?}", other),
    }
    assert!(repo.lock().unwrap().blobs.is_empty());
}

#[tokio::test]
async fn test_import_downloads_root_files() {
    let Some((_repo, api)) = start_fake().await else { return };
    let importer = Importer::new(api, None);

    let files = importer.import("https://github.com/octo/hello.git").await.unwrap();
    let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["README.md", "main.py"]);
    assert_eq!(files[1].content, "print('hello')\n");
}

#[tokio::test]
async fn test_import_invalid_url_makes_no_request() {
    let Some((_repo, api)) = start_fake().await else { return };
    let importer = Importer::new(api, None);

    let err = importer.import("https://example.com/octo/hello").await.unwrap_err();
    assert!(matches!(err, ImportError::Invalid(_)));
}
