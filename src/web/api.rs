use std::sync::Arc;

use anyhow::Result;
use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::config::PilotConfig;
use crate::credentials::{CredentialSource, CredentialStore, KeyStatus};
use crate::errors::{BuildError, GatewayError, ImportError, PublishError, ValidationError};
use crate::gateway::{CodeGenerator, GeminiClient};
use crate::github::{
    GitHubApi, GitHubClient, Importer, PublishRequest, Publisher, RepoFile,
};
use crate::packaging::{Packager, SourceFile};
use crate::prompt::{self, GenerationRequest};

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub config: PilotConfig,
    pub credentials: Arc<CredentialStore>,
    pub generator: CodeGenerator,
    pub packager: Packager,
    pub publisher: Publisher,
    pub importer: Importer,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Wire the production clients from configuration.
    pub fn from_config(config: PilotConfig) -> Result<Self> {
        let credentials = Arc::new(CredentialStore::from_env(
            config.credentials.resolved_store_path(),
        ));
        let model = Arc::new(GeminiClient::new(&config.llm)?);
        let github: Arc<dyn GitHubApi> = Arc::new(GitHubClient::new(&config.github)?);
        let token = config.github.token.clone();

        Ok(Self {
            credentials,
            generator: CodeGenerator::new(model),
            packager: Packager::new(config.packaging.clone()),
            publisher: Publisher::new(
                Arc::clone(&github),
                config.github.commit_path.clone(),
                token.clone(),
            ),
            importer: Importer::new(github, token),
            config,
        })
    }
}

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCodeRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub uploaded_files: Vec<String>,
}

#[derive(Deserialize)]
pub struct GeneratePythonRequest {
    #[serde(default)]
    pub prompt: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    #[serde(default)]
    pub repo_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveKeyRequest {
    #[serde(default)]
    pub api_key: String,
}

// ── Response payload types ────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCodeResponse {
    pub success: bool,
    pub generated_code: String,
    pub filename: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePythonResponse {
    pub success: bool,
    pub python_code: String,
    pub filename: String,
    pub message: String,
    pub regenerated: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResponse {
    pub success: bool,
    pub message: String,
    pub job_id: String,
    pub output_path: String,
    pub download_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_path: Option<String>,
    pub logs: String,
}

#[derive(Serialize)]
pub struct ImportResponse {
    pub success: bool,
    pub files: Vec<RepoFile>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResponse {
    pub success: bool,
    pub commit_sha: String,
    pub commit_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyStatus {
    pub configured: bool,
    pub source: CredentialSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub masked: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<KeyStatus>,
}

// ── Error handling ────────────────────────────────────────────────────

pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
    /// A 500 that carries the underlying cause and, for builds, the tool output.
    Failed {
        error: String,
        details: String,
        logs: Option<String>,
    },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, serde_json::json!({"error": msg})),
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, serde_json::json!({"error": msg}))
            }
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({"error": msg}),
            ),
            ApiError::Failed {
                error,
                details,
                logs,
            } => {
                let mut body = serde_json::json!({"error": error, "details": details});
                if let Some(logs) = logs {
                    body["logs"] = serde_json::Value::String(logs);
                }
                (StatusCode::INTERNAL_SERVER_ERROR, body)
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

fn gateway_failure(summary: &str, e: GatewayError) -> ApiError {
    tracing::error!(error = %e, "{}", summary);
    ApiError::Failed {
        error: summary.to_string(),
        details: e.to_string(),
        logs: None,
    }
}

impl From<BuildError> for ApiError {
    fn from(e: BuildError) -> Self {
        tracing::error!(error = %e, "Build failed");
        ApiError::Failed {
            error: "Build failed".to_string(),
            logs: Some(e.logs().to_string()),
            details: e.to_string(),
        }
    }
}

impl From<PublishError> for ApiError {
    fn from(e: PublishError) -> Self {
        match e {
            PublishError::Invalid(v) => v.into(),
            PublishError::GitHub(cause) => {
                tracing::error!(%cause, "Publish to GitHub failed");
                ApiError::Internal("Failed to push to GitHub".to_string())
            }
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(e: ImportError) -> Self {
        match e {
            ImportError::Invalid(v) => v.into(),
            ImportError::Upstream(cause) => {
                tracing::error!(%cause, "Repository import failed");
                ApiError::Failed {
                    error: "Failed to import repository".to_string(),
                    details: cause,
                    logs: None,
                }
            }
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/generate-code", post(generate_code))
        .route("/api/generate-python", post(generate_python))
        .route("/api/build-exe", post(build_exe))
        .route("/api/artifacts/{job}/{name}", get(download_artifact))
        .route("/api/github/import", post(import_repo))
        .route("/api/github", post(publish_to_github))
        .route("/api/api-key", get(api_key_status).post(save_api_key))
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn generate_code(
    State(state): State<SharedState>,
    Json(req): Json<GenerateCodeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.prompt.trim().is_empty() {
        return Err(ValidationError::Missing("Prompt").into());
    }
    let request = GenerationRequest::new(req.prompt).with_files(req.uploaded_files);
    let credential = state.credentials.resolve();
    tracing::info!(
        files = request.uploaded_files.len(),
        key_source = %credential.source,
        "Generating code"
    );

    let result = state
        .generator
        .generate(&request, &credential)
        .await
        .map_err(|e| gateway_failure("Failed to generate code", e))?;

    Ok(Json(GenerateCodeResponse {
        success: true,
        generated_code: result.generated_code,
        filename: result.filename,
    }))
}

async fn generate_python(
    State(state): State<SharedState>,
    Json(req): Json<GeneratePythonRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.prompt.trim().is_empty() {
        return Err(ValidationError::Missing("Prompt").into());
    }
    let request = GenerationRequest::new(prompt::wrap_mobile_request(req.prompt.trim()));
    let credential = state.credentials.resolve();

    let result = state
        .generator
        .generate_mobile(&request, &credential)
        .await
        .map_err(|e| gateway_failure("Failed to generate Python code", e))?;

    Ok(Json(GeneratePythonResponse {
        success: true,
        python_code: result.generated_code,
        filename: result.filename,
        message: "Python code generated successfully".to_string(),
        regenerated: result.regenerated,
    }))
}

async fn build_exe(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut bytes: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        match field.name() {
            Some("file") => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;
                bytes = Some(data.to_vec());
            }
            Some("fileName") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read fileName: {}", e)))?;
                file_name = Some(text);
            }
            _ => {}
        }
    }

    let bytes = bytes.ok_or(ValidationError::Missing("file"))?;
    let name = file_name
        .filter(|n| !n.trim().is_empty())
        .ok_or(ValidationError::Missing("fileName"))?;
    let source = SourceFile::new(name, bytes)?;

    let artifact = state.packager.build(&source).await?;
    let executable_name = artifact.executable_name();

    Ok(Json(BuildResponse {
        success: true,
        message: "Executable built successfully".to_string(),
        download_url: format!("/api/artifacts/{}/{}", artifact.job_id, executable_name),
        job_id: artifact.job_id,
        output_path: artifact.executable_path.display().to_string(),
        project_path: artifact.project_dir.map(|p| p.display().to_string()),
        logs: artifact.logs,
    }))
}

async fn download_artifact(
    State(state): State<SharedState>,
    Path((job, name)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let path = state.packager.artifact_path(&job, &name)?;
    if !path.is_file() {
        return Err(ApiError::NotFound(format!("Artifact not found: {}/{}", job, name)));
    }

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to read artifact: {}", e)))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                content_disposition(&name),
            ),
        ],
        bytes,
    ))
}

/// `attachment` disposition with `name` as a quoted-string.
fn content_disposition(name: &str) -> String {
    let mut quoted = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '"' | '\\' => {
                quoted.push('\\');
                quoted.push(c);
            }
            c if c.is_control() => quoted.push('_'),
            c => quoted.push(c),
        }
    }
    format!("attachment; filename=\"{}\"", quoted)
}

async fn import_repo(
    State(state): State<SharedState>,
    Json(req): Json<ImportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let files = state.importer.import(&req.repo_url).await?;
    Ok(Json(ImportResponse {
        success: true,
        files,
    }))
}

async fn publish_to_github(
    State(state): State<SharedState>,
    Json(req): Json<PublishRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.publisher.publish(&req).await?;
    Ok(Json(PublishResponse {
        success: true,
        commit_sha: outcome.commit_sha,
        commit_url: outcome.commit_url,
    }))
}

fn key_status(store: &CredentialStore, status: Option<KeyStatus>) -> ApiKeyStatus {
    let credential = store.resolve();
    ApiKeyStatus {
        configured: credential.is_present(),
        source: credential.source,
        masked: credential.is_present().then(|| credential.masked()),
        status,
    }
}

async fn api_key_status(State(state): State<SharedState>) -> impl IntoResponse {
    Json(key_status(&state.credentials, None))
}

async fn save_api_key(
    State(state): State<SharedState>,
    Json(req): Json<SaveKeyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .credentials
        .save(&req.api_key)
        .map_err(|e| ApiError::Internal(format!("Failed to save API key: {:#}", e)))?;

    let key = req.api_key.trim();
    let status = if key.is_empty() {
        KeyStatus::Unchecked
    } else {
        state.generator.model().check_key(key).await
    };
    Ok(Json(key_status(&state.credentials, Some(status))))
}
