use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header, request::Parts},
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use super::api::{self, AppState};
use crate::config::{PilotConfig, ServerConfig};

/// Check a browser origin against the allowlist. A pattern is either an exact
/// origin or contains a single `*` matching any run of characters.
pub fn origin_allowed(origin: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|pattern| match pattern.split_once('*') {
        None => pattern == origin,
        Some((prefix, suffix)) => {
            origin.len() >= prefix.len() + suffix.len()
                && origin.starts_with(prefix)
                && origin.ends_with(suffix)
        }
    })
}

fn cors_layer(patterns: Vec<String>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &Parts| {
                origin
                    .to_str()
                    .map(|o| origin_allowed(o, &patterns))
                    .unwrap_or(false)
            },
        ))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Build the full application router with upload limits and, when origins
/// are configured, CORS.
pub fn build_router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    let mut app = api::api_router()
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .with_state(state);

    if !config.allowed_origins.is_empty() {
        app = app.layer(cors_layer(config.allowed_origins.clone()));
    }
    app
}

/// Start the HTTP server and run until Ctrl-C.
pub async fn start_server(config: PilotConfig, open_browser: bool) -> Result<()> {
    let server = config.server.clone();
    let state = Arc::new(AppState::from_config(config).context("Failed to initialize services")?);
    let app = build_router(state, &server);

    let addr = format!("{}:{}", server.host, server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    let url = format!("http://{}", local_addr);
    println!("CodePilot running at {}", url);
    tracing::info!(%local_addr, origins = server.allowed_origins.len(), "Server listening");

    if open_browser {
        if let Err(e) = open::that(&url) {
            tracing::warn!("Failed to open browser: {}", e);
        }
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    println!("Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    println!("\nShutting down...");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::api::testing::default_state;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn patterns(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_origin_allowed_exact_and_wildcard() {
        let allow = patterns(&["http://localhost:3000", "https://*.cloudworkstations.dev"]);
        assert!(origin_allowed("http://localhost:3000", &allow));
        assert!(origin_allowed("https://9000-abc.cloudworkstations.dev", &allow));
        assert!(!origin_allowed("http://localhost:3001", &allow));
        assert!(!origin_allowed("https://evil.dev", &allow));
        // Prefix and suffix must not overlap.
        assert!(!origin_allowed("https://.dev", &patterns(&["https://.*.dev"])));
        assert!(!origin_allowed("http://localhost:3000", &[]));
    }

    #[tokio::test]
    async fn test_health_via_full_router() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(default_state(dir.path()), &ServerConfig::default());
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cors_admits_listed_origin_only() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            allowed_origins: patterns(&["https://*.example.dev"]),
            ..ServerConfig::default()
        };
        let app = build_router(default_state(dir.path()), &config);

        let preflight = |origin: &str| {
            Request::builder()
                .method("OPTIONS")
                .uri("/api/generate-code")
                .header("origin", origin)
                .header("access-control-request-method", "POST")
                .body(Body::empty())
                .unwrap()
        };

        let resp = app.clone().oneshot(preflight("https://ws-1.example.dev")).await.unwrap();
        assert_eq!(
            resp.headers()["access-control-allow-origin"],
            "https://ws-1.example.dev"
        );

        let resp = app.oneshot(preflight("https://other.dev")).await.unwrap();
        assert!(resp.headers().get("access-control-allow-origin").is_none());
    }

    #[tokio::test]
    async fn test_no_cors_headers_without_allowlist() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(default_state(dir.path()), &ServerConfig::default());
        let req = Request::builder()
            .uri("/health")
            .header("origin", "https://anywhere.dev")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert!(resp.headers().get("access-control-allow-origin").is_none());
    }

    #[tokio::test]
    async fn test_upload_limit_rejects_large_body() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            max_upload_bytes: 64,
            ..ServerConfig::default()
        };
        let app = build_router(default_state(dir.path()), &config);

        let boundary = "limit-boundary";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"big.py\"\r\n\r\n{payload}\r\n--{b}--\r\n",
            b = boundary,
            payload = "x".repeat(4096)
        );
        let req = Request::builder()
            .method("POST")
            .uri("/api/build-exe")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert!(resp.status().is_client_error());
    }
}
