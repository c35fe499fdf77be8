//! Axum server setup
//!
//! Server skeleton with:
//! - Localhost-only CORS by default
//! - Tracing middleware
//! - Uploaded files served read-only under `/uploads`
//! - Blacklist sweeps running alongside, stopped at shutdown
//! - Graceful shutdown on SIGTERM/Ctrl+C

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Uri};
use axum::Router;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use super::error::ApiError;
use super::routes;
use crate::auth::{TokenError, TokenService};
use crate::config::AppConfig;
use crate::db::migrations;
use crate::storage::{MediaStorage, StorageError, PUBLIC_PREFIX};
use crate::sweep;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to (default: 127.0.0.1:3030)
    pub bind_addr: SocketAddr,

    /// Allow permissive CORS (default: false = localhost only)
    ///
    /// WARNING: Setting this to true allows any origin.
    pub cors_permissive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3030)),
            cors_permissive: false,
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: AppConfig,
    pub tokens: TokenService,
    pub storage: MediaStorage,
}

impl AppState {
    pub fn new(pool: PgPool, config: AppConfig) -> Result<Self, ServerError> {
        let tokens = TokenService::new(&config.jwt)?;
        let storage = MediaStorage::new(config.uploads_root.clone(), config.upload_limits);
        Ok(Self {
            pool,
            config,
            tokens,
            storage,
        })
    }
}

fn cors_layer(permissive: bool) -> CorsLayer {
    if permissive {
        tracing::warn!("CORS: Permissive mode enabled - all origins allowed");
        CorsLayer::permissive()
    } else {
        // Localhost only
        CorsLayer::new()
            .allow_origin([
                HeaderValue::from_static("http://localhost:3000"),
                HeaderValue::from_static("http://localhost:3030"),
                HeaderValue::from_static("http://127.0.0.1:3000"),
                HeaderValue::from_static("http://127.0.0.1:3030"),
            ])
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound {
        resource: "route",
        id: uri.path().to_owned(),
    }
}

/// Build the full application router.
pub fn build_router(state: Arc<AppState>, cors_permissive: bool) -> Router {
    let body_limit = state.config.upload_limits.max_body_bytes();
    let uploads = ServeDir::new(state.storage.root());

    Router::new()
        .merge(routes::health::router())
        .merge(routes::auth::router())
        .merge(routes::users::router())
        .merge(routes::sectors::router())
        .merge(routes::projects::router())
        .merge(routes::offers::router())
        .merge(routes::connects::router())
        .merge(routes::teams::router())
        .merge(routes::posts::router())
        .merge(routes::comments::router())
        .merge(routes::likes::router())
        .merge(routes::media::router())
        .merge(routes::discussions::router())
        .merge(routes::notifications::router())
        .nest_service(PUBLIC_PREFIX, uploads)
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer(cors_permissive))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server.
///
/// Runs migrations, prepares the upload layout and starts the blacklist
/// sweeps before accepting connections.
///
/// # Example
///
/// ```ignore
/// let pool = create_pool(&database_url).await?;
/// let app_config = AppConfig::from_env()?;
/// run_server(pool, app_config, ServerConfig::default()).await?;
/// ```
pub async fn run_server(
    pool: PgPool,
    app_config: AppConfig,
    config: ServerConfig,
) -> Result<(), ServerError> {
    migrations::run(&pool).await?;

    let state = AppState::new(pool.clone(), app_config)?;
    state.storage.init().await?;
    tracing::info!(uploads_root = %state.storage.root().display(), "Upload storage ready");

    let sweeps = sweep::spawn(pool, state.config.sweep);
    let app = build_router(Arc::new(state), config.cors_permissive);

    // Bind listener
    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    // Run with graceful shutdown
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    sweeps.abort();
    served?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting shutdown");
        }
    }
}

/// Server error type
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("token setup failed: {0}")]
    Token(#[from] TokenError),

    #[error("upload storage error: {0}")]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    /// Router over a pool that never connects; only routes that fail
    /// before touching the database can be exercised.
    fn app(root: &std::path::Path) -> Router {
        let pool = crate::db::lazy_pool("postgres://localhost/pitchhub_unused").unwrap();
        let config = AppConfig::with_root(SECRET, root.to_path_buf());
        let state = AppState::new(pool, config).unwrap();
        build_router(Arc::new(state), false)
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 3030);
        assert!(!config.cors_permissive);
    }

    #[tokio::test]
    async fn health_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn unknown_route_is_json_404() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path())
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["error"], "not_found");
    }

    #[tokio::test]
    async fn protected_route_requires_token() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        for uri in ["/users/me", "/offers", "/notifications"] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
        }

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/users/me")
                    .header("authorization", "Basic dXNlcjpwYXNz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"], "unauthorized");
    }

    #[tokio::test]
    async fn forged_token_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path())
            .oneshot(
                Request::builder()
                    .uri("/users/me")
                    .header("authorization", "Bearer not.a.token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn invalid_registration_lists_fields() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/register")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"email": "nope", "password": "x", "first_name": "", "last_name": "L"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"], "validation_error");
        assert_eq!(body["fields"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/login")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "bad_request");
    }

    #[tokio::test]
    async fn malformed_id_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path())
            .oneshot(
                Request::builder()
                    .uri("/projects/not-a-uuid")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["fields"][0]["field"], "id");
    }

    #[tokio::test]
    async fn uploaded_files_are_served() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("postMedia/images");
        std::fs::create_dir_all(&images).unwrap();
        std::fs::write(images.join("pitch.txt"), b"deck").unwrap();

        let response = app(dir.path())
            .oneshot(
                Request::builder()
                    .uri("/uploads/postMedia/images/pitch.txt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"deck");
    }
}
