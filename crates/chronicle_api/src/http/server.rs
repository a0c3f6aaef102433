use crate::http::{last_user, stats, submit, ApiContext, HttpLoggingConfig, HttpLoggingLayer};
use anyhow::Context;
use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, info};

/// CORS configuration for the HTTP server
#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// `["*"]` allows every origin
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
        }
    }
}

impl CorsConfig {
    /// Parse comma-separated origins string. An empty list allows every origin.
    pub fn from_comma_separated(origins: &str) -> Self {
        let allowed_origins: Vec<String> = origins
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if allowed_origins.is_empty() {
            Self::default()
        } else {
            Self { allowed_origins }
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub listen_addr: String,
    /// Path every route is mounted under, e.g. `/chronicle`. Empty mounts at the root.
    pub prefix: String,
    pub logging_config: HttpLoggingConfig,
    pub cors_config: CorsConfig,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            prefix: String::new(),
            logging_config: HttpLoggingConfig::default(),
            cors_config: CorsConfig::default(),
        }
    }
}

fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    let allow_origin = if config.allowed_origins.len() == 1 && config.allowed_origins[0] == "*" {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            config
                .allowed_origins
                .iter()
                .filter_map(|origin| origin.parse().ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE, header::ORIGIN])
}

/// Trims trailing slashes and adds the leading one. Returns `None` for the root.
fn normalize_prefix(prefix: &str) -> Option<String> {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(format!("/{}", trimmed))
    }
}

/// Builds every route under the configured prefix with CORS and request logging
pub fn build_router(context: ApiContext, config: &HttpServerConfig) -> Router {
    let api_stats = context.stats.clone();

    let api = Router::new()
        .route("/api/v1/submit", post(submit))
        .route("/api/v1.1/submit", post(submit))
        .route("/api/v1.1/stats", get(stats))
        .route("/api/v1.1/last_user", post(last_user))
        .with_state(context);

    let router = match normalize_prefix(&config.prefix) {
        Some(prefix) => Router::new().nest(&prefix, api),
        None => api,
    };

    router
        .layer(build_cors_layer(&config.cors_config))
        .layer(HttpLoggingLayer::new(config.logging_config.clone(), api_stats))
}

/// Serves `router` until the token is cancelled
pub async fn run_http_server(
    config: HttpServerConfig,
    router: Router,
    cancellation_token: CancellationToken,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;

    info!(
        address = %config.listen_addr,
        prefix = %config.prefix,
        "Starting HTTP server"
    );

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        cancellation_token.cancelled().await;
        debug!("HTTP server shutdown signal received");
    })
    .await
    .context("HTTP server failed")?;

    Ok(())
}
