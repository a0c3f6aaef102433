use crate::domain::{ApiError, ApiStats, LastUserService, StatsSnapshot, SubmissionService};
use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use common::domain::LastUserEntry;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::warn;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Shared state of every route
#[derive(Clone)]
pub struct ApiContext {
    pub submissions: Arc<SubmissionService>,
    pub last_user: Arc<LastUserService>,
    pub stats: Arc<ApiStats>,
}

/// Address the submission came from: the first `X-Forwarded-For` entry when
/// present, otherwise the peer address
pub fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    headers
        .get(FORWARDED_FOR)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| peer.ip().to_string())
}

pub async fn submit(
    State(context): State<ApiContext>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let internet_ip = client_ip(&headers, peer);
    match context.submissions.submit(&body, internet_ip).await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            warn!(error = %e, "submission rejected");
            e.status_code()
        }
    }
}

pub async fn stats(State(context): State<ApiContext>) -> Json<StatsSnapshot> {
    Json(context.stats.snapshot(context.submissions.queue_len()))
}

pub async fn last_user(
    State(context): State<ApiContext>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Option<Vec<LastUserEntry>>>, ApiError> {
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    context.last_user.authorize(authorization)?;

    let entries = context.last_user.query(&body).await?;
    Ok(Json(entries))
}
