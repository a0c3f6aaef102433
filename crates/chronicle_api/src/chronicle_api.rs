use crate::domain::{ApiStats, LastUserService, SubmissionService};
use crate::http::{build_router, run_http_server, ApiContext, HttpServerConfig};
use axum::Router;
use common::domain::{LastUserRepository, ObservationSink};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct ChronicleApi {
    context: ApiContext,
    config: HttpServerConfig,
}

impl ChronicleApi {
    pub fn new(
        sink: Arc<dyn ObservationSink>,
        last_user_repository: Arc<dyn LastUserRepository>,
        api_key: String,
        config: HttpServerConfig,
    ) -> Self {
        debug!("Initializing Chronicle API module");
        let stats = Arc::new(ApiStats::new());
        let context = ApiContext {
            submissions: Arc::new(SubmissionService::new(sink, Arc::clone(&stats))),
            last_user: Arc::new(LastUserService::new(last_user_repository, api_key)),
            stats,
        };
        Self { context, config }
    }

    pub fn router(&self) -> Router {
        build_router(self.context.clone(), &self.config)
    }

    pub async fn run(self, cancellation_token: CancellationToken) -> anyhow::Result<()> {
        let router = self.router();
        run_http_server(self.config, router, cancellation_token).await
    }
}
