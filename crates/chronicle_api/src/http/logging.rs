use crate::domain::ApiStats;
use axum::http::{Request, Response};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::{error, info, Instrument, Span};

/// Configuration for HTTP request logging
#[derive(Clone, Debug, Default)]
pub struct HttpLoggingConfig {
    /// Path prefixes that are counted but not logged
    pub ignored_paths: Vec<String>,
}

impl HttpLoggingConfig {
    pub fn new(ignored_paths: Vec<String>) -> Self {
        Self { ignored_paths }
    }

    fn should_ignore(&self, path: &str) -> bool {
        self.ignored_paths
            .iter()
            .any(|prefix| path.starts_with(prefix))
    }
}

/// Tower layer that logs every request and counts response status codes
#[derive(Clone)]
pub struct HttpLoggingLayer {
    config: HttpLoggingConfig,
    stats: Arc<ApiStats>,
}

impl HttpLoggingLayer {
    pub fn new(config: HttpLoggingConfig, stats: Arc<ApiStats>) -> Self {
        Self { config, stats }
    }
}

impl<S> Layer<S> for HttpLoggingLayer {
    type Service = HttpLoggingService<S>;

    fn layer(&self, service: S) -> Self::Service {
        HttpLoggingService {
            inner: service,
            config: self.config.clone(),
            stats: Arc::clone(&self.stats),
        }
    }
}

#[derive(Clone)]
pub struct HttpLoggingService<S> {
    inner: S,
    config: HttpLoggingConfig,
    stats: Arc<ApiStats>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for HttpLoggingService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Error: std::fmt::Display,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let should_ignore = self.config.should_ignore(&path);
        let stats = Arc::clone(&self.stats);
        let start = Instant::now();
        let future = self.inner.call(req);

        let span = Span::current();

        Box::pin(
            async move {
                let result = future.await;
                let duration = start.elapsed();

                match &result {
                    Ok(response) => {
                        let status = response.status().as_u16();
                        stats.record_response(status);
                        if !should_ignore {
                            info!(
                                method = %method,
                                path = %path,
                                http_status = status,
                                duration_ms = %duration.as_millis(),
                                "{} {} - {} - {}ms",
                                method,
                                path,
                                status,
                                duration.as_millis()
                            );
                        }
                    }
                    Err(e) => {
                        error!(
                            method = %method,
                            path = %path,
                            duration_ms = %duration.as_millis(),
                            error = %e,
                            "{} {} - {}ms - ERROR: {}",
                            method,
                            path,
                            duration.as_millis(),
                            e
                        );
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}
