use crate::domain::{ApiError, ApiStats};
use chrono::Utc;
use common::domain::{Observation, ObservationSink};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Turns submitted JSON bodies into validated, timestamped observations
pub struct SubmissionService {
    sink: Arc<dyn ObservationSink>,
    stats: Arc<ApiStats>,
}

impl SubmissionService {
    pub fn new(sink: Arc<dyn ObservationSink>, stats: Arc<ApiStats>) -> Self {
        Self { sink, stats }
    }

    /// Parses, stamps and validates one observation, then hands it to the pipeline.
    ///
    /// `internet_ip` and the time always come from the server, whatever the body says.
    #[instrument(skip_all, fields(internet_ip = %internet_ip))]
    pub async fn submit(&self, body: &[u8], internet_ip: String) -> Result<(), ApiError> {
        let mut observation: Observation = serde_json::from_slice(body).map_err(|e| {
            self.stats.record_rejected();
            ApiError::InvalidBody(e)
        })?;

        observation.internet_ip = internet_ip;
        observation.time = Utc::now();

        if let Err(e) = observation.check() {
            self.stats.record_rejected();
            return Err(ApiError::Validation(e));
        }

        debug!(serial = %observation.serial, username = %observation.username, "observation accepted");
        self.sink.push(observation).await;
        self.stats.record_submitted();
        Ok(())
    }

    pub fn queue_len(&self) -> usize {
        self.sink.queue_len()
    }
}
