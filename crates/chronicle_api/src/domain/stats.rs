use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

/// Process-wide request counters served by the stats endpoint
#[derive(Debug)]
pub struct ApiStats {
    started: Instant,
    submitted: AtomicU64,
    rejected: AtomicU64,
    responses: Mutex<BTreeMap<u16, u64>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub queue_len: usize,
    pub submitted: u64,
    pub rejected: u64,
    pub uptime_secs: u64,
    pub total_responses: u64,
    pub status_code_count: BTreeMap<u16, u64>,
}

impl Default for ApiStats {
    fn default() -> Self {
        Self {
            started: Instant::now(),
            submitted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            responses: Mutex::new(BTreeMap::new()),
        }
    }
}

impl ApiStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_response(&self, status: u16) {
        let mut responses = self.responses.lock().unwrap_or_else(PoisonError::into_inner);
        *responses.entry(status).or_insert(0) += 1;
    }

    pub fn snapshot(&self, queue_len: usize) -> StatsSnapshot {
        let status_code_count = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        StatsSnapshot {
            queue_len,
            submitted: self.submitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            uptime_secs: self.started.elapsed().as_secs(),
            total_responses: status_code_count.values().sum(),
            status_code_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_counts() {
        let stats = ApiStats::new();
        stats.record_submitted();
        stats.record_submitted();
        stats.record_rejected();
        stats.record_response(200);
        stats.record_response(200);
        stats.record_response(400);

        let snapshot = stats.snapshot(5);
        assert_eq!(snapshot.queue_len, 5);
        assert_eq!(snapshot.submitted, 2);
        assert_eq!(snapshot.rejected, 1);
        assert_eq!(snapshot.total_responses, 3);
        assert_eq!(snapshot.status_code_count.get(&200), Some(&2));
        assert_eq!(snapshot.status_code_count.get(&400), Some(&1));
    }

    #[test]
    fn test_snapshot_serializes_status_codes_as_keys() {
        let stats = ApiStats::new();
        stats.record_response(404);

        let json = serde_json::to_value(stats.snapshot(0)).unwrap();
        assert_eq!(json["status_code_count"]["404"], 1);
        assert_eq!(json["queue_len"], 0);
    }
}
