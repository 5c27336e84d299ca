//! Result store + status counters.
//!
//! The Runner is the sole writer; HTTP handlers are readers. A result is
//! published by a single `insert` after the aggregator has finished and
//! its bytes are fully encoded, so a reader never observes a partial
//! document.

use crate::aggregate::ReportResult;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

#[derive(Default)]
pub struct ResultStore {
    results: RwLock<HashMap<String, ReportResult>>,
}

impl ResultStore {
    pub fn new() -> Self {
        ResultStore::default()
    }

    /// Replace every job's entry with its result from the pass that just
    /// completed. Inter-job publish order is unspecified.
    pub fn publish_all(&self, results: HashMap<String, ReportResult>) {
        let mut guard = self.results.write().expect("result store lock poisoned");
        *guard = results;
    }

    pub fn get(&self, name: &str) -> Option<ReportResult> {
        self.results
            .read()
            .expect("result store lock poisoned")
            .get(name)
            .cloned()
    }
}

/// Observability counters written by the Runner, read by HTTP. Readers tolerate mildly stale values, so plain atomics suffice —
/// no cross-field consistency is promised or required.
#[derive(Default)]
pub struct Counters {
    current_report_event_count: AtomicU64,
    last_report_event_count: AtomicU64,
    last_report_duration_nanos: AtomicU64,
    last_report_time: AtomicU64,
}

impl Counters {
    pub fn new() -> Self {
        Counters::default()
    }

    pub fn set_current_report_event_count(&self, n: u64) {
        self.current_report_event_count.store(n, Ordering::Relaxed);
    }

    pub fn current_report_event_count(&self) -> u64 {
        self.current_report_event_count.load(Ordering::Relaxed)
    }

    pub fn finish_pass(&self, event_count: u64, duration: Duration, completed_at_unix: u64) {
        self.last_report_event_count.store(event_count, Ordering::Relaxed);
        self.last_report_duration_nanos
            .store(duration.as_nanos() as u64, Ordering::Relaxed);
        self.last_report_time.store(completed_at_unix, Ordering::Relaxed);
    }

    pub fn last_report_event_count(&self) -> u64 {
        self.last_report_event_count.load(Ordering::Relaxed)
    }

    pub fn last_report_duration(&self) -> Duration {
        Duration::from_nanos(self.last_report_duration_nanos.load(Ordering::Relaxed))
    }

    pub fn last_report_time(&self) -> u64 {
        self.last_report_time.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_entry_is_none() {
        let store = ResultStore::new();
        assert!(store.get("nope").is_none());
    }

    #[test]
    fn publish_replaces_prior_entries() {
        let store = ResultStore::new();
        let mut first = HashMap::new();
        first.insert("views".to_string(), ReportResult::json(b"{}".to_vec()));
        store.publish_all(first);
        assert!(store.get("views").is_some());

        let second: HashMap<String, ReportResult> = HashMap::new();
        store.publish_all(second);
        assert!(store.get("views").is_none());
    }
}
