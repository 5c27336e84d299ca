//! Subset: a bounded filtered snapshot.

use super::{Aggregator, ReportResult};
use crate::event::Event;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Appends matching events to an output list until `limit` is reached,
/// then stops reading — the Runner's fan-out loop tolerates this.
pub struct Subset {
    pub filter: Box<dyn Fn(&Event) -> bool + Send + Sync>,
    pub limit: usize,
}

#[async_trait]
impl Aggregator for Subset {
    async fn run(&self, mut rx: mpsc::Receiver<Event>) -> ReportResult {
        let mut matched = Vec::with_capacity(self.limit.min(1024));

        while matched.len() < self.limit {
            match rx.recv().await {
                Some(event) if (self.filter)(&event) => matched.push(event),
                Some(_) => {}
                None => break,
            }
        }

        let bytes = serde_json::to_vec(&matched).expect("vec of Event cannot fail to serialize");
        ReportResult::json(bytes)
    }
}
