//! Aggregator contract.
//!
//! An aggregator consumes a lazy, finite, non-restartable sequence of
//! events delivered newest-first and produces a [`ReportResult`]. It may
//! stop reading at any time — the Runner guarantees that abandoning a
//! channel mid-stream is safe.

pub mod subset;
pub mod topn;
pub mod views;

use crate::event::Event;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// The published result of one aggregator run.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportResult {
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl ReportResult {
    pub fn json(bytes: Vec<u8>) -> Self {
        ReportResult {
            content_type: "application/json",
            bytes,
        }
    }
}

#[async_trait]
pub trait Aggregator: Send + Sync {
    /// Consume events from `rx` until either the channel closes (the
    /// reverse reader finished the pass) or the aggregator decides it
    /// has seen enough, then emit the final result.
    async fn run(&self, rx: mpsc::Receiver<Event>) -> ReportResult;
}

pub use subset::Subset;
pub use topn::TopN;
pub use views::Views;
