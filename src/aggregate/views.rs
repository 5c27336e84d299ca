//! Views: a filtered cutoff histogram.

use super::{Aggregator, ReportResult};
use crate::event::{EvType, Event};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Counts `LOAD` events by `cid` within `time >= min_ev_time`, then keeps
/// only the `cid`s whose count reached `cutoff`.
pub struct Views {
    pub cutoff: u32,
    pub estimated_size: usize,
    pub min_ev_time: u32,
}

#[async_trait]
impl Aggregator for Views {
    async fn run(&self, mut rx: mpsc::Receiver<Event>) -> ReportResult {
        let mut counts: HashMap<u32, u32> = HashMap::with_capacity(self.estimated_size);

        while let Some(event) = rx.recv().await {
            if event.time < self.min_ev_time {
                // Events arrive newest-first at block granularity; this
                // is a "may terminate" optimization, not
                // the sole correctness guarantee — the explicit
                // ev_type/time check above still gates every increment.
                break;
            }
            if event.ev_type == EvType::Load {
                *counts.entry(event.cid).or_insert(0) += 1;
            }
        }

        counts.retain(|_, count| *count >= self.cutoff);

        let as_strings: HashMap<String, u32> =
            counts.into_iter().map(|(cid, count)| (cid.to_string(), count)).collect();
        let bytes = serde_json::to_vec(&as_strings).expect("map of string->u32 cannot fail to serialize");
        ReportResult::json(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run_views(views: Views, events: Vec<Event>) -> HashMap<String, u32> {
        let (tx, rx) = mpsc::channel(events.len().max(1));
        for e in events {
            tx.send(e).await.unwrap();
        }
        drop(tx);
        let result = views.run(rx).await;
        serde_json::from_slice(&result.bytes).unwrap()
    }

    #[tokio::test]
    async fn empty_input_yields_empty_object() {
        let out = run_views(
            Views {
                cutoff: 1,
                estimated_size: 16,
                min_ev_time: 0,
            },
            vec![],
        )
        .await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn cutoff_correctness() {
        let events = vec![
            Event::load(100, 1, 1, 7),
            Event::load(100, 1, 1, 7),
            Event::load(100, 1, 1, 9),
        ];
        let out = run_views(
            Views {
                cutoff: 2,
                estimated_size: 16,
                min_ev_time: 0,
            },
            events,
        )
        .await;
        assert_eq!(out.get("7"), Some(&2));
        assert_eq!(out.get("9"), None);
    }

    #[tokio::test]
    async fn stops_at_min_ev_time_boundary() {
        // block A (newer): 2 loads at T; block B (older): 100 loads at T - 3600
        let t = 1_000_000u32;
        let mut events: Vec<Event> = vec![Event::load(t, 1, 1, 1), Event::load(t, 1, 1, 2)];
        for i in 0..100 {
            events.push(Event::load(t - 3600, 1, 1, 100 + i));
        }
        let out = run_views(
            Views {
                cutoff: 1,
                estimated_size: 16,
                min_ev_time: t - 60,
            },
            events,
        )
        .await;
        assert_eq!(out.len(), 2);
        assert!(out.contains_key("1"));
        assert!(out.contains_key("2"));
    }
}
