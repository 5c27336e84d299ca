//! Top-N: heap-based top-K by `cid` count.
//!
//! A min-heap of at most `N` `{cid, count}` entries, plus a `cid ->
//! heap_index` map kept in sync with every mutation (push, pop, sift) —
//! letting the index map drift out of sync with the heap is an easy bug
//! to write; this implementation keeps them coupled behind a single type
//! so that can't happen by construction.

use super::{Aggregator, ReportResult};
use crate::event::{EvType, Event};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    cid: u32,
    count: u32,
}

/// A min-heap over `Entry.count`, with an index map for O(1) lookup of
/// a `cid`'s current slot.
struct IndexedMinHeap {
    entries: Vec<Entry>,
    index: HashMap<u32, usize>,
}

impl IndexedMinHeap {
    fn new() -> Self {
        IndexedMinHeap {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn contains(&self, cid: u32) -> bool {
        self.index.contains_key(&cid)
    }

    fn min_count(&self) -> u32 {
        self.entries[0].count
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.entries.swap(a, b);
        self.index.insert(self.entries[a].cid, a);
        self.index.insert(self.entries[b].cid, b);
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.entries[i].count < self.entries[parent].count {
                self.swap(i, parent);
                i = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut i: usize) {
        let len = self.entries.len();
        loop {
            let left = 2 * i + 1;
            let right = 2 * i + 2;
            let mut smallest = i;
            if left < len && self.entries[left].count < self.entries[smallest].count {
                smallest = left;
            }
            if right < len && self.entries[right].count < self.entries[smallest].count {
                smallest = right;
            }
            if smallest == i {
                break;
            }
            self.swap(i, smallest);
            i = smallest;
        }
    }

    fn push(&mut self, entry: Entry) {
        let i = self.entries.len();
        self.entries.push(entry);
        self.index.insert(entry.cid, i);
        self.sift_up(i);
    }

    /// Update the count of an already-present `cid`. Counts only ever
    /// increase here, so a sift-down is sufficient to restore the
    /// min-heap property.
    fn update(&mut self, cid: u32, count: u32) {
        let i = self.index[&cid];
        self.entries[i].count = count;
        self.sift_down(i);
    }

    /// Remove the root (minimum) and push a replacement in its place.
    fn replace_root(&mut self, entry: Entry) {
        self.index.remove(&self.entries[0].cid);
        self.entries[0] = entry;
        self.index.insert(entry.cid, 0);
        self.sift_down(0);
    }
}

pub struct TopN {
    pub n: usize,
    pub min_ev_time: u32,
}

#[async_trait]
impl Aggregator for TopN {
    async fn run(&self, mut rx: mpsc::Receiver<Event>) -> ReportResult {
        let mut counts: HashMap<u32, u32> = HashMap::new();
        let mut heap = IndexedMinHeap::new();

        while let Some(event) = rx.recv().await {
            if event.time < self.min_ev_time {
                break;
            }
            if event.ev_type != EvType::Load {
                continue;
            }

            let count = {
                let c = counts.entry(event.cid).or_insert(0);
                *c += 1;
                *c
            };

            if heap.contains(event.cid) {
                heap.update(event.cid, count);
            } else if heap.len() < self.n {
                heap.push(Entry {
                    cid: event.cid,
                    count,
                });
            } else if self.n > 0 && count > heap.min_count() {
                heap.replace_root(Entry {
                    cid: event.cid,
                    count,
                });
            }
        }

        let as_strings: HashMap<String, u32> = heap
            .entries
            .into_iter()
            .map(|e| (e.cid.to_string(), e.count))
            .collect();
        let bytes = serde_json::to_vec(&as_strings).expect("map of string->u32 cannot fail to serialize");
        ReportResult::json(bytes)
    }
}
