//! Block writer.
//!
//! Owns the append end of the log file. Runs as a background tokio task
//! that drains a bounded channel, batches events into blocks of
//! `block_size`, and seals each block (encode, gzip, append, flush) to
//! disk. The channel's bounded capacity is the backpressure mechanism:
//! `submit` blocks once the queue is full.
//!
//! File-open semantics (create+append, exclusive advisory lock) follow
//! the teacher's `EventWriter::open_with_lock`; write failures are fatal
//! here the same way the teacher treats a failed lock acquisition as
//! fatal.

use crate::codec;
use crate::error::FatalError;
use crate::event::Event;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Handle used by the ingest path to submit events to the writer.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<Event>,
    file_size: Arc<AtomicU64>,
}

impl WriterHandle {
    /// Enqueue an event. Blocks (without holding any lock) when the
    /// internal queue is full — the ingest path's natural backpressure.
    pub async fn submit(&self, event: Event) {
        // A closed receiver only happens after the writer has already
        // exited fatally or shutdown is complete; there is no recovery
        // path for an ingest request at that point.
        let _ = self.tx.send(event).await;
    }

    /// Current size of the log file in bytes, updated after each sealed
    /// block. May be mildly stale — readers tolerate that.
    pub fn file_size(&self) -> u64 {
        self.file_size.load(Ordering::Relaxed)
    }
}

/// Open the log and start the background writer task.
///
/// The file is opened and locked here, synchronously, so the returned
/// handle's `file_size()` already reflects the log's on-disk size by
/// the time callers see it — a caller that reads `file_size()` right
/// after `spawn` returns (the Runner does, at the start of every pass)
/// must not race the background task's own open.
///
/// Dropping every `WriterHandle` closes the channel, which causes the
/// task to seal any remaining pending events and exit.
pub fn spawn(path: impl AsRef<Path>, block_size: usize, queue_capacity: usize) -> WriterHandle {
    let path = path.as_ref().to_path_buf();
    let (tx, rx) = mpsc::channel(queue_capacity);

    let mut file = match open_for_append(&path) {
        Ok(f) => f,
        Err(e) => {
            log::error!(target: "pageanalytics::writer", "fatal: {e}");
            std::process::exit(1);
        }
    };
    let initial_size = file.metadata().map(|m| m.len()).unwrap_or(0);
    let file_size = Arc::new(AtomicU64::new(initial_size));

    let handle = WriterHandle {
        tx,
        file_size: file_size.clone(),
    };

    tokio::task::spawn_blocking(move || run(&mut file, block_size, rx, file_size));

    handle
}

fn open_for_append(path: &Path) -> Result<File, FatalError> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(FatalError::OpenLog)?;
    file.try_lock_exclusive().map_err(FatalError::OpenLog)?;
    Ok(file)
}

fn run(file: &mut File, block_size: usize, mut rx: mpsc::Receiver<Event>, file_size: Arc<AtomicU64>) {
    let mut pending: Vec<Event> = Vec::with_capacity(block_size);

    loop {
        match rx.blocking_recv() {
            Some(event) => {
                pending.push(event);
                if pending.len() >= block_size {
                    if let Err(e) = seal(file, &pending) {
                        log::error!(target: "pageanalytics::writer", "fatal write error: {e}");
                        std::process::exit(1);
                    }
                    file_size.store(file.metadata().map(|m| m.len()).unwrap_or(0), Ordering::Relaxed);
                    pending.clear();
                }
            }
            None => {
                // Channel closed: drain the queue (already empty, by
                // definition of mpsc) and seal whatever remains.
                if !pending.is_empty() {
                    if let Err(e) = seal(file, &pending) {
                        log::error!(target: "pageanalytics::writer", "fatal write error on shutdown: {e}");
                        std::process::exit(1);
                    }
                    file_size.store(file.metadata().map(|m| m.len()).unwrap_or(0), Ordering::Relaxed);
                }
                return;
            }
        }
    }
}

fn seal(file: &mut File, events: &[Event]) -> std::io::Result<()> {
    let frame = codec::encode_block(events)?;
    file.write_all(&frame)?;
    file.sync_data()
}
