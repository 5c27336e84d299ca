//! Runner: the pipeline orchestrator.
//!
//! Drives one pass per tick of the run loop: scan the log in reverse,
//! fan events out to every running job, collect each job's result, and
//! publish atomically. The fan-out loop is the part worth
//! reading closely — it is what lets one slow aggregator be skipped for
//! individual events without stalling the others or the whole pass.

use crate::aggregate::{Aggregator, ReportResult};
use crate::event::Event;
use crate::pool::WorkerPool;
use crate::reader;
use crate::store::{Counters, ResultStore};
use crate::writer::WriterHandle;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, watch};

const PER_JOB_CHANNEL_CAPACITY: usize = 2;
const PER_JOB_SEND_TIMEOUT: Duration = Duration::from_millis(100);

pub struct Runner {
    path: PathBuf,
    block_size: usize,
    worker_pool_size: usize,
    min_report_interval: Duration,
    jobs: HashMap<String, Arc<dyn Aggregator>>,
    writer: WriterHandle,
    store: Arc<ResultStore>,
    counters: Arc<Counters>,
    cancel_tx: watch::Sender<bool>,
}

impl Runner {
    pub fn new(
        path: PathBuf,
        block_size: usize,
        worker_pool_size: usize,
        min_report_interval: Duration,
        jobs: HashMap<String, Arc<dyn Aggregator>>,
        writer: WriterHandle,
    ) -> Arc<Self> {
        let (cancel_tx, _) = watch::channel(false);
        Arc::new(Runner {
            path,
            block_size,
            worker_pool_size,
            min_report_interval,
            jobs,
            writer,
            store: Arc::new(ResultStore::new()),
            counters: Arc::new(Counters::new()),
            cancel_tx,
        })
    }

    pub fn store(&self) -> Arc<ResultStore> {
        self.store.clone()
    }

    pub fn result(&self, name: &str) -> Option<ReportResult> {
        self.store.get(name)
    }

    pub fn file_size(&self) -> u64 {
        self.writer.file_size()
    }

    pub fn current_report_event_count(&self) -> u64 {
        self.counters.current_report_event_count()
    }

    pub fn last_report_event_count(&self) -> u64 {
        self.counters.last_report_event_count()
    }

    pub fn last_report_duration(&self) -> Duration {
        self.counters.last_report_duration()
    }

    pub fn last_report_time(&self) -> u64 {
        self.counters.last_report_time()
    }

    /// Signal cancellation of any in-flight pass. The pass publishes
    /// whatever results had already completed.
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    /// Run the endless pass loop in the background.
    pub fn spawn_run_loop(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                if *self.cancel_tx.subscribe().borrow() {
                    return;
                }
                let pass_start = Instant::now();
                self.run_pass().await;
                let elapsed = pass_start.elapsed();
                if elapsed < self.min_report_interval {
                    tokio::time::sleep(self.min_report_interval - elapsed).await;
                }
            }
        })
    }

    /// Run exactly one pass: scan, fan out, collect, publish.
    pub async fn run_pass(&self) {
        let pass_start = Instant::now();
        let size = self.file_size();

        let (events_tx, events_rx) = mpsc::channel::<Event>(self.block_size);
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || reader::scan(path, size, events_tx));

        let (job_done_tx, job_done_rx) = mpsc::unbounded_channel::<(String, ReportResult)>();
        let mut job_txs: HashMap<String, mpsc::Sender<Event>> = HashMap::new();
        let mut running: HashSet<String> = HashSet::new();

        for (name, aggregator) in &self.jobs {
            let (tx, rx) = mpsc::channel::<Event>(PER_JOB_CHANNEL_CAPACITY);
            job_txs.insert(name.clone(), tx);
            running.insert(name.clone());

            let aggregator = aggregator.clone();
            let name = name.clone();
            let job_done_tx = job_done_tx.clone();
            tokio::spawn(async move {
                let result = aggregator.run(rx).await;
                let _ = job_done_tx.send((name, result));
            });
        }
        drop(job_done_tx);

        let event_count = self
            .fan_out(events_rx, job_done_rx, job_txs, running)
            .await;

        let completed_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.counters
            .finish_pass(event_count, pass_start.elapsed(), completed_at);
    }

    /// The fan-out loop: dispatch each event, via a
    /// worker pool, to every still-running job with a bounded per-job
    /// send timeout; retire jobs as they finish; close remaining job
    /// channels once the reader is done (or every job is already done)
    /// and the pool has drained.
    async fn fan_out(
        &self,
        mut events_rx: mpsc::Receiver<Event>,
        mut job_done_rx: mpsc::UnboundedReceiver<(String, ReportResult)>,
        mut job_txs: HashMap<String, mpsc::Sender<Event>>,
        mut running: HashSet<String>,
    ) -> u64 {
        let pool = WorkerPool::spawn(self.worker_pool_size.max(1), self.block_size.max(1));
        let mut cancel_rx = self.cancel_tx.subscribe();
        let mut collected: HashMap<String, ReportResult> = HashMap::new();
        let event_count = Arc::new(AtomicU64::new(0));

        'dispatch: loop {
            tokio::select! {
                biased;

                _ = cancel_rx.changed() => {
                    if *cancel_rx.borrow() {
                        break 'dispatch;
                    }
                }

                maybe_done = job_done_rx.recv(), if !running.is_empty() => {
                    if let Some((name, result)) = maybe_done {
                        running.remove(&name);
                        job_txs.remove(&name);
                        collected.insert(name, result);
                        self.counters.set_current_report_event_count(event_count.load(Ordering::Relaxed));
                    }
                    if running.is_empty() {
                        // Early termination: every job is
                        // done, stop reading and close up immediately.
                        break 'dispatch;
                    }
                }

                maybe_event = events_rx.recv() => {
                    match maybe_event {
                        Some(event) => {
                            event_count.fetch_add(1, Ordering::Relaxed);
                            self.counters.set_current_report_event_count(event_count.load(Ordering::Relaxed));

                            let targets: Vec<mpsc::Sender<Event>> = running
                                .iter()
                                .filter_map(|name| job_txs.get(name).cloned())
                                .collect();
                            let cancel_rx = cancel_rx.clone();

                            let task = async move {
                                for tx in targets {
                                    if *cancel_rx.borrow() {
                                        return;
                                    }
                                    // Dropped for this job only if the
                                    // bounded wait times out.
                                    let _ = tokio::time::timeout(PER_JOB_SEND_TIMEOUT, tx.send(event)).await;
                                }
                            };
                            // If the pool's queue is momentarily full,
                            // run the fan-out inline rather than
                            // silently dropping the event for every job.
                            if let Err(task) = pool.dispatch(task) {
                                task.await;
                            }
                        }
                        None => {
                            // Reader exhausted: proceed to drain below.
                            break 'dispatch;
                        }
                    }
                }
            }
        }

        // Barrier: let every in-flight dispatch task finish before
        // closing job channels, so no job sees a spuriously early EOF
        // while a send to it is still outstanding.
        pool.stop_and_wait().await;
        drop(job_txs);

        while let Some((name, result)) = job_done_rx.recv().await {
            collected.insert(name, result);
        }

        self.store.publish_all(collected);
        event_count.load(Ordering::Relaxed)
    }
}
