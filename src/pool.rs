//! Worker pool.
//!
//! A pool of `N` workers consuming tasks from a single bounded, ordered
//! queue. The Runner uses one pool per pass: started at the beginning of
//! a fan-out loop, `stop_and_wait`ed as the barrier before job channels
//! are closed.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

pub struct WorkerPool {
    tx: mpsc::Sender<Task>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `workers` tasks pulling FIFO from a queue of capacity `capacity`.
    pub fn spawn(workers: usize, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        let rx = Arc::new(Mutex::new(rx));

        let handles = (0..workers)
            .map(|_| {
                let rx = rx.clone();
                tokio::spawn(async move {
                    loop {
                        let task = { rx.lock().await.recv().await };
                        match task {
                            Some(task) => task.await,
                            None => break,
                        }
                    }
                })
            })
            .collect();

        WorkerPool { tx, handles }
    }

    /// Enqueue a task. Non-blocking: if the queue is full or the pool is
    /// shutting down, the task is handed straight back so the caller can
    /// run it inline rather than stalling on a full queue.
    pub fn dispatch<F>(&self, task: F) -> Result<(), Task>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tx.try_send(Box::pin(task)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(t) => t,
            mpsc::error::TrySendError::Closed(t) => t,
        })
    }

    /// Close the queue and wait for every worker to finish its current
    /// task and drain the backlog.
    pub async fn stop_and_wait(self) {
        drop(self.tx);
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}
