//! End-to-end pipeline tests: writer -> log file -> Runner pass ->
//! published results, covering the literal scenarios a single pass must
//! satisfy.

use pageanalytics::aggregate::{Aggregator, Subset, TopN, Views};
use pageanalytics::event::{EvType, Event};
use pageanalytics::runner::Runner;
use pageanalytics::writer;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

fn jobs() -> HashMap<String, Arc<dyn Aggregator>> {
    let mut jobs: HashMap<String, Arc<dyn Aggregator>> = HashMap::new();
    jobs.insert(
        "views".to_string(),
        Arc::new(Views {
            cutoff: 1,
            estimated_size: 16,
            min_ev_time: 0,
        }),
    );
    jobs.insert("top".to_string(), Arc::new(TopN { n: 1, min_ev_time: 0 }));
    jobs.insert(
        "subset".to_string(),
        Arc::new(Subset {
            filter: Box::new(|e| e.ev_type == EvType::Load),
            limit: 10,
        }),
    );
    jobs
}

async fn run_one_pass(events: Vec<Event>, block_size: usize) -> Arc<Runner> {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events");
    let writer_handle = writer::spawn(&path, block_size, 64);

    for event in events {
        writer_handle.submit(event).await;
    }
    drop(writer_handle);
    // give the blocking writer task time to seal the trailing partial block
    tokio::time::sleep(Duration::from_millis(200)).await;

    // fresh handle: file_size must reflect everything flushed above
    let writer_handle = writer::spawn(&path, block_size, 64);
    let runner = Runner::new(
        path,
        block_size,
        2,
        Duration::from_secs(3600),
        jobs(),
        writer_handle,
    );
    runner.run_pass().await;
    std::mem::forget(dir);
    runner
}

fn views_result(runner: &Runner) -> HashMap<String, u32> {
    serde_json::from_slice(&runner.result("views").unwrap().bytes).unwrap()
}

fn top_result(runner: &Runner) -> HashMap<String, u32> {
    serde_json::from_slice(&runner.result("top").unwrap().bytes).unwrap()
}

fn subset_result(runner: &Runner) -> Vec<Event> {
    serde_json::from_slice(&runner.result("subset").unwrap().bytes).unwrap()
}

#[tokio::test]
async fn empty_log_yields_empty_reports() {
    let runner = run_one_pass(vec![], 10).await;

    assert!(views_result(&runner).is_empty());
    assert!(top_result(&runner).is_empty());
    assert!(subset_result(&runner).is_empty());
    assert_eq!(runner.last_report_event_count(), 0);
}

#[tokio::test]
async fn one_block_three_loads() {
    let now = 1_000_000u32;
    let events = vec![
        Event::load(now, 1, 1, 7),
        Event::load(now, 1, 1, 7),
        Event::load(now, 1, 1, 9),
    ];
    let runner = run_one_pass(events, 10).await;

    let views = views_result(&runner);
    assert_eq!(views.get("7"), Some(&2));
    assert_eq!(views.get("9"), Some(&1));

    let top = top_result(&runner);
    assert_eq!(top.len(), 1);
    assert_eq!(top.get("7"), Some(&2));

    assert_eq!(subset_result(&runner).len(), 3);
}

#[tokio::test]
async fn tail_corruption_still_yields_the_earlier_blocks() {
    let events: Vec<Event> = (0..100u32).map(|i| Event::load(i, 1, 1, i)).collect();

    let dir = tempdir().unwrap();
    let path = dir.path().join("events");
    let writer_handle = writer::spawn(&path, 1, 128);
    for event in events {
        writer_handle.submit(event).await;
    }
    drop(writer_handle);
    tokio::time::sleep(Duration::from_millis(300)).await;

    let size = std::fs::metadata(&path).unwrap().len();
    std::fs::OpenOptions::new()
        .write(true)
        .open(&path)
        .unwrap()
        .set_len(size - 1)
        .unwrap();

    let writer_handle = writer::spawn(&path, 1, 128);
    let runner = Runner::new(
        path,
        1,
        2,
        Duration::from_secs(3600),
        jobs(),
        writer_handle,
    );
    runner.run_pass().await;
    std::mem::forget(dir);

    assert_eq!(runner.last_report_event_count(), 99);
}
