//! pageanalytics: ingest page-view/unload/time-on-page events over HTTP,
//! persist them to an append-only block log, and periodically fold the
//! log into a handful of published reports (views histogram, top-N,
//! and bounded subsets).

pub mod aggregate;
pub mod codec;
pub mod config;
pub mod error;
pub mod event;
pub mod http;
pub mod pool;
pub mod proto;
pub mod ratelimit;
pub mod reader;
pub mod runner;
pub mod store;
pub mod writer;
