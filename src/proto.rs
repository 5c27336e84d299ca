//! Generated protobuf types for the on-disk block format.
//!
//! Compiled from `proto/event.proto` by `build.rs` via `prost-build`.

include!(concat!(env!("OUT_DIR"), "/pageanalytics.rs"));
