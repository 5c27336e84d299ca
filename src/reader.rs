//! Reverse block reader.
//!
//! Scans the log backwards, block by block: seek to `size - 4`, read the
//! big-endian length suffix, seek back that far, decompress + decode,
//! repeat until the start of the file. Events of block *k* are emitted
//! before any event of block *k - 1*; within a block, events are
//! emitted in their on-disk (arrival) order.
//!
//! `size` is captured once by the caller at the start of a pass and
//! never re-read here — the writer may be appending concurrently, and
//! re-stating mid-scan would let the reader chase a moving tail.

use crate::codec::{self, SUFFIX_LEN};
use crate::event::Event;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use tokio::sync::mpsc;

/// Attempt to read one frame whose length suffix ends exactly at byte
/// offset `end`. Returns the offset its payload starts at (i.e. the next
/// `end` to try) plus the events it held, or `None` if anything about
/// the frame at this offset is invalid.
fn read_frame_ending_at(file: &mut File, end: u64) -> Option<(u64, Vec<Event>)> {
    if end < SUFFIX_LEN {
        return None;
    }
    let suffix_at = end - SUFFIX_LEN;
    file.seek(SeekFrom::Start(suffix_at)).ok()?;

    let mut len_buf = [0u8; SUFFIX_LEN as usize];
    file.read_exact(&mut len_buf).ok()?;
    let len = u32::from_be_bytes(len_buf) as u64;
    if len == 0 || len > suffix_at {
        return None;
    }

    let payload_at = suffix_at - len;
    file.seek(SeekFrom::Start(payload_at)).ok()?;
    let mut payload = vec![0u8; len as usize];
    file.read_exact(&mut payload).ok()?;

    let events = codec::decode_payload(&payload).ok()?;
    Some((payload_at, events))
}

/// Having failed to read a valid frame ending at `corrupt_end`, walk
/// backwards one byte at a time looking for the nearest offset that
/// *is* a valid frame boundary — recovering everything older than the
/// corrupt tail.
fn resync(file: &mut File, corrupt_end: u64) -> Option<(u64, u64, Vec<Event>)> {
    let mut candidate = corrupt_end;
    while candidate > SUFFIX_LEN {
        candidate -= 1;
        if let Some((payload_at, events)) = read_frame_ending_at(file, candidate) {
            return Some((candidate, payload_at, events));
        }
    }
    None
}

/// Scan `path` backwards from `size` bytes, emitting every event into
/// `tx`. Intended to run on a blocking thread (`spawn_blocking`) since it
/// performs synchronous file I/O and uses `blocking_send`.
///
/// A corrupt tail — a frame whose length suffix is `0`, too large, or
/// whose payload fails to decode — is skipped by resyncing to the
/// nearest earlier valid frame boundary; only the corrupt block itself
/// is lost, everything older remains readable.
pub fn scan(path: impl AsRef<Path>, size: u64, tx: mpsc::Sender<Event>) {
    let path = path.as_ref();
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            log::warn!(target: "pageanalytics::reader", "cannot open log for scan: {e}");
            return;
        }
    };

    let mut remaining = size;

    while remaining > 0 {
        let frame = match read_frame_ending_at(&mut file, remaining) {
            Some(frame) => frame,
            None => {
                log::warn!(
                    target: "pageanalytics::reader",
                    "corrupt frame ending at offset {remaining}, resyncing to the previous block"
                );
                match resync(&mut file, remaining) {
                    Some((found_end, payload_at, events)) => {
                        log::warn!(
                            target: "pageanalytics::reader",
                            "resynced after skipping {} corrupt bytes",
                            remaining - found_end
                        );
                        (payload_at, events)
                    }
                    None => {
                        log::warn!(
                            target: "pageanalytics::reader",
                            "no valid frame found before offset {remaining}, stopping scan"
                        );
                        break;
                    }
                }
            }
        };

        let (payload_at, events) = frame;
        for event in events {
            if tx.blocking_send(event).is_err() {
                // Every receiver (job fan-out) has gone away — nothing
                // left to feed, stop scanning.
                return;
            }
        }

        remaining = payload_at;
    }
}
