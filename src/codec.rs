//! Block codec: encode/decode gzipped protobuf blocks with a trailing
//! length suffix.
//!
//! ```text
//! [ gzip(protobuf(Block{ evs: [Event...] })) ]  [ u32 BE length of the gzip payload ]
//! ```
//!
//! The length suffix — not a prefix — is what makes the log scannable in
//! reverse without an index: seek to `file_size - 4`, read the length,
//! seek back that far again, decode, and repeat.

use crate::event::Event;
use crate::proto;
use flate2::write::GzEncoder;
use flate2::Compression;
use prost::Message;
use std::io::{self, Write};

/// Length of the trailing frame-length suffix, in bytes.
pub const SUFFIX_LEN: u64 = 4;

/// Encode a batch of events as one framed block: gzip(protobuf) + u32 BE length suffix.
pub fn encode_block(events: &[Event]) -> io::Result<Vec<u8>> {
    let block = proto::Block {
        evs: events.iter().map(|e| e.to_proto()).collect(),
    };
    let payload = block.encode_to_vec();

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&payload)?;
    let gzipped = encoder.finish()?;

    let len: u32 = gzipped
        .len()
        .try_into()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "block too large to frame"))?;

    let mut frame = gzipped;
    frame.extend_from_slice(&len.to_be_bytes());
    Ok(frame)
}

/// Decode a single gzip(protobuf) payload (the length suffix already
/// stripped) into the events it contains, in on-disk (arrival) order.
///
/// Events with an unrecognized `ev_type` are skipped rather than failing
/// the whole block — the invariant violation is logged by the caller.
pub fn decode_payload(payload: &[u8]) -> io::Result<Vec<Event>> {
    use flate2::read::GzDecoder;
    use std::io::Read;

    let mut decoder = GzDecoder::new(payload);
    let mut buf = Vec::new();
    decoder.read_to_end(&mut buf)?;

    let block = proto::Block::decode(buf.as_slice())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    Ok(block
        .evs
        .into_iter()
        .filter_map(Event::from_proto)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_block() {
        let events = vec![
            Event::load(100, 1, 2, 3),
            Event::unload(101, 1, 2, 3, 0.5),
            Event::time_on_page(102, 1, 2, 3, 42),
        ];
        let frame = encode_block(&events).unwrap();
        let len = u32::from_be_bytes(frame[frame.len() - 4..].try_into().unwrap()) as usize;
        let payload = &frame[..frame.len() - 4];
        assert_eq!(len, payload.len());
        let decoded = decode_payload(payload).unwrap();
        assert_eq!(decoded, events);
    }

    #[test]
    fn empty_block_round_trips() {
        let frame = encode_block(&[]).unwrap();
        let len = u32::from_be_bytes(frame[frame.len() - 4..].try_into().unwrap()) as usize;
        let payload = &frame[..frame.len() - 4];
        let decoded = decode_payload(payload).unwrap();
        assert!(decoded.is_empty());
        assert_eq!(len, payload.len());
    }
}
