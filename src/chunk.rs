//! Fragmenter / reassembler (§3, §4.C): splits a complete frame into
//! ≤19-byte chunks with a sequence+countdown-index header, and reassembles
//! the inverse from a stream of inbound chunk values, emitting ack chunks.

use crate::crc8;
use crate::error::{Error, Result};

/// Chunk payload capacity; chunk wire size is this plus a 1-byte header.
pub const MAX_CHUNK_PAYLOAD: usize = 19;

/// `txSeqno` lives in `1..14`; 0 and 15 are reserved for the ack sentinel
/// (§3, §9 "txSeqno wraparound").
pub const TX_SEQNO_MIN: u8 = 1;
pub const TX_SEQNO_MAX: u8 = 14;

/// Advance a frame sequence number modulo 15, skipping the reserved
/// values 0 and 15.
pub fn next_tx_seqno(current: u8) -> u8 {
    let next = (current + 1) % 15;
    if next == 0 {
        1
    } else {
        next
    }
}

/// Split `frame` (already CRC-suffixed wire bytes) into outbound chunks
/// tagged with `tx_seqno`. Only the caller decides which deferred-write
/// entry carries a completion — fragmentation itself just produces bytes.
pub fn fragment_frame(frame: &[u8], tx_seqno: u8) -> Vec<Vec<u8>> {
    debug_assert!((TX_SEQNO_MIN..=TX_SEQNO_MAX).contains(&tx_seqno));
    let chunk_count = frame.len().div_ceil(MAX_CHUNK_PAYLOAD).max(1);
    let mut chunks = Vec::with_capacity(chunk_count);
    for i in 0..chunk_count {
        let start = i * MAX_CHUNK_PAYLOAD;
        let end = (start + MAX_CHUNK_PAYLOAD).min(frame.len());
        let index_remaining = (chunk_count - 1 - i) as u8;
        let mut chunk = Vec::with_capacity(1 + (end - start));
        chunk.push((tx_seqno << 4) | index_remaining);
        chunk.extend_from_slice(&frame[start..end]);
        chunks.push(chunk);
    }
    chunks
}

/// Build the 3-byte ack chunk for `peer_seqno` (§3, §4.C).
pub fn ack_chunk(peer_seqno: u8) -> [u8; 3] {
    [0xFF, peer_seqno, 0x00]
}

/// What happened when an inbound notification value was fed to the
/// reassembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedOutcome {
    /// `v[0] == 0xFF`: the peer acked the chunk we last wrote. Release
    /// the next deferred write (§4.C, §4.E pump).
    PeerAck { seqno: u8 },
    /// A non-ack chunk was accepted: an ack chunk must always be written
    /// back, and if this chunk completed a frame (`idxRem & 0x0F == 0`),
    /// `frame` holds the full reassembled byte span (still CRC-suffixed;
    /// verify before decoding — a CRC failure is the caller's concern).
    Accepted {
        ack: [u8; 3],
        frame: Option<Vec<u8>>,
    },
}

/// Reassembles a stream of inbound chunk values into complete frames.
///
/// `last_seqno` uses a `-1` sentinel so that the very first chunk of a
/// new frame always resets the buffer cleanly (§9 "assembly reset
/// predicate" open question) — preserved verbatim, including the quirk
/// that a fresh frame's first chunk following an idxRem==0 terminator
/// also resets (since `0 - 1 == -1` can coincide with a genuine new-frame
/// countdown start).
pub struct Reassembler {
    buffer: Vec<u8>,
    last_seqno: i16,
}

impl Reassembler {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            last_seqno: -1,
        }
    }

    /// Feed one inbound characteristic value.
    pub fn feed(&mut self, value: &[u8]) -> Result<FeedOutcome> {
        if value.is_empty() {
            return Err(Error::Malformed("empty chunk"));
        }
        if value[0] == 0xFF {
            let seqno = *value.get(1).ok_or(Error::Malformed("short ack chunk"))?;
            return Ok(FeedOutcome::PeerAck { seqno });
        }
        // §4.C: "let seqno = v[0]" — the whole header byte, not just the
        // txSeqno nibble. Within one frame the countdown nibble decrements
        // chunk to chunk while txSeqno stays fixed, so the full byte steps
        // down by exactly 1 per chunk; using only the nibble would make the
        // reset predicate fire on every chunk of a multi-chunk frame.
        let seqno = value[0];
        let index_remaining = seqno & 0x0F;

        if i16::from(seqno) != self.last_seqno - 1 {
            self.buffer.clear();
        }
        self.buffer.extend_from_slice(&value[1..]);
        self.last_seqno = i16::from(seqno);

        let ack = ack_chunk(seqno);
        let frame = if index_remaining == 0 {
            let done = std::mem::take(&mut self.buffer);
            self.last_seqno = -1;
            Some(done)
        } else {
            None
        };
        Ok(FeedOutcome::Accepted { ack, frame })
    }
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_seqno_skips_zero_and_fifteen() {
        assert_eq!(next_tx_seqno(14), 1);
        assert_eq!(next_tx_seqno(1), 2);
    }

    #[test]
    fn single_chunk_frame() {
        let frame = read_settings_request();
        let chunks = fragment_frame(&frame, 1);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0][0], (1 << 4) | 0);
    }

    fn read_settings_request() -> Vec<u8> {
        crate::frame::Frame::encode_request(0x53, &[])
    }

    #[test]
    fn two_chunk_frame_has_countdown_header() {
        let payload = vec![0u8; 20];
        let frame = crate::frame::Frame::encode_request(0x3B, &payload);
        let chunks = fragment_frame(&frame, 1);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0][0] & 0x0F, 1);
        assert_eq!(chunks[1][0] & 0x0F, 0);
        for c in &chunks {
            assert!(c.len() <= 20);
        }
    }

    #[test]
    fn reassembles_single_chunk() {
        // §8 scenario 1: ack carries the whole header byte (1<<4)|0 = 16,
        // not just the txSeqno nibble.
        let frame = read_settings_request();
        let chunks = fragment_frame(&frame, 1);
        let mut r = Reassembler::new();
        let outcome = r.feed(&chunks[0]).unwrap();
        match outcome {
            FeedOutcome::Accepted { ack, frame: Some(f) } => {
                assert_eq!(ack, [0xFF, 16, 0]);
                assert_eq!(f, frame);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn reassembles_two_chunks_in_order() {
        let payload = vec![7u8; 20];
        let frame = crate::frame::Frame::encode_request(0x3B, &payload);
        let chunks = fragment_frame(&frame, 1);
        let mut r = Reassembler::new();
        let first = r.feed(&chunks[0]).unwrap();
        assert!(matches!(
            first,
            FeedOutcome::Accepted { frame: None, .. }
        ));
        let second = r.feed(&chunks[1]).unwrap();
        match second {
            FeedOutcome::Accepted { frame: Some(f), .. } => assert_eq!(f, frame),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn out_of_order_resets_buffer() {
        // §8 scenario 3: seq=2 idxRem=1 then seq=5 idxRem=0.
        let mut r = Reassembler::new();
        let chunk_a = {
            let mut c = vec![(2u8 << 4) | 1];
            c.extend_from_slice(&[0xAA; 5]);
            c
        };
        let chunk_b = {
            let mut c = vec![(5u8 << 4) | 0];
            c.extend_from_slice(&[0xBB; 5]);
            c
        };
        r.feed(&chunk_a).unwrap();
        let outcome = r.feed(&chunk_b).unwrap();
        match outcome {
            FeedOutcome::Accepted { frame: Some(f), .. } => {
                assert_eq!(f, vec![0xBB; 5], "buffer should have reset to only seq=5's payload");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn peer_ack_is_recognised() {
        let mut r = Reassembler::new();
        let outcome = r.feed(&ack_chunk(3)).unwrap();
        assert_eq!(outcome, FeedOutcome::PeerAck { seqno: 3 });
    }

    proptest::proptest! {
        #[test]
        fn fragmentation_roundtrip(
            payload in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..(19 * 14)),
            seq in 1u8..=14,
        ) {
            let frame = crate::frame::Frame::encode_request(0x06, &payload);
            let chunks = fragment_frame(&frame, seq);
            for c in &chunks {
                proptest::prop_assert!(c.len() <= 20);
            }
            let mut r = Reassembler::new();
            let mut reconstructed = None;
            for (i, c) in chunks.iter().enumerate() {
                let outcome = r.feed(c).unwrap();
                match outcome {
                    FeedOutcome::Accepted { frame: Some(f), .. } => {
                        proptest::prop_assert_eq!(i, chunks.len() - 1);
                        reconstructed = Some(f);
                    }
                    FeedOutcome::Accepted { frame: None, .. } => {
                        proptest::prop_assert!(i != chunks.len() - 1);
                    }
                    FeedOutcome::PeerAck { .. } => proptest::prop_assert!(false, "unexpected ack"),
                }
            }
            proptest::prop_assert_eq!(reconstructed, Some(frame));
        }
    }
}
