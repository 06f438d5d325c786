//! MT frame codec (§3, §4.B): encodes a (type, status-or-command, payload)
//! triple into the on-wire byte layout and decodes it back, after
//! reassembly has handed us a whole, CRC-verified byte span.

use crate::crc8;
use crate::error::{Error, Result};

/// `frameType` discriminant (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Response,
    Request,
}

impl FrameType {
    fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Self::Response),
            3 => Some(Self::Request),
            _ => None,
        }
    }

    fn to_bits(self) -> u8 {
        match self {
            Self::Response => 0,
            Self::Request => 3,
        }
    }
}

/// A decoded MT frame. For a request, `status_or_command` holds the
/// command byte; for a response, it holds the status byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub frame_type: FrameType,
    pub status_or_command: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    /// Build a request frame for `command` with `payload` and encode it
    /// to wire bytes, including the trailing CRC-8 (§4.B).
    pub fn encode_request(command: u8, payload: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(3 + payload.len() + 1);
        bytes.push((FrameType::Request.to_bits() << 6) | 0);
        bytes.push(command);
        bytes.push(payload.len() as u8);
        bytes.extend_from_slice(payload);
        let crc = crc8::crc8(&bytes);
        bytes.push(crc);
        bytes
    }

    /// Decode a complete, already-reassembled byte span. Verifies the
    /// trailing CRC-8 first; a CRC failure is `Error::Crc`. Frames whose
    /// `frameType` is outside `{0,3}` are dropped silently per §4.B,
    /// surfaced here as `Error::Malformed` for the caller to ignore.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::Malformed("empty frame"));
        }
        if !crc8::verify(bytes) {
            return Err(Error::Crc);
        }
        // Drop the trailing CRC byte; everything else is header+payload.
        let body = &bytes[..bytes.len() - 1];
        if body.is_empty() {
            return Err(Error::Malformed("frame shorter than header"));
        }
        let frame_type = FrameType::from_bits(body[0] >> 6)
            .ok_or(Error::Malformed("frame type not in {0,3}"))?;
        let status_or_command = body[0] & 0x3F;
        let hdr = match frame_type {
            FrameType::Response => 0,
            FrameType::Request => 1,
        };
        let command = if hdr == 1 {
            *body.get(1).ok_or(Error::Malformed("missing command byte"))?
        } else {
            status_or_command
        };
        let len_idx = 1 + hdr;
        let payload_len = *body
            .get(len_idx)
            .ok_or(Error::Malformed("missing payload length byte"))? as usize;
        let payload_start = len_idx + 1;
        let payload_end = payload_start + payload_len;
        let payload = body
            .get(payload_start..payload_end)
            .ok_or(Error::Malformed("payload length exceeds frame"))?
            .to_vec();
        Ok(Self {
            frame_type,
            status_or_command: command,
            payload,
        })
    }
}
