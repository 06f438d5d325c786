//! Unified error types for the MT link layer.
//!
//! A single `Error` enum every subsystem funnels into, matching the house
//! style: manual `Display` impls, `From` conversions from leaf error
//! sources, no `thiserror`. This keeps callers' error handling uniform and
//! lets the type compose with `anyhow` at the embedding boundary.

use core::fmt;

use crate::commands::codes::StatusCode;

/// Every fallible operation surfaced to a caller of the MT link layer.
#[derive(Debug, Clone)]
pub enum Error {
    /// A reassembled frame failed its CRC-8 check (§7 `CRCError`).
    Crc,
    /// The device responded with a non-zero status byte (§7 `StatusError`).
    Status(StatusCode),
    /// The underlying BLE stack reported an error on a write, notification,
    /// or disconnect callback (§7 `LinkError`).
    Link(String),
    /// The peripheral's `disconnected` latch has fired; carries the
    /// terminal cause that unblocked every pending and future operation.
    Disconnected(Box<Error>),
    /// Bluetooth is unsupported or permission was denied — fatal at this
    /// layer (§7 `AdapterFatal`).
    AdapterFatal(String),
    /// A frame or chunk was structurally invalid and was dropped rather
    /// than routed (e.g. a frame type outside `{0,3}`).
    Malformed(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Crc => write!(f, "CRC-8 check failed on reassembled frame"),
            Self::Status(code) => write!(f, "device status error: {code}"),
            Self::Link(msg) => write!(f, "link error: {msg}"),
            Self::Disconnected(cause) => write!(f, "peripheral disconnected: {cause}"),
            Self::AdapterFatal(msg) => write!(f, "adapter fatal: {msg}"),
            Self::Malformed(msg) => write!(f, "malformed frame: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Wrap `self` as the terminal cause carried by a disconnect.
    pub fn into_disconnected(self) -> Self {
        Self::Disconnected(Box::new(self))
    }
}

impl From<btleplug::Error> for Error {
    fn from(e: btleplug::Error) -> Self {
        Self::Link(e.to_string())
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
