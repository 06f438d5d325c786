//! Host-side client for the Bosch GLM laser rangefinder MT protocol over
//! BLE. Modules `crc8`/`frame`/`chunk`/`sync` are pure and transport
//! agnostic; `transport` is the single seam onto a real BLE stack;
//! `session` and `central` drive a live link; `commands` is the typed
//! request/response API built on top of a session.

#![deny(unused_must_use)]

pub mod central;
pub mod chunk;
pub mod commands;
pub mod config;
pub mod crc8;
pub mod error;
pub mod frame;
pub mod session;
pub mod sync;
pub mod transport;

pub use central::CentralManager;
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use session::PeripheralSession;
pub use transport::{BtleplugTransport, GattTransport};
