//! `0x51 GetMeasurements` paging loop (§4.G, §8 scenario 6).

use super::codes::command;
use super::SyncContainer;
use crate::error::{Error, Result};
use crate::session::PeripheralSession;
use crate::transport::GattTransport;

/// Page through `[first, last]`, issuing successive `0x51` requests
/// until the device returns no further records or the next page would
/// start past `last`.
pub async fn get_measurements<T: GattTransport>(
    session: &PeripheralSession<T>,
    first: u8,
    last: u8,
) -> Result<Vec<SyncContainer>> {
    let mut records = Vec::new();
    let mut first = first;
    if first > last {
        return Ok(records);
    }
    loop {
        let resp = session
            .send_request(command::GET_MEASUREMENTS, &[first, last])
            .await?;
        if resp.len() < 2 {
            return Err(Error::Malformed("GetMeasurements response too short"));
        }
        let next_first = resp[1];
        let body = &resp[2..];
        if body.is_empty() {
            break;
        }
        for record in body.chunks_exact(33) {
            records.push(SyncContainer::from_bytes(record)?);
        }
        if u16::from(next_first) + 1 > u16::from(last) {
            break;
        }
        first = next_first + 1;
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    // Exercised end-to-end against a fake peripheral in tests/session.rs
    // (needs a full PeripheralSession, not just this module).
}
