//! GATT transport contract (§1, §6, §9): the single seam between the
//! link layer (modules A-F) and a real BLE stack. `GattTransport` is the
//! "external collaborator" — everything above it is transport-agnostic
//! and testable without a radio. `BtleplugTransport` wires it to
//! `btleplug`, the cross-platform BLE central crate.
//!
//! Every method takes `&self`: the notification stream is lazily
//! initialised behind its own interior mutex so that polling it for the
//! next notification never blocks a concurrent write — the two are
//! independent operations on the same peripheral.

use async_trait::async_trait;
use btleplug::api::{Characteristic, Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use futures::stream::StreamExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{Error, Result};

/// MT GATT service.
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_5301_0000_0041_5253_534F_4654_0000);
/// Host→device characteristic, write-with-response.
pub const TX_CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0x0000_4301_0000_0041_5253_534F_4654_0000);
/// Device→host characteristic, notify.
pub const RX_CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0x0000_4302_0000_0041_5253_534F_4654_0000);

/// One inbound notification value from the RX characteristic.
pub type Notification = Vec<u8>;

/// The GATT operations the link layer needs from a connected peripheral.
/// A session discovers the two MT characteristics, enables notifications
/// on RX, writes chunks to TX with response, and consumes the
/// notification stream — nothing else about the underlying BLE stack is
/// visible above this trait.
#[async_trait]
pub trait GattTransport: Send + Sync {
    /// Discover services/characteristics and return the TX and RX
    /// characteristics for the MT service, in that order.
    async fn discover_characteristics(&self) -> Result<(Characteristic, Characteristic)>;

    /// Enable notifications on the RX characteristic.
    async fn enable_notifications(&self, rx: &Characteristic) -> Result<()>;

    /// Write one chunk (≤20 bytes) to TX with a write-with-response
    /// acknowledgement from the radio itself — distinct from the MT
    /// protocol's own peer ack chunk (§4.E pump step 3).
    async fn write_chunk(&self, tx: &Characteristic, chunk: &[u8]) -> Result<()>;

    /// The next inbound notification value, or `None` once the
    /// underlying stream ends (disconnect).
    async fn next_notification(&self) -> Option<Notification>;

    /// Whether the peripheral reports itself connected.
    async fn is_connected(&self) -> Result<bool>;
}

type NotificationStream = std::pin::Pin<Box<dyn futures::Stream<Item = btleplug::api::ValueNotification> + Send>>;

/// Concrete `GattTransport` over a `btleplug::platform::Peripheral`.
pub struct BtleplugTransport {
    peripheral: Peripheral,
    notifications: Mutex<Option<NotificationStream>>,
}

impl BtleplugTransport {
    pub fn new(peripheral: Peripheral) -> Self {
        Self {
            peripheral,
            notifications: Mutex::new(None),
        }
    }
}

#[async_trait]
impl GattTransport for BtleplugTransport {
    async fn discover_characteristics(&self) -> Result<(Characteristic, Characteristic)> {
        self.peripheral.discover_services().await?;
        let chars = self.peripheral.characteristics();
        let tx = chars
            .iter()
            .find(|c| c.uuid == TX_CHARACTERISTIC_UUID)
            .cloned()
            .ok_or(Error::Malformed("TX characteristic not found"))?;
        let rx = chars
            .iter()
            .find(|c| c.uuid == RX_CHARACTERISTIC_UUID)
            .cloned()
            .ok_or(Error::Malformed("RX characteristic not found"))?;
        Ok((tx, rx))
    }

    async fn enable_notifications(&self, rx: &Characteristic) -> Result<()> {
        self.peripheral.subscribe(rx).await?;
        Ok(())
    }

    async fn write_chunk(&self, tx: &Characteristic, chunk: &[u8]) -> Result<()> {
        self.peripheral
            .write(tx, chunk, WriteType::WithResponse)
            .await?;
        Ok(())
    }

    async fn next_notification(&self) -> Option<Notification> {
        let mut slot = self.notifications.lock().await;
        if slot.is_none() {
            let stream = self.peripheral.notifications().await.ok()?;
            *slot = Some(Box::pin(stream));
        }
        slot.as_mut().unwrap().next().await.map(|v| v.value)
    }

    async fn is_connected(&self) -> Result<bool> {
        Ok(self.peripheral.is_connected().await?)
    }
}
