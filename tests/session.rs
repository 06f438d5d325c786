//! End-to-end tests for `PeripheralSession` driven against an in-memory
//! fake peripheral instead of a real radio (§8 concrete scenarios).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use btleplug::api::{CharPropFlags, Characteristic};
use glm_mt_link::chunk::{self, Reassembler};
use glm_mt_link::commands::codes::{command, StatusCode};
use glm_mt_link::error::{Error, Result};
use glm_mt_link::frame::Frame;
use glm_mt_link::session::PeripheralSession;
use glm_mt_link::transport::{GattTransport, Notification};
use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

fn fake_characteristic(discriminant: u128) -> Characteristic {
    Characteristic {
        uuid: Uuid::from_u128(discriminant),
        service_uuid: Uuid::from_u128(1),
        properties: CharPropFlags::WRITE | CharPropFlags::NOTIFY,
        descriptors: Default::default(),
    }
}

fn encode_response(status: u8, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(3 + payload.len() + 1);
    bytes.push(status & 0x3F);
    bytes.push(payload.len() as u8);
    bytes.extend_from_slice(payload);
    let crc = glm_mt_link::crc8::crc8(&bytes);
    bytes.push(crc);
    bytes
}

type Responder = Box<dyn Fn(u8, &[u8]) -> (u8, Vec<u8>) + Send + Sync>;

/// Simulates the GLM device side of the link: acks every chunk it
/// receives, reassembles requests, and replies through `responder`.
struct FakeDevice {
    notifications: AsyncMutex<mpsc::UnboundedReceiver<Notification>>,
    notify_tx: mpsc::UnboundedSender<Notification>,
    device_reassembler: AsyncMutex<Reassembler>,
    device_seqno: AtomicU8,
    responder: Responder,
    connected: AtomicBool,
}

impl FakeDevice {
    fn new(responder: Responder) -> Self {
        let (notify_tx, rx) = mpsc::unbounded_channel();
        Self {
            notifications: AsyncMutex::new(rx),
            notify_tx,
            device_reassembler: AsyncMutex::new(Reassembler::new()),
            device_seqno: AtomicU8::new(chunk::TX_SEQNO_MIN),
            responder,
            connected: AtomicBool::new(true),
        }
    }

    fn next_device_seqno(&self) -> u8 {
        let current = self.device_seqno.load(Ordering::SeqCst);
        self.device_seqno
            .store(chunk::next_tx_seqno(current), Ordering::SeqCst);
        current
    }

    /// Disconnect by closing the notification stream, same signal the
    /// real transport gives when the radio drops (`next_notification`
    /// returns `None`).
    fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl GattTransport for FakeDevice {
    async fn discover_characteristics(&self) -> Result<(Characteristic, Characteristic)> {
        Ok((fake_characteristic(10), fake_characteristic(11)))
    }

    async fn enable_notifications(&self, _rx: &Characteristic) -> Result<()> {
        Ok(())
    }

    async fn write_chunk(&self, _tx: &Characteristic, chunk_bytes: &[u8]) -> Result<()> {
        if chunk_bytes.first() == Some(&0xFF) {
            // Host acking one of our response chunks; nothing further to do.
            return Ok(());
        }
        // §4.C: the ack echoes the whole header byte, not just the
        // txSeqno nibble.
        let seqno = chunk_bytes[0];
        let _ = self.notify_tx.send(chunk::ack_chunk(seqno).to_vec());

        let outcome = {
            let mut reassembler = self.device_reassembler.lock().await;
            reassembler.feed(chunk_bytes)
        };
        if let Ok(glm_mt_link::chunk::FeedOutcome::Accepted {
            frame: Some(bytes), ..
        }) = outcome
        {
            let request = Frame::decode(&bytes).expect("fake device received a malformed frame");
            let (status, payload) = (self.responder)(request.status_or_command, &request.payload);
            let response = encode_response(status, &payload);
            let device_seq = self.next_device_seqno();
            for part in chunk::fragment_frame(&response, device_seq) {
                let _ = self.notify_tx.send(part);
            }
        }
        Ok(())
    }

    async fn next_notification(&self) -> Option<Notification> {
        if !self.connected.load(Ordering::SeqCst) {
            return None;
        }
        self.notifications.lock().await.recv().await
    }

    async fn is_connected(&self) -> Result<bool> {
        Ok(self.connected.load(Ordering::SeqCst))
    }
}

#[tokio::test]
async fn single_chunk_request_response_roundtrip() {
    let device = FakeDevice::new(Box::new(|cmd, _payload| {
        assert_eq!(cmd, command::READ_SETTINGS);
        (0, vec![1u8; 11])
    }));
    let session = PeripheralSession::connect("fake-1".to_string(), device).await;

    let response = session
        .send_request(command::READ_SETTINGS, &[])
        .await
        .unwrap();
    assert_eq!(response, vec![1u8; 11]);
}

#[tokio::test]
async fn multi_chunk_request_and_response_roundtrip() {
    let big_reply = vec![0xAB; 40];
    let expected_reply = big_reply.clone();
    let device = FakeDevice::new(Box::new(move |cmd, payload| {
        assert_eq!(cmd, command::UPLOAD_BLOCK);
        assert_eq!(payload.len(), 30);
        (0, big_reply.clone())
    }));
    let session = PeripheralSession::connect("fake-2".to_string(), device).await;

    let request_payload = vec![0x42; 30];
    let response = session
        .send_request(command::UPLOAD_BLOCK, &request_payload)
        .await
        .unwrap();
    assert_eq!(response, expected_reply);
}

#[tokio::test]
async fn status_error_response_surfaces_as_error() {
    let device = FakeDevice::new(Box::new(|_cmd, _payload| (0x02, vec![])));
    let session = PeripheralSession::connect("fake-3".to_string(), device).await;

    let err = session
        .send_request(command::WRITE_SETTINGS, &[0u8; 11])
        .await
        .unwrap_err();
    match err {
        Error::Status(status) => assert_eq!(status, StatusCode::from_byte(0x02)),
        other => panic!("expected Error::Status, got {other:?}"),
    }
}

#[tokio::test]
async fn disconnect_fails_pending_and_future_requests() {
    let device = Arc::new(FakeDevice::new(Box::new(|_cmd, _payload| (0, vec![]))));

    struct Forwarding(Arc<FakeDevice>);

    #[async_trait]
    impl GattTransport for Forwarding {
        async fn discover_characteristics(&self) -> Result<(Characteristic, Characteristic)> {
            self.0.discover_characteristics().await
        }
        async fn enable_notifications(&self, rx: &Characteristic) -> Result<()> {
            self.0.enable_notifications(rx).await
        }
        async fn write_chunk(&self, tx: &Characteristic, chunk_bytes: &[u8]) -> Result<()> {
            self.0.write_chunk(tx, chunk_bytes).await
        }
        async fn next_notification(&self) -> Option<Notification> {
            self.0.next_notification().await
        }
        async fn is_connected(&self) -> Result<bool> {
            self.0.is_connected().await
        }
    }

    let session = PeripheralSession::connect("fake-4".to_string(), Forwarding(device.clone())).await;
    session
        .send_request(command::REAL_TIME_CLOCK, &[])
        .await
        .unwrap();

    device.disconnect();
    let cause = session.wait_disconnected().await;
    assert!(matches!(cause, Error::Link(_)));

    let err = session
        .send_request(command::REAL_TIME_CLOCK, &[])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Link(_)));
}

#[tokio::test]
async fn paged_get_measurements_collects_all_records() {
    // Device has 3 records across two pages: first page returns records
    // for [0,0], reporting next_first = 1; second page returns the rest
    // and an empty body signals the end (§4.G, §8 scenario 6).
    let device = FakeDevice::new(Box::new(|cmd, payload| {
        assert_eq!(cmd, command::GET_MEASUREMENTS);
        let first = payload[0];
        if first == 0 {
            let mut resp = vec![0u8, 1];
            resp.extend_from_slice(&[0xAA; 33]);
            resp.extend_from_slice(&[0xBB; 33]);
            (0, resp)
        } else {
            let mut resp = vec![first, first];
            resp.extend_from_slice(&[0xCC; 33]);
            (0, resp)
        }
    }));
    let session = PeripheralSession::connect("fake-5".to_string(), device).await;

    let records = glm_mt_link::commands::get_measurements(&session, 0, 2)
        .await
        .unwrap();
    assert_eq!(records.len(), 3);
    // 0xAA/0xBB/0xCC-filled bytes decode to distinct measurement_type
    // nibbles, which is enough to confirm record ordering and identity
    // without hand-decoding every field of a fixed-filler sync container.
    assert_eq!(records[0].measurement_type, 0xAA & 0x1F);
    assert_eq!(records[1].measurement_type, 0xBB & 0x1F);
    assert_eq!(records[2].measurement_type, 0xCC & 0x1F);
}
