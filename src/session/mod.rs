//! Peripheral session (§4.E): turns a connected peripheral's unreliable
//! write/notify characteristic pair into a reliable, ordered
//! request/response channel. Owns the readiness gates, write pipeline,
//! reassembler, and response stream for exactly one peripheral.

pub mod delegate;
pub mod readiness;
pub mod write_pipeline;

use std::sync::Arc;

use btleplug::api::Characteristic;
use tokio::sync::{oneshot, Mutex, OnceCell};

pub use delegate::GattDelegate;
pub use readiness::Readiness;
pub use write_pipeline::WritePipeline;

use crate::chunk::{self, FeedOutcome, Reassembler};
use crate::commands::codes::StatusCode;
use crate::error::{Error, Result};
use crate::frame::{Frame, FrameType};
use crate::sync::{Fuse, ResponseStream};
use crate::transport::GattTransport;

/// A live MT link to one peripheral.
pub struct PeripheralSession<T: GattTransport> {
    uuid: String,
    transport: T,
    readiness: Readiness,
    disconnected: Fuse<Error>,
    tx_seqno: Mutex<u8>,
    reassembler: Mutex<Reassembler>,
    write_pipeline: WritePipeline,
    response_stream: ResponseStream<Vec<u8>>,
    tx_char: OnceCell<Characteristic>,
    rx_char: OnceCell<Characteristic>,
}

impl<T: GattTransport + 'static> PeripheralSession<T> {
    /// Construct a session and spawn its background notification loop
    /// (the run-time stand-in for the OS dispatch queue of §5).
    pub async fn connect(uuid: String, transport: T) -> Arc<Self> {
        let session = Arc::new(Self {
            uuid,
            transport,
            readiness: Readiness::new(),
            disconnected: Fuse::new(),
            tx_seqno: Mutex::new(chunk::TX_SEQNO_MIN),
            reassembler: Mutex::new(Reassembler::new()),
            write_pipeline: WritePipeline::new(),
            response_stream: ResponseStream::new(),
            tx_char: OnceCell::new(),
            rx_char: OnceCell::new(),
        });
        let loop_session = session.clone();
        tokio::spawn(async move { loop_session.run().await });
        session
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.is_triggered()
    }

    /// Wait for the link to become unusable, returning the terminal
    /// cause (§3 `disconnected` latch).
    pub async fn wait_disconnected(&self) -> Error {
        self.disconnected.wait().await
    }

    /// Force the session into its terminal state from outside, e.g. when
    /// the owning central manager's adapter drops below `PoweredOn`
    /// (§4.F "below PoweredOff, clear all maps"). A no-op if the session
    /// is already disconnected.
    pub fn force_disconnect(&self, cause: Error) {
        self.fail(cause);
    }

    async fn run(self: Arc<Self>) {
        let (tx, rx) = match self.transport.discover_characteristics().await {
            Ok(pair) => pair,
            Err(e) => {
                self.fail(e);
                return;
            }
        };
        self.on_characteristic_discovered(&tx, &rx);
        let _ = self.tx_char.set(tx);
        let _ = self.rx_char.set(rx.clone());
        self.readiness.mark_tx_characteristic_found();
        self.readiness.mark_rx_characteristic_found();

        if let Err(e) = self.transport.enable_notifications(&rx).await {
            self.fail(e);
            return;
        }
        self.on_notify_state_changed(true);
        self.readiness.mark_notify_enabled();

        loop {
            match self.transport.next_notification().await {
                Some(value) => self.on_inbound_value(&value).await,
                None => {
                    self.fail(Error::Link("notification stream ended".into()));
                    return;
                }
            }
        }
    }

    fn fail(&self, cause: Error) {
        if self.disconnected.is_triggered() {
            return;
        }
        self.on_disconnect(&cause);
        self.response_stream.set_terminal_error(cause.clone());
        self.disconnected.trigger(cause);
    }

    async fn on_inbound_value(&self, value: &[u8]) {
        self.on_value_updated(value);
        let outcome = {
            let mut reassembler = self.reassembler.lock().await;
            reassembler.feed(value)
        };
        let tx_char = match self.tx_char.get() {
            Some(c) => c.clone(),
            None => return,
        };
        match outcome {
            Err(_) => {
                // malformed chunk: dropped silently, same as an
                // unrecognised frame type (§4.B).
            }
            Ok(FeedOutcome::PeerAck { .. }) => {
                self.write_pipeline.pump(&self.transport, &tx_char, |r| self.on_write_complete(r)).await;
            }
            Ok(FeedOutcome::Accepted { ack, frame }) => {
                self.write_pipeline.enqueue_chunk(ack.to_vec(), None).await;
                self.write_pipeline.pump(&self.transport, &tx_char, |r| self.on_write_complete(r)).await;
                if let Some(bytes) = frame {
                    self.handle_complete_frame(&bytes);
                }
            }
        }
    }

    fn handle_complete_frame(&self, bytes: &[u8]) {
        match Frame::decode(bytes) {
            Ok(frame) => match frame.frame_type {
                FrameType::Response => {
                    let status = frame.status_or_command;
                    if status == 0 {
                        self.response_stream.post(Ok(frame.payload));
                    } else {
                        self.response_stream
                            .post(Err(Error::Status(StatusCode::from_byte(status))));
                    }
                }
                FrameType::Request => {
                    self.dispatch_request_from_device(frame.status_or_command, &frame.payload)
                }
            },
            Err(Error::Crc) => self.response_stream.post(Err(Error::Crc)),
            Err(_) => {
                // unrecognised frame type: dropped silently (§4.B).
            }
        }
    }

    fn dispatch_request_from_device(&self, command: u8, payload: &[u8]) {
        match command {
            crate::commands::codes::command::CONTROL => {
                log::info!("[{}] sync container pushed by device ({} bytes)", self.uuid, payload.len());
            }
            other => {
                log::debug!("[{}] ignoring unknown request command 0x{:02x}", self.uuid, other);
            }
        }
    }

    /// Issue a request and await its response (§4.E).
    ///
    /// Fails immediately if the link is already disconnected; otherwise
    /// waits for readiness, writes the framed+fragmented request, and
    /// claims the next response off the response stream.
    pub async fn send_request(&self, command: u8, payload: &[u8]) -> Result<Vec<u8>> {
        if let Some(cause) = self.disconnected.get() {
            return Err(cause);
        }
        tokio::select! {
            () = self.readiness.wait() => {}
            cause = self.disconnected.wait() => return Err(cause),
        }

        let seq = {
            let mut guard = self.tx_seqno.lock().await;
            let current = *guard;
            *guard = chunk::next_tx_seqno(current);
            current
        };
        let frame = Frame::encode_request(command, payload);
        let chunks = chunk::fragment_frame(&frame, seq);
        let (completion_tx, completion_rx) = oneshot::channel();
        let mut completion_tx = Some(completion_tx);
        let last = chunks.len() - 1;
        for (i, bytes) in chunks.into_iter().enumerate() {
            let completion = if i == last { completion_tx.take() } else { None };
            self.write_pipeline.enqueue_chunk(bytes, completion).await;
        }
        let tx_char = self
            .tx_char
            .get()
            .cloned()
            .ok_or(Error::Link("tx characteristic not ready".into()))?;
        self.write_pipeline.pump(&self.transport, &tx_char, |r| self.on_write_complete(r)).await;

        let write_result = tokio::select! {
            r = completion_rx => r.unwrap_or_else(|_| Err(Error::Link("write pipeline dropped".into()))),
            cause = self.disconnected.wait() => return Err(cause),
        };
        write_result?;

        self.response_stream.claim().await
    }
}

impl<T: GattTransport> GattDelegate for PeripheralSession<T> {
    fn on_characteristic_discovered(&self, tx: &Characteristic, rx: &Characteristic) {
        log::debug!("[{}] discovered tx={} rx={}", self.uuid, tx.uuid, rx.uuid);
    }

    fn on_notify_state_changed(&self, enabled: bool) {
        log::debug!("[{}] notify enabled = {enabled}", self.uuid);
    }

    fn on_value_updated(&self, value: &[u8]) {
        log::trace!("[{}] notification, {} bytes", self.uuid, value.len());
    }

    fn on_write_complete(&self, result: &Result<()>) {
        if let Err(e) = result {
            log::warn!("[{}] write failed: {e}", self.uuid);
        }
    }

    fn on_disconnect(&self, cause: &Error) {
        log::warn!("[{}] disconnected: {cause}", self.uuid);
    }
}
