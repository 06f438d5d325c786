//! Write pipeline (§4.E): a FIFO of deferred writes pumped one at a time
//! onto the radio, enforcing "at most one chunk outstanding" (§3
//! invariant 1). A sentinel flush entry lets a caller wait for every
//! write enqueued so far to have at least been submitted.

use std::collections::VecDeque;

use btleplug::api::Characteristic;
use tokio::sync::{oneshot, Mutex};

use crate::error::Result;
use crate::transport::GattTransport;

enum WriteItem {
    Chunk {
        bytes: Vec<u8>,
        completion: Option<oneshot::Sender<Result<()>>>,
    },
    Flush(oneshot::Sender<()>),
}

/// Serialises outbound chunk writes. Mirrors §4.E's `deferredWrites` /
/// `submittedWrites` FIFOs and the `writeMutex`-guarded pump.
pub struct WritePipeline {
    deferred: Mutex<VecDeque<WriteItem>>,
    submitted: Mutex<VecDeque<Option<oneshot::Sender<Result<()>>>>>,
    pump_lock: Mutex<()>,
}

impl WritePipeline {
    pub fn new() -> Self {
        Self {
            deferred: Mutex::new(VecDeque::new()),
            submitted: Mutex::new(VecDeque::new()),
            pump_lock: Mutex::new(()),
        }
    }

    /// Queue a chunk for write. `completion` is `Some` only for the last
    /// chunk of a frame (§4.E step 2) or for a bare ack chunk the session
    /// doesn't need to await.
    pub async fn enqueue_chunk(&self, bytes: Vec<u8>, completion: Option<oneshot::Sender<Result<()>>>) {
        self.deferred
            .lock()
            .await
            .push_back(WriteItem::Chunk { bytes, completion });
    }

    /// Push a flush marker and wait for it to be reached by the pump —
    /// i.e. every write enqueued before it has at least been submitted.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        self.deferred.lock().await.push_back(WriteItem::Flush(tx));
        let _ = rx.await;
    }

    /// The number of writes currently awaiting a GATT write-response.
    /// Used by the at-most-one-in-flight property test (§8).
    pub async fn in_flight_count(&self) -> usize {
        self.submitted.lock().await.len()
    }

    /// Run the pump: pop and dispatch writes until a chunk is submitted
    /// or the queue empties. Call after every enqueue and after every
    /// peer ack (§4.E). `on_write_complete` is the session's
    /// `GattDelegate` hook, invoked with every GATT write-response
    /// regardless of whether the chunk carries a user completion — it is
    /// the only place a failed ack-chunk write is ever observed.
    pub async fn pump<T: GattTransport + ?Sized>(
        &self,
        transport: &T,
        tx_char: &Characteristic,
        on_write_complete: impl Fn(&Result<()>),
    ) {
        let _guard = self.pump_lock.lock().await;
        loop {
            let item = self.deferred.lock().await.pop_front();
            match item {
                None => return,
                Some(WriteItem::Flush(tx)) => {
                    let _ = tx.send(());
                    continue;
                }
                Some(WriteItem::Chunk { bytes, completion }) => {
                    self.submitted.lock().await.push_back(completion);
                    let result = transport.write_chunk(tx_char, &bytes).await;
                    on_write_complete(&result);
                    if let Some(Some(tx)) = self.submitted.lock().await.pop_front() {
                        let _ = tx.send(result);
                    }
                    return;
                }
            }
        }
    }
}

impl Default for WritePipeline {
    fn default() -> Self {
        Self::new()
    }
}
