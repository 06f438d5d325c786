//! Ordered response stream (§4.D, §9): pairs outstanding request futures
//! ("claims") with frames produced by the reassembler ("posts"), in FIFO
//! order, with a terminal-error close state once the session disconnects.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::oneshot;

use crate::error::Error;

type Posted<T> = std::result::Result<T, Error>;

struct State<T> {
    /// Claims registered before a matching post arrived.
    early: VecDeque<oneshot::Sender<Posted<T>>>,
    /// Posted values waiting for a claim to pick them up.
    late: VecDeque<Posted<T>>,
    terminal_error: Option<Error>,
}

/// Ordered claim/post stream. `T` is the payload of a successfully
/// decoded response frame.
pub struct ResponseStream<T> {
    state: Mutex<State<T>>,
}

enum Claimed<T> {
    Ready(Posted<T>),
    Pending(oneshot::Receiver<Posted<T>>),
}

impl<T: Send + 'static> ResponseStream<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                early: VecDeque::new(),
                late: VecDeque::new(),
                terminal_error: None,
            }),
        }
    }

    /// Register a claim for the next posted frame, in FIFO order with
    /// respect to other claims and posts (§3 invariant 6).
    pub async fn claim(&self) -> Posted<T> {
        let claimed = {
            let mut state = self.state.lock().unwrap();
            if let Some(v) = state.late.pop_front() {
                Claimed::Ready(v)
            } else if let Some(e) = &state.terminal_error {
                Claimed::Ready(Err(e.clone()))
            } else {
                let (tx, rx) = oneshot::channel();
                state.early.push_back(tx);
                Claimed::Pending(rx)
            }
        };
        match claimed {
            Claimed::Ready(v) => v,
            Claimed::Pending(rx) => rx.await.unwrap_or_else(|_| {
                Err(Error::Link("response stream claim dropped".to_string()))
            }),
        }
    }

    /// Post a value (a decoded frame, or an error such as a CRC failure)
    /// to the oldest pending claim. If no claim is pending, the value is
    /// queued as "late" for the next claim to pop — unless it is a
    /// success and the stream has already been closed, in which case it
    /// is dropped (§4.D `post`, §9 open question on dropping successes
    /// after closure).
    pub fn post(&self, mut value: Posted<T>) {
        let mut state = self.state.lock().unwrap();
        while let Some(tx) = state.early.pop_front() {
            match tx.send(value) {
                Ok(()) => return,
                Err(returned) => value = returned,
            }
        }
        if value.is_err() || state.terminal_error.is_none() {
            state.late.push_back(value);
        }
    }

    /// Close the stream: every currently pending claim resolves with
    /// `e`, and every claim made from now on resolves with `e` too.
    /// Already-posted successes sitting in `late` remain claimable.
    pub fn set_terminal_error(&self, e: Error) {
        let mut state = self.state.lock().unwrap();
        if state.terminal_error.is_some() {
            return;
        }
        state.terminal_error = Some(e.clone());
        for tx in state.early.drain(..) {
            let _ = tx.send(Err(e.clone()));
        }
    }
}

impl<T: Send + 'static> Default for ResponseStream<T> {
    fn default() -> Self {
        Self::new()
    }
}
