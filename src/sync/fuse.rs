//! One-shot latch (§4.D "fuse"): a value set at most once, observable by
//! any number of waiters whether they started waiting before or after it
//! landed. Used for the per-session ready latch and disconnected latch.

use std::sync::Mutex;

use tokio::sync::oneshot;

struct State<T> {
    value: Option<T>,
    waiters: Vec<oneshot::Sender<T>>,
}

/// A single-shot latch. `trigger` may be called any number of times but
/// only the first has effect.
pub struct Fuse<T> {
    state: Mutex<State<T>>,
}

impl<T: Clone> Fuse<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                value: None,
                waiters: Vec::new(),
            }),
        }
    }

    /// Optimistic read of whether the fuse has fired.
    pub fn is_triggered(&self) -> bool {
        self.state.lock().unwrap().value.is_some()
    }

    /// The stored value, if the fuse has already fired.
    pub fn get(&self) -> Option<T> {
        self.state.lock().unwrap().value.clone()
    }

    /// Set the fuse's value and wake every current waiter. A no-op if the
    /// fuse already fired.
    pub fn trigger(&self, value: T) {
        let mut state = self.state.lock().unwrap();
        if state.value.is_some() {
            return;
        }
        state.value = Some(value.clone());
        for waiter in state.waiters.drain(..) {
            let _ = waiter.send(value.clone());
        }
    }

    /// Wait for the fuse to fire, resolving immediately if it already
    /// has. Dropping the returned future before completion is the
    /// "unlisten" of §4.D — the registration is simply abandoned.
    pub async fn wait(&self) -> T {
        let rx = {
            let mut state = self.state.lock().unwrap();
            if let Some(v) = &state.value {
                return v.clone();
            }
            let (tx, rx) = oneshot::channel();
            state.waiters.push(tx);
            rx
        };
        rx.await.expect("fuse triggered without sending a value")
    }
}

impl<T: Clone> Default for Fuse<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_before_trigger() {
        let fuse = Fuse::new();
        let fuse = std::sync::Arc::new(fuse);
        let f2 = fuse.clone();
        let handle = tokio::spawn(async move { f2.wait().await });
        tokio::task::yield_now().await;
        fuse.trigger(42);
        assert_eq!(handle.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn wait_after_trigger_resolves_synchronously() {
        let fuse: Fuse<u32> = Fuse::new();
        fuse.trigger(7);
        assert_eq!(fuse.wait().await, 7);
    }

    #[test]
    fn second_trigger_is_noop() {
        let fuse = Fuse::new();
        fuse.trigger("first");
        fuse.trigger("second");
        assert_eq!(fuse.get(), Some("first"));
    }
}
