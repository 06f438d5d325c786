//! Keyed multi-listener event (§4.D): a map from key to a set of waiters,
//! used for the central manager's per-UUID connect rendezvous.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;

use tokio::sync::oneshot;

struct State<K, T> {
    listeners: HashMap<K, Vec<oneshot::Sender<T>>>,
}

pub struct KeyedEvent<K, T> {
    state: Mutex<State<K, T>>,
}

impl<K: Eq + Hash + Clone, T: Clone> KeyedEvent<K, T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                listeners: HashMap::new(),
            }),
        }
    }

    /// Register interest in `key`, returning a future that resolves the
    /// next time `trigger(key, _)` is called. Scoped cleanup is left to
    /// the caller dropping the returned future.
    pub fn listen(&self, key: K) -> oneshot::Receiver<T> {
        let (tx, rx) = oneshot::channel();
        self.state
            .lock()
            .unwrap()
            .listeners
            .entry(key)
            .or_default()
            .push(tx);
        rx
    }

    /// Complete every listener currently registered for `key` with
    /// `value`. Listeners are one-shot, so this effectively clears the
    /// key's entry as a side effect of consuming each sender.
    pub fn trigger(&self, key: &K, value: T) {
        let mut state = self.state.lock().unwrap();
        if let Some(waiters) = state.listeners.remove(key) {
            for waiter in waiters {
                let _ = waiter.send(value.clone());
            }
        }
    }
}

impl<K: Eq + Hash + Clone, T: Clone> Default for KeyedEvent<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trigger_wakes_registered_listener() {
        let event: KeyedEvent<String, u32> = KeyedEvent::new();
        let rx = event.listen("peripheral-a".to_string());
        event.trigger(&"peripheral-a".to_string(), 99);
        assert_eq!(rx.await.unwrap(), 99);
    }

    #[tokio::test]
    async fn trigger_for_unknown_key_is_noop() {
        let event: KeyedEvent<String, u32> = KeyedEvent::new();
        event.trigger(&"nothing-registered".to_string(), 1);
    }

    #[tokio::test]
    async fn multiple_listeners_for_same_key_all_complete() {
        let event: KeyedEvent<String, u32> = KeyedEvent::new();
        let rx1 = event.listen("k".to_string());
        let rx2 = event.listen("k".to_string());
        event.trigger(&"k".to_string(), 5);
        assert_eq!(rx1.await.unwrap(), 5);
        assert_eq!(rx2.await.unwrap(), 5);
    }
}
