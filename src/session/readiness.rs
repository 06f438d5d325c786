//! Readiness gates (§3, §4.E): a session is usable once its TX/RX
//! characteristics are discovered and notifications are enabled on RX.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::sync::Fuse;

/// Tracks the three readiness gates and fires a one-shot latch once all
/// three flip true.
pub struct Readiness {
    tx_char: AtomicBool,
    rx_char: AtomicBool,
    notify_enabled: AtomicBool,
    ready: Fuse<()>,
}

impl Readiness {
    pub fn new() -> Self {
        Self {
            tx_char: AtomicBool::new(false),
            rx_char: AtomicBool::new(false),
            notify_enabled: AtomicBool::new(false),
            ready: Fuse::new(),
        }
    }

    pub fn mark_tx_characteristic_found(&self) {
        self.tx_char.store(true, Ordering::SeqCst);
        self.check();
    }

    pub fn mark_rx_characteristic_found(&self) {
        self.rx_char.store(true, Ordering::SeqCst);
        self.check();
    }

    pub fn mark_notify_enabled(&self) {
        self.notify_enabled.store(true, Ordering::SeqCst);
        self.check();
    }

    fn check(&self) {
        if self.tx_char.load(Ordering::SeqCst)
            && self.rx_char.load(Ordering::SeqCst)
            && self.notify_enabled.load(Ordering::SeqCst)
        {
            self.ready.trigger(());
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.is_triggered()
    }

    pub async fn wait(&self) {
        self.ready.wait().await;
    }
}

impl Default for Readiness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ready_only_after_all_three_gates() {
        let readiness = Readiness::new();
        assert!(!readiness.is_ready());
        readiness.mark_tx_characteristic_found();
        assert!(!readiness.is_ready());
        readiness.mark_rx_characteristic_found();
        assert!(!readiness.is_ready());
        readiness.mark_notify_enabled();
        assert!(readiness.is_ready());
        readiness.wait().await;
    }
}
