//! One-shot shutdown broadcast
//!
//! Every long-lived activity in the stack suspends only on queue
//! operations and timers, and each of those suspensions is raced
//! against one of these signals so cancellation is prompt. Once
//! triggered, a signal stays triggered.

use std::sync::Arc;
use tokio::sync::watch;

/// A clonable one-shot broadcast: trigger once, observe from anywhere.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// Create an untriggered signal.
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Shutdown { tx: Arc::new(tx), rx }
    }

    /// Trigger the signal. Triggering more than once is harmless.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Whether the signal has been triggered.
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until the signal is triggered. Returns immediately if it
    /// already has been.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Shutdown::new()
    }
}
