// src/job/signal.rs

//! One-shot, multi-waiter completion signal.

use std::time::Duration;

use tokio::sync::watch;

/// Broadcast-once flag backed by a `watch` channel.
///
/// Any number of tasks may wait on it concurrently, before or after it fires.
/// Waiters that subscribe after the signal fired return immediately.
#[derive(Debug)]
pub struct CompletionSignal {
    tx: watch::Sender<bool>,
}

impl CompletionSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Fire the signal. Returns `true` only for the call that actually fired it.
    pub fn fire(&self) -> bool {
        let mut fired_now = false;
        self.tx.send_if_modified(|done| {
            if *done {
                false
            } else {
                *done = true;
                fired_now = true;
                true
            }
        });
        fired_now
    }

    pub fn is_fired(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until the signal fires.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so this only returns once fired.
        let _ = rx.wait_for(|done| *done).await;
    }

    /// Wait until the signal fires or `timeout` elapses.
    ///
    /// Returns `true` if the signal fired in time. `None` waits forever.
    pub async fn wait_timeout(&self, timeout: Option<Duration>) -> bool {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, self.wait()).await.is_ok(),
            None => {
                self.wait().await;
                true
            }
        }
    }
}

impl Default for CompletionSignal {
    fn default() -> Self {
        Self::new()
    }
}
