//! Cancellation of running programs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Cancels every execution holding one of its watchers.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    /// Create a token and its first watcher.
    pub fn new() -> (Self, CancellationWatcher) {
        let (tx, rx) = watch::channel(false);
        let cancelled = Arc::new(AtomicBool::new(false));

        let token = Self {
            cancelled: cancelled.clone(),
            notify: Arc::new(tx),
        };

        let watcher = CancellationWatcher {
            cancelled,
            notify: rx,
        };

        (token, watcher)
    }

    /// Create another watcher bound to this token.
    pub fn watcher(&self) -> CancellationWatcher {
        CancellationWatcher {
            cancelled: self.cancelled.clone(),
            notify: self.notify.subscribe(),
        }
    }

    /// Cancel all executions.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.send_replace(true);
    }

    /// Check if cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Observes a [`CancellationToken`].
#[derive(Debug, Clone)]
pub struct CancellationWatcher {
    cancelled: Arc<AtomicBool>,
    notify: watch::Receiver<bool>,
}

impl CancellationWatcher {
    /// A watcher that is never cancelled.
    pub fn never() -> Self {
        CancellationToken::new().1
    }

    /// Check if cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Wait for cancellation.
    ///
    /// Pends forever once every token is dropped without cancelling.
    pub async fn cancelled(&mut self) {
        loop {
            if self.is_cancelled() || *self.notify.borrow() {
                return;
            }
            if self.notify.changed().await.is_err() {
                if self.is_cancelled() {
                    return;
                }
                std::future::pending::<()>().await;
            }
        }
    }
}
