//! Cooperative cancellation (spec §5, §8 invariant 10). A deliberately
//! minimal hand-rolled token rather than pulling in `tokio-util`: an
//! `AtomicBool` flag plus a `Notify` so a suspended step wakes up as soon
//! as cancellation is requested instead of polling.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Flags the token cancelled and wakes every task parked in
    /// [`Self::cancelled`]. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Resolves immediately if already cancelled, otherwise waits for the
    /// next [`Self::cancel`] call. Used at suspension points (provider
    /// call, tool call, guardrail check) so a step bails out as soon as
    /// cancellation is requested rather than running to completion.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        let notified = self.notify.notified();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
