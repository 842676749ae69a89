//! Seed signal
//!
//! A one-shot event raised when the last missing piece arrives. Workers that
//! only upload wait on it instead of polling the bitfield.

use std::future::Future;
use tokio::sync::watch;
use tracing::info;

/// Outcome of a cancellable wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedWait {
    /// The client is ready to seed
    Ready,
    /// The cancellation future finished first
    Cancelled,
}

/// One-shot "ready to seed" flag. Once set it never resets.
#[derive(Debug)]
pub struct SeedSignal {
    tx: watch::Sender<bool>,
}

impl SeedSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Set the flag and wake every waiter.
    ///
    /// Returns `true` only for the call that actually flipped it.
    pub fn fire(&self) -> bool {
        let fired = self.tx.send_if_modified(|ready| {
            if *ready {
                false
            } else {
                *ready = true;
                true
            }
        });
        if fired {
            info!("All pieces present, ready to seed");
        }
        fired
    }

    pub fn is_set(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until the flag is set; returns immediately if it already is
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so the channel cannot close here.
        let _ = rx.wait_for(|ready| *ready).await;
    }

    /// Wait until the flag is set or `cancel` completes, whichever is first
    pub async fn wait_or_cancel<F>(&self, cancel: F) -> SeedWait
    where
        F: Future,
    {
        tokio::select! {
            _ = self.wait() => SeedWait::Ready,
            _ = cancel => SeedWait::Cancelled,
        }
    }
}

impl Default for SeedSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_fires_exactly_once() {
        let signal = SeedSignal::new();
        assert!(!signal.is_set());
        assert!(signal.fire());
        assert!(!signal.fire());
        assert!(signal.is_set());
    }

    #[tokio::test]
    async fn test_wait_after_fire_returns() {
        let signal = SeedSignal::new();
        signal.fire();
        tokio::time::timeout(Duration::from_secs(1), signal.wait()).await.unwrap();
    }

    #[tokio::test]
    async fn test_waiters_wake_on_fire() {
        let signal = Arc::new(SeedSignal::new());
        let mut waiters = Vec::new();
        for _ in 0..3 {
            let signal = signal.clone();
            waiters.push(tokio::spawn(async move { signal.wait().await }));
        }

        tokio::task::yield_now().await;
        signal.fire();
        for waiter in waiters {
            tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn test_wait_is_cancellable() {
        let signal = SeedSignal::new();
        let outcome = signal.wait_or_cancel(tokio::time::sleep(Duration::from_millis(20))).await;
        assert_eq!(outcome, SeedWait::Cancelled);
        assert!(!signal.is_set());
    }

    #[tokio::test]
    async fn test_wait_or_cancel_ready() {
        let signal = SeedSignal::new();
        signal.fire();
        let outcome = signal.wait_or_cancel(std::future::pending::<()>()).await;
        assert_eq!(outcome, SeedWait::Ready);
    }
}
