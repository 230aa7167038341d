//! Transfer control for cancellation: shared cancel tokens and a registry.
//!
//! The driver checks its token at every chunk boundary, on every body read and
//! while sleeping between attempts or for the rate limit. A cancelled transfer
//! stops in an orderly way and leaves its partial file resumable.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// Granularity of interruptible sleeps.
const SLEEP_SLICE: Duration = Duration::from_millis(25);

/// Cloneable cancellation flag shared between a transfer and its controller.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Sleep for `duration` in short slices. Returns false if the token was
    /// cancelled before the full duration elapsed.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}

/// Shared registry of transfer id -> cancel token, for hosts that run several
/// transfers at once and cancel them individually.
#[derive(Default)]
pub struct TransferControl {
    transfers: RwLock<HashMap<u64, CancelToken>>,
}

impl TransferControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transfer; returns the token to pass to the driver.
    pub fn register(&self, id: u64) -> CancelToken {
        let token = CancelToken::new();
        self.transfers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, token.clone());
        token
    }

    /// Unregister a transfer (call when it finishes, success or failure).
    pub fn unregister(&self, id: u64) {
        self.transfers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
    }

    /// Request cancellation. Returns false if no such transfer is registered.
    pub fn cancel(&self, id: u64) -> bool {
        match self
            .transfers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
        {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.transfers.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn sleep_completes_when_not_cancelled() {
        let token = CancelToken::new();
        let start = Instant::now();
        assert!(token.sleep(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn sleep_returns_early_on_cancel() {
        let token = CancelToken::new();
        let remote = token.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });
        let start = Instant::now();
        assert!(!token.sleep(Duration::from_secs(5)));
        assert!(start.elapsed() < Duration::from_secs(2));
        handle.join().unwrap();
    }

    #[test]
    fn registry_cancels_only_the_named_transfer() {
        let control = TransferControl::new();
        let a = control.register(1);
        let b = control.register(2);
        assert_eq!(control.len(), 2);
        assert!(control.cancel(2));
        assert!(!a.is_cancelled());
        assert!(b.is_cancelled());
        control.unregister(2);
        assert!(!control.cancel(2));
        control.unregister(1);
        assert!(control.is_empty());
    }
}
