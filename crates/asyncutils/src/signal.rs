use crate::error::{ErrorKind, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct Gate {
    set: AtomicBool,
    notify: Notify,
}

/// A resettable completion gate.
///
/// One call to [`set`](Self::set) releases every task currently waiting, and
/// every task that waits afterwards, until [`reset`](Self::reset) re-arms it.
/// Resetting swaps in a brand-new gate rather than clearing the old one, so
/// waiters that were already released by the previous `set()` are never
/// pulled back into a waiting state.
#[derive(Debug, Default)]
pub struct AsyncSignal {
    gate: Mutex<Arc<Gate>>,
}

impl AsyncSignal {
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&self) -> Arc<Gate> {
        // The lock only ever guards a pointer swap, a poisoned guard still
        // holds a valid gate.
        self.gate.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Opens the gate, waking all waiters.
    pub fn set(&self) {
        let gate = self.current();
        gate.set.store(true, Ordering::Release);
        gate.notify.notify_waiters();
    }

    pub fn is_set(&self) -> bool {
        self.current().set.load(Ordering::Acquire)
    }

    /// Re-arms the gate. No-op if the gate is not currently set.
    pub fn reset(&self) {
        let mut gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        if gate.set.load(Ordering::Acquire) {
            *gate = Arc::new(Gate::default());
        }
    }

    /// Waits for the gate to be set.
    ///
    /// Returns `Ok(true)` if the gate was (or became) set, and `Ok(false)` if
    /// the `timeout` expired first. A `None` timeout waits indefinitely.
    ///
    /// # Errors
    /// [`ErrorKind::Cancelled`] if `cancel` fires before the gate is set.
    pub async fn wait(&self, timeout: Option<Duration>, cancel: &CancellationToken) -> Result<bool> {
        let gate = self.current();
        let notified = gate.notify.notified();
        tokio::pin!(notified);
        // Register interest before checking the flag, otherwise a `set()`
        // landing between the check and the first poll is missed.
        notified.as_mut().enable();
        if gate.set.load(Ordering::Acquire) {
            return Ok(true);
        }
        let expiry = async {
            match timeout {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => exn::bail!(ErrorKind::Cancelled),
            _ = &mut notified => Ok(true),
            _ = expiry => Ok(gate.set.load(Ordering::Acquire)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ops::Deref;

    const SHORT: Duration = Duration::from_millis(20);

    #[tokio::test]
    async fn test_wait_returns_immediately_when_set() {
        let signal = AsyncSignal::new();
        signal.set();
        let cancel = CancellationToken::new();
        assert!(signal.wait(Some(SHORT), &cancel).await.unwrap());
    }

    #[tokio::test]
    async fn test_wait_times_out_when_unset() {
        let signal = AsyncSignal::new();
        let cancel = CancellationToken::new();
        assert!(!signal.wait(Some(SHORT), &cancel).await.unwrap());
    }

    #[tokio::test]
    async fn test_cancellation_is_not_a_timeout() {
        let signal = AsyncSignal::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = signal.wait(Some(Duration::from_secs(5)), &cancel).await.unwrap_err();
        assert_eq!(*err.deref(), ErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn test_reset_rearms_only_when_set() {
        let signal = AsyncSignal::new();
        let cancel = CancellationToken::new();
        signal.reset();
        assert!(!signal.is_set());
        signal.set();
        assert!(signal.is_set());
        signal.reset();
        assert!(!signal.is_set());
        assert!(!signal.wait(Some(SHORT), &cancel).await.unwrap());
    }

    #[tokio::test]
    async fn test_set_releases_every_waiter() {
        let signal = Arc::new(AsyncSignal::new());
        let cancel = CancellationToken::new();
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let signal = signal.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move { signal.wait(Some(Duration::from_secs(5)), &cancel).await })
            })
            .collect();
        // Let every waiter register before opening the gate.
        tokio::task::yield_now().await;
        signal.set();
        for waiter in waiters {
            assert!(waiter.await.unwrap().unwrap());
        }
    }

    #[tokio::test]
    async fn test_reset_after_release_does_not_block_released_waiter() {
        let signal = Arc::new(AsyncSignal::new());
        let cancel = CancellationToken::new();
        let waiter = {
            let signal = signal.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { signal.wait(None, &cancel).await })
        };
        tokio::task::yield_now().await;
        signal.set();
        signal.reset();
        assert!(waiter.await.unwrap().unwrap());
    }
}
