use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Stop signal shared between a worker thread and its owner
#[derive(Debug)]
pub struct SignalOfStop {
    // Shared state between clones
    shared: Arc<SharedState>,
}

#[derive(Debug)]
struct SharedState {
    closing: AtomicBool,
    mutex: Mutex<()>,
    condvar: Condvar,
}

impl SignalOfStop {
    pub fn new() -> SignalOfStop {
        SignalOfStop {
            shared: Arc::new(SharedState {
                closing: AtomicBool::new(false),
                mutex: Mutex::new(()),
                condvar: Condvar::new(),
            }),
        }
    }

    pub fn cancel(&self) {
        self.shared.closing.store(true, Ordering::Release);

        // Lock briefly so a waiter cannot miss the notification between its check and its wait
        let _guard = self
            .shared
            .mutex
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.shared.condvar.notify_all();
    }

    pub fn cancelled(&self) -> bool {
        self.shared.closing.load(Ordering::Acquire)
    }

    /// Sleep for at most `timeout`, waking early on cancellation.
    ///
    /// Returns whether the signal is cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = self
            .shared
            .mutex
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let _ = self
            .shared
            .condvar
            .wait_timeout_while(guard, timeout, |_| !self.cancelled())
            .unwrap_or_else(PoisonError::into_inner);

        self.cancelled()
    }
}

impl Default for SignalOfStop {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SignalOfStop {
    fn clone(&self) -> SignalOfStop {
        SignalOfStop {
            shared: Arc::clone(&self.shared),
        }
    }
}
