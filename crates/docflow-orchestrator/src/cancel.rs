//! Caller-driven cancellation of a whole flow.
//!
//! The orchestrator polls the signal at join points only (before each tier
//! and each wave). Checks already launched run to completion or deadline.

use tokio::sync::watch;

/// Sending side, kept by the caller.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Receiving side, handed to the orchestrator.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

/// Create a connected handle/signal pair.
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

impl CancelHandle {
    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Another signal connected to this handle.
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl CancelSignal {
    /// A signal that is never raised.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_visible_to_all_signals() {
        let (handle, signal) = cancel_pair();
        let other = handle.signal();
        let cloned = signal.clone();

        assert!(!signal.is_cancelled());
        handle.cancel();
        handle.cancel();
        assert!(signal.is_cancelled());
        assert!(other.is_cancelled());
        assert!(cloned.is_cancelled());
    }

    #[test]
    fn test_never_stays_clear() {
        let signal = CancelSignal::never();
        assert!(!signal.is_cancelled());
    }

    #[test]
    fn test_signal_survives_dropped_handle() {
        let (handle, signal) = cancel_pair();
        handle.cancel();
        drop(handle);
        assert!(signal.is_cancelled());
    }
}
