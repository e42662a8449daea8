//! Single-use fallback to plain HTTP.
//!
//! The trigger side may be fired from any number of places; only the first
//! fire is delivered. The receiving side is consumed by the fallback worker.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;

use crate::net::Protocol;

/// Why plain HTTP is being started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// Plain HTTP was requested directly.
    Requested,
    /// A preferred transport could not be started.
    Failed { protocol: Protocol, error: String },
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackReason::Requested => write!(f, "plain HTTP requested"),
            FallbackReason::Failed { protocol, error } => write!(f, "{protocol} failed: {error}"),
        }
    }
}

/// Create a connected trigger/receiver pair.
pub fn channel() -> (FallbackTrigger, FallbackReceiver) {
    let (tx, rx) = oneshot::channel();
    (
        FallbackTrigger {
            tx: Arc::new(Mutex::new(Some(tx))),
        },
        FallbackReceiver { rx },
    )
}

/// Fires the fallback at most once.
#[derive(Debug, Clone)]
pub struct FallbackTrigger {
    tx: Arc<Mutex<Option<oneshot::Sender<FallbackReason>>>>,
}

impl FallbackTrigger {
    /// Fire the fallback. Returns `false` if it had already been fired.
    pub fn fire(&self, reason: FallbackReason) -> bool {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
        match tx {
            Some(tx) => {
                // The receiver may already be gone during shutdown.
                let _ = tx.send(reason);
                true
            }
            None => false,
        }
    }

    pub fn is_fired(&self) -> bool {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).is_none()
    }
}

/// Receiving end, owned by the fallback worker.
#[derive(Debug)]
pub struct FallbackReceiver {
    rx: oneshot::Receiver<FallbackReason>,
}

impl FallbackReceiver {
    /// Wait for the fallback. `None` once every trigger is dropped unfired.
    pub async fn wait(self) -> Option<FallbackReason> {
        self.rx.await.ok()
    }
}
