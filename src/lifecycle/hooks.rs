//! Shutdown hook registry.
//!
//! Collaborators register zero-argument teardown actions while the server is
//! running. A single shutdown pass runs them all, in registration order,
//! exactly once, no matter how many triggers race to start it.

use std::io::Write;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Hook = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct Hooks {
    pending: Vec<Hook>,
    completed: bool,
}

#[derive(Default)]
struct Inner {
    /// Registered hooks and the completed flag.
    hooks: Mutex<Hooks>,
    /// Serializes shutdown passes so a second trigger waits for the first.
    run: Mutex<()>,
}

/// Ordered, run-once registry of shutdown actions.
///
/// Cloning yields another handle to the same registry. The entry point
/// creates one and hands clones to the orchestrator, the listeners and any
/// collaborator that needs cleanup on shutdown.
#[derive(Clone, Default)]
pub struct ShutdownHooks {
    inner: Arc<Inner>,
    verbose: bool,
}

impl ShutdownHooks {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Log the shutdown pass at info level instead of debug.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Append an action to run at shutdown.
    ///
    /// Registering after the shutdown pass has completed drops the action.
    pub fn register<F>(&self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut hooks = self.lock_hooks();
        if hooks.completed {
            tracing::debug!("Shutdown already completed, dropping late hook");
            return;
        }
        hooks.pending.push(Box::new(action));
    }

    /// Run every registered action once, in registration order.
    ///
    /// Returns the number of actions executed. Calls after the first
    /// completed pass are no-ops and return 0; a call racing an in-progress
    /// pass blocks until that pass is done. A panicking action is logged and
    /// does not stop the remaining ones.
    pub fn run_all(&self) -> usize {
        let _running = self.inner.run.lock().unwrap_or_else(PoisonError::into_inner);

        if self.lock_hooks().completed {
            return 0;
        }

        if self.verbose {
            tracing::info!("Initiating shutdown");
        } else {
            tracing::debug!("Initiating shutdown");
        }

        let mut executed = 0;
        loop {
            // Actions may register further actions; drain until nothing is left.
            let batch = {
                let mut hooks = self.lock_hooks();
                if hooks.pending.is_empty() {
                    hooks.completed = true;
                    break;
                }
                std::mem::take(&mut hooks.pending)
            };

            for hook in batch {
                executed += 1;
                if let Err(panic) = catch_unwind(AssertUnwindSafe(hook)) {
                    tracing::error!(
                        hook = executed,
                        panic = %panic_message(panic.as_ref()),
                        "Shutdown hook panicked"
                    );
                }
            }
        }

        if self.verbose {
            tracing::info!(hooks = executed, "Shutdown complete");
        } else {
            tracing::debug!(hooks = executed, "Shutdown complete");
        }

        // One final flush
        let _ = std::io::stdout().flush();
        executed
    }

    /// Whether the shutdown pass has completed.
    pub fn is_completed(&self) -> bool {
        self.lock_hooks().completed
    }

    /// Number of actions waiting for the shutdown pass.
    pub fn pending(&self) -> usize {
        self.lock_hooks().pending.len()
    }

    fn lock_hooks(&self) -> MutexGuard<'_, Hooks> {
        self.inner.hooks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ShutdownHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hooks = self.lock_hooks();
        f.debug_struct("ShutdownHooks")
            .field("pending", &hooks.pending.len())
            .field("completed", &hooks.completed)
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
