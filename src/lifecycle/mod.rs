//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (hooks.rs):
//!     Listener adapters, collaborators → ShutdownHooks::register
//!
//! Shutdown (hooks.rs, shutdown.rs):
//!     done / SIGINT / SIGTERM / fatal listener error
//!         → ShutdownHooks::run_all (once, FIFO)
//!         → fatal paths: process exit with non-zero status
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Interrupt (always fatal)
//! ```
//!
//! # Design Decisions
//! - The hook registry is an explicit object, injected rather than global
//! - Every trigger funnels into the same run-once pass
//! - Graceful stops are bounded by the configured shutdown timeout

pub mod hooks;
pub mod shutdown;
pub mod signals;

pub use hooks::ShutdownHooks;
pub use shutdown::fatal_exit;
pub use signals::{wait_for_interrupt, Interrupt};
