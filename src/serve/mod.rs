//! Serving subsystem: topology selection, fallback and orchestration.
//!
//! # Data Flow
//! ```text
//! ServerConfig.protocol
//!     → topology.rs (pick exactly one topology)
//!     → orchestrator.rs
//!         ├─ one task per listener (net::ListenerAdapter)
//!         ├─ one fallback task (fallback.rs) → plain HTTP
//!         └─ control loop: ready → serving → shutdown
//!     → state.rs (live transports, read for open-URL)
//! ```
//!
//! # Design Decisions
//! - Workers never return errors to the caller directly; they report a
//!   `ListenerOutcome` and the control loop decides
//! - The fallback fires at most once per invocation
//! - Every exit path runs the shutdown hooks

pub mod fallback;
pub mod open_url;
pub mod orchestrator;
pub mod state;
pub mod topology;

use thiserror::Error;

use crate::config::validation::ValidationError;
use crate::lifecycle::Interrupt;
use crate::net::{ListenerError, Protocol};

pub use fallback::{FallbackReason, FallbackTrigger};
pub use open_url::{served_url, SystemBrowser, UrlOpener};
pub use orchestrator::{ListenerOutcome, Orchestrator, READY_DELAY};
pub use state::{ServingState, Slot};
pub use topology::{FailurePolicy, Topology};

/// Why serving ended abnormally. Every variant is fatal.
#[derive(Debug, Error)]
pub enum ServeError {
    /// A listener without a fallback failed.
    #[error("{protocol} listener on {address} failed: {source}")]
    Listener {
        protocol: Protocol,
        address: String,
        #[source]
        source: ListenerError,
    },

    /// The process was interrupted by the OS.
    #[error("interrupted by {0}")]
    Interrupted(Interrupt),

    /// The configuration cannot lead to a working server.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The configuration failed validation before anything started.
    #[error("invalid configuration: {}", display_all(.0))]
    InvalidConfig(Vec<ValidationError>),
}

fn display_all(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}
