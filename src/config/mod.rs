//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)            CLI flags (main.rs)
//!     → loader.rs (parse)           │
//!     → validation.rs ◀─────────────┘
//!     → ServerConfig (validated, immutable)
//!     → shared via Arc with the orchestrator and its listeners
//! ```
//!
//! # Design Decisions
//! - Config is immutable once the orchestrator starts
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::ListenerConfig;
pub use schema::ObservabilityConfig;
pub use schema::ProtocolConfig;
pub use schema::ServerConfig;
pub use schema::TimeoutConfig;
pub use schema::TlsConfig;
