//! Multi-protocol listener orchestrator with coordinated graceful shutdown.

pub mod config;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod serve;

pub use config::schema::ServerConfig;
pub use lifecycle::ShutdownHooks;
pub use serve::{Orchestrator, ServeError};
