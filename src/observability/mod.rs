//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Orchestrator, listeners, shutdown hooks produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (listener counters, serving gauges)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```

pub mod logging;
pub mod metrics;
