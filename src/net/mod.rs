//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ListenerSpec (address, protocol, TLS paths)
//!     → listener.rs (ListenerAdapter: registers graceful stop)
//!     → deadline.rs (response write deadline, streamed bodies included)
//!     → bind: addr.rs (resolve) + tls.rs (load PEM material)
//!     → serve:
//!         TCP  → axum-server (HTTP/1.1, h2c, HTTPS + HTTP/2)
//!         UDP  → quic.rs (HTTP/3 over QUIC)
//! ```
//!
//! # Design Decisions
//! - One adapter per address; adapters never share a socket
//! - Binding is separate from serving so callers can observe a successful bind
//! - Read/write timeouts and header limits are fixed, not configurable

pub mod addr;
pub mod deadline;
pub mod listener;
mod quic;
pub mod tls;

pub use listener::{BoundListener, ListenerAdapter, ListenerError, ListenerSpec, Protocol};
