//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the listener orchestrator.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address, host, TLS material).
    pub listener: ListenerConfig,

    /// Protocol selection flags.
    pub protocol: ProtocolConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Open the served URL once a transport is confirmed live.
    pub open_url_after_serving: bool,
}

impl ServerConfig {
    /// How long a graceful listener stop waits for in-flight requests.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.shutdown_secs)
    }

    /// Whether informational lifecycle messages should be logged at info level.
    pub fn verbose(&self) -> bool {
        self.observability.verbose
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:3000" or ":3000" for all interfaces).
    pub bind_address: String,

    /// Public host name, used by production mode and when opening the URL.
    pub host: String,

    /// TLS certificate and key paths.
    pub tls: TlsConfig,

    /// Port for the HTTPS listener in production mode.
    pub production_https_port: u16,

    /// Port for the plain HTTP listener in production mode.
    pub production_http_port: u16,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: ":3000".to_string(),
            host: String::new(),
            tls: TlsConfig::default(),
            production_https_port: 443,
            production_http_port: 80,
        }
    }
}

/// TLS material for the secure transports.
///
/// The files are opaque to the orchestrator; a missing or unreadable pair
/// only disables the secure transport.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            cert_path: "cert.pem".to_string(),
            key_path: "key.pem".to_string(),
        }
    }
}

/// Protocol selection flags. Evaluated in a fixed priority order, see
/// [`Topology::select`](crate::serve::Topology::select).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Serve plain HTTP only.
    pub plain_http_only: bool,

    /// Serve HTTP/2 without TLS (h2c).
    pub http2_without_tls: bool,

    /// Serve HTTP/3 over QUIC, falling back to plain HTTP.
    pub experimental_quic: bool,

    /// Serve HTTPS on the production HTTPS port and HTTP on the production HTTP port.
    pub production_mode: bool,

    /// Start no listener at all; only take part in the ready/done handshake.
    pub serve_nothing: bool,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Graceful shutdown drain timeout in seconds.
    pub shutdown_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { shutdown_secs: 10 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Verbose lifecycle logging.
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error). Overridden by `RUST_LOG`.
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
