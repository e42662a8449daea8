//! Listener adapter: one transport on one address.
//!
//! # Responsibilities
//! - Bind the address (TCP, or UDP for QUIC)
//! - Load TLS material for the secure transports
//! - Serve the handler with fixed read/write timeouts and header limits
//! - Register a graceful stop with the shutdown hooks on construction

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use hyper_util::server::conn::auto::Builder;
use thiserror::Error;
use tokio::sync::watch;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::TlsConfig;
use crate::lifecycle::ShutdownHooks;
use crate::net::{addr, deadline, quic, tls};

/// Maximum time to receive request headers.
pub const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum time to write a response, measured from the arrival of the
/// request. A streamed body is cut off once it elapses.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum size of the request headers.
pub const MAX_HEADER_BYTES: usize = 1 << 20;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Certificate or key file does not exist.
    #[error("TLS material not found: {}", .0.display())]
    TlsMaterialMissing(PathBuf),

    /// Certificate or key could not be used.
    #[error("invalid TLS material: {0}")]
    TlsMaterialInvalid(String),

    /// The accept loop failed after a successful bind.
    #[error("serve error: {0}")]
    Serve(#[source] std::io::Error),

    /// HTTP/3 connection-level failure.
    #[error("QUIC error: {0}")]
    Quic(String),
}

/// Transport served by one listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// HTTP/1.1 without TLS.
    Http,
    /// HTTP/2 without TLS (h2c). HTTP/1.1 is still answered.
    Http2Cleartext,
    /// HTTPS with HTTP/2 and HTTP/1.1 negotiated over ALPN.
    Https,
    /// HTTP/3 over QUIC (UDP).
    Http3,
}

impl Protocol {
    /// URL scheme clients use for this transport.
    pub fn scheme(self) -> &'static str {
        match self {
            Protocol::Http | Protocol::Http2Cleartext => "http",
            Protocol::Https | Protocol::Http3 => "https",
        }
    }

    /// Whether the transport needs a certificate and key.
    pub fn needs_tls(self) -> bool {
        matches!(self, Protocol::Https | Protocol::Http3)
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Protocol::Http => "HTTP",
            Protocol::Http2Cleartext => "HTTP/2 (cleartext)",
            Protocol::Https => "HTTP/2",
            Protocol::Http3 => "QUIC",
        };
        f.write_str(name)
    }
}

/// What to start: an address, a transport, and TLS material if needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerSpec {
    pub address: String,
    pub protocol: Protocol,
    pub tls: Option<TlsConfig>,
}

impl ListenerSpec {
    pub fn new(address: impl Into<String>, protocol: Protocol) -> Self {
        Self {
            address: address.into(),
            protocol,
            tls: None,
        }
    }

    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    /// The URL this listener is reachable at.
    pub fn url(&self) -> String {
        format!("{}://{}/", self.protocol.scheme(), addr::display_authority(&self.address))
    }
}

/// A single transport bound to a single address.
///
/// Constructing an adapter registers its graceful stop with the shutdown
/// hooks, so a later shutdown pass stops it even if it is still binding.
pub struct ListenerAdapter {
    spec: ListenerSpec,
    handler: Router,
    shutdown_timeout: Duration,
    handle: Handle,
    stop: watch::Receiver<bool>,
}

impl ListenerAdapter {
    /// Create an adapter and register its shutdown action.
    pub fn new(spec: ListenerSpec, handler: Router, hooks: &ShutdownHooks, shutdown_timeout: Duration) -> Self {
        let handle = Handle::new();
        let (stop_tx, stop) = watch::channel(false);

        let stop_handle = handle.clone();
        let address = spec.address.clone();
        hooks.register(move || {
            tracing::debug!(address = %address, "Stopping listener");
            stop_handle.graceful_shutdown(Some(shutdown_timeout));
            let _ = stop_tx.send(true);
        });

        Self {
            spec,
            handler,
            shutdown_timeout,
            handle,
            stop,
        }
    }

    /// Bind the address and load TLS material, without serving yet.
    pub async fn bind(self) -> Result<BoundListener, ListenerError> {
        let address = self.spec.address.clone();
        let bind_err = |source: std::io::Error| ListenerError::Bind {
            address: address.clone(),
            source,
        };
        let socket_addr = addr::resolve_bind_addr(&self.spec.address).map_err(bind_err)?;

        let (cert, key) = match &self.spec.tls {
            Some(tls) => (PathBuf::from(&tls.cert_path), PathBuf::from(&tls.key_path)),
            None if self.spec.protocol.needs_tls() => {
                return Err(ListenerError::TlsMaterialMissing(PathBuf::new()));
            }
            None => (PathBuf::new(), PathBuf::new()),
        };

        let transport = match self.spec.protocol {
            Protocol::Http | Protocol::Http2Cleartext => Transport::Tcp(bind_tcp(socket_addr).map_err(bind_err)?),
            Protocol::Https => {
                let config = tls::load_tls_config(&cert, &key).await?;
                Transport::Tls(bind_tcp(socket_addr).map_err(bind_err)?, config)
            }
            Protocol::Http3 => {
                let config = tls::load_quic_config(&cert, &key)?;
                Transport::Quic(quinn::Endpoint::server(config, socket_addr).map_err(bind_err)?)
            }
        };

        let local_addr = match &transport {
            Transport::Tcp(l) | Transport::Tls(l, _) => l.local_addr(),
            Transport::Quic(endpoint) => endpoint.local_addr(),
        }
        .map_err(bind_err)?;

        tracing::debug!(
            address = %local_addr,
            protocol = %self.spec.protocol,
            "Listener bound"
        );

        Ok(BoundListener {
            spec: self.spec,
            local_addr,
            transport,
            handler: self.handler,
            shutdown_timeout: self.shutdown_timeout,
            handle: self.handle,
            stop: self.stop,
        })
    }

    /// Bind and serve until the listener is stopped or fails.
    pub async fn listen_and_serve(self) -> Result<(), ListenerError> {
        self.bind().await?.serve().await
    }
}

enum Transport {
    Tcp(std::net::TcpListener),
    Tls(std::net::TcpListener, RustlsConfig),
    Quic(quinn::Endpoint),
}

/// A listener whose address is bound and ready to accept.
pub struct BoundListener {
    spec: ListenerSpec,
    local_addr: SocketAddr,
    transport: Transport,
    handler: Router,
    shutdown_timeout: Duration,
    handle: Handle,
    stop: watch::Receiver<bool>,
}

impl BoundListener {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until the graceful stop completes. Returns `Ok(())` after a
    /// requested stop and an error if the accept loop fails.
    pub async fn serve(self) -> Result<(), ListenerError> {
        let app = with_timeouts(self.handler);

        match self.transport {
            Transport::Tcp(listener) => {
                let mut server = axum_server::from_tcp(listener).handle(self.handle);
                configure_http(server.http_builder());
                server
                    .serve(app.into_make_service())
                    .await
                    .map_err(ListenerError::Serve)?;
            }
            Transport::Tls(listener, config) => {
                let mut server = axum_server::from_tcp_rustls(listener, config).handle(self.handle);
                configure_http(server.http_builder());
                server
                    .serve(app.into_make_service())
                    .await
                    .map_err(ListenerError::Serve)?;
            }
            Transport::Quic(endpoint) => {
                quic::serve(endpoint, app, self.stop, self.shutdown_timeout).await?;
            }
        }

        tracing::debug!(address = %self.local_addr, protocol = %self.spec.protocol, "Listener stopped");
        Ok(())
    }
}

fn bind_tcp(addr: SocketAddr) -> std::io::Result<std::net::TcpListener> {
    let listener = std::net::TcpListener::bind(addr)?;
    listener.set_nonblocking(true)?;
    Ok(listener)
}

/// Wrap the handler with the response deadline and request tracing.
#[allow(deprecated)]
fn with_timeouts(handler: Router) -> Router {
    handler
        .layer(TimeoutLayer::new(WRITE_TIMEOUT))
        .layer(axum::middleware::from_fn(deadline::write_deadline))
        .layer(TraceLayer::new_for_http())
}

fn configure_http(builder: &mut Builder<TokioExecutor>) {
    builder
        .http1()
        .timer(TokioTimer::new())
        .header_read_timeout(READ_TIMEOUT)
        .max_buf_size(MAX_HEADER_BYTES);
    builder.http2().max_header_list_size(MAX_HEADER_BYTES as u32);
}
