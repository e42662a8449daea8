//! portico: serve one handler over HTTP, HTTPS + HTTP/2, h2c or HTTP/3,
//! falling back to plain HTTP when the preferred transport cannot start.
//!
//! # Architecture Overview
//!
//! ```text
//!   CLI flags ──┐
//!   TOML file ──┴─▶ ServerConfig ──▶ Orchestrator::serve(handler, ready, done)
//!                                         │
//!                     ┌───────────────────┼────────────────────┐
//!                     ▼                   ▼                    ▼
//!              preferred listener   fallback worker      control loop
//!              (HTTPS/h2c/QUIC)     (plain HTTP)         ready → serving
//!                     │                   ▲                    │
//!                     └── failure ────────┘                    ▼
//!                                                     ShutdownHooks::run_all
//!   stdin "exit" ──▶ done                            (done, signal, fatal)
//! ```

use std::path::PathBuf;

use axum::http::Version;
use axum::routing::get;
use axum::Router;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::oneshot;

use portico::config::loader::load_config;
use portico::lifecycle::shutdown::FATAL_EXIT_CODE;
use portico::lifecycle::{fatal_exit, ShutdownHooks};
use portico::observability::{logging, metrics};
use portico::{Orchestrator, ServerConfig};

#[derive(Parser)]
#[command(name = "portico")]
#[command(about = "Serve a handler over HTTP, HTTP/2 or HTTP/3 with automatic fallback", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. ":3000" or "127.0.0.1:3000"
    #[arg(short, long)]
    addr: Option<String>,

    /// Public host name (production mode, opened URL)
    #[arg(long)]
    host: Option<String>,

    /// TLS certificate (PEM)
    #[arg(long)]
    cert: Option<String>,

    /// TLS private key (PEM)
    #[arg(long)]
    key: Option<String>,

    /// Serve plain HTTP only
    #[arg(short = 't', long)]
    plain_http: bool,

    /// Serve HTTP/2 without TLS (not recommended)
    #[arg(long)]
    http2_without_tls: bool,

    /// Serve HTTP/3 over QUIC (experimental)
    #[arg(short = 'u', long)]
    quic: bool,

    /// Serve HTTPS on port 443 and HTTP on port 80 of the host
    #[arg(long)]
    prod: bool,

    /// Start no listener
    #[arg(long)]
    serve_nothing: bool,

    /// Graceful shutdown timeout in seconds
    #[arg(long)]
    shutdown_timeout: Option<u64>,

    /// Open the served URL once serving
    #[arg(short, long)]
    open: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Overlay command-line flags on top of the file configuration.
    fn apply(&self, config: &mut ServerConfig) {
        if let Some(addr) = &self.addr {
            config.listener.bind_address = addr.clone();
        }
        if let Some(host) = &self.host {
            config.listener.host = host.clone();
        }
        if let Some(cert) = &self.cert {
            config.listener.tls.cert_path = cert.clone();
        }
        if let Some(key) = &self.key {
            config.listener.tls.key_path = key.clone();
        }
        if let Some(secs) = self.shutdown_timeout {
            config.timeouts.shutdown_secs = secs;
        }

        let protocol = &mut config.protocol;
        protocol.plain_http_only |= self.plain_http;
        protocol.http2_without_tls |= self.http2_without_tls;
        protocol.experimental_quic |= self.quic;
        protocol.production_mode |= self.prod;
        protocol.serve_nothing |= self.serve_nothing;

        config.open_url_after_serving |= self.open;
        config.observability.verbose |= self.verbose;
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("portico: {}: {}", path.display(), e);
                std::process::exit(FATAL_EXIT_CODE);
            }
        },
        None => ServerConfig::default(),
    };
    cli.apply(&mut config);

    if let Err(e) = logging::init_logging(&config.observability) {
        eprintln!("portico: failed to initialize logging: {e}");
    }

    tracing::info!("portico v{} starting", env!("CARGO_PKG_VERSION"));

    let hooks = ShutdownHooks::new().with_verbose(config.verbose());

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let orchestrator = Orchestrator::new(config, hooks.clone());

    let (ready_tx, ready_rx) = oneshot::channel();
    let (done_tx, done_rx) = oneshot::channel();

    tokio::spawn(async move {
        if ready_rx.await.is_ok() {
            tracing::info!("Ready. Type \"exit\" to stop.");
        }
    });
    tokio::spawn(read_commands(done_tx));

    match orchestrator.serve(handler(), ready_tx, done_rx).await {
        Ok(()) => tracing::info!("Done serving"),
        Err(e) => fatal_exit(&hooks, &e),
    }
}

/// Wait for an `exit` or `quit` line on stdin.
///
/// On end of input the sender is dropped, which keeps the server running.
async fn read_commands(done: oneshot::Sender<()>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        match line.trim() {
            "exit" | "quit" => {
                let _ = done.send(());
                return;
            }
            "" => {}
            other => tracing::warn!(command = %other, "Unknown command"),
        }
    }
}

fn handler() -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(|| async { "ok" }))
}

async fn index(version: Version) -> String {
    format!("portico {} ({:?})\n", env!("CARGO_PKG_VERSION"), version)
}
