//! Protocol orchestrator.
//!
//! # State Machine
//! ```text
//! Idle → Starting (listeners spawned)
//!      → Ready (ready sent after the settling delay)
//!      → Serving (waiting on done / interrupt / fatal outcome)
//!      → ShuttingDown (shutdown hooks run, listeners drained)
//!      → Terminated
//! ```
//!
//! A fatal outcome or an interrupt skips straight to `ShuttingDown` from
//! `Starting` or `Serving` and ends in an error the entry point turns into a
//! non-zero exit.

use std::future::pending;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;

use crate::config::validation::validate_config;
use crate::config::ServerConfig;
use crate::lifecycle::{wait_for_interrupt, Interrupt, ShutdownHooks};
use crate::net::{ListenerAdapter, ListenerError, ListenerSpec, Protocol};
use crate::observability::metrics;
use crate::serve::fallback::{self, FallbackReason, FallbackTrigger};
use crate::serve::open_url::{served_url, SystemBrowser, UrlOpener};
use crate::serve::state::{ServingState, Slot};
use crate::serve::topology::{self, FailurePolicy, Topology};
use crate::serve::ServeError;

/// Delay between starting the listeners and reporting readiness.
pub const READY_DELAY: Duration = Duration::from_millis(20);

/// Extra time allowed, on top of the shutdown timeout, for listener tasks to return.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// What a listener worker reports back to the orchestrator.
#[derive(Debug)]
pub enum ListenerOutcome {
    /// Bound and accepting.
    Started { spec: ListenerSpec, local_addr: SocketAddr },
    /// Stopped after a shutdown request.
    Stopped { spec: ListenerSpec },
    /// Failed; other listeners keep running.
    Degraded { spec: ListenerSpec, error: ListenerError },
    /// Failed; plain HTTP should be started instead.
    FailedWithFallback { spec: ListenerSpec, error: ListenerError },
    /// Failed with no way to recover.
    FailedFatal { spec: ListenerSpec, error: ListenerError },
}

impl ListenerOutcome {
    fn failed(spec: ListenerSpec, error: ListenerError, policy: FailurePolicy) -> Self {
        metrics::record_listener_failed(spec.protocol, policy);
        match policy {
            FailurePolicy::Fallback => ListenerOutcome::FailedWithFallback { spec, error },
            FailurePolicy::Degrade => ListenerOutcome::Degraded { spec, error },
            FailurePolicy::Fatal => ListenerOutcome::FailedFatal { spec, error },
        }
    }
}

/// Everything a listener worker needs.
#[derive(Clone)]
struct WorkerContext {
    handler: Router,
    hooks: ShutdownHooks,
    state: ServingState,
    outcomes: mpsc::UnboundedSender<ListenerOutcome>,
    shutdown_timeout: Duration,
}

/// Decides which listeners to run and drives them through their lifecycle.
pub struct Orchestrator {
    config: Arc<ServerConfig>,
    hooks: ShutdownHooks,
    state: ServingState,
    opener: Arc<dyn UrlOpener>,
    handle_signals: bool,
}

impl Orchestrator {
    /// Create an orchestrator for `config`, registering listener shutdowns with `hooks`.
    pub fn new(config: ServerConfig, hooks: ShutdownHooks) -> Self {
        Self {
            config: Arc::new(config),
            hooks,
            state: ServingState::new(),
            opener: Arc::new(SystemBrowser),
            handle_signals: true,
        }
    }

    /// Replace the side effect used to open the served URL.
    pub fn with_url_opener(mut self, opener: impl UrlOpener + 'static) -> Self {
        self.opener = Arc::new(opener);
        self
    }

    /// Whether SIGINT/SIGTERM are watched while serving. On by default.
    pub fn handle_signals(mut self, enabled: bool) -> Self {
        self.handle_signals = enabled;
        self
    }

    /// A view of the live transports.
    pub fn serving_state(&self) -> ServingState {
        self.state.clone()
    }

    /// Serve `handler` until `done` fires or serving becomes impossible.
    ///
    /// `ready` is sent once, [`READY_DELAY`] after the listeners were
    /// started. A value on `done` runs the shutdown hooks and returns
    /// `Ok(())`; if the sender of `done` is dropped the orchestrator keeps
    /// serving. Fatal listener failures, interrupts and configuration errors
    /// also run the shutdown hooks, then return the error.
    pub async fn serve(
        &self,
        handler: Router,
        ready: oneshot::Sender<()>,
        done: oneshot::Receiver<()>,
    ) -> Result<(), ServeError> {
        validate_config(&self.config).map_err(ServeError::InvalidConfig)?;

        let topology = Topology::select(&self.config.protocol);
        tracing::debug!(topology = ?topology, "Serving topology selected");

        if topology == Topology::Nothing {
            let _ = ready.send(());
            let result = tokio::select! {
                _ = wait_for_done(done) => Ok(()),
                interrupt = self.interrupted() => Err(ServeError::Interrupted(interrupt)),
            };
            self.hooks.run_all();
            return result;
        }

        let (outcome_tx, mut outcomes) = mpsc::unbounded_channel();
        let (fallback, fallback_rx) = fallback::channel();
        let ctx = WorkerContext {
            handler,
            hooks: self.hooks.clone(),
            state: self.state.clone(),
            outcomes: outcome_tx,
            shutdown_timeout: self.config.shutdown_timeout(),
        };

        let mut workers = JoinSet::new();

        // Plain HTTP, started only when the fallback fires.
        {
            let ctx = ctx.clone();
            let spec = topology::plain_http(&self.config);
            workers.spawn(async move {
                if let Some(reason) = fallback_rx.wait().await {
                    tracing::debug!(reason = %reason, "Starting plain HTTP");
                    log_serving(&spec);
                    run_listener(ctx, spec, FailurePolicy::Fatal).await;
                }
            });
        }

        for (spec, policy) in topology.listeners(&self.config) {
            log_serving(&spec);
            workers.spawn(run_listener(ctx.clone(), spec, policy));
        }
        drop(ctx);

        if topology.starts_with_fallback() {
            fallback.fire(FallbackReason::Requested);
        }

        let settle = tokio::time::sleep(READY_DELAY);
        tokio::pin!(settle);
        let interrupted = self.interrupted();
        tokio::pin!(interrupted);
        let done = wait_for_done(done);
        tokio::pin!(done);
        let mut ready = Some(ready);

        let result = loop {
            tokio::select! {
                _ = &mut settle, if ready.is_some() => {
                    if let Some(ready) = ready.take() {
                        let _ = ready.send(());
                    }
                    if self.config.open_url_after_serving {
                        if let Err(e) = self.open_served_url(topology) {
                            break Err(e);
                        }
                    }
                }
                Some(outcome) = outcomes.recv() => {
                    if let Err(e) = self.handle_outcome(outcome, &fallback) {
                        break Err(e);
                    }
                }
                _ = &mut done, if ready.is_none() => break Ok(()),
                interrupt = &mut interrupted => break Err(ServeError::Interrupted(interrupt)),
            }
        };

        self.hooks.run_all();

        // Releases the fallback worker if it never fired.
        drop(fallback);
        let drain = self.config.shutdown_timeout() + DRAIN_GRACE;
        let drained = tokio::time::timeout(drain, async {
            while workers.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            tracing::warn!(timeout = ?drain, "Listeners still running after shutdown timeout, aborting");
        }
        workers.shutdown().await;

        result
    }

    fn handle_outcome(&self, outcome: ListenerOutcome, fallback: &FallbackTrigger) -> Result<(), ServeError> {
        match outcome {
            ListenerOutcome::Started { spec, local_addr } => {
                tracing::debug!(
                    protocol = %spec.protocol,
                    address = %local_addr,
                    "Listener started"
                );
                metrics::record_listener_started(spec.protocol);
                Ok(())
            }
            ListenerOutcome::Stopped { spec } => {
                tracing::debug!(protocol = %spec.protocol, address = %spec.address, "Listener stopped");
                Ok(())
            }
            ListenerOutcome::Degraded { spec, error } => {
                tracing::error!(
                    protocol = %spec.protocol,
                    address = %spec.address,
                    error = %error,
                    "Listener failed, continuing without it"
                );
                Ok(())
            }
            ListenerOutcome::FailedWithFallback { spec, error } => {
                tracing::warn!(
                    protocol = %spec.protocol,
                    address = %spec.address,
                    error = %error,
                    "Not serving {} after all, falling back to plain HTTP",
                    spec.protocol
                );
                if spec.protocol.needs_tls() {
                    tracing::info!("Use the plain HTTP flag to serve regular HTTP instead");
                }
                let fired = fallback.fire(FallbackReason::Failed {
                    protocol: spec.protocol,
                    error: error.to_string(),
                });
                if fired {
                    metrics::record_fallback(spec.protocol);
                }
                Ok(())
            }
            ListenerOutcome::FailedFatal { spec, error } => Err(ServeError::Listener {
                protocol: spec.protocol,
                address: spec.address,
                source: error,
            }),
        }
    }

    fn open_served_url(&self, topology: Topology) -> Result<(), ServeError> {
        if !self.state.any() {
            return Err(ServeError::Configuration(
                "serving neither over http:// nor over https://".to_string(),
            ));
        }

        // Prefer the secure transport when both are live.
        let scheme = if self.state.secure() {
            topology.secure_scheme()
        } else {
            "http"
        };
        let listener = &self.config.listener;
        let url = served_url(scheme, &listener.host, &listener.bind_address)
            .map_err(|e| ServeError::Configuration(format!("cannot build URL to open: {e}")))?;

        tracing::info!(url = %url, "Opening URL");
        if let Err(e) = self.opener.open(&url) {
            tracing::warn!(url = %url, error = %e, "Failed to open URL");
        }
        Ok(())
    }

    async fn interrupted(&self) -> Interrupt {
        if !self.handle_signals {
            return pending().await;
        }
        match wait_for_interrupt().await {
            Ok(interrupt) => {
                tracing::warn!(signal = %interrupt, "Interrupted");
                interrupt
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install signal handlers");
                pending().await
            }
        }
    }
}

/// Resolves when `done` receives a value. A dropped sender never resolves.
async fn wait_for_done(done: oneshot::Receiver<()>) {
    if done.await.is_err() {
        pending::<()>().await;
    }
}

/// Bind, serve and report. Keeps the serving flag in step with the bind.
async fn run_listener(ctx: WorkerContext, spec: ListenerSpec, policy: FailurePolicy) {
    let slot = Slot::for_protocol(spec.protocol);
    let adapter = ListenerAdapter::new(spec.clone(), ctx.handler, &ctx.hooks, ctx.shutdown_timeout);

    let bound = match adapter.bind().await {
        Ok(bound) => bound,
        Err(error) => {
            let _ = ctx.outcomes.send(ListenerOutcome::failed(spec, error, policy));
            return;
        }
    };

    ctx.state.set(slot, true);
    let _ = ctx.outcomes.send(ListenerOutcome::Started {
        spec: spec.clone(),
        local_addr: bound.local_addr(),
    });

    let result = bound.serve().await;
    ctx.state.set(slot, false);

    let outcome = match result {
        Ok(()) => ListenerOutcome::Stopped { spec },
        Err(error) => ListenerOutcome::failed(spec, error, policy),
    };
    let _ = ctx.outcomes.send(outcome);
}

fn log_serving(spec: &ListenerSpec) {
    match spec.protocol {
        Protocol::Http2Cleartext => tracing::warn!(
            url = %spec.url(),
            "Serving HTTP/2 without HTTPS (not recommended!)"
        ),
        protocol => tracing::info!(url = %spec.url(), "Serving {}", protocol),
    }
}
