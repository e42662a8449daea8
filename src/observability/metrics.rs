//! Metrics collection and exposition.
//!
//! # Metrics
//! - `portico_listener_started_total` (counter): successful binds by protocol
//! - `portico_listener_failed_total` (counter): failures by protocol and policy
//! - `portico_fallback_total` (counter): fallbacks to plain HTTP by failed protocol
//! - `portico_serving` (gauge): 1 while a serving slot is live
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Exporter is optional and bound to its own address

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::net::Protocol;
use crate::serve::{FailurePolicy, Slot};

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_listener_started(protocol: Protocol) {
    counter!("portico_listener_started_total", "protocol" => protocol_label(protocol)).increment(1);
}

pub fn record_listener_failed(protocol: Protocol, policy: FailurePolicy) {
    counter!(
        "portico_listener_failed_total",
        "protocol" => protocol_label(protocol),
        "policy" => policy.as_str()
    )
    .increment(1);
}

pub fn record_fallback(protocol: Protocol) {
    counter!("portico_fallback_total", "protocol" => protocol_label(protocol)).increment(1);
}

pub fn record_serving(slot: Slot, live: bool) {
    gauge!("portico_serving", "slot" => slot.as_str()).set(if live { 1.0 } else { 0.0 });
}

fn protocol_label(protocol: Protocol) -> &'static str {
    match protocol {
        Protocol::Http => "http",
        Protocol::Http2Cleartext => "h2c",
        Protocol::Https => "https",
        Protocol::Http3 => "h3",
    }
}
