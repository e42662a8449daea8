//! Serving topology selection.

use crate::config::{ProtocolConfig, ServerConfig};
use crate::net::addr::join_host_port;
use crate::net::{ListenerSpec, Protocol};

/// What happens when a listener fails to bind or stops with an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Start plain HTTP instead.
    Fallback,
    /// Clear the serving flag, log, keep the other listeners running.
    Degrade,
    /// Shut everything down and exit with a non-zero status.
    Fatal,
}

impl FailurePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            FailurePolicy::Fallback => "fallback",
            FailurePolicy::Degrade => "degrade",
            FailurePolicy::Fatal => "fatal",
        }
    }
}

/// The set of listeners one orchestrator invocation starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// No listener; only the ready/done handshake.
    Nothing,
    /// HTTP/3 over QUIC on the configured address.
    Quic,
    /// HTTPS + HTTP/2 and plain HTTP on the production ports of the host.
    Production,
    /// HTTP/2 without TLS on the configured address.
    Http2Cleartext,
    /// HTTPS + HTTP/2 on the configured address.
    Secure,
    /// Plain HTTP on the configured address.
    Plain,
}

impl Topology {
    /// Pick a topology from the protocol flags. The first match wins.
    pub fn select(protocol: &ProtocolConfig) -> Self {
        if protocol.serve_nothing {
            Topology::Nothing
        } else if protocol.experimental_quic {
            Topology::Quic
        } else if protocol.production_mode {
            Topology::Production
        } else if protocol.http2_without_tls {
            Topology::Http2Cleartext
        } else if !protocol.plain_http_only {
            Topology::Secure
        } else {
            Topology::Plain
        }
    }

    /// Listeners started directly at entry, with their failure policy.
    ///
    /// [`Topology::Plain`] starts nothing here: it fires the fallback right
    /// away, so plain HTTP always runs through the fallback worker.
    pub fn listeners(self, config: &ServerConfig) -> Vec<(ListenerSpec, FailurePolicy)> {
        let listener = &config.listener;
        let address = listener.bind_address.clone();
        let tls = listener.tls.clone();

        match self {
            Topology::Nothing | Topology::Plain => Vec::new(),
            Topology::Quic => vec![(
                ListenerSpec::new(address, Protocol::Http3).with_tls(tls),
                FailurePolicy::Fallback,
            )],
            Topology::Production => vec![
                (
                    ListenerSpec::new(
                        join_host_port(&listener.host, listener.production_https_port),
                        Protocol::Https,
                    )
                    .with_tls(tls),
                    FailurePolicy::Degrade,
                ),
                (
                    ListenerSpec::new(
                        join_host_port(&listener.host, listener.production_http_port),
                        Protocol::Http,
                    ),
                    FailurePolicy::Fatal,
                ),
            ],
            Topology::Http2Cleartext => vec![(
                ListenerSpec::new(address, Protocol::Http2Cleartext),
                FailurePolicy::Fallback,
            )],
            Topology::Secure => vec![(
                ListenerSpec::new(address, Protocol::Https).with_tls(tls),
                FailurePolicy::Fallback,
            )],
        }
    }

    /// Whether plain HTTP is started through the fallback worker at entry.
    pub fn starts_with_fallback(self) -> bool {
        self == Topology::Plain
    }

    /// URL scheme of this topology's secure-slot transport.
    pub fn secure_scheme(self) -> &'static str {
        match self {
            Topology::Http2Cleartext => "http",
            _ => "https",
        }
    }
}

/// The plain HTTP listener started by the fallback worker.
pub fn plain_http(config: &ServerConfig) -> ListenerSpec {
    ListenerSpec::new(config.listener.bind_address.clone(), Protocol::Http)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(f: impl FnOnce(&mut ProtocolConfig)) -> ProtocolConfig {
        let mut protocol = ProtocolConfig::default();
        f(&mut protocol);
        protocol
    }

    #[test]
    fn priority_order() {
        assert_eq!(Topology::select(&ProtocolConfig::default()), Topology::Secure);
        assert_eq!(Topology::select(&flags(|p| p.plain_http_only = true)), Topology::Plain);
        assert_eq!(
            Topology::select(&flags(|p| p.http2_without_tls = true)),
            Topology::Http2Cleartext
        );
        assert_eq!(
            Topology::select(&flags(|p| {
                p.http2_without_tls = true;
                p.plain_http_only = true;
            })),
            Topology::Http2Cleartext
        );
        assert_eq!(
            Topology::select(&flags(|p| {
                p.production_mode = true;
                p.http2_without_tls = true;
            })),
            Topology::Production
        );
        assert_eq!(
            Topology::select(&flags(|p| {
                p.experimental_quic = true;
                p.production_mode = true;
            })),
            Topology::Quic
        );
        assert_eq!(
            Topology::select(&flags(|p| {
                p.serve_nothing = true;
                p.experimental_quic = true;
            })),
            Topology::Nothing
        );
    }

    #[test]
    fn production_uses_host_and_ports() {
        let mut config = ServerConfig::default();
        config.listener.host = "example.org".into();

        let listeners = Topology::Production.listeners(&config);
        assert_eq!(listeners.len(), 2);

        let (https, https_policy) = &listeners[0];
        assert_eq!(https.address, "example.org:443");
        assert_eq!(https.protocol, Protocol::Https);
        assert!(https.tls.is_some());
        assert_eq!(*https_policy, FailurePolicy::Degrade);

        let (http, http_policy) = &listeners[1];
        assert_eq!(http.address, "example.org:80");
        assert_eq!(http.protocol, Protocol::Http);
        assert_eq!(*http_policy, FailurePolicy::Fatal);
    }

    #[test]
    fn production_without_host_binds_all_interfaces() {
        let listeners = Topology::Production.listeners(&ServerConfig::default());
        assert_eq!(listeners[0].0.address, ":443");
        assert_eq!(listeners[1].0.address, ":80");
    }

    #[test]
    fn preferred_transports_fall_back() {
        let config = ServerConfig::default();
        for topology in [Topology::Quic, Topology::Http2Cleartext, Topology::Secure] {
            let listeners = topology.listeners(&config);
            assert_eq!(listeners.len(), 1);
            assert_eq!(listeners[0].1, FailurePolicy::Fallback);
            assert_eq!(listeners[0].0.address, config.listener.bind_address);
        }
    }

    #[test]
    fn plain_runs_through_the_fallback_worker() {
        assert!(Topology::Plain.listeners(&ServerConfig::default()).is_empty());
        assert!(Topology::Plain.starts_with_fallback());
        assert_eq!(plain_http(&ServerConfig::default()).protocol, Protocol::Http);
    }
}
