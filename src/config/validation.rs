//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid)
//! - Detect combinations that can never serve anything
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before any listener is started

use thiserror::Error;

use crate::config::schema::ServerConfig;
use crate::net::addr::resolve_bind_addr;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address {address:?}: {reason}")]
    BindAddress { address: String, reason: String },

    #[error("production ports must be non-zero and distinct (https={https}, http={http})")]
    ProductionPorts { https: u16, http: u16 },

    #[error("shutdown timeout must be greater than zero")]
    ZeroShutdownTimeout,

    #[error("certificate and key paths must both be set")]
    IncompleteTls,

    #[error("opening the URL was requested, but serve_nothing disables every listener")]
    OpenUrlWithoutListener,

    #[error("invalid metrics address {0:?}")]
    MetricsAddress(String),
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = resolve_bind_addr(&config.listener.bind_address) {
        errors.push(ValidationError::BindAddress {
            address: config.listener.bind_address.clone(),
            reason: e.to_string(),
        });
    }

    if config.protocol.production_mode {
        let https = config.listener.production_https_port;
        let http = config.listener.production_http_port;
        if https == 0 || http == 0 || https == http {
            errors.push(ValidationError::ProductionPorts { https, http });
        }
    }

    if config.timeouts.shutdown_secs == 0 {
        errors.push(ValidationError::ZeroShutdownTimeout);
    }

    let tls = &config.listener.tls;
    if tls.cert_path.is_empty() != tls.key_path.is_empty() {
        errors.push(ValidationError::IncompleteTls);
    }

    if config.open_url_after_serving && config.protocol.serve_nothing {
        errors.push(ValidationError::OpenUrlWithoutListener);
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&ServerConfig::default()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = ServerConfig::default();
        config.listener.bind_address = "not an address".into();
        config.timeouts.shutdown_secs = 0;
        config.listener.tls.key_path = String::new();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::ZeroShutdownTimeout));
        assert!(errors.contains(&ValidationError::IncompleteTls));
    }

    #[test]
    fn open_url_with_serve_nothing_is_rejected() {
        let mut config = ServerConfig::default();
        config.open_url_after_serving = true;
        config.protocol.serve_nothing = true;

        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::OpenUrlWithoutListener])
        );
    }

    #[test]
    fn production_ports_must_differ() {
        let mut config = ServerConfig::default();
        config.protocol.production_mode = true;
        config.listener.production_http_port = 443;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::ProductionPorts { https: 443, http: 443 }]
        );
    }
}
