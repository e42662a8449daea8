//! TLS configuration and certificate loading.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use quinn::crypto::rustls::QuicServerConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};

use crate::net::listener::ListenerError;

/// ALPN identifier for HTTP/3.
const ALPN_H3: &[u8] = b"h3";

/// Install the process-wide rustls crypto provider.
///
/// Both the TCP and the QUIC stacks pull in a provider; rustls refuses to
/// pick one on its own when more than one is compiled in.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// Load TLS configuration from certificate and key files.
///
/// The resulting config advertises `h2` and `http/1.1` over ALPN.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, ListenerError> {
    check_exists(cert_path, key_path)?;
    install_crypto_provider();

    RustlsConfig::from_pem_file(cert_path, key_path)
        .await
        .map_err(|e| ListenerError::TlsMaterialInvalid(e.to_string()))
}

/// Load the QUIC server configuration from certificate and key files.
///
/// QUIC requires TLS 1.3; ALPN is fixed to `h3`.
pub fn load_quic_config(cert_path: &Path, key_path: &Path) -> Result<quinn::ServerConfig, ListenerError> {
    check_exists(cert_path, key_path)?;
    install_crypto_provider();

    let certs = read_certs(cert_path)?;
    let key = read_private_key(key_path)?;

    let mut tls = rustls::ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_protocol_versions(&[&rustls::version::TLS13])
    .map_err(|e| ListenerError::TlsMaterialInvalid(e.to_string()))?
    .with_no_client_auth()
    .with_single_cert(certs, key)
    .map_err(|e| ListenerError::TlsMaterialInvalid(e.to_string()))?;
    tls.alpn_protocols = vec![ALPN_H3.to_vec()];

    let crypto = QuicServerConfig::try_from(tls)
        .map_err(|e| ListenerError::TlsMaterialInvalid(e.to_string()))?;
    Ok(quinn::ServerConfig::with_crypto(Arc::new(crypto)))
}

fn check_exists(cert_path: &Path, key_path: &Path) -> Result<(), ListenerError> {
    if !cert_path.exists() {
        return Err(ListenerError::TlsMaterialMissing(cert_path.to_path_buf()));
    }
    if !key_path.exists() {
        return Err(ListenerError::TlsMaterialMissing(key_path.to_path_buf()));
    }
    Ok(())
}

fn read_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, ListenerError> {
    let file = File::open(path).map_err(|e| invalid(path, e))?;
    let certs = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| invalid(path, e))?;
    if certs.is_empty() {
        return Err(ListenerError::TlsMaterialInvalid(format!(
            "no certificates found in {}",
            path.display()
        )));
    }
    Ok(certs)
}

fn read_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, ListenerError> {
    let file = File::open(path).map_err(|e| invalid(path, e))?;
    rustls_pemfile::private_key(&mut BufReader::new(file))
        .map_err(|e| invalid(path, e))?
        .ok_or_else(|| {
            ListenerError::TlsMaterialInvalid(format!("no private key found in {}", path.display()))
        })
}

fn invalid(path: &Path, err: std::io::Error) -> ListenerError {
    ListenerError::TlsMaterialInvalid(format!("{}: {}", path.display(), err))
}
