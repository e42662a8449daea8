//! Shared utilities for orchestrator integration tests.

#![allow(dead_code)]

use std::future::{poll_fn, Future};
use std::io::BufReader;
use std::net::{SocketAddr, TcpListener, UdpSocket};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::Router;
use bytes::Buf;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use portico::{Orchestrator, ServeError, ServerConfig, ShutdownHooks};

/// A port that was free a moment ago, for both TCP and UDP.
pub fn free_port() -> u16 {
    loop {
        let tcp = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = tcp.local_addr().unwrap().port();
        if UdpSocket::bind(("127.0.0.1", port)).is_ok() {
            return port;
        }
    }
}

pub fn local(port: u16) -> String {
    format!("127.0.0.1:{port}")
}

/// Write a self-signed certificate and key for localhost into `dir`.
pub fn write_cert_pair(dir: &Path) -> (String, String) {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string(), "127.0.0.1".to_string()])
        .unwrap();
    let cert = dir.join("cert.pem");
    let key = dir.join("key.pem");
    std::fs::write(&cert, certified.cert.pem()).unwrap();
    std::fs::write(&key, certified.key_pair.serialize_pem()).unwrap();
    (cert.display().to_string(), key.display().to_string())
}

/// Configuration for `address` with TLS paths that do not exist.
pub fn config_without_certs(address: &str, dir: &Path) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.bind_address = address.to_string();
    config.listener.tls.cert_path = dir.join("missing-cert.pem").display().to_string();
    config.listener.tls.key_path = dir.join("missing-key.pem").display().to_string();
    config.timeouts.shutdown_secs = 1;
    config
}

pub fn hello() -> Router {
    Router::new().route("/", get(|| async { "hello" }))
}

/// A running orchestrator and the handles to drive it.
pub struct Running {
    pub orchestrator: std::sync::Arc<Orchestrator>,
    pub hooks: ShutdownHooks,
    pub ready: Option<oneshot::Receiver<()>>,
    pub done: Option<oneshot::Sender<()>>,
    pub task: JoinHandle<Result<(), ServeError>>,
}

impl Running {
    pub fn start(config: ServerConfig) -> Self {
        let hooks = ShutdownHooks::new();
        let orchestrator = std::sync::Arc::new(Orchestrator::new(config, hooks.clone()).handle_signals(false));
        let (ready_tx, ready_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();

        let serving = std::sync::Arc::clone(&orchestrator);
        let task = tokio::spawn(async move { serving.serve(hello(), ready_tx, done_rx).await });

        Self {
            orchestrator,
            hooks,
            ready: Some(ready_rx),
            done: Some(done_tx),
            task,
        }
    }

    /// Wait for the ready signal.
    pub async fn ready(&mut self) {
        let ready = self.ready.take().expect("ready already awaited");
        tokio::time::timeout(Duration::from_secs(5), ready)
            .await
            .expect("ready not sent in time")
            .expect("ready sender dropped");
    }

    /// Send done and wait for the orchestrator to return.
    pub async fn finish(mut self) -> Result<(), ServeError> {
        let done = self.done.take().expect("done already sent");
        done.send(()).unwrap();
        self.join().await
    }

    /// Wait for the orchestrator to return on its own.
    pub async fn join(self) -> Result<(), ServeError> {
        tokio::time::timeout(Duration::from_secs(10), self.task)
            .await
            .expect("orchestrator did not return in time")
            .unwrap()
    }
}

/// Poll `check` until it returns true or the timeout elapses.
pub async fn wait_until<F>(mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// Retry an HTTP GET until the server answers.
pub async fn get_with_retry<F, Fut>(mut request: F) -> reqwest::Response
where
    F: FnMut() -> Fut,
    Fut: Future<Output = reqwest::Result<reqwest::Response>>,
{
    let mut last_err = None;
    for _ in 0..50 {
        match request().await {
            Ok(response) => return response,
            Err(e) => last_err = Some(e),
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("server never answered: {:?}", last_err)
}

pub fn addr(port: u16) -> SocketAddr {
    local(port).parse().unwrap()
}

/// An HTTP/3 client connection trusting one certificate.
pub struct H3Client {
    server: SocketAddr,
    endpoint: quinn::Endpoint,
    pub sender: h3::client::SendRequest<h3_quinn::OpenStreams, bytes::Bytes>,
    driver: JoinHandle<()>,
}

impl H3Client {
    pub async fn connect(addr: SocketAddr, cert_path: &str) -> Self {
        let mut roots = rustls::RootCertStore::empty();
        let file = std::fs::File::open(cert_path).unwrap();
        for cert in rustls_pemfile::certs(&mut BufReader::new(file)) {
            roots.add(cert.unwrap()).unwrap();
        }
        let mut tls = rustls::ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_protocol_versions(&[&rustls::version::TLS13])
            .unwrap()
            .with_root_certificates(roots)
            .with_no_client_auth();
        tls.alpn_protocols = vec![b"h3".to_vec()];
        let crypto = quinn::crypto::rustls::QuicClientConfig::try_from(tls).unwrap();

        let mut endpoint = quinn::Endpoint::client("127.0.0.1:0".parse().unwrap()).unwrap();
        endpoint.set_default_client_config(quinn::ClientConfig::new(Arc::new(crypto)));

        let connection = endpoint.connect(addr, "localhost").unwrap().await.unwrap();
        let (mut driver, sender) = h3::client::new(h3_quinn::Connection::new(connection)).await.unwrap();
        let driver = tokio::spawn(async move {
            let _ = poll_fn(|cx| driver.poll_close(cx)).await;
        });

        Self {
            server: addr,
            endpoint,
            sender,
            driver,
        }
    }

    /// GET `/` and read the whole response.
    pub async fn get(&mut self) -> (StatusCode, String) {
        let request = Request::get(format!("https://localhost:{}/", self.server.port()))
            .body(())
            .unwrap();
        let mut stream = self.sender.send_request(request).await.unwrap();
        stream.finish().await.unwrap();

        let response = stream.recv_response().await.unwrap();
        let mut body = Vec::new();
        while let Some(mut chunk) = stream.recv_data().await.unwrap() {
            let len = chunk.remaining();
            body.extend_from_slice(&chunk.copy_to_bytes(len));
        }
        (response.status(), String::from_utf8(body).unwrap())
    }

    pub fn close(self) {
        drop(self.sender);
        self.endpoint.close(0u32.into(), b"done");
        self.driver.abort();
    }
}
