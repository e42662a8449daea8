//! Experimental HTTP/3 transport over QUIC.
//!
//! Each QUIC connection becomes an h3 server connection; every request
//! stream is buffered, handed to the same `Router` the TCP listeners use,
//! and the response is written back in one piece. The request body must
//! arrive within the read timeout; both bodies are capped in size.

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use bytes::{Buf, Bytes, BytesMut};
use h3::server::RequestStream;
use tokio::sync::watch;
use tower::ServiceExt;

use crate::net::listener::{ListenerError, MAX_HEADER_BYTES, READ_TIMEOUT};

/// Largest request or response body buffered for one HTTP/3 exchange.
const MAX_BUFFERED_BODY: usize = 16 << 20;

type QuicRequestStream = RequestStream<h3_quinn::BidiStream<Bytes>, Bytes>;

/// Accept connections until `stop` fires, then drain for up to `drain`.
pub(crate) async fn serve(
    endpoint: quinn::Endpoint,
    handler: Router,
    mut stop: watch::Receiver<bool>,
    drain: Duration,
) -> Result<(), ListenerError> {
    loop {
        let stopped = *stop.borrow();
        if stopped {
            break;
        }
        tokio::select! {
            incoming = endpoint.accept() => {
                let Some(incoming) = incoming else {
                    break;
                };
                let handler = handler.clone();
                tokio::spawn(async move {
                    if let Err(e) = serve_connection(incoming, handler).await {
                        tracing::debug!(error = %e, "QUIC connection ended with error");
                    }
                });
            }
            changed = stop.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    // Stop accepting, give open connections a chance to finish, then close.
    endpoint.set_server_config(None);
    if tokio::time::timeout(drain, endpoint.wait_idle()).await.is_err() {
        tracing::warn!(timeout = ?drain, "QUIC connections still open after shutdown timeout, closing");
    }
    endpoint.close(quinn::VarInt::from_u32(0), b"shutdown");
    Ok(())
}

async fn serve_connection(incoming: quinn::Incoming, handler: Router) -> Result<(), ListenerError> {
    let connection = incoming
        .accept()
        .map_err(quic_err)?
        .await
        .map_err(quic_err)?;
    let remote = connection.remote_address();

    let mut h3_conn: h3::server::Connection<h3_quinn::Connection, Bytes> = h3::server::builder()
        .max_field_section_size(MAX_HEADER_BYTES as u64)
        .build(h3_quinn::Connection::new(connection))
        .await
        .map_err(quic_err)?;

    loop {
        match h3_conn.accept().await {
            Ok(Some((request, stream))) => {
                let handler = handler.clone();
                tokio::spawn(async move {
                    if let Err(e) = serve_request(request, stream, handler).await {
                        tracing::debug!(peer_addr = %remote, error = %e, "HTTP/3 request failed");
                    }
                });
            }
            Ok(None) => break,
            Err(e) => return Err(quic_err(e)),
        }
    }
    Ok(())
}

async fn serve_request(
    request: Request<()>,
    mut stream: QuicRequestStream,
    handler: Router,
) -> Result<(), ListenerError> {
    let body = match tokio::time::timeout(READ_TIMEOUT, read_body(&mut stream)).await {
        Ok(Ok(Some(body))) => body,
        Ok(Ok(None)) => return reject(stream, StatusCode::PAYLOAD_TOO_LARGE).await,
        Ok(Err(e)) => return Err(e),
        Err(_) => return reject(stream, StatusCode::REQUEST_TIMEOUT).await,
    };

    let (parts, ()) = request.into_parts();
    let request = Request::from_parts(parts, Body::from(body));

    let response = match handler.oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };

    let (parts, body) = response.into_parts();
    let bytes = axum::body::to_bytes(body, MAX_BUFFERED_BODY)
        .await
        .map_err(quic_err)?;

    stream
        .send_response(Response::from_parts(parts, ()))
        .await
        .map_err(quic_err)?;
    if !bytes.is_empty() {
        stream.send_data(bytes).await.map_err(quic_err)?;
    }
    stream.finish().await.map_err(quic_err)
}

/// Buffer the request body. `None` if it grows past [`MAX_BUFFERED_BODY`].
async fn read_body(stream: &mut QuicRequestStream) -> Result<Option<Bytes>, ListenerError> {
    let mut body = BytesMut::new();
    while let Some(mut chunk) = stream.recv_data().await.map_err(quic_err)? {
        let len = chunk.remaining();
        if body.len() + len > MAX_BUFFERED_BODY {
            return Ok(None);
        }
        body.extend_from_slice(&chunk.copy_to_bytes(len));
    }
    Ok(Some(body.freeze()))
}

async fn reject(mut stream: QuicRequestStream, status: StatusCode) -> Result<(), ListenerError> {
    let response = Response::builder()
        .status(status)
        .body(())
        .map_err(quic_err)?;
    stream.send_response(response).await.map_err(quic_err)?;
    stream.finish().await.map_err(quic_err)
}

fn quic_err(err: impl std::fmt::Display) -> ListenerError {
    ListenerError::Quic(err.to_string())
}
