//! Response write deadline.
//!
//! `TimeoutLayer` only bounds the handler future that produces the response
//! head. A streamed body keeps going after the head is sent, so the body is
//! wrapped as well: once the deadline taken at request start passes, the body
//! ends with an error and the connection aborts the response.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use axum::BoxError;
use bytes::Bytes;
use hyper::body::{Body as HttpBody, Frame, SizeHint};
use thiserror::Error;
use tokio::time::{Instant, Sleep};

use crate::net::listener::WRITE_TIMEOUT;

/// The response was still being written when the write timeout elapsed.
#[derive(Debug, Error)]
#[error("response not written within {0:?}")]
pub struct WriteTimeoutElapsed(pub std::time::Duration);

/// Middleware: fix the deadline when the request arrives and attach it to
/// the response body.
pub async fn write_deadline(request: Request, next: Next) -> Response {
    let deadline = Instant::now() + WRITE_TIMEOUT;
    next.run(request)
        .await
        .map(|body| Body::new(DeadlineBody::new(body, deadline)))
}

/// A body that fails once `deadline` has passed.
pub struct DeadlineBody {
    inner: Body,
    deadline: Pin<Box<Sleep>>,
    budget: std::time::Duration,
    expired: bool,
}

impl DeadlineBody {
    pub fn new(inner: Body, deadline: Instant) -> Self {
        Self {
            inner,
            deadline: Box::pin(tokio::time::sleep_until(deadline)),
            budget: deadline.saturating_duration_since(Instant::now()),
            expired: false,
        }
    }
}

impl HttpBody for DeadlineBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        if this.expired {
            return Poll::Ready(None);
        }
        if this.deadline.as_mut().poll(cx).is_ready() {
            this.expired = true;
            tracing::debug!(timeout = ?this.budget, "Response write timeout, aborting body");
            return Poll::Ready(Some(Err(WriteTimeoutElapsed(this.budget).into())));
        }
        Pin::new(&mut this.inner).poll_frame(cx).map_err(Into::into)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
