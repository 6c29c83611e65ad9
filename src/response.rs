//! Translation of the rejection signal into a client-visible response.
//!
//! A rejected call becomes `429 Too Many Requests` with a JSON body:
//!
//! ```json
//! {"name": "Debounced", "data": "too many requests to '/debounce': retry in 2000ms (minimum interval 3000ms)"}
//! ```
//!
//! [`RejectionLayer`] sits outside [`DebounceLayer`](crate::DebounceLayer) and turns
//! `GateError::Debounced` into that response while passing inner errors through untouched.

use futures::future::BoxFuture;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

use crate::error::{Debounced, GateError};

/// Status returned for debounced calls.
pub const REJECTION_STATUS: StatusCode = StatusCode::TOO_MANY_REQUESTS;

/// JSON error body: error kind plus message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error kind.
    pub name: String,
    /// Human-readable message.
    pub data: String,
}

impl From<&Debounced> for ErrorBody {
    fn from(rejection: &Debounced) -> Self {
        Self { name: rejection.kind().to_owned(), data: rejection.to_string() }
    }
}

/// Build the 429 response for a rejection.
pub fn rejection_response(rejection: &Debounced) -> Response<String> {
    let body = ErrorBody::from(rejection);
    // Two plain strings always serialize; the fallback only keeps this infallible.
    let json = serde_json::to_string(&body)
        .unwrap_or_else(|_| format!("{{\"name\":\"{}\"}}", rejection.kind()));
    let mut response = Response::new(json);
    *response.status_mut() = REJECTION_STATUS;
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Layer translating debounce rejections into 429 responses.
#[derive(Clone, Copy, Debug, Default)]
pub struct RejectionLayer;

impl RejectionLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for RejectionLayer {
    type Service = RejectionService<S>;

    fn layer(&self, service: S) -> Self::Service {
        RejectionService { inner: service }
    }
}

/// Service produced by [`RejectionLayer`].
#[derive(Clone, Debug)]
pub struct RejectionService<S> {
    inner: S,
}

impl<S, Req, B, E> Service<Req> for RejectionService<S>
where
    S: Service<Req, Response = Response<B>, Error = GateError<E>>,
    S::Future: Send + 'static,
    B: From<String> + Send + 'static,
    E: Send + 'static,
{
    type Response = Response<B>;
    type Error = E;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        match self.inner.poll_ready(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(())) => Poll::Ready(Ok(())),
            Poll::Ready(Err(GateError::Inner(e))) => Poll::Ready(Err(e)),
            // The gate only rejects inside `call`; readiness never carries a rejection.
            Poll::Ready(Err(GateError::Debounced(_))) => Poll::Ready(Ok(())),
        }
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let fut = self.inner.call(req);
        Box::pin(async move {
            match fut.await {
                Ok(response) => Ok(response),
                Err(GateError::Debounced(rejection)) => {
                    Ok(rejection_response(&rejection).map(B::from))
                }
                Err(GateError::Inner(e)) => Err(e),
            }
        })
    }
}
