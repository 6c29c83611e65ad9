//! Tower middleware running the debounce gate in front of a service.
//!
//! The layer doesn't know how routes or sessions are represented; it asks the request
//! through [`GateRequest`]. `http::Request` is supported out of the box: the route is the
//! URI path and the session is a [`SessionId`] placed in the request extensions by
//! whatever session layer runs upstream.

use futures::future::BoxFuture;
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

use crate::error::GateError;
use crate::gate::DebounceGate;
use crate::session::{SessionId, SessionStore};

/// Requests the gate can inspect.
pub trait GateRequest {
    /// Stable identifier of the target operation.
    fn route(&self) -> &str;
    /// Session the request belongs to, if any.
    fn session_id(&self) -> Option<&SessionId>;
}

impl<B> GateRequest for http::Request<B> {
    fn route(&self) -> &str {
        self.uri().path()
    }

    fn session_id(&self) -> Option<&SessionId> {
        self.extensions().get::<SessionId>()
    }
}

/// A layer that enforces debounce policies using a [`DebounceGate`].
#[derive(Debug)]
pub struct DebounceLayer<St> {
    gate: DebounceGate<St>,
}

impl<St> Clone for DebounceLayer<St> {
    fn clone(&self) -> Self {
        Self { gate: self.gate.clone() }
    }
}

impl<St> DebounceLayer<St> {
    /// Create a new debounce layer.
    pub fn new(gate: DebounceGate<St>) -> Self {
        Self { gate }
    }
}

impl<S, St> Layer<S> for DebounceLayer<St> {
    type Service = DebounceService<S, St>;

    fn layer(&self, service: S) -> Self::Service {
        DebounceService { inner: service, gate: self.gate.clone() }
    }
}

/// Middleware service that enforces debounce policies.
#[derive(Debug)]
pub struct DebounceService<S, St> {
    inner: S,
    gate: DebounceGate<St>,
}

impl<S: Clone, St> Clone for DebounceService<S, St> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone(), gate: self.gate.clone() }
    }
}

impl<S, St> DebounceService<S, St> {
    /// Borrow the wrapped service.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }
}

impl<S, St, Req> Service<Req> for DebounceService<S, St>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send + 'static,
    St: SessionStore + 'static,
    Req: GateRequest + Send + 'static,
{
    type Response = S::Response;
    type Error = GateError<S::Error>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(GateError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let gate = self.gate.clone();
        // Keep the instance that was driven to readiness.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let route = req.route().to_owned();
        let session = req.session_id().cloned();

        Box::pin(async move {
            gate.enforce(&route, session.as_ref()).await?;
            inner.call(req).await.map_err(GateError::Inner)
        })
    }
}
