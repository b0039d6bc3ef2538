//! Bulkhead service implementation.

use crate::bulkhead::Bulkhead;
use crate::error::BulkheadError;
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use tower::Service;

/// Service that runs each request of `S` under a bulkhead permit.
///
/// The permit is taken before the inner service is called and held until
/// the inner response future resolves.
#[derive(Clone, Debug)]
pub struct BulkheadService<S> {
    inner: S,
    bulkhead: Bulkhead,
}

impl<S> BulkheadService<S> {
    /// Wraps `inner` with `bulkhead`.
    pub fn new(inner: S, bulkhead: Bulkhead) -> Self {
        Self { inner, bulkhead }
    }

    /// The bulkhead guarding this service.
    pub fn bulkhead(&self) -> &Bulkhead {
        &self.bulkhead
    }

    /// Consumes the wrapper, returning the inner service.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S, Request> Service<Request> for BulkheadService<S>
where
    S: Service<Request> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: From<BulkheadError> + Send + 'static,
    Request: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        // The clone that was driven to readiness handles this request.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let bulkhead = self.bulkhead.clone();

        Box::pin(async move {
            let execution = bulkhead.enter().await?;
            execution.guard(inner.call(request)).await
        })
    }
}
