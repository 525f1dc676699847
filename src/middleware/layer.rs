//! Tower integration for deadline enforcement.

use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use tower::{Layer, Service};

use crate::config::DeadlineConfig;
use crate::deadline::{Attributes, DeadlineError};
use crate::middleware::enforce::{enforce, DeadlineMiddleware};

/// Layer that bounds every message handled by the inner service by its deadline.
#[derive(Debug, Clone, Default)]
pub struct DeadlineLayer {
    middleware: DeadlineMiddleware,
}

impl DeadlineLayer {
    pub fn new(middleware: DeadlineMiddleware) -> Self {
        Self { middleware }
    }

    pub fn from_config(config: &DeadlineConfig) -> Self {
        Self::new(DeadlineMiddleware::from_config(config))
    }
}

impl<S> Layer<S> for DeadlineLayer {
    type Service = DeadlineService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DeadlineService {
            inner,
            middleware: self.middleware.clone(),
        }
    }
}

/// Service produced by [`DeadlineLayer`].
#[derive(Debug, Clone)]
pub struct DeadlineService<S> {
    inner: S,
    middleware: DeadlineMiddleware,
}

impl<S> DeadlineService<S> {
    pub fn get_ref(&self) -> &S {
        &self.inner
    }
}

impl<S, M> Service<M> for DeadlineService<S>
where
    S: Service<M> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
    M: Attributes + Send + 'static,
{
    type Response = S::Response;
    type Error = DeadlineError<S::Error>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(DeadlineError::Handler)
    }

    fn call(&mut self, message: M) -> Self::Future {
        let deadline = self.middleware.resolver().resolve(&message);

        // Take the instance that was driven to readiness; leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(enforce(deadline, move || inner.call(message)))
    }
}
