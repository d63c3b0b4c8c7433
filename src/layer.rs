use crate::error::ThrottleServiceError;
use crate::request::RequestDescriptor;
use crate::throttler::Throttler;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

/// A layer that runs every request through a [`Throttler`] before the inner service sees it.
#[derive(Clone, Debug)]
pub struct ThrottleLayer {
    throttler: Throttler,
}

impl ThrottleLayer {
    pub fn new(throttler: Throttler) -> Self {
        Self { throttler }
    }
}

impl<S> Layer<S> for ThrottleLayer {
    type Service = ThrottleService<S>;

    fn layer(&self, service: S) -> Self::Service {
        ThrottleService { inner: service, throttler: self.throttler.clone() }
    }
}

/// Middleware service produced by [`ThrottleLayer`].
#[derive(Clone, Debug)]
pub struct ThrottleService<S> {
    inner: S,
    throttler: Throttler,
}

impl<S, Req> Service<Req> for ThrottleService<S>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send + 'static,
    Req: RequestDescriptor + Send + Sync + 'static,
{
    type Response = S::Response;
    type Error = ThrottleServiceError<S::Error>;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(ThrottleServiceError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let throttler = self.throttler.clone();
        // Keep the instance that was driven to readiness.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            throttler.gate(&req).await?;
            inner.call(req).await.map_err(ThrottleServiceError::Inner)
        })
    }
}
