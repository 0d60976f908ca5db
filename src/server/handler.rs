// src/server/handler.rs
use crate::health::HealthService;
use crate::probe::{Executors, ProbeExecutor};
use crate::server::response;
use hyper::{Body, Request, Response};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tower::Service;

/// Every request, whatever its path, runs one health check.
pub struct RequestHandler<E = Executors> {
    service: Arc<HealthService<E>>,
    write_timeout: Duration,
}

impl<E> Clone for RequestHandler<E> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            write_timeout: self.write_timeout,
        }
    }
}

impl<E: ProbeExecutor> RequestHandler<E> {
    pub fn new(service: Arc<HealthService<E>>, write_timeout: Duration) -> Self {
        Self {
            service,
            write_timeout,
        }
    }
}

impl<E: ProbeExecutor> Service<Request<Body>> for RequestHandler<E> {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = futures::future::BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let service = self.service.clone();
        let write_timeout = self.write_timeout;
        Box::pin(async move {
            tracing::debug!(method = %req.method(), path = %req.uri().path(), "health request");
            let resp = match timeout(write_timeout, service.handle()).await {
                Ok(resp) => resp,
                Err(_) => {
                    tracing::warn!(?write_timeout, "health check exceeded the write timeout");
                    response::timed_out()
                }
            };
            Ok(resp.into())
        })
    }
}
