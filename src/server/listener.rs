// ────────────────────────────────
// src/server/listener.rs
// Low-level TCP bind plus the idle timeout applied to accepted connections.
// ────────────────────────────────
use anyhow::{Context as _, Result};
use futures::future::BoxFuture;
use hyper::{Body, Request};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpListener;
use tokio::time::{sleep, Instant, Sleep};
use tower::Service;

pub async fn bind_tcp(addr: SocketAddr) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind listener on {}", addr))?;
    Ok(listener)
}

/// Number of requests currently being answered on one connection.
#[derive(Debug, Clone, Default)]
pub struct ActiveRequests(Arc<AtomicUsize>);

impl ActiveRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self) -> RequestGuard {
        self.0.fetch_add(1, Ordering::SeqCst);
        RequestGuard(self.0.clone())
    }

    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::SeqCst) > 0
    }
}

/// Marks a request as finished when dropped, including when hyper abandons it.
pub struct RequestGuard(Arc<AtomicUsize>);

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Wraps a connection's service so its stream knows when a request is in flight.
#[derive(Clone)]
pub struct TrackRequests<H> {
    inner: H,
    active: ActiveRequests,
}

impl<H> TrackRequests<H> {
    pub fn new(inner: H, active: ActiveRequests) -> Self {
        Self { inner, active }
    }
}

impl<H> Service<Request<Body>> for TrackRequests<H>
where
    H: Service<Request<Body>>,
    H::Future: Send + 'static,
    H::Response: Send + 'static,
    H::Error: Send + 'static,
{
    type Response = H::Response;
    type Error = H::Error;
    type Future = BoxFuture<'static, Result<H::Response, H::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let guard = self.active.enter();
        let fut = self.inner.call(req);
        Box::pin(async move {
            let resp = fut.await;
            drop(guard);
            resp
        })
    }
}

/// Fails reads and writes once the connection has seen no traffic for
/// `timeout`, which makes hyper drop it. The clock does not run while a
/// request is being answered.
pub struct IdleTimeoutStream<S> {
    inner: S,
    timeout: Duration,
    deadline: Pin<Box<Sleep>>,
    active: ActiveRequests,
    was_busy: bool,
}

impl<S> IdleTimeoutStream<S> {
    pub fn new(inner: S, timeout: Duration, active: ActiveRequests) -> Self {
        Self {
            inner,
            timeout,
            deadline: Box::pin(sleep(timeout)),
            active,
            was_busy: false,
        }
    }

    fn touch(&mut self) {
        let next = Instant::now() + self.timeout;
        self.deadline.as_mut().reset(next);
    }

    fn expire<T>(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<T>> {
        if self.active.is_busy() {
            self.was_busy = true;
            return Poll::Pending;
        }
        if self.was_busy {
            // idle time restarts once the last request is answered
            self.was_busy = false;
            self.touch();
        }
        match self.deadline.as_mut().poll(cx) {
            Poll::Ready(()) => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "connection idle timeout",
            ))),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for IdleTimeoutStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(result) => {
                this.touch();
                Poll::Ready(result)
            }
            Poll::Pending => this.expire(cx),
        }
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for IdleTimeoutStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_write(cx, buf) {
            Poll::Ready(result) => {
                this.touch();
                Poll::Ready(result)
            }
            Poll::Pending => this.expire(cx),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
