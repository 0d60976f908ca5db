// ────────────────────────────────
// src/server/builder.rs
// ────────────────────────────────
use crate::server::listener::{bind_tcp, ActiveRequests, IdleTimeoutStream, TrackRequests};
use anyhow::{Context, Result};
use hyper::{server::conn::Http, Body, Request, Response};
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::Service;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Builder pattern so `main.rs` can inject the health handler and the
/// connection timeouts.
pub struct ServerBuilder<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>> + Send + 'static,
    H::Future: Send + 'static,
{
    addr: SocketAddr,
    handler: Option<H>,
    read_timeout: Duration,
    idle_timeout: Duration,
}

impl<H> ServerBuilder<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>> + Send + 'static,
    H::Future: Send + 'static,
{
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            handler: None,
            read_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(15),
        }
    }

    pub fn with_handler(mut self, handler: H) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Upper bound on receiving a request's headers.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Connections without traffic for this long are closed.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Bind the configured address and serve until `shutdown` resolves.
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = bind_tcp(self.addr).await?;
        self.serve_listener(listener, shutdown).await
    }

    /// Serve on an already bound listener, one Tokio task per connection.
    pub async fn serve_listener<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let handler = self
            .handler
            .context("handler must be set via with_handler()")?;

        tracing::info!("HTTP server listening on {}", listener.local_addr()?);

        let mut http = Http::new();
        http.http1_header_read_timeout(self.read_timeout);

        tokio::pin!(shutdown);
        loop {
            let (stream, peer) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(err) => {
                        // EMFILE and friends persist for a while; don't spin on them.
                        tracing::warn!(%err, "failed to accept connection");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                        continue;
                    }
                },
                _ = &mut shutdown => {
                    tracing::info!("HTTP server shutting down");
                    return Ok(());
                }
            };

            let active = ActiveRequests::new();
            let svc = TrackRequests::new(handler.clone(), active.clone());
            let http = http.clone();
            let stream = IdleTimeoutStream::new(stream, self.idle_timeout, active);

            tokio::spawn(async move {
                // A failed response write abandons the connection; nothing is retried.
                if let Err(err) = http.serve_connection(stream, svc).await {
                    tracing::warn!(%peer, %err, "connection error");
                }
            });
        }
    }
}
