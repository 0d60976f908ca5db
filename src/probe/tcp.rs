// src/probe/tcp.rs
use super::ProbeError;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct TcpProbe {
    dial_timeout: Duration,
}

impl TcpProbe {
    pub fn new(dial_timeout: Duration) -> Self {
        Self { dial_timeout }
    }

    /// Succeeds once a connection is established. The socket is closed straight away.
    pub async fn run(&self, ctx: &CancellationToken, address: &str) -> Result<(), ProbeError> {
        let target = dial_target(address);
        debug!(%target, "attempting TCP connection");

        tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(ProbeError::Cancelled),
            result = timeout(self.dial_timeout, TcpStream::connect(target.as_str())) => match result {
                Ok(Ok(stream)) => {
                    drop(stream);
                    Ok(())
                }
                Ok(Err(e)) => Err(ProbeError::Io(e)),
                Err(_) => Err(ProbeError::TimedOut(self.dial_timeout)),
            },
        }
    }
}

/// A bare port (or an empty host) dials the unspecified address.
pub(crate) fn dial_target(address: &str) -> String {
    match address.rsplit_once(':') {
        None => format!("0.0.0.0:{}", address),
        Some(("", port)) => format!("0.0.0.0:{}", port),
        Some(_) => address.to_string(),
    }
}
