// src/probe/mod.rs
mod http;
pub mod process;
mod script;
mod tcp;

pub use http::HttpProbe;
pub use script::ScriptProbe;
pub use tcp::TcpProbe;

use crate::config::TimeoutConfig;
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// One configured probe. Built once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeSpec {
    Tcp {
        address: String,
    },
    Script {
        path: PathBuf,
        args: Vec<String>,
    },
    Http {
        url: Url,
        verify_payload: Option<String>,
        allow_insecure_tls: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeKind {
    Tcp,
    Script,
    Http,
}

impl ProbeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeKind::Tcp => "tcp",
            ProbeKind::Script => "script",
            ProbeKind::Http => "http",
        }
    }
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ProbeSpec {
    pub fn kind(&self) -> ProbeKind {
        match self {
            ProbeSpec::Tcp { .. } => ProbeKind::Tcp,
            ProbeSpec::Script { .. } => ProbeKind::Script,
            ProbeSpec::Http { .. } => ProbeKind::Http,
        }
    }

    /// The address, script path or URL the probe targets.
    pub fn identifier(&self) -> String {
        match self {
            ProbeSpec::Tcp { address } => address.clone(),
            ProbeSpec::Script { path, .. } => path.display().to_string(),
            ProbeSpec::Http { url, .. } => url.to_string(),
        }
    }

    /// Aggregate failure line for this probe.
    pub fn failure_message(&self, err: &ProbeError) -> String {
        match self {
            ProbeSpec::Tcp { address } => format!("TCP connection to {} failed: {}", address, err),
            ProbeSpec::Script { path, .. } => format!("Script {} failed: {}", path.display(), err),
            ProbeSpec::Http { url, .. } => format!("HTTP check to {} failed: {}", url, err),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("cancelled after a sibling probe failed")]
    Cancelled,

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("killed after exceeding the {after:?} timeout (Output: {output})")]
    Killed { after: Duration, output: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{status} (Output: {output})")]
    Exit {
        status: std::process::ExitStatus,
        output: String,
    },

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP check returned non-2xx status code: {0}")]
    Status(u16),

    #[error("invalid regular expression '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("HTTP response body did not match verify-payload regex '{0}'")]
    PayloadMismatch(String),
}

impl ProbeError {
    /// Cancellation is the expected result of a sibling failing first,
    /// not a failure of this probe.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ProbeError::Cancelled)
    }
}

/// Runs a single probe against the shared cancellation token of a check pass.
#[async_trait]
pub trait ProbeExecutor: Send + Sync + 'static {
    async fn execute(&self, ctx: &CancellationToken, spec: &ProbeSpec) -> Result<(), ProbeError>;
}

/// Production executor: one concrete probe per [`ProbeSpec`] variant.
pub struct Executors {
    tcp: TcpProbe,
    script: ScriptProbe,
    http: HttpProbe,
}

impl Executors {
    pub fn new(timeouts: &TimeoutConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            tcp: TcpProbe::new(timeouts.tcp_dial()),
            script: ScriptProbe::new(timeouts.script()),
            http: HttpProbe::new(timeouts.http_dial())?,
        })
    }
}

#[async_trait]
impl ProbeExecutor for Executors {
    async fn execute(&self, ctx: &CancellationToken, spec: &ProbeSpec) -> Result<(), ProbeError> {
        match spec {
            ProbeSpec::Tcp { address } => self.tcp.run(ctx, address).await,
            ProbeSpec::Script { path, args } => self.script.run(ctx, path, args).await,
            ProbeSpec::Http {
                url,
                verify_payload,
                allow_insecure_tls,
            } => {
                self.http
                    .run(ctx, url, verify_payload.as_deref(), *allow_insecure_tls)
                    .await
            }
        }
    }
}
