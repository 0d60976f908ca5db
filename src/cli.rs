// src/cli.rs
use crate::config::{Config, ConfigError, HttpCheckConfig};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use url::Url;

pub const DEBUG_ENV_VAR: &str = "HEALTH_CHECKER_DEBUG";

/// A simple HTTP server that will return 200 OK if the configured checks are all successful.
#[derive(Debug, Parser)]
#[command(name = "health-checker", version)]
pub struct Cli {
    /// [One of port/script/http required] Port (or HOST:PORT) to open a TCP connection to. Repeatable. Example: 8000
    #[arg(long = "port", value_name = "PORT")]
    pub ports: Vec<String>,

    /// [One of port/script/http required] Script to run, with arguments. Repeatable. Example: "/usr/local/bin/health-check.sh --http-port 8000"
    #[arg(long = "script", value_name = "COMMAND")]
    pub scripts: Vec<String>,

    /// [One of port/script/http required] URL to GET, optionally followed by a regex the body must match. Repeatable. Example: "http://localhost:8000/health ^ok$"
    #[arg(long = "http", value_name = "URL [REGEX]")]
    pub http_checks: Vec<String>,

    /// Skip TLS certificate verification for --http checks.
    #[arg(long)]
    pub allow_insecure_tls: bool,

    /// Timeout, in seconds, to wait for the scripts to complete [default: 5]
    #[arg(long, value_name = "SECS")]
    pub script_timeout: Option<u64>,

    /// Timeout, in seconds, for dialing TCP connections for health checks [default: 5]
    #[arg(long, value_name = "SECS")]
    pub tcp_dial_timeout: Option<u64>,

    /// Timeout, in seconds, for HTTP health check requests [default: 5]
    #[arg(long, value_name = "SECS")]
    pub http_dial_timeout: Option<u64>,

    /// Timeout, in seconds, for reading an inbound request's headers [default: 5]
    #[arg(long, value_name = "SECS")]
    pub http_read_timeout: Option<u64>,

    /// Timeout, in seconds, for producing the response. 0 means script timeout + 5 [default: 0]
    #[arg(long, value_name = "SECS")]
    pub http_write_timeout: Option<u64>,

    /// Timeout, in seconds, before an inactive keep-alive connection is closed [default: 15]
    #[arg(long, value_name = "SECS")]
    pub http_idle_timeout: Option<u64>,

    /// Make concurrent requests share the same check pass.
    #[arg(long)]
    pub singleflight: bool,

    /// Return a JSON payload with elapsed time and the failure messages.
    #[arg(long)]
    pub detailed_status: bool,

    /// The IP address and port on which inbound HTTP connections will be accepted [default: 0.0.0.0:5500]
    #[arg(long, value_name = "ADDR")]
    pub listener: Option<SocketAddr>,

    /// Log level.
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "info",
        value_parser = ["trace", "debug", "info", "warn", "error"]
    )]
    pub log_level: String,

    /// YAML or JSON config file. Flags are merged on top of it.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Serve Prometheus metrics on this port.
    #[arg(long, value_name = "PORT")]
    pub metrics_port: Option<u16>,
}

impl Cli {
    /// Merge the flags onto `base` (a loaded config file, if any).
    pub fn into_config(self, base: Option<Config>) -> Result<Config, ConfigError> {
        let mut config = base.unwrap_or_default();

        config.ports.extend(self.ports);
        config.scripts.extend(self.scripts);
        for raw in &self.http_checks {
            config
                .http_checks
                .push(parse_http_flag(raw, self.allow_insecure_tls)?);
        }

        let timeouts = &mut config.timeouts;
        if let Some(secs) = self.script_timeout {
            timeouts.script_secs = secs;
        }
        if let Some(secs) = self.tcp_dial_timeout {
            timeouts.tcp_dial_secs = secs;
        }
        if let Some(secs) = self.http_dial_timeout {
            timeouts.http_dial_secs = secs;
        }
        if let Some(secs) = self.http_read_timeout {
            timeouts.http_read_secs = secs;
        }
        if let Some(secs) = self.http_write_timeout {
            timeouts.http_write_secs = secs;
        }
        if let Some(secs) = self.http_idle_timeout {
            timeouts.http_idle_secs = secs;
        }

        config.singleflight |= self.singleflight;
        config.detailed_status |= self.detailed_status;

        if let Some(listener) = self.listener {
            config.listener = listener;
        }
        if let Some(port) = self.metrics_port {
            config.metrics.enabled = true;
            config.metrics.port = port;
        }

        Ok(config)
    }
}

/// `URL` or `URL REGEX`; everything after the first whitespace is the regex.
pub fn parse_http_flag(raw: &str, allow_insecure_tls: bool) -> Result<HttpCheckConfig, ConfigError> {
    let raw = raw.trim();
    let (url, pattern) = match raw.split_once(char::is_whitespace) {
        Some((url, pattern)) => (url, Some(pattern.trim())),
        None => (raw, None),
    };

    let url = Url::parse(url).map_err(|err| ConfigError::InvalidHttpCheck(raw.to_string(), err))?;

    Ok(HttpCheckConfig {
        url,
        verify_payload: pattern.filter(|p| !p.is_empty()).map(str::to_string),
        allow_insecure_tls,
    })
}

/// Full error chains are only printed when debug mode is on.
pub fn is_debug_mode() -> bool {
    std::env::var(DEBUG_ENV_VAR)
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
