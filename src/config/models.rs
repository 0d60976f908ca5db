// src/config/models.rs
use super::error::ConfigError;
use super::script::parse_scripts;
use crate::probe::ProbeSpec;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub ports: Vec<String>,
    #[serde(default)]
    pub scripts: Vec<String>,
    #[serde(default)]
    pub http_checks: Vec<HttpCheckConfig>,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub singleflight: bool,
    #[serde(default)]
    pub detailed_status: bool,
    #[serde(default = "default_listener")]
    pub listener: SocketAddr,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ports: Vec::new(),
            scripts: Vec::new(),
            http_checks: Vec::new(),
            timeouts: TimeoutConfig::default(),
            singleflight: false,
            detailed_status: false,
            listener: default_listener(),
            metrics: MetricsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HttpCheckConfig {
    pub url: Url,
    #[serde(default)]
    pub verify_payload: Option<String>,
    #[serde(default)]
    pub allow_insecure_tls: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_script_secs")]
    pub script_secs: u64,
    #[serde(default = "default_dial_secs")]
    pub tcp_dial_secs: u64,
    #[serde(default = "default_dial_secs")]
    pub http_dial_secs: u64,
    #[serde(default = "default_read_secs")]
    pub http_read_secs: u64,
    /// 0 means "script timeout plus 5 seconds".
    #[serde(default)]
    pub http_write_secs: u64,
    #[serde(default = "default_idle_secs")]
    pub http_idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            script_secs: default_script_secs(),
            tcp_dial_secs: default_dial_secs(),
            http_dial_secs: default_dial_secs(),
            http_read_secs: default_read_secs(),
            http_write_secs: 0,
            http_idle_secs: default_idle_secs(),
        }
    }
}

impl TimeoutConfig {
    pub fn script(&self) -> Duration {
        Duration::from_secs(self.script_secs)
    }

    pub fn tcp_dial(&self) -> Duration {
        or_default(self.tcp_dial_secs, default_dial_secs())
    }

    pub fn http_dial(&self) -> Duration {
        or_default(self.http_dial_secs, default_dial_secs())
    }

    pub fn http_read(&self) -> Duration {
        or_default(self.http_read_secs, default_read_secs())
    }

    /// Must leave room for the scripts to run plus time to render the response.
    pub fn http_write(&self) -> Duration {
        or_default(self.http_write_secs, self.script_secs + 5)
    }

    pub fn http_idle(&self) -> Duration {
        or_default(self.http_idle_secs, default_idle_secs())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
            path: default_metrics_path(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ports.is_empty() && self.scripts.is_empty() && self.http_checks.is_empty() {
            return Err(ConfigError::NoProbes);
        }

        for port in &self.ports {
            validate_port(port)?;
        }

        Ok(())
    }

    /// Validate and build the immutable probe set shared by every check pass.
    pub fn probe_specs(&self) -> Result<Arc<[ProbeSpec]>, ConfigError> {
        self.validate()?;

        let scripts = parse_scripts(&self.scripts)?;

        let mut specs = Vec::with_capacity(
            self.ports.len() + scripts.len() + self.http_checks.len(),
        );
        specs.extend(self.ports.iter().map(|address| ProbeSpec::Tcp {
            address: address.clone(),
        }));
        specs.extend(scripts.into_iter().map(|script| ProbeSpec::Script {
            path: script.path,
            args: script.args,
        }));
        specs.extend(self.http_checks.iter().map(|check| ProbeSpec::Http {
            url: check.url.clone(),
            verify_payload: check.verify_payload.clone(),
            allow_insecure_tls: check.allow_insecure_tls,
        }));

        Ok(specs.into())
    }
}

fn validate_port(raw: &str) -> Result<(), ConfigError> {
    let port = match raw.rsplit_once(':') {
        Some((_, port)) => port,
        None => raw,
    };

    match port.parse::<u16>() {
        Ok(p) if p != 0 => Ok(()),
        _ => Err(ConfigError::InvalidPort(raw.to_string())),
    }
}

fn or_default(secs: u64, fallback: u64) -> Duration {
    Duration::from_secs(if secs == 0 { fallback } else { secs })
}

fn default_listener() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5500))
}

fn default_script_secs() -> u64 {
    5
}

fn default_dial_secs() -> u64 {
    5
}

fn default_read_secs() -> u64 {
    5
}

fn default_idle_secs() -> u64 {
    15
}

fn default_metrics_port() -> u16 {
    9100
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScriptError;

    #[test]
    fn test_empty_probe_set_is_rejected() {
        let config = Config::default();
        assert!(matches!(config.validate(), Err(ConfigError::NoProbes)));
    }

    #[test]
    fn test_port_forms() {
        for ok in ["8080", "localhost:8080", "10.0.0.1:22", "[::1]:443", ":9000"] {
            assert!(validate_port(ok).is_ok(), "{} should be accepted", ok);
        }
        for bad in ["", "http", "host:", "host:99999", "0"] {
            assert!(validate_port(bad).is_err(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn test_write_timeout_scales_with_script_timeout() {
        let mut timeouts = TimeoutConfig::default();
        assert_eq!(timeouts.http_write(), Duration::from_secs(10));

        timeouts.script_secs = 30;
        assert_eq!(timeouts.http_write(), Duration::from_secs(35));

        timeouts.http_write_secs = 3;
        assert_eq!(timeouts.http_write(), Duration::from_secs(3));
    }

    #[test]
    fn test_probe_specs_cover_every_kind() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("ok.sh");
        std::fs::write(&script, "exit 0\n").unwrap();

        let config = Config {
            ports: vec!["8080".to_string()],
            scripts: vec![format!("{} --quick", script.display())],
            http_checks: vec![HttpCheckConfig {
                url: Url::parse("http://localhost:9000/health").unwrap(),
                verify_payload: Some("ok".to_string()),
                allow_insecure_tls: false,
            }],
            ..Config::default()
        };

        let specs = config.probe_specs().unwrap();
        assert_eq!(specs.len(), 3);
        assert!(matches!(&specs[0], ProbeSpec::Tcp { address } if address == "8080"));
        assert!(matches!(&specs[1], ProbeSpec::Script { args, .. } if args == &["--quick"]));
        assert!(matches!(&specs[2], ProbeSpec::Http { verify_payload: Some(p), .. } if p == "ok"));
    }

    #[test]
    fn test_probe_specs_abort_on_bad_script() {
        let config = Config {
            scripts: vec!["check.sh; reboot".to_string()],
            ..Config::default()
        };

        assert!(matches!(
            config.probe_specs(),
            Err(ConfigError::Script(ScriptError::Sanitization(_)))
        ));
    }
}
