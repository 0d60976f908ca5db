// src/probe/http.rs
use super::ProbeError;
use regex::bytes::Regex;
use reqwest::Client;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

/// HTTP(S) GET probe with optional payload verification.
///
/// Both clients are built once so keep-alive connections are reused across
/// check passes.
pub struct HttpProbe {
    client: Client,
    insecure_client: Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        let insecure_client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(true)
            .build()?;

        Ok(Self {
            client,
            insecure_client,
        })
    }

    pub async fn run(
        &self,
        ctx: &CancellationToken,
        url: &Url,
        verify_payload: Option<&str>,
        allow_insecure_tls: bool,
    ) -> Result<(), ProbeError> {
        debug!(%url, "attempting HTTP check");

        let client = if allow_insecure_tls {
            &self.insecure_client
        } else {
            &self.client
        };
        let verify_payload = verify_payload.filter(|p| !p.is_empty());

        tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(ProbeError::Cancelled),
            result = check(client, url, verify_payload) => result,
        }
    }
}

async fn check(client: &Client, url: &Url, verify_payload: Option<&str>) -> Result<(), ProbeError> {
    let mut response = client.get(url.clone()).send().await?;
    let status = response.status();

    // The body is only buffered when it has to be matched; otherwise it is
    // drained so the connection can go back to the pool.
    let body = match verify_payload {
        Some(_) => Some(response.bytes().await?),
        None => {
            while let Ok(Some(_)) = response.chunk().await {}
            None
        }
    };

    if !status.is_success() {
        return Err(ProbeError::Status(status.as_u16()));
    }

    if let (Some(pattern), Some(body)) = (verify_payload, body) {
        let regex = Regex::new(pattern).map_err(|source| ProbeError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        if !regex.is_match(&body) {
            return Err(ProbeError::PayloadMismatch(pattern.to_string()));
        }
    }

    Ok(())
}
