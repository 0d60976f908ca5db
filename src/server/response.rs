// src/server/response.rs
use crate::health::CheckResult;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Body, Response, StatusCode};
use serde::Serialize;

pub const STATUS_OK: &str = "OK";
pub const STATUS_FAILED: &str = "At least one health check failed";

const TEXT_PLAIN: &str = "text/plain";
const APPLICATION_JSON: &str = "application/json";

/// The whole contract with the transport: status, content type and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: String,
}

/// Body of a `--detailed-status` response.
#[derive(Debug, Serialize)]
pub struct DetailedStatus<'a> {
    pub status: &'a str,
    pub elapsed_time: String,
    #[serde(skip_serializing_if = "no_errors")]
    pub errors: &'a [String],
}

fn no_errors(errors: &&[String]) -> bool {
    errors.is_empty()
}

pub fn render(result: &CheckResult, detailed: bool) -> HealthResponse {
    let (status, text) = if result.succeeded {
        (StatusCode::OK, STATUS_OK)
    } else {
        (StatusCode::GATEWAY_TIMEOUT, STATUS_FAILED)
    };

    if !detailed {
        return HealthResponse {
            status,
            content_type: TEXT_PLAIN,
            body: text.to_string(),
        };
    }

    let payload = DetailedStatus {
        status: text,
        elapsed_time: format!("{:?}", result.elapsed),
        errors: &result.failures,
    };
    let body = serde_json::to_string(&payload).unwrap_or_else(|err| {
        tracing::warn!(%err, "Failed to marshal detailed status JSON");
        r#"{"status":"error_marshalling_json"}"#.to_string()
    });

    HealthResponse {
        status,
        content_type: APPLICATION_JSON,
        body,
    }
}

/// Response for a check that could not finish within the write timeout.
pub fn timed_out() -> HealthResponse {
    HealthResponse {
        status: StatusCode::GATEWAY_TIMEOUT,
        content_type: TEXT_PLAIN,
        body: "health check timed out".to_string(),
    }
}

impl From<HealthResponse> for Response<Body> {
    fn from(resp: HealthResponse) -> Self {
        let mut response = Response::new(Body::from(resp.body));
        *response.status_mut() = resp.status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(resp.content_type));
        response
    }
}
