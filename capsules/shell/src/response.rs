use crate::attributes::ShellRuntimeConfig;
use crate::error::InvocationError;
use serde::Serialize;
use std::collections::BTreeMap;

pub const STATUS_OK: u16 = 200;

/// Outcome of one invocation, ready for the trigger to write back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationResult {
    pub status: u16,
    pub body: Vec<u8>,
    pub headers: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct ErrorResponse<'a> {
    error: String,
    code: &'a str,
}

impl InvocationResult {
    /// Error result for a failed invocation. Static response headers are not applied.
    pub fn from_error(error: &InvocationError) -> Self {
        let payload = ErrorResponse {
            error: error.to_string(),
            code: error.code(),
        };
        let body = serde_json::to_vec(&payload).unwrap_or_else(|_| error.to_string().into_bytes());

        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());

        Self {
            status: error.status(),
            body,
            headers,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Successful result: stdout verbatim plus the function's static headers.
pub fn compose(config: &ShellRuntimeConfig, stdout: Vec<u8>) -> InvocationResult {
    InvocationResult {
        status: STATUS_OK,
        body: stdout,
        headers: config.response_headers().clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{validate, RuntimeAttributes};
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn compose_keeps_body_and_applies_static_headers() {
        let mut raw = RuntimeAttributes::new();
        raw.insert(
            "responseHeaders".to_string(),
            json!({"header1": "value1", "header2": "value2"}),
        );
        let config = validate(&raw).unwrap();

        let result = compose(&config, b"123456\n".to_vec());
        assert_eq!(result.status, 200);
        assert_eq!(result.body, b"123456\n");
        assert_eq!(result.headers.get("header1").map(String::as_str), Some("value1"));
        assert_eq!(result.headers.get("header2").map(String::as_str), Some("value2"));
        assert!(result.is_success());
    }

    #[test]
    fn error_result_is_json_without_static_headers() {
        let result = InvocationResult::from_error(&InvocationError::Timeout {
            timeout: Duration::from_secs(1),
        });
        assert_eq!(result.status, 504);
        assert!(!result.is_success());
        assert_eq!(result.headers.len(), 1);

        let body: serde_json::Value = serde_json::from_slice(&result.body).unwrap();
        assert_eq!(body["code"], "SHELL_TIMEOUT");
        assert_eq!(body["error"], "Handler timed out after 1000ms");
    }
}
