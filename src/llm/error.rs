//! Typed errors for model-server calls
//!
//! Lets the orchestrator report upstream status codes without string matching.

use thiserror::Error;

/// Errors from a call to the model server
///
/// - `Upstream` - the server answered with a non-success status
/// - `Network` - connection failed or the request timed out at the socket level
/// - `MalformedResponse` - the body did not have the expected shape
/// - `Other` - catch-all for unhandled errors
#[derive(Debug, Error)]
pub enum LlmError {
    /// Non-success HTTP status from the model server
    #[error("Model server error ({status}): {message}")]
    Upstream { status: u16, message: String },

    /// Connection or transport failure
    #[error("Network error: {0}")]
    Network(String),

    /// Response body could not be parsed
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Other errors not fitting the above categories
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl LlmError {
    /// Convert HTTP status code and error text into typed LlmError
    pub fn from_http_status(status: reqwest::StatusCode, error_text: String) -> Self {
        let message = if error_text.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        } else {
            error_text
        };
        LlmError::Upstream {
            status: status.as_u16(),
            message,
        }
    }

    /// Convert network/connection errors into typed LlmError
    pub fn from_network_error(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Network(format!("Request timeout: {}", e))
        } else if e.is_connect() {
            LlmError::Network(format!("Connection failed: {}", e))
        } else if let Some(status) = e.status() {
            Self::from_http_status(status, e.to_string())
        } else if e.is_decode() {
            LlmError::MalformedResponse(e.to_string())
        } else {
            LlmError::Other(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_http_status_keeps_body() {
        let err = LlmError::from_http_status(
            reqwest::StatusCode::NOT_FOUND,
            r#"{"error":"model 'llama9' not found"}"#.to_string(),
        );
        assert!(matches!(err, LlmError::Upstream { status: 404, .. }));
        assert!(err.to_string().contains("model 'llama9' not found"));
    }

    #[test]
    fn test_from_http_status_empty_body_uses_reason() {
        let err = LlmError::from_http_status(
            reqwest::StatusCode::SERVICE_UNAVAILABLE,
            String::new(),
        );
        assert_eq!(
            err.to_string(),
            "Model server error (503): Service Unavailable"
        );
    }

    #[test]
    fn test_network_error_has_no_status() {
        let err = LlmError::Network("Connection failed".to_string());
        assert!(!matches!(err, LlmError::Upstream { .. }));
        assert_eq!(err.to_string(), "Network error: Connection failed");
    }

    #[test]
    fn test_convert_to_anyhow() {
        let llm_err = LlmError::MalformedResponse("missing message".to_string());
        let anyhow_err: anyhow::Error = llm_err.into();
        assert!(anyhow_err.to_string().contains("missing message"));
    }
}
