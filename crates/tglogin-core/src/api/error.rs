use thiserror::Error;

use crate::models::grant::ErrorBody;

/// Fallback shown when the server rejects a login without saying why.
const GENERIC_AUTH_FAILURE: &str = "Authentication failed";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Request rejected with status {status}: {}", .message.as_deref().unwrap_or("no details"))]
    Rejected { status: u16, message: Option<String> },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in log output
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    /// Build a rejection from a non-2xx reply, picking up the server's
    /// `error` field when the body is JSON.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.error)
            .filter(|m| !m.is_empty());
        ApiError::Rejected {
            status: status.as_u16(),
            message,
        }
    }

    /// Text to put in front of the user after a failed login.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Rejected { message, .. } => message
                .clone()
                .unwrap_or_else(|| GENERIC_AUTH_FAILURE.to_string()),
            ApiError::Network(_) => "Network error".to_string(),
            ApiError::InvalidResponse(_) => "Invalid response from server".to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::InvalidResponse(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_reads_error_field() {
        let err = ApiError::from_status(StatusCode::BAD_REQUEST, r#"{"error": "Token expired"}"#);
        assert_eq!(
            err,
            ApiError::Rejected {
                status: 400,
                message: Some("Token expired".to_string())
            }
        );
        assert_eq!(err.user_message(), "Token expired");
    }

    #[test]
    fn test_from_status_without_json_body() {
        let err = ApiError::from_status(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert_eq!(err.user_message(), "Authentication failed");

        let err = ApiError::from_status(StatusCode::UNAUTHORIZED, r#"{"error": ""}"#);
        assert_eq!(err.user_message(), "Authentication failed");
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(
            ApiError::Network("connection refused".into()).user_message(),
            "Network error"
        );
        assert_eq!(
            ApiError::InvalidResponse("missing field `expires_in`".into()).user_message(),
            "Invalid response from server"
        );
    }

    #[test]
    fn test_truncate_body() {
        let short = "short";
        assert_eq!(ApiError::truncate_body(short), "short");

        let long = "é".repeat(400);
        let truncated = ApiError::truncate_body(&long);
        assert!(truncated.contains("truncated, 800 total bytes"));
    }
}
