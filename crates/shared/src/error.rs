//! Shared error types for the REST surface.

use serde_json::Value;
use thiserror::Error;

/// API error type for client-side use.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Deserialization error: {0}")]
    Deserialize(String),
}

impl ApiError {
    /// A user-facing message for this error.
    ///
    /// For HTTP errors, digs the server's message out of the body before
    /// falling back to the raw text.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Http { body, status } => try_error_message(body)
                .unwrap_or_else(|| format!("Request failed with status {status}")),
            other => other.to_string(),
        }
    }
}

/// Attempt to pull a human-readable message out of an error response body.
///
/// The backend is not consistent about its error envelope; the shapes seen
/// in practice are `{"message": ...}`, `{"error": "..."}` and
/// `{"error": {"message": ...}}`.
pub fn try_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;

    if let Some(msg) = value.get("message").and_then(Value::as_str) {
        if !msg.trim().is_empty() {
            return Some(msg.to_string());
        }
    }
    match value.get("error") {
        Some(Value::String(msg)) if !msg.trim().is_empty() => Some(msg.clone()),
        Some(Value::Object(obj)) => obj
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.trim().is_empty())
            .map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_message_from_known_shapes() {
        assert_eq!(
            try_error_message(r#"{"message":"room not found"}"#).as_deref(),
            Some("room not found")
        );
        assert_eq!(
            try_error_message(r#"{"error":"forbidden"}"#).as_deref(),
            Some("forbidden")
        );
        assert_eq!(
            try_error_message(r#"{"error":{"message":"token expired"}}"#).as_deref(),
            Some("token expired")
        );
    }

    #[test]
    fn falls_back_on_unknown_bodies() {
        assert_eq!(try_error_message("<html>502</html>"), None);
        assert_eq!(try_error_message(r#"{"message":"  "}"#), None);

        let err = ApiError::Http { status: 502, body: "<html>502</html>".into() };
        assert_eq!(err.user_message(), "Request failed with status 502");
    }
}
