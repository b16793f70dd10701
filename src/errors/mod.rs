//! Error handling module for the MUA client core.
//!
//! Provides a single error type with stable codes, plus the decoded form of the
//! backend's failure envelope.

use serde::{Deserialize, Serialize};

/// Error codes as constants to avoid stringly-typed errors.
#[allow(dead_code)]
pub mod codes {
    pub const UNAUTHENTICATED: &str = "UNAUTHENTICATED";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const HTTP_ERROR: &str = "HTTP_ERROR";
    pub const TRANSPORT_ERROR: &str = "TRANSPORT_ERROR";
    pub const DECODE_ERROR: &str = "DECODE_ERROR";
    pub const API_ERROR: &str = "API_ERROR";
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Client error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// No viewer is signed in; the caller should redirect to login
    Unauthenticated,
    /// Resource not found
    NotFound(String),
    /// Input rejected before dispatch
    Validation(String),
    /// Non-success HTTP status
    Http { status: u16, message: String },
    /// Connection, TLS or timeout failure
    Transport(String),
    /// Body could not be decoded
    Decode(String),
    /// Envelope reported `success: false`
    Api(String),
    /// Session storage could not be read or written
    Storage(String),
    /// Anything else
    Internal(String),
}

impl ClientError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            ClientError::Unauthenticated => codes::UNAUTHENTICATED,
            ClientError::NotFound(_) => codes::NOT_FOUND,
            ClientError::Validation(_) => codes::VALIDATION_ERROR,
            ClientError::Http { .. } => codes::HTTP_ERROR,
            ClientError::Transport(_) => codes::TRANSPORT_ERROR,
            ClientError::Decode(_) => codes::DECODE_ERROR,
            ClientError::Api(_) => codes::API_ERROR,
            ClientError::Storage(_) => codes::STORAGE_ERROR,
            ClientError::Internal(_) => codes::INTERNAL_ERROR,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            ClientError::Unauthenticated => "Login required".to_string(),
            ClientError::NotFound(msg) => msg.clone(),
            ClientError::Validation(msg) => msg.clone(),
            ClientError::Http { status, message } => format!("HTTP {}: {}", status, message),
            ClientError::Transport(msg) => msg.clone(),
            ClientError::Decode(msg) => msg.clone(),
            ClientError::Api(msg) => msg.clone(),
            ClientError::Storage(msg) => msg.clone(),
            ClientError::Internal(msg) => msg.clone(),
        }
    }

    /// Map an HTTP status and server message into the matching variant.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 => ClientError::Unauthenticated,
            404 => ClientError::NotFound(message),
            400 | 422 => ClientError::Validation(message),
            _ => ClientError::Http { status, message },
        }
    }
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for ClientError {}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        tracing::error!("HTTP client error: {:?}", err);
        if err.is_decode() {
            return ClientError::Decode(format!("Decode error: {}", err));
        }
        match err.status() {
            Some(status) => ClientError::from_status(status.as_u16(), err.to_string()),
            None => ClientError::Transport(format!("Transport error: {}", err)),
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON error: {:?}", err);
        ClientError::Decode(format!("JSON error: {}", err))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        tracing::error!("Push channel error: {:?}", err);
        ClientError::Transport(format!("Push channel error: {}", err))
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        tracing::error!("Storage error: {:?}", err);
        ClientError::Storage(format!("Storage error: {}", err))
    }
}

/// Result alias used across the crate.
pub type ClientResult<T> = Result<T, ClientError>;

/// Failure envelope as sent by the backend: `{ success: false, message }`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorEnvelope {
    pub fn into_error(self, status: u16) -> ClientError {
        let message = self
            .message
            .unwrap_or_else(|| "Request failed".to_string());
        ClientError::from_status(status, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ClientError::from_status(401, "nope"),
            ClientError::Unauthenticated
        );
        assert_eq!(
            ClientError::from_status(404, "gone"),
            ClientError::NotFound("gone".to_string())
        );
        assert_eq!(ClientError::from_status(500, "boom").error_code(), codes::HTTP_ERROR);
    }

    #[test]
    fn test_display_includes_code() {
        let err = ClientError::Validation("Content is required".to_string());
        assert_eq!(err.to_string(), "VALIDATION_ERROR: Content is required");
    }

    #[test]
    fn test_error_envelope_default_message() {
        let env: ErrorEnvelope = serde_json::from_str(r#"{"success":false}"#).unwrap();
        assert_eq!(
            env.into_error(503),
            ClientError::Http {
                status: 503,
                message: "Request failed".to_string()
            }
        );
    }
}
