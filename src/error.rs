// src/error.rs

use serde_json::Value;

/// Client-side view of everything that can go wrong talking to the clinic
/// API. Non-2xx responses map onto the server's `{ "error": { code, message } }`
/// body; older endpoints answer with a flat `{"error": "..."}` or
/// `{"message": "..."}`, so the parse is tolerant.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("{code}: {message}")]
    Validation { code: String, message: String },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("server error: {0}")]
    Server(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("unreadable response: {0}")]
    Decode(String),
    #[error("unexpected status {status}: {message}")]
    Unexpected { status: u16, message: String },
    #[error("session expired")]
    SessionExpired,
}

impl ApiError {
    /// Map a non-2xx status plus its raw body to the taxonomy.
    pub fn from_response(status: u16, body: &str) -> Self {
        let (code, message) = parse_error_body(body, status);
        match status {
            400 => ApiError::Validation { code, message },
            401 => ApiError::Unauthorized(message),
            403 => ApiError::Forbidden(message),
            404 => ApiError::NotFound(message),
            409 => ApiError::Conflict(message),
            500..=599 => ApiError::Server(message),
            _ => ApiError::Unexpected { status, message },
        }
    }

    /// A 400 complaining that the appointment is already cancelled is a
    /// benign race between two operators, not a failure.
    pub fn is_already_cancelled(&self) -> bool {
        match self {
            ApiError::Validation { message, .. } => {
                message.contains("ya está cancelada") || message.contains("cancelled")
            }
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

fn parse_error_body(body: &str, status: u16) -> (String, String) {
    let fallback_code = || format!("HTTP_{status}");
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return (fallback_code(), default_message(body, status));
    };

    // { "error": { "code": ..., "message": ... } }
    if let Some(obj) = value.get("error").and_then(Value::as_object) {
        let code = obj
            .get("code")
            .and_then(Value::as_str)
            .unwrap_or("VALIDATION_ERROR")
            .to_string();
        let message = obj
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| default_message(body, status));
        return (code, message);
    }

    // { "error": "..." } or { "message": "..." }
    for key in ["error", "message"] {
        if let Some(msg) = value.get(key).and_then(Value::as_str) {
            return (fallback_code(), msg.to_string());
        }
    }

    (fallback_code(), default_message(body, status))
}

fn default_message(body: &str, status: u16) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("Error {status}")
    } else {
        trimmed.chars().take(200).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_error_body() {
        let err = ApiError::from_response(
            400,
            r#"{"error":{"code":"VALIDATION_ERROR","message":"cancellation_reason is required"}}"#,
        );
        match err {
            ApiError::Validation { code, message } => {
                assert_eq!(code, "VALIDATION_ERROR");
                assert_eq!(message, "cancellation_reason is required");
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn test_flat_error_body() {
        let err = ApiError::from_response(400, r#"{"error":"La cita ya está cancelada"}"#);
        assert!(err.is_already_cancelled());
    }

    #[test]
    fn test_message_only_body() {
        let err = ApiError::from_response(400, r#"{"message":"appointment already cancelled"}"#);
        assert!(err.is_already_cancelled());
    }

    #[test]
    fn test_other_400_is_not_already_cancelled() {
        let err = ApiError::from_response(400, r#"{"error":"motivo requerido"}"#);
        assert!(!err.is_already_cancelled());
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            ApiError::from_response(409, r#"{"error":"duplicate license_number"}"#),
            ApiError::Conflict(_)
        ));
        assert!(matches!(
            ApiError::from_response(500, ""),
            ApiError::Server(_)
        ));
        assert!(matches!(
            ApiError::from_response(404, "not found"),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from_response(418, "teapot"),
            ApiError::Unexpected { status: 418, .. }
        ));
    }

    #[test]
    fn test_unparseable_body_still_maps() {
        let err = ApiError::from_response(500, "<html>Internal Server Error</html>");
        assert!(matches!(err, ApiError::Server(_)));
    }
}
