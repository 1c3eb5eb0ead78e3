use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::auth::StoreError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unauthorized - token may be expired")]
    Unauthorized,

    #[error("Session expired: {0}")]
    SessionExpired(String),

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),

    #[error("Token storage error: {0}")]
    TokenStore(#[from] StoreError),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            400 => ApiError::Validation(ValidationErrors::parse(body)),
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(truncated),
            404 => ApiError::NotFound(truncated),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    /// Authorization was denied and not recovered by a renewal
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::Unauthorized | ApiError::AccessDenied(_))
    }

    /// Human-readable message for a failed `action` ("load rooms",
    /// "cancel reservation", ...). Safe to show to the user.
    pub fn user_message(&self, action: &str) -> String {
        match self {
            ApiError::NetworkError(_) | ApiError::Timeout(_) => {
                "Unable to connect to server. Check your connection.".to_string()
            }
            ApiError::Validation(errors) => errors.to_string(),
            ApiError::SessionExpired(_) => "Session expired. Please log in again.".to_string(),
            _ => format!("Failed to {}.", action),
        }
    }

    /// Message for a failed login attempt
    pub fn login_message(&self) -> String {
        match self {
            ApiError::Unauthorized => "Invalid username or password".to_string(),
            ApiError::Validation(errors) => errors.to_string(),
            ApiError::Timeout(_) => "Connection timed out. Please try again.".to_string(),
            ApiError::NetworkError(e) if e.is_timeout() => {
                "Connection timed out. Please try again.".to_string()
            }
            other => other.user_message("log in"),
        }
    }
}

/// One message from a validation failure. `field` is `None` for errors that
/// apply to the whole request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: Option<String>,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.field {
            Some(ref field) => write!(f, "{}: {}", field, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Field-level validation messages, from the server's 400 body or from the
/// client-side checks run before a request is sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

/// Keys that carry request-wide messages rather than a field name
const NON_FIELD_KEYS: [&str; 2] = ["detail", "non_field_errors"];

impl ValidationErrors {
    pub fn push(&mut self, field: Option<&str>, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.map(str::to_string),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// `Ok(())` when nothing was recorded
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Parse an error body of the shapes the API produces:
    /// `{"detail": "..."}`, `{"field": ["msg", ...]}`, `{"field": "msg"}`,
    /// `["msg", ...]` or plain text.
    pub fn parse(body: &str) -> Self {
        let mut errors = Self::default();
        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) => {
                for (key, value) in map {
                    let field = (!NON_FIELD_KEYS.contains(&key.as_str())).then_some(key.as_str());
                    for message in collect_messages(&value) {
                        errors.push(field, message);
                    }
                }
            }
            Ok(value @ (Value::Array(_) | Value::String(_))) => {
                for message in collect_messages(&value) {
                    errors.push(None, message);
                }
            }
            _ if !body.trim().is_empty() => errors.push(None, ApiError::truncate_body(body.trim())),
            _ => {}
        }

        if errors.is_empty() {
            errors.push(None, "Invalid request.");
        }
        errors
    }
}

fn collect_messages(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items.iter().flat_map(collect_messages).collect(),
        Value::Object(map) => map
            .iter()
            .flat_map(|(key, nested)| {
                collect_messages(nested)
                    .into_iter()
                    .map(move |m| format!("{}: {}", key, m))
            })
            .collect(),
        Value::Null => Vec::new(),
        other => vec![other.to_string()],
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", error)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_mapping() {
        let status = |code: StatusCode| ApiError::from_status(code, "{}");

        assert!(matches!(status(StatusCode::UNAUTHORIZED), ApiError::Unauthorized));
        assert!(matches!(status(StatusCode::FORBIDDEN), ApiError::AccessDenied(_)));
        assert!(matches!(status(StatusCode::NOT_FOUND), ApiError::NotFound(_)));
        assert!(matches!(status(StatusCode::TOO_MANY_REQUESTS), ApiError::RateLimited));
        assert!(matches!(status(StatusCode::BAD_GATEWAY), ApiError::ServerError(_)));
        assert!(matches!(status(StatusCode::BAD_REQUEST), ApiError::Validation(_)));
        assert!(matches!(status(StatusCode::IM_A_TEAPOT), ApiError::InvalidResponse(_)));
    }

    #[test]
    fn test_truncate_body() {
        let long = "x".repeat(MAX_ERROR_BODY_LENGTH + 20);
        let truncated = ApiError::truncate_body(&long);
        assert!(truncated.starts_with(&"x".repeat(MAX_ERROR_BODY_LENGTH)));
        assert!(truncated.ends_with("(truncated, 520 total bytes)"));

        // Never splits a multi-byte character
        let accents = "é".repeat(MAX_ERROR_BODY_LENGTH);
        assert!(ApiError::truncate_body(&accents).contains("truncated"));
    }

    #[test]
    fn test_parse_field_errors() {
        let errors = ValidationErrors::parse(
            r#"{"password": ["This password is too short.", "This password is too common."], "username": "A user with that username already exists."}"#,
        );
        assert_eq!(
            errors.to_string(),
            "password: This password is too short.; password: This password is too common.; username: A user with that username already exists."
        );
        assert_eq!(errors.errors().len(), 3);
    }

    #[test]
    fn test_parse_non_field_errors() {
        let errors = ValidationErrors::parse(
            r#"{"non_field_errors": ["Overlapping reservation exists for this room, date, and time."]}"#,
        );
        assert_eq!(
            errors.to_string(),
            "Overlapping reservation exists for this room, date, and time."
        );

        let errors = ValidationErrors::parse(r#"{"detail": "Only staff can approve."}"#);
        assert_eq!(errors.errors()[0].field, None);
    }

    #[test]
    fn test_parse_list_and_plain_bodies() {
        assert_eq!(
            ValidationErrors::parse(r#"["start_time must be before end_time."]"#).to_string(),
            "start_time must be before end_time."
        );
        assert_eq!(ValidationErrors::parse("Bad Request").to_string(), "Bad Request");
        assert_eq!(ValidationErrors::parse("").to_string(), "Invalid request.");
        assert_eq!(ValidationErrors::parse("{}").to_string(), "Invalid request.");
    }

    #[test]
    fn test_parse_nested_objects() {
        let errors = ValidationErrors::parse(r#"{"room": {"id": ["Invalid pk."]}}"#);
        assert_eq!(errors.to_string(), "room: id: Invalid pk.");
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(
            ApiError::Unauthorized.user_message("load reservations"),
            "Failed to load reservations."
        );
        assert_eq!(
            ApiError::SessionExpired("refresh rejected".into()).user_message("load rooms"),
            "Session expired. Please log in again."
        );

        let mut errors = ValidationErrors::default();
        errors.push(Some("title"), "This field may not be blank.");
        assert_eq!(
            ApiError::Validation(errors).user_message("create reservation"),
            "title: This field may not be blank."
        );
        assert_eq!(ApiError::Unauthorized.login_message(), "Invalid username or password");
        assert_eq!(
            ApiError::Timeout(30).login_message(),
            "Connection timed out. Please try again."
        );
        assert!(ApiError::Unauthorized.is_auth_failure());
        assert!(!ApiError::RateLimited.is_auth_failure());
    }

    #[test]
    fn test_network_errors_read_as_connection_problems() {
        // A request that fails before reaching the network still surfaces as a reqwest error
        let err = reqwest::Client::new().get("not a url").build().unwrap_err();
        let err = ApiError::from(err);

        assert!(matches!(err, ApiError::NetworkError(_)));
        assert_eq!(
            err.user_message("load rooms"),
            "Unable to connect to server. Check your connection."
        );
        assert_eq!(
            ApiError::Timeout(30).user_message("load rooms"),
            "Unable to connect to server. Check your connection."
        );
    }
}
