use actix_web::http::StatusCode;
use serde::{Serialize, Serializer};
use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Boxed error accepted as the cause of an [`AppError`]
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Result type used across the registry
pub type AppResult<T> = Result<T, AppError>;

/// Numeric error codes shared by every service in the platform
///
/// Codes are grouped by thousands: the first code of a group is the generic
/// one, the following codes refine it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorCode {
    Success = 0,
    Internal = 1000,
    Database = 2000,
    Auth = 3000,
    Unauthorized = 3001,
    Forbidden = 3002,
    Service = 4000,
    Timeout = 4001,
    RateLimit = 4002,
    Validation = 5000,
    NotFound = 5001,
    AlreadyExists = 5002,
    Network = 6000,
    Config = 7000,
    File = 8000,
    Business = 9000,
}

impl ErrorCode {
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Default human readable message for the code
    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::Success => "operation succeeded",
            ErrorCode::Internal => "internal error",
            ErrorCode::Database => "database error",
            ErrorCode::Auth => "authentication error",
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::Forbidden => "forbidden",
            ErrorCode::Service => "service error",
            ErrorCode::Timeout => "request timed out",
            ErrorCode::RateLimit => "rate limit exceeded",
            ErrorCode::Validation => "validation error",
            ErrorCode::NotFound => "resource not found",
            ErrorCode::AlreadyExists => "resource already exists",
            ErrorCode::Network => "network error",
            ErrorCode::Config => "configuration error",
            ErrorCode::File => "file error",
            ErrorCode::Business => "business rule violated",
        }
    }

    /// HTTP status an error with this code is reported as
    pub fn http_status(self) -> StatusCode {
        match self {
            ErrorCode::Success => StatusCode::OK,
            ErrorCode::Auth | ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::Service => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::Timeout => StatusCode::REQUEST_TIMEOUT,
            ErrorCode::RateLimit => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::Validation => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::AlreadyExists => StatusCode::CONFLICT,
            ErrorCode::Network => StatusCode::BAD_GATEWAY,
            ErrorCode::Business => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::Internal | ErrorCode::Database | ErrorCode::Config | ErrorCode::File => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u32())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.as_u32())
    }
}

/// Platform error carrying a code, a message and optional context
#[derive(Debug, Error)]
#[error("[{code}] {message}{}", cause_suffix(.cause))]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
    #[source]
    pub cause: Option<BoxError>,
}

fn cause_suffix(cause: &Option<BoxError>) -> String {
    match cause {
        Some(cause) => format!(": {}", cause),
        None => String::new(),
    }
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            cause: None,
        }
    }

    pub fn with_details(
        code: ErrorCode,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            details: Some(details.into()),
            cause: None,
        }
    }

    /// Wrap a lower-level error, keeping it reachable through `source()`
    pub fn wrap(code: ErrorCode, message: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            cause: Some(cause.into()),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Validation, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Config, message)
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.http_status()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .iter()
            .map(|(field, errors)| {
                let messages: Vec<String> = errors
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect();
                format!("{}: {}", field, messages.join(", "))
            })
            .collect();
        fields.sort();

        AppError::with_details(ErrorCode::Validation, "validation failed", fields.join("; "))
    }
}

/// Whether an arbitrary error is an [`AppError`]
pub fn is_app_error(err: &(dyn StdError + 'static)) -> bool {
    err.downcast_ref::<AppError>().is_some()
}

/// Code of an [`AppError`], `Internal` for anything else
pub fn error_code(err: &(dyn StdError + 'static)) -> ErrorCode {
    err.downcast_ref::<AppError>()
        .map(|e| e.code)
        .unwrap_or(ErrorCode::Internal)
}

/// Details of an [`AppError`], the display string for anything else
pub fn error_details(err: &(dyn StdError + 'static)) -> String {
    match err.downcast_ref::<AppError>() {
        Some(app_err) => app_err.details.clone().unwrap_or_default(),
        None => err.to_string(),
    }
}

/// JSON body returned for every failed request
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<serde_json::Value>,
    pub request_id: String,
    pub path: String,
    pub method: String,
}

impl ErrorResponse {
    pub fn from_error(
        err: &AppError,
        request_id: impl Into<String>,
        path: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            code: err.code,
            message: err.message.clone(),
            details: err.details.clone(),
            fields: None,
            request_id: request_id.into(),
            path: path.into(),
            method: method.into(),
        }
    }

    pub fn with_fields(mut self, fields: serde_json::Value) -> Self {
        self.fields = Some(fields);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use validator::Validate;

    #[test]
    fn codes_have_default_messages() {
        let cases = [
            (ErrorCode::Success, "operation succeeded"),
            (ErrorCode::Database, "database error"),
            (ErrorCode::Auth, "authentication error"),
            (ErrorCode::Validation, "validation error"),
            (ErrorCode::Service, "service error"),
            (ErrorCode::Network, "network error"),
            (ErrorCode::Config, "configuration error"),
            (ErrorCode::File, "file error"),
            (ErrorCode::Business, "business rule violated"),
        ];

        for (code, expected) in cases {
            assert_eq!(code.message(), expected, "message for {}", code);
        }
    }

    #[test]
    fn codes_map_to_http_status() {
        let cases = [
            (ErrorCode::Success, StatusCode::OK),
            (ErrorCode::Database, StatusCode::INTERNAL_SERVER_ERROR),
            (ErrorCode::Unauthorized, StatusCode::UNAUTHORIZED),
            (ErrorCode::Forbidden, StatusCode::FORBIDDEN),
            (ErrorCode::Validation, StatusCode::BAD_REQUEST),
            (ErrorCode::NotFound, StatusCode::NOT_FOUND),
            (ErrorCode::AlreadyExists, StatusCode::CONFLICT),
            (ErrorCode::Timeout, StatusCode::REQUEST_TIMEOUT),
            (ErrorCode::RateLimit, StatusCode::TOO_MANY_REQUESTS),
            (ErrorCode::Network, StatusCode::BAD_GATEWAY),
        ];

        for (code, expected) in cases {
            assert_eq!(code.http_status(), expected, "status for {}", code);
        }
    }

    #[test]
    fn constructors_fill_fields() {
        let err = AppError::new(ErrorCode::Database, "connection refused");
        assert_eq!(err.code, ErrorCode::Database);
        assert_eq!(err.message, "connection refused");
        assert!(err.details.is_none());

        let err = AppError::with_details(ErrorCode::Validation, "bad input", "name is empty");
        assert_eq!(err.details.as_deref(), Some("name is empty"));
    }

    #[test]
    fn wrapped_error_keeps_cause_and_formats_it() {
        let cause = io::Error::new(io::ErrorKind::Other, "upstream refused");
        let err = AppError::wrap(ErrorCode::Service, "service call failed", cause);

        let source = err.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("upstream refused"));
        assert_eq!(err.to_string(), "[4000] service call failed: upstream refused");
    }

    #[test]
    fn display_without_cause_has_no_suffix() {
        let err = AppError::not_found("service api-1 not found");
        assert_eq!(err.to_string(), "[5001] service api-1 not found");
    }

    #[test]
    fn recognises_app_errors() {
        let app_err = AppError::new(ErrorCode::Database, "database error");
        assert!(is_app_error(&app_err));

        let plain = io::Error::new(io::ErrorKind::Other, "plain error");
        assert!(!is_app_error(&plain));
    }

    #[test]
    fn foreign_errors_report_internal_code() {
        let app_err = AppError::new(ErrorCode::Auth, "authentication failed");
        assert_eq!(error_code(&app_err), ErrorCode::Auth);

        let plain = io::Error::new(io::ErrorKind::Other, "plain error");
        assert_eq!(error_code(&plain), ErrorCode::Internal);
    }

    #[test]
    fn details_fall_back_to_display() {
        let app_err = AppError::with_details(ErrorCode::Validation, "failed", "more context");
        assert_eq!(error_details(&app_err), "more context");

        let plain = io::Error::new(io::ErrorKind::Other, "plain error");
        assert_eq!(error_details(&plain), "plain error");
    }

    #[test]
    fn error_response_serializes_numeric_code() {
        let err = AppError::with_details(ErrorCode::Database, "connection failed", "timeout");
        let response = ErrorResponse::from_error(&err, "test-request-id", "/api/test", "GET");

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["code"], 2000);
        assert_eq!(json["request_id"], "test-request-id");
        assert_eq!(json["details"], "timeout");
        assert!(json.get("fields").is_none());
    }

    #[derive(Validate)]
    struct Sample {
        #[validate(length(min = 1, message = "must not be empty"))]
        name: String,
    }

    #[test]
    fn validation_errors_convert_with_field_details() {
        let errors = Sample { name: String::new() }.validate().unwrap_err();
        let err = AppError::from(errors);

        assert_eq!(err.code, ErrorCode::Validation);
        assert_eq!(err.details.as_deref(), Some("name: must not be empty"));
    }
}
