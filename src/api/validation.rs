use actix_web::{error::JsonPayloadError, web, HttpRequest};

use super::response::error_body;
use crate::errors::{AppError, ErrorCode};

/// Creates a configured JsonConfig with standardized error handling for the entire project
pub fn json_config() -> actix_web_validator::JsonConfig {
    actix_web_validator::JsonConfig::default().error_handler(|err, req| match err {
        actix_web_validator::Error::Validate(validation_errors) => {
            let mut fields = serde_json::Map::new();
            for (field, errors) in validation_errors.field_errors() {
                let messages: Vec<String> = errors
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| format!("Validation error in field: {}", field))
                    })
                    .collect();
                fields.insert(field.to_string(), serde_json::json!({ "errors": messages }));
            }

            let app_err = AppError::from(validation_errors);
            reject(req, &app_err, Some(serde_json::Value::Object(fields)))
        }
        actix_web_validator::Error::Deserialize(de_err) => {
            reject(req, &deserialize_error(&de_err.to_string()), None)
        }
        _ => {
            let app_err = AppError::validation("Validation failed");
            reject(req, &app_err, None)
        }
    })
}

/// JsonConfig for bodies extracted without validation, sharing the same error body
pub fn plain_json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, req| {
        let app_err = match &err {
            JsonPayloadError::Overflow { .. } | JsonPayloadError::OverflowKnownLength { .. } => {
                AppError::with_details(ErrorCode::Validation, "Request body is too large", err.to_string())
            }
            JsonPayloadError::ContentType => AppError::with_details(
                ErrorCode::Validation,
                "Request validation failed",
                "Expected Content-Type: application/json",
            ),
            _ => deserialize_error(&err.to_string()),
        };
        reject(req, &app_err, None)
    })
}

fn deserialize_error(err_string: &str) -> AppError {
    let details = if err_string.contains("EOF while parsing") {
        "Request body is empty. Expected JSON payload"
    } else if err_string.contains("unknown variant") {
        "Invalid enum value. Check allowed values for this field"
    } else if err_string.contains("missing field") {
        "A required field is missing"
    } else {
        "Invalid JSON format"
    };

    AppError::with_details(ErrorCode::Validation, "Request validation failed", details)
}

fn reject(
    req: &HttpRequest,
    err: &AppError,
    fields: Option<serde_json::Value>,
) -> actix_web::Error {
    let mut body = error_body(req, err);
    if let Some(fields) = fields {
        body = body.with_fields(fields);
    }

    actix_web::error::InternalError::from_response(
        err.to_string(),
        actix_web::HttpResponse::build(err.status_code()).json(body),
    )
    .into()
}
