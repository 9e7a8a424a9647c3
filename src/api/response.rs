use actix_web::{HttpRequest, HttpResponse};
use tracing::{error, warn};

use crate::errors::{AppError, ErrorResponse};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request id from the `x-request-id` header, or a freshly generated one
pub fn request_id(req: &HttpRequest) -> String {
    req.headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{:016x}", rand::random::<u64>()))
}

/// Build the error body for `err`, without sending it
pub fn error_body(req: &HttpRequest, err: &AppError) -> ErrorResponse {
    ErrorResponse::from_error(err, request_id(req), req.path(), req.method().as_str())
}

/// Log `err` and turn it into a JSON response with the code's HTTP status
pub fn error_response(req: &HttpRequest, err: &AppError) -> HttpResponse {
    let status = err.status_code();
    if status.is_server_error() {
        error!("{} {} failed: {}", req.method(), req.path(), err);
    } else {
        warn!("{} {} rejected: {}", req.method(), req.path(), err);
    }

    HttpResponse::build(status).json(error_body(req, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;
    use actix_web::{http::StatusCode, test::TestRequest};

    #[test]
    fn reuses_incoming_request_id() {
        let req = TestRequest::get()
            .uri("/services/a")
            .insert_header((REQUEST_ID_HEADER, "req-42"))
            .to_http_request();

        let body = error_body(&req, &AppError::not_found("Service a not found"));
        assert_eq!(body.request_id, "req-42");
        assert_eq!(body.path, "/services/a");
        assert_eq!(body.method, "GET");
    }

    #[test]
    fn generates_request_id_when_missing() {
        let req = TestRequest::get().to_http_request();
        assert_eq!(request_id(&req).len(), 16);
    }

    #[test]
    fn status_follows_error_code() {
        let req = TestRequest::delete().uri("/services/a").to_http_request();

        let response = error_response(&req, &AppError::not_found("missing"));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = error_response(&req, &AppError::new(ErrorCode::Service, "closed"));
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
