//! HTTP adapter mapping for domain errors.
//!
//! Keeps the domain error type transport-agnostic while giving Actix handlers
//! consistent JSON bodies, HTTP statuses and gRPC status codes.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use tracing::error;

use crate::domain::{Error, ErrorCode};
use crate::middleware::TRACE_ID_HEADER;

/// Header carrying the numeric gRPC status code.
pub const GRPC_STATUS_HEADER: &str = "grpc-status";

/// Convenient result alias for HTTP handlers.
pub type ApiResult<T> = Result<T, Error>;

/// gRPC status associated with an error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrpcStatus {
    /// Numeric wire value.
    pub code: u16,
    /// Canonical lowercase name.
    pub name: &'static str,
}

/// Map an error code onto its gRPC status.
pub fn grpc_status_for(code: ErrorCode) -> GrpcStatus {
    let (code, name) = match code {
        ErrorCode::InvalidRequest => (3, "invalid_argument"),
        ErrorCode::Cancelled => (4, "deadline_exceeded"),
        ErrorCode::NotFound => (5, "not_found"),
        ErrorCode::AlreadyExists => (6, "already_exists"),
        ErrorCode::ResourceExhausted => (8, "resource_exhausted"),
        ErrorCode::InternalError => (13, "internal"),
        ErrorCode::ServiceUnavailable => (14, "unavailable"),
    };
    GrpcStatus { code, name }
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::AlreadyExists => StatusCode::CONFLICT,
        ErrorCode::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
        ErrorCode::Cancelled => StatusCode::GATEWAY_TIMEOUT,
        ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn redact_if_internal(error: &Error) -> Error {
    if matches!(error.code(), ErrorCode::InternalError) {
        let mut redacted = Error::internal("Internal server error");
        if let Some(id) = error.trace_id() {
            redacted = redacted.with_trace_id(id.to_owned());
        }
        redacted
    } else {
        error.clone()
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        status_for(self.code())
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());
        builder.insert_header((
            GRPC_STATUS_HEADER,
            grpc_status_for(self.code()).code.to_string(),
        ));
        if let Some(id) = self.trace_id() {
            builder.insert_header((TRACE_ID_HEADER, id.to_owned()));
        }

        builder.json(redact_if_internal(self))
    }
}

impl From<actix_web::Error> for Error {
    fn from(err: actix_web::Error) -> Self {
        // Do not leak implementation details to clients.
        error!(error = %err, "actix error promoted to domain error");
        Error::internal("Internal server error")
    }
}
