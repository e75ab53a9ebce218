//! Request deadline extraction.
//!
//! Callers may bound a call with the gRPC `grpc-timeout` header: one to eight
//! ASCII digits followed by a unit (`H`, `M`, `S`, `m`, `u` or `n`). Without
//! the header the configured default timeout applies.

use std::time::Duration;

use actix_web::HttpRequest;
use serde_json::json;

use crate::domain::Error;

/// Header carrying the caller's timeout.
pub const GRPC_TIMEOUT_HEADER: &str = "grpc-timeout";

/// Parse a `grpc-timeout` value.
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use profile_service::inbound::http::deadline::parse_grpc_timeout;
///
/// assert_eq!(parse_grpc_timeout("250m"), Some(Duration::from_millis(250)));
/// assert_eq!(parse_grpc_timeout("5S"), Some(Duration::from_secs(5)));
/// assert_eq!(parse_grpc_timeout("5s"), None);
/// ```
pub fn parse_grpc_timeout(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let unit = raw.chars().last()?;
    let digits = &raw[..raw.len() - unit.len_utf8()];
    if digits.is_empty() || digits.len() > 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value: u64 = digits.parse().ok()?;
    let duration = match unit {
        'H' => Duration::from_secs(value.checked_mul(3600)?),
        'M' => Duration::from_secs(value.checked_mul(60)?),
        'S' => Duration::from_secs(value),
        'm' => Duration::from_millis(value),
        'u' => Duration::from_micros(value),
        'n' => Duration::from_nanos(value),
        _ => return None,
    };
    Some(duration)
}

/// Resolve the timeout for a request.
///
/// # Errors
///
/// Returns `invalid_request` when the header is present but malformed.
pub fn request_timeout(req: &HttpRequest, default: Duration) -> Result<Duration, Error> {
    let Some(value) = req.headers().get(GRPC_TIMEOUT_HEADER) else {
        return Ok(default);
    };
    value
        .to_str()
        .ok()
        .and_then(parse_grpc_timeout)
        .ok_or_else(|| {
            Error::invalid_request("grpc-timeout header is malformed")
                .with_details(json!({ "header": GRPC_TIMEOUT_HEADER }))
        })
}
