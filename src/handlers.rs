//! Demo HTTP handlers exercising every access log severity.

use axum::{
    extract::Path,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::error::HandlerError;

/// Answers with whatever status the path asks for, e.g. `/status/418`
pub async fn status(Path(code): Path<u16>) -> Result<Response, HandlerError> {
    let status = StatusCode::from_u16(code)
        .map_err(|_| HandlerError::bad_request(format!("invalid status code {code}")))?;
    let body = status.canonical_reason().unwrap_or("").to_string();
    Ok((status, body).into_response())
}

/// Redirects to the root
pub async fn redirect() -> Response {
    let mut response = StatusCode::FOUND.into_response();
    response
        .headers_mut()
        .insert(header::LOCATION, HeaderValue::from_static("/"));
    response
}

/// Always fails with a handler error
pub async fn fail() -> Result<&'static str, HandlerError> {
    Err(HandlerError::internal("simulated failure"))
}

pub async fn root() -> &'static str {
    "ok"
}
