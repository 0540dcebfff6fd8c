//! Handler errors that the access log observes and reports.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// Error returned by a handler further down the chain.
///
/// Its response carries a copy of the error in the response extensions, which
/// is how [`crate::middleware::log_requests`] tells a failed handler apart
/// from one that merely answered with an error status.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    status: StatusCode,
    message: String,
}

impl HandlerError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let mut response = render_error(&self);
        response.extensions_mut().insert(self);
        response
    }
}

/// Turns a reported handler error into the response sent to the client.
pub type ErrorHandler = Arc<dyn Fn(&HandlerError) -> Response + Send + Sync>;

/// Plain-text body with the error's status code.
pub fn render_error(err: &HandlerError) -> Response {
    (err.status, err.message.clone()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_carries_error() {
        let response = HandlerError::bad_request("missing field `name`").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let carried = response.extensions().get::<HandlerError>().unwrap();
        assert_eq!(carried.status(), StatusCode::BAD_REQUEST);
        assert_eq!(carried.message(), "missing field `name`");
    }

    #[test]
    fn test_display_is_message() {
        let err = HandlerError::internal("pool exhausted");
        assert_eq!(err.to_string(), "pool exhausted");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
