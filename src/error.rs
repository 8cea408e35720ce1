use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Error codes for structured error responses
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ConnectionError,
    DecodeError,
    MalformedChunk,
    HandlerError,
    BadRequest,
    ServiceUnavailable,
}

/// Structured error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Monitor error type.
///
/// Pipeline failures (decode, malformed chunk, handler) are absorbed and
/// logged at their boundary; they never cross into consumers. The HTTP
/// status mapping only matters for the request-scoped variants.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Malformed chunk: {0}")]
    MalformedChunk(String),

    #[error("Handler error: {0}")]
    Handler(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl MonitorError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn malformed_chunk(msg: impl Into<String>) -> Self {
        Self::MalformedChunk(msg.into())
    }

    pub fn handler(msg: impl Into<String>) -> Self {
        Self::Handler(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    fn error_code(&self) -> ErrorCode {
        match self {
            Self::Connection(_) => ErrorCode::ConnectionError,
            Self::Decode(_) => ErrorCode::DecodeError,
            Self::MalformedChunk(_) => ErrorCode::MalformedChunk,
            Self::Handler(_) => ErrorCode::HandlerError,
            Self::BadRequest(_) => ErrorCode::BadRequest,
            Self::Unavailable(_) => ErrorCode::ServiceUnavailable,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Connection(_) => StatusCode::BAD_GATEWAY,
            Self::Decode(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MalformedChunk(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Handler(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for MonitorError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        tracing::error!(
            error_code = ?error_code,
            status = %status.as_u16(),
            message = %message,
            "request error"
        );

        let body = ErrorResponse {
            error: error_code,
            message,
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for MonitorError {
    fn from(err: anyhow::Error) -> Self {
        Self::Handler(err.to_string())
    }
}
