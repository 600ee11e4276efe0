use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Whether a failed upstream fetch is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    Transient,
    Permanent,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchErrorKind::Transient => f.write_str("transient"),
            FetchErrorKind::Permanent => f.write_str("permanent"),
        }
    }
}

/// Structured error types for the travel service
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Timeout error: {0}")]
    TimeoutError(String),

    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Terminal outcome of a retried fetch, wrapping the last attempt's error.
    #[error("Fetch error ({kind}) after {attempts} attempt(s): {source}")]
    FetchError {
        kind: FetchErrorKind,
        attempts: u32,
        #[source]
        source: Box<AppError>,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl AppError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::HttpError {
            status,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::TimeoutError(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedPayload(message.into())
    }

    pub fn fetch(kind: FetchErrorKind, attempts: u32, source: AppError) -> Self {
        Self::FetchError {
            kind,
            attempts,
            source: Box::new(source),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError(message.into())
    }

    /// Classifies a single-attempt failure: network faults, timeouts, 5xx and
    /// 429 are retryable; everything else is not.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::TimeoutError(_) | AppError::NetworkError(_) => true,
            AppError::HttpError { status, .. } => *status >= 500 || *status == 429,
            AppError::FetchError { kind, .. } => *kind == FetchErrorKind::Transient,
            _ => false,
        }
    }

    /// The fetch classification, if this error came out of the fetcher.
    pub fn fetch_kind(&self) -> Option<FetchErrorKind> {
        match self {
            AppError::FetchError { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::TimeoutError(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::HttpError { .. } | AppError::NetworkError(_) => StatusCode::BAD_GATEWAY,
            AppError::ParseError(_) | AppError::MalformedPayload(_) => StatusCode::BAD_GATEWAY,
            AppError::FetchError {
                kind: FetchErrorKind::Transient,
                ..
            } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::FetchError {
                kind: FetchErrorKind::Permanent,
                ..
            } => StatusCode::BAD_GATEWAY,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_and_rate_limits_are_transient() {
        assert!(AppError::http(500, "boom").is_transient());
        assert!(AppError::http(503, "unavailable").is_transient());
        assert!(AppError::http(429, "slow down").is_transient());
        assert!(AppError::timeout("slow").is_transient());
    }

    #[test]
    fn client_errors_are_permanent() {
        assert!(!AppError::http(400, "bad request").is_transient());
        assert!(!AppError::http(404, "missing").is_transient());
        assert!(!AppError::malformed("bad timestamp").is_transient());
        assert!(!AppError::validation("latitude").is_transient());
    }

    #[test]
    fn fetch_error_reports_kind_and_status() {
        let err = AppError::fetch(FetchErrorKind::Transient, 3, AppError::http(502, "bad gateway"));
        assert_eq!(err.fetch_kind(), Some(FetchErrorKind::Transient));
        assert!(err.to_string().contains("after 3 attempt(s)"));
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);

        let err = AppError::fetch(FetchErrorKind::Permanent, 1, AppError::http(400, "bad"));
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }
}
