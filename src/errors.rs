use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Failures surfaced by the MailChimp client and the domain service.
///
/// Every variant carries the provider's (or our own) human readable message.
/// The type is `Clone` so that cache loaders can hand the same failure to
/// every caller waiting on one upstream fetch.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MailChimpError {
    /// The API key is malformed; raised at construction time only.
    #[error("Invalid MailChimp API key: {0}")]
    InvalidApiKey(String),
    /// The provider answered 404.
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),
    /// Any other upstream failure, including transport and decode errors.
    #[error("MailChimp API error: {0}")]
    ApiError(String),
    /// A caller asked for a query capability the lazy query cannot honour.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
}

impl MailChimpError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, MailChimpError::ResourceNotFound(_))
    }

    /// The bare message without the variant prefix.
    pub fn detail(&self) -> &str {
        match self {
            MailChimpError::InvalidApiKey(msg)
            | MailChimpError::ResourceNotFound(msg)
            | MailChimpError::ApiError(msg)
            | MailChimpError::UnsupportedOperation(msg) => msg,
        }
    }
}

/// Application-specific error types for the HTTP layer.
#[derive(Debug, Clone)]
pub enum AppError {
    /// Resource not found error.
    NotFound(String),
    /// Bad request error (invalid input).
    BadRequest(String),
    /// Error interacting with the MailChimp API.
    ExternalApiError(String),
    /// Internal server error.
    InternalError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::ExternalApiError(msg) => write!(f, "External API error: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    /// Maps each variant to a status code and a JSON body.
    /// Upstream messages are passed through to the caller.
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::ExternalApiError(msg) => {
                tracing::error!("External API error: {}", msg);
                (StatusCode::BAD_GATEWAY, msg)
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<MailChimpError> for AppError {
    fn from(err: MailChimpError) -> Self {
        match err {
            MailChimpError::ResourceNotFound(msg) => AppError::NotFound(msg),
            MailChimpError::UnsupportedOperation(msg) => AppError::BadRequest(msg),
            MailChimpError::ApiError(msg) => AppError::ExternalApiError(msg),
            MailChimpError::InvalidApiKey(msg) => AppError::InternalError(msg),
        }
    }
}
