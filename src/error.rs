use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

/// Errors from JWT authentication.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Token not found.")]
    TokenNotFound,

    /// Undecodable token, or a registered claim that does not match.
    #[error("Invalid token.")]
    InvalidToken,

    #[error("Invalid token sign.")]
    InvalidTokenSignature,

    /// Expired and past the refresh window.
    #[error("Token has expired.")]
    TokenExpired,

    #[error("Auth not configured: {0}")]
    ConfigError(String),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::TokenNotFound => StatusCode::FORBIDDEN,
            AuthError::InvalidToken
            | AuthError::InvalidTokenSignature
            | AuthError::TokenExpired => StatusCode::UNAUTHORIZED,
            AuthError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            error: self.to_string(),
        };

        (self.status(), axum::Json(body)).into_response()
    }
}
