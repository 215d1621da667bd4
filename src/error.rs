use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Error kinds surfaced by the API. Each operation either succeeds wholly or
/// fails with exactly one of these; the HTTP mapping lives in one place below.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not authenticated")]
    Unauthenticated,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("User already exists")]
    EmailTaken,
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Not authorized")]
    NotAuthorized,
    #[error("Cannot modify global resource")]
    GlobalResource,
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("token error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("password hashing failed")]
    Hash,
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match self {
            Error::Unauthenticated | Error::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Error::EmailTaken => StatusCode::CONFLICT,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::NotAuthorized | Error::GlobalResource => StatusCode::FORBIDDEN,
            Error::Db(_) | Error::Jwt(_) | Error::Hash | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("{self}");
        }
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
