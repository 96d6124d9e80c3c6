use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use super::{dto::ErrorResponse, jwt::TokenError, password::HashError, repo::StoreError};

pub const INVALID_CREDENTIALS: &str = "invalid credentials";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("email already registered")]
    DuplicateUser,
    /// Unknown email and wrong password both map here.
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Hashing(#[from] HashError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("storage unavailable: {0}")]
    Storage(#[source] StoreError),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::DuplicateUser => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::Hashing(HashError::InputTooLong) => StatusCode::BAD_REQUEST,
            AuthError::Hashing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::Token(TokenError::Issuance(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::Token(_) => StatusCode::UNAUTHORIZED,
            AuthError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Client-facing message. Credential and token failures stay generic.
    pub fn public_message(&self) -> String {
        match self {
            AuthError::Validation(msg) => msg.clone(),
            AuthError::DuplicateUser => self.to_string(),
            AuthError::InvalidCredentials => INVALID_CREDENTIALS.into(),
            AuthError::Hashing(HashError::InputTooLong) => self.to_string(),
            AuthError::Hashing(_) => "internal server error".into(),
            AuthError::Token(TokenError::Issuance(_)) => "failed to generate token".into(),
            AuthError::Token(_) => "invalid or expired token".into(),
            AuthError::Storage(_) => "service temporarily unavailable".into(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, %status, "request failed");
        }
        let body = ErrorResponse {
            error: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_kind() {
        assert_eq!(AuthError::Validation("bad".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::DuplicateUser.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::from(TokenError::Expired).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AuthError::from(TokenError::Issuance("x".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AuthError::Storage(StoreError::Timeout("create")).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn token_failures_share_one_message() {
        assert_eq!(
            AuthError::from(TokenError::Expired).public_message(),
            AuthError::from(TokenError::Invalid).public_message()
        );
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let err = AuthError::Hashing(HashError::Primitive("argon2 blew up".into()));
        assert!(!err.public_message().contains("argon2"));
        let err = AuthError::Storage(StoreError::Timeout("get_by_email"));
        assert!(!err.public_message().contains("get_by_email"));
    }
}
