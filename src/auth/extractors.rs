use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::warn;

use super::{claims::Claims, error::AuthError, jwt::TokenError};
use crate::state::AppState;

/// Verified claims of the `Authorization: Bearer` token.
pub struct AuthUser(pub Claims);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|auth| {
                auth.strip_prefix("Bearer ")
                    .or_else(|| auth.strip_prefix("bearer "))
            })
            .ok_or(AuthError::Token(TokenError::Invalid))?;

        let claims = state.credentials.authenticate(token.trim()).map_err(|e| {
            warn!(error = %e, "bearer token rejected");
            e
        })?;

        Ok(AuthUser(claims))
    }
}
