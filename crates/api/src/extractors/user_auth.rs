//! Authenticated caller extractor.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::user_auth::{bearer_token, AuthenticatedUser};

/// Caller identity taken from the bearer token.
///
/// Reuses the identity inserted by `require_user_auth` when the route is
/// behind it, otherwise verifies the token itself.
#[derive(Debug, Clone, Copy)]
pub struct UserAuth {
    pub user_id: Uuid,
}

#[async_trait]
impl FromRequestParts<AppState> for UserAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(AuthenticatedUser(user_id)) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(UserAuth { user_id: *user_id });
        }

        let token = bearer_token(&parts.headers)
            .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

        let user_id = state
            .jwt
            .verify_user(token)
            .map_err(|_| ApiError::Unauthorized("Invalid or expired token".to_string()))?;

        Ok(UserAuth { user_id })
    }
}
