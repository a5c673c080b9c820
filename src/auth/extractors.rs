use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::{debug, warn};

use crate::auth::repo_types::User;
use crate::error::AppError;
use crate::state::AppState;

const UNAUTHORIZED: &str = "Unauthorized";

/// The user resolved from the `Authorization: Bearer <token>` header.
pub struct CurrentUser(pub User);

/// Token part of a `Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();
    (scheme == "Bearer" && !token.is_empty()).then_some(token)
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(bearer_token)
            .ok_or_else(|| AppError::Unauthorized(UNAUTHORIZED.into()))?;

        match state.users.find_by_token(token).await? {
            Some(user) => {
                debug!(user_id = %user.id, "bearer token resolved");
                Ok(CurrentUser(user))
            }
            None => {
                warn!("unknown bearer token");
                Err(AppError::Unauthorized(UNAUTHORIZED.into()))
            }
        }
    }
}
