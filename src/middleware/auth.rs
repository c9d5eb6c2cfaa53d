use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AppError;
use crate::services::auth::validate_token;
use crate::services::AppState;

/// The authenticated caller, resolved from `Authorization: Bearer <jwt>`.
#[derive(Clone, Copy, Debug)]
pub struct AuthUser {
    pub id: Uuid,
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = Arc::<AppState>::from_ref(state);

        let token = bearer_token(parts)
            .ok_or_else(|| AppError::unauthorized("No token provided, authorization denied"))?;

        let claims = validate_token(token, &state.config.jwt_secret).map_err(|e| {
            tracing::debug!(error = %e, "Rejected bearer token");
            AppError::unauthorized("Token is not valid")
        })?;

        let id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::unauthorized("Token is not valid"))?;

        // Tokens outlive deleted accounts.
        if state.users.find_user(id).await?.is_none() {
            return Err(AppError::unauthorized("User no longer exists"));
        }

        Ok(AuthUser { id })
    }
}
