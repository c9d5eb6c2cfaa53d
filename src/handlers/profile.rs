use axum::{extract::rejection::JsonRejection, extract::State, Json};
use std::sync::Arc;

use super::{done, json_body, ok, HandlerResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::origin::RequestOrigin;
use crate::services::profile::{self, ChangePasswordRequest, UpdateProfileRequest};
use crate::services::AppState;

pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    origin: RequestOrigin,
) -> HandlerResult {
    let view = profile::get_profile(&state, user.id, origin.as_str()).await?;
    ok(view, "Profile retrieved successfully")
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> HandlerResult {
    let account = profile::update_profile(&state, user.id, json_body(payload)?).await?;
    ok(account, "Profile updated successfully")
}

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> HandlerResult {
    profile::change_password(&state, user.id, json_body(payload)?).await?;
    done("Password changed successfully")
}

pub async fn delete_account(State(state): State<Arc<AppState>>, user: AuthUser) -> HandlerResult {
    profile::delete_account(&state, user.id).await?;
    done("Account deleted successfully")
}
