use axum::{extract::rejection::JsonRejection, extract::State, Json};
use std::sync::Arc;

use super::{json_body, ok, HandlerResult};
use crate::middleware::auth::AuthUser;
use crate::models::settings::SettingsPatch;
use crate::services::settings;
use crate::services::AppState;

pub async fn get_settings(State(state): State<Arc<AppState>>, user: AuthUser) -> HandlerResult {
    let view = settings::get_settings(&state, user.id).await?;
    ok(view, "Settings retrieved successfully")
}

pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    payload: Result<Json<SettingsPatch>, JsonRejection>,
) -> HandlerResult {
    let view = settings::update_settings(&state, user.id, json_body(payload)?).await?;
    ok(view, "Settings updated successfully")
}
