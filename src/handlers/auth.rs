use axum::{extract::rejection::JsonRejection, extract::State, Json};
use std::sync::Arc;

use super::{created, json_body, ok, HandlerResult};
use crate::services::auth::{self, LoginRequest, SignupRequest};
use crate::services::AppState;

pub async fn signup(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> HandlerResult {
    let response = auth::signup(&state, json_body(payload)?).await?;
    created(response, "User registered successfully")
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> HandlerResult {
    let response = auth::login(&state, json_body(payload)?).await?;
    ok(response, "Login successful")
}
