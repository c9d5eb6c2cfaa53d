use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use std::sync::Arc;

use super::{created, done, json_body, ok, parse_id, query_params, HandlerResult};
use crate::middleware::auth::AuthUser;
use crate::services::groups::{self, GroupRequest, LeaveOutcome};
use crate::services::listing::GroupListParams;
use crate::services::AppState;

const ENTITY: &str = "study group";

pub async fn list_groups(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    params: Result<Query<GroupListParams>, QueryRejection>,
) -> HandlerResult {
    let page = groups::list_groups(&state, user.id, query_params(params)?).await?;
    ok(page, "Study groups retrieved successfully")
}

pub async fn create_group(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    payload: Result<Json<GroupRequest>, JsonRejection>,
) -> HandlerResult {
    let group = groups::create_group(&state, user.id, json_body(payload)?).await?;
    created(group, "Study group created successfully")
}

pub async fn get_group(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> HandlerResult {
    let group = groups::get_group(&state, user.id, parse_id(&id, ENTITY)?).await?;
    ok(group, "Study group retrieved successfully")
}

pub async fn update_group(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    payload: Result<Json<GroupRequest>, JsonRejection>,
) -> HandlerResult {
    let id = parse_id(&id, ENTITY)?;
    let group = groups::update_group(&state, user.id, id, json_body(payload)?).await?;
    ok(group, "Study group updated successfully")
}

pub async fn delete_group(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> HandlerResult {
    groups::delete_group(&state, user.id, parse_id(&id, ENTITY)?).await?;
    done("Study group deleted successfully")
}

pub async fn join_group(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> HandlerResult {
    let group = groups::join_group(&state, user.id, parse_id(&id, ENTITY)?).await?;
    ok(group, "Successfully joined the study group")
}

pub async fn leave_group(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> HandlerResult {
    match groups::leave_group(&state, user.id, parse_id(&id, ENTITY)?).await? {
        LeaveOutcome::Left => done("Successfully left the study group"),
        LeaveOutcome::GroupDeleted => done("Group deleted as owner left"),
    }
}
