//! Study-group operations. Every mutation re-fetches the group and checks
//! ownership or membership before writing.

use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use super::listing::{annotate_groups, GroupListParams, Page};
use super::AppState;
use crate::error::{AppError, AppResult};
use crate::models::group::{
    GroupDetailView, GroupPatch, GroupSummary, GroupUpdate, GroupView, JoinOutcome, MemberView,
    NewGroup, DEFAULT_MAX_MEMBERS,
};
use crate::models::Subject;
use crate::utils::{check_length, trimmed};

const MIN_MEMBERS: i64 = 2;
const MAX_MEMBERS: i64 = 100;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub subject: Option<String>,
    /// Accepts a JSON number or a numeric string.
    pub max_members: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    Left,
    /// The owner left, so the group was deleted.
    GroupDeleted,
}

fn group_not_found() -> AppError {
    AppError::not_found("Study group not found")
}

fn parse_max_members(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn check_max_members(errors: &mut Vec<String>, value: Option<&Value>) -> Option<i32> {
    let value = value.filter(|v| !v.is_null())?;
    match parse_max_members(value) {
        Some(n) if (MIN_MEMBERS..=MAX_MEMBERS).contains(&n) => i32::try_from(n).ok(),
        _ => {
            errors.push(format!(
                "maxMembers: Max members must be between {} and {}",
                MIN_MEMBERS, MAX_MEMBERS
            ));
            None
        }
    }
}

fn check_subject(errors: &mut Vec<String>, raw: &str) -> Option<Subject> {
    let subject = Subject::parse(raw);
    if subject.is_none() {
        errors.push("subject: Invalid subject".to_string());
    }
    subject
}

fn validate_new(req: GroupRequest, owner_id: Uuid) -> AppResult<NewGroup> {
    let mut errors = Vec::new();

    let name = trimmed(req.name).unwrap_or_default();
    if name.is_empty() {
        errors.push("name: Group name is required".to_string());
    } else {
        check_length(&mut errors, "name", &name, 3, 100, "Group name must be between 3 and 100 characters");
    }

    let description = trimmed(req.description).unwrap_or_default();
    if description.is_empty() {
        errors.push("description: Description is required".to_string());
    } else {
        check_length(
            &mut errors,
            "description",
            &description,
            10,
            2000,
            "Description must be between 10 and 2000 characters",
        );
    }

    let subject = check_subject(&mut errors, req.subject.as_deref().unwrap_or_default());
    let max_members = check_max_members(&mut errors, req.max_members.as_ref());

    match subject {
        Some(subject) if errors.is_empty() => Ok(NewGroup {
            name,
            description,
            subject,
            max_members: max_members.unwrap_or(DEFAULT_MAX_MEMBERS),
            owner_id,
        }),
        _ => Err(AppError::validation(errors)),
    }
}

fn validate_patch(req: GroupRequest) -> AppResult<GroupPatch> {
    let mut errors = Vec::new();
    let mut patch = GroupPatch::default();

    if let Some(name) = req.name.map(|n| n.trim().to_string()) {
        check_length(&mut errors, "name", &name, 3, 100, "Group name must be between 3 and 100 characters");
        patch.name = Some(name);
    }

    if let Some(description) = req.description.map(|d| d.trim().to_string()) {
        check_length(
            &mut errors,
            "description",
            &description,
            10,
            2000,
            "Description must be between 10 and 2000 characters",
        );
        patch.description = Some(description);
    }

    if let Some(raw) = req.subject.as_deref() {
        patch.subject = check_subject(&mut errors, raw);
    }

    patch.max_members = check_max_members(&mut errors, req.max_members.as_ref());

    if !errors.is_empty() {
        return Err(AppError::validation(errors));
    }
    Ok(patch)
}

async fn owned_group(state: &AppState, viewer: Uuid, id: Uuid, action: &str) -> AppResult<GroupSummary> {
    let summary = state.groups.find_group(id).await?.ok_or_else(group_not_found)?;
    if summary.group.owner_id != viewer {
        return Err(AppError::forbidden(format!(
            "Only the owner can {} this group",
            action
        )));
    }
    Ok(summary)
}

pub async fn create_group(state: &AppState, viewer: Uuid, req: GroupRequest) -> AppResult<GroupView> {
    let new = validate_new(req, viewer)?;
    let summary = state.groups.create_group(new).await?;

    tracing::info!(user_id = %viewer, group_id = %summary.group.id, "Study group created");
    Ok(GroupView::new(summary, true, true))
}

pub async fn get_group(state: &AppState, viewer: Uuid, id: Uuid) -> AppResult<GroupDetailView> {
    let summary = state.groups.find_group(id).await?.ok_or_else(group_not_found)?;
    let members = state.groups.group_members(id).await?;

    let is_owner = summary.group.owner_id == viewer;
    let is_member = members.iter().any(|m| m.user.id == viewer);

    Ok(GroupDetailView {
        group: GroupView::new(summary, is_owner, is_member),
        members: members.into_iter().map(MemberView::from).collect(),
    })
}

pub async fn list_groups(
    state: &AppState,
    viewer: Uuid,
    params: GroupListParams,
) -> AppResult<Page<GroupView>> {
    let query = params.into_query()?;
    let (summaries, total) = state.groups.list_groups(&query).await?;

    let ids: Vec<Uuid> = summaries.iter().map(|s| s.group.id).collect();
    let member_of = state.groups.memberships_among(viewer, &ids).await?;

    Ok(Page::new(
        annotate_groups(summaries, viewer, &member_of),
        total,
        query.page,
    ))
}

pub async fn update_group(
    state: &AppState,
    viewer: Uuid,
    id: Uuid,
    req: GroupRequest,
) -> AppResult<GroupView> {
    let patch = validate_patch(req)?;
    owned_group(state, viewer, id, "update").await?;

    match state.groups.update_group(id, &patch).await? {
        GroupUpdate::Updated(summary) => {
            tracing::info!(user_id = %viewer, group_id = %id, "Study group updated");
            Ok(GroupView::new(summary, true, true))
        }
        GroupUpdate::BelowMemberCount(count) => Err(AppError::bad_request(format!(
            "Cannot set maxMembers below current member count ({})",
            count
        ))),
        GroupUpdate::GroupMissing => Err(group_not_found()),
    }
}

/// Deletes the group, its memberships and its resources, then removes the
/// resources' files.
async fn remove_group(state: &AppState, id: Uuid) -> AppResult<()> {
    let file_urls = state.resources.file_urls_for_group(id).await?;
    if !state.groups.delete_group(id).await? {
        return Err(group_not_found());
    }
    state.storage.remove_all_best_effort(&file_urls).await;
    Ok(())
}

pub async fn delete_group(state: &AppState, viewer: Uuid, id: Uuid) -> AppResult<()> {
    owned_group(state, viewer, id, "delete").await?;
    remove_group(state, id).await?;

    tracing::info!(user_id = %viewer, group_id = %id, "Study group deleted");
    Ok(())
}

/// Returns the group as seen by the new member.
pub async fn join_group(state: &AppState, viewer: Uuid, id: Uuid) -> AppResult<GroupView> {
    match state.groups.join_group(id, viewer).await? {
        JoinOutcome::Joined => {}
        JoinOutcome::AlreadyMember => {
            return Err(AppError::bad_request("You are already a member of this group"))
        }
        JoinOutcome::Full => return Err(AppError::bad_request("This group is full")),
        JoinOutcome::GroupMissing => return Err(group_not_found()),
    }

    tracing::info!(user_id = %viewer, group_id = %id, "Joined study group");

    let summary = state.groups.find_group(id).await?.ok_or_else(group_not_found)?;
    let is_owner = summary.group.owner_id == viewer;
    Ok(GroupView::new(summary, is_owner, true))
}

pub async fn leave_group(state: &AppState, viewer: Uuid, id: Uuid) -> AppResult<LeaveOutcome> {
    let summary = state.groups.find_group(id).await?.ok_or_else(group_not_found)?;

    if summary.group.owner_id == viewer {
        remove_group(state, id).await?;
        tracing::info!(user_id = %viewer, group_id = %id, "Owner left; study group deleted");
        return Ok(LeaveOutcome::GroupDeleted);
    }

    if !state.groups.leave_group(id, viewer).await? {
        return Err(AppError::bad_request("You are not a member of this group"));
    }

    tracing::info!(user_id = %viewer, group_id = %id, "Left study group");
    Ok(LeaveOutcome::Left)
}
