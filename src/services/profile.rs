use serde::Deserialize;
use uuid::Uuid;

use super::auth::{hash_password_task, verify_password_task, MIN_PASSWORD_LEN};
use super::listing::absolute_url;
use super::AppState;
use crate::error::{AppError, AppResult};
use crate::models::profile::{AccountView, ProfileGroup, ProfileResource, ProfileStats, ProfileView};
use crate::utils::{check_length, format_date_label};

/// Entries per recent-activity list on the profile page.
pub const RECENT_LIMIT: i64 = 10;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: Option<String>,
    pub new_password: Option<String>,
    pub confirm_password: Option<String>,
}

fn user_not_found() -> AppError {
    AppError::not_found("User not found")
}

/// Identity, stats and recent activity. The independent reads run
/// concurrently.
pub async fn get_profile(state: &AppState, user_id: Uuid, origin: &str) -> AppResult<ProfileView> {
    let user = state
        .users
        .find_user(user_id)
        .await?
        .ok_or_else(user_not_found)?;

    let (groups_created, groups_joined, uploads, owned_groups, joined_groups, owned_resources) = tokio::try_join!(
        state.groups.count_groups_owned(user_id),
        state.groups.count_memberships(user_id),
        state.resources.upload_stats(user_id),
        state.groups.groups_owned_by(user_id, RECENT_LIMIT),
        state.groups.groups_joined_by(user_id, RECENT_LIMIT),
        state.resources.resources_owned_by(user_id, RECENT_LIMIT),
    )?;

    let owned_resources = owned_resources
        .into_iter()
        .map(|summary| {
            let url = absolute_url(origin, &summary.resource.file_url);
            ProfileResource::new(summary, url)
        })
        .collect();

    Ok(ProfileView {
        user: user.public(),
        created_at: user.created_at,
        created_at_label: format_date_label(user.created_at),
        member_since_label: format_date_label(user.created_at),
        stats: ProfileStats {
            groups_created,
            groups_joined,
            resources_uploaded: uploads.resources_uploaded,
            total_downloads: uploads.total_downloads,
        },
        owned_groups: owned_groups.into_iter().map(ProfileGroup::owned).collect(),
        joined_groups: joined_groups.into_iter().map(ProfileGroup::joined).collect(),
        owned_resources,
    })
}

pub async fn update_profile(
    state: &AppState,
    user_id: Uuid,
    req: UpdateProfileRequest,
) -> AppResult<AccountView> {
    let Some(name) = req.full_name.map(|n| n.trim().to_string()) else {
        let user = state
            .users
            .find_user(user_id)
            .await?
            .ok_or_else(user_not_found)?;
        return Ok(user.into());
    };

    let mut errors = Vec::new();
    check_length(&mut errors, "fullName", &name, 2, 100, "Full name must be between 2 and 100 characters");
    if !errors.is_empty() {
        return Err(AppError::validation(errors));
    }

    let user = state
        .users
        .update_user_name(user_id, &name)
        .await?
        .ok_or_else(user_not_found)?;

    tracing::info!(%user_id, "Profile updated");
    Ok(user.into())
}

pub async fn change_password(
    state: &AppState,
    user_id: Uuid,
    req: ChangePasswordRequest,
) -> AppResult<()> {
    let old_password = req.old_password.unwrap_or_default();
    let new_password = req.new_password.unwrap_or_default();

    let mut errors = Vec::new();
    if old_password.is_empty() {
        errors.push("oldPassword: Old password is required".to_string());
    }
    if new_password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(format!(
            "newPassword: New password must be at least {} characters",
            MIN_PASSWORD_LEN
        ));
    }
    if req.confirm_password.as_deref() != Some(new_password.as_str()) {
        errors.push("confirmPassword: Passwords do not match".to_string());
    }
    if !errors.is_empty() {
        return Err(AppError::validation(errors));
    }

    let user = state
        .users
        .find_user(user_id)
        .await?
        .ok_or_else(user_not_found)?;

    if !verify_password_task(old_password, user.password_hash).await? {
        return Err(AppError::bad_request("Old password is incorrect"));
    }

    let hash = hash_password_task(new_password).await?;
    if !state.users.update_password(user_id, &hash).await? {
        return Err(user_not_found());
    }

    tracing::info!(%user_id, "Password changed");
    Ok(())
}

/// Removes the account and everything it owns, then the files of every
/// resource the cascade removed.
pub async fn delete_account(state: &AppState, user_id: Uuid) -> AppResult<()> {
    let file_urls = state.resources.file_urls_for_user(user_id).await?;

    if !state.users.delete_user(user_id).await? {
        return Err(user_not_found());
    }
    state.storage.remove_all_best_effort(&file_urls).await;

    tracing::info!(%user_id, files = file_urls.len(), "Account deleted");
    Ok(())
}
