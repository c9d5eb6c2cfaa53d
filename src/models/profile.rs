use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::group::{GroupSummary, JoinedGroup};
use super::resource::ResourceSummary;
use super::user::{PublicUser, User};
use super::vocabulary::{Category, Subject};
use crate::utils::format_date_label;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileStats {
    pub groups_created: i64,
    pub groups_joined: i64,
    pub resources_uploaded: i64,
    pub total_downloads: i64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileGroup {
    pub id: Uuid,
    pub name: String,
    pub subject: Subject,
    pub member_count: i64,
    pub created_at: DateTime<Utc>,
    pub created_at_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joined_at_label: Option<String>,
    pub is_owner: bool,
    pub is_member: bool,
}

impl ProfileGroup {
    pub fn owned(summary: GroupSummary) -> Self {
        Self {
            id: summary.group.id,
            name: summary.group.name,
            subject: summary.group.subject,
            member_count: summary.member_count,
            created_at_label: format_date_label(summary.group.created_at),
            created_at: summary.group.created_at,
            joined_at: None,
            joined_at_label: None,
            is_owner: true,
            is_member: true,
        }
    }

    pub fn joined(joined: JoinedGroup) -> Self {
        let mut group = Self::owned(joined.summary);
        group.is_owner = false;
        group.joined_at_label = Some(format_date_label(joined.joined_at));
        group.joined_at = Some(joined.joined_at);
        group
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResource {
    pub id: Uuid,
    pub title: String,
    pub category: Category,
    pub download_count: i64,
    pub file_url: String,
    pub file_name: String,
    pub created_at: DateTime<Utc>,
    pub created_at_label: String,
}

impl ProfileResource {
    /// `file_url` must already be absolute.
    pub fn new(summary: ResourceSummary, file_url: String) -> Self {
        let resource = summary.resource;
        Self {
            id: resource.id,
            title: resource.title,
            category: resource.category,
            download_count: resource.download_count,
            file_url,
            file_name: resource.file_name,
            created_at_label: format_date_label(resource.created_at),
            created_at: resource.created_at,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub user: PublicUser,
    pub created_at: DateTime<Utc>,
    pub created_at_label: String,
    pub member_since_label: String,
    pub stats: ProfileStats,
    pub owned_groups: Vec<ProfileGroup>,
    pub joined_groups: Vec<ProfileGroup>,
    pub owned_resources: Vec<ProfileResource>,
}

/// Returned after a display-name change.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for AccountView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            created_at: user.created_at,
        }
    }
}
