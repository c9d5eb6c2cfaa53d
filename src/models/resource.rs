use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::vocabulary::Category;
use crate::utils::format_date_label;

#[derive(Clone, Debug)]
pub struct Resource {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub subject: Option<String>,
    /// Relative URL of the backing file, e.g. `/uploads/notes-1700000000000-42.pdf`.
    pub file_url: String,
    pub file_name: String,
    pub uploaded_by: Uuid,
    pub group_id: Option<Uuid>,
    pub download_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct ResourceSummary {
    pub resource: Resource,
    pub uploader_name: String,
}

#[derive(Clone, Debug)]
pub struct NewResource {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub subject: Option<String>,
    pub file_url: String,
    pub file_name: String,
    pub uploaded_by: Uuid,
    pub group_id: Option<Uuid>,
}

#[derive(Clone, Debug, Default)]
pub struct ResourcePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    /// `Some(None)` clears the subject tag.
    pub subject: Option<Option<String>>,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
}

/// Aggregate download stats for an uploader.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UploadStats {
    pub resources_uploaded: i64,
    pub total_downloads: i64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceView {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub subject: Option<String>,
    pub file_url: String,
    pub file_name: String,
    pub download_count: i64,
    pub is_owner: bool,
    pub uploaded_by: String,
    pub group_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub created_at_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
}

impl ResourceView {
    /// `file_url` must already be absolute.
    pub fn new(summary: ResourceSummary, is_owner: bool, file_url: String) -> Self {
        let ResourceSummary {
            resource,
            uploader_name,
        } = summary;

        Self {
            id: resource.id,
            title: resource.title,
            description: resource.description,
            category: resource.category,
            subject: resource.subject,
            file_url,
            file_name: resource.file_name,
            download_count: resource.download_count,
            is_owner,
            uploaded_by: uploader_name,
            group_id: resource.group_id,
            created_at: resource.created_at,
            created_at_label: format_date_label(resource.created_at),
            preview_url: None,
        }
    }
}
