//! Shared resources and their backing files.
//!
//! A new upload is written to disk before its row exists; the
//! [`PendingFile`](super::storage::PendingFile) guard removes it again on
//! every path that does not end in a stored row.

use axum::http::HeaderValue;
use chrono::Utc;
use std::path::PathBuf;
use uuid::Uuid;

use super::listing::{absolute_url, is_previewable, preview_url, Page, ResourceListParams};
use super::storage::{preview_content_type, IncomingFile, UPLOAD_URL_PREFIX};
use super::AppState;
use crate::error::{AppError, AppResult};
use crate::models::resource::{NewResource, ResourcePatch, ResourceSummary, ResourceView};
use crate::models::Category;
use crate::utils::{check_length, trimmed};

/// Text fields and file of a multipart resource submission.
#[derive(Debug, Default)]
pub struct ResourceForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub subject: Option<String>,
    pub group_id: Option<String>,
    pub file: Option<IncomingFile>,
}

fn resource_not_found() -> AppError {
    AppError::not_found("Resource not found")
}

fn check_title(errors: &mut Vec<String>, title: &str) {
    check_length(errors, "title", title, 3, 200, "Title must be between 3 and 200 characters");
}

fn check_description(errors: &mut Vec<String>, description: &str) {
    check_length(
        errors,
        "description",
        description,
        10,
        2000,
        "Description must be between 10 and 2000 characters",
    );
}

fn check_category(errors: &mut Vec<String>, raw: &str) -> Option<Category> {
    let category = Category::parse(raw);
    if category.is_none() {
        errors.push("category: Invalid category".to_string());
    }
    category
}

fn check_subject(errors: &mut Vec<String>, subject: &Option<String>) {
    if let Some(subject) = subject {
        if subject.chars().count() > 100 {
            errors.push("subject: Subject tag must be less than 100 characters".to_string());
        }
    }
}

fn parse_group_id(raw: Option<String>) -> AppResult<Option<Uuid>> {
    trimmed(raw)
        .map(|id| Uuid::parse_str(&id).map_err(|_| AppError::bad_request("Invalid study group ID")))
        .transpose()
}

fn view(summary: ResourceSummary, viewer: Uuid, origin: &str) -> ResourceView {
    let is_owner = summary.resource.uploaded_by == viewer;
    let file_url = absolute_url(origin, &summary.resource.file_url);
    ResourceView::new(summary, is_owner, file_url)
}

async fn owned_resource(
    state: &AppState,
    viewer: Uuid,
    id: Uuid,
    action: &str,
) -> AppResult<ResourceSummary> {
    let summary = state
        .resources
        .find_resource(id)
        .await?
        .ok_or_else(resource_not_found)?;
    if summary.resource.uploaded_by != viewer {
        return Err(AppError::forbidden(format!(
            "Only the owner can {} this resource",
            action
        )));
    }
    Ok(summary)
}

pub async fn create_resource(
    state: &AppState,
    viewer: Uuid,
    origin: &str,
    form: ResourceForm,
) -> AppResult<ResourceView> {
    let mut errors = Vec::new();

    let title = trimmed(form.title).unwrap_or_default();
    if title.is_empty() {
        errors.push("title: Title is required".to_string());
    } else {
        check_title(&mut errors, &title);
    }

    let description = trimmed(form.description).unwrap_or_default();
    if description.is_empty() {
        errors.push("description: Description is required".to_string());
    } else {
        check_description(&mut errors, &description);
    }

    let category = match trimmed(form.category) {
        Some(raw) => check_category(&mut errors, &raw),
        None => {
            errors.push("category: Category is required".to_string());
            None
        }
    };

    let subject = trimmed(form.subject);
    check_subject(&mut errors, &subject);

    if form.file.is_none() {
        errors.push("file: File is required".to_string());
    }

    let (Some(category), Some(file), true) = (category, form.file, errors.is_empty()) else {
        return Err(AppError::validation(errors));
    };

    let group_id = parse_group_id(form.group_id)?;
    if let Some(group_id) = group_id {
        if state.groups.find_group(group_id).await?.is_none() {
            return Err(AppError::not_found("Study group not found"));
        }
        if !state.groups.is_member(group_id, viewer).await? {
            return Err(AppError::forbidden(
                "Only group members can share resources with this group",
            ));
        }
    }

    state.upload_limiter.check(viewer)?;
    let pending = state.storage.save(&file).await?;

    let summary = state
        .resources
        .create_resource(NewResource {
            title,
            description,
            category,
            subject,
            file_url: pending.file_url().to_string(),
            file_name: pending.file_name().to_string(),
            uploaded_by: viewer,
            group_id,
        })
        .await?;
    pending.commit();

    tracing::info!(user_id = %viewer, resource_id = %summary.resource.id, "Resource uploaded");
    Ok(view(summary, viewer, origin))
}

pub async fn get_resource(
    state: &AppState,
    viewer: Uuid,
    origin: &str,
    id: Uuid,
) -> AppResult<ResourceView> {
    let summary = state
        .resources
        .find_resource(id)
        .await?
        .ok_or_else(resource_not_found)?;

    let preview = preview_url(origin, &summary.resource.file_url);
    let mut resource = view(summary, viewer, origin);
    resource.preview_url = preview;
    Ok(resource)
}

pub async fn list_resources(
    state: &AppState,
    viewer: Uuid,
    origin: &str,
    params: ResourceListParams,
) -> AppResult<Page<ResourceView>> {
    let query = params.into_query(Utc::now())?;
    let (summaries, total) = state.resources.list_resources(&query).await?;

    let items = summaries
        .into_iter()
        .map(|summary| view(summary, viewer, origin))
        .collect();

    Ok(Page::new(items, total, query.page))
}

pub async fn update_resource(
    state: &AppState,
    viewer: Uuid,
    origin: &str,
    id: Uuid,
    form: ResourceForm,
) -> AppResult<ResourceView> {
    let mut errors = Vec::new();
    let mut patch = ResourcePatch::default();

    if let Some(title) = form.title.map(|t| t.trim().to_string()) {
        check_title(&mut errors, &title);
        patch.title = Some(title);
    }
    if let Some(description) = form.description.map(|d| d.trim().to_string()) {
        check_description(&mut errors, &description);
        patch.description = Some(description);
    }
    if let Some(raw) = form.category {
        patch.category = check_category(&mut errors, raw.trim());
    }
    if let Some(raw) = form.subject {
        let subject = trimmed(Some(raw));
        check_subject(&mut errors, &subject);
        patch.subject = Some(subject);
    }
    if !errors.is_empty() {
        return Err(AppError::validation(errors));
    }

    let existing = owned_resource(state, viewer, id, "update").await?;

    let pending = match &form.file {
        Some(file) => {
            state.upload_limiter.check(viewer)?;
            let pending = state.storage.save(file).await?;
            patch.file_url = Some(pending.file_url().to_string());
            patch.file_name = Some(pending.file_name().to_string());
            Some(pending)
        }
        None => None,
    };

    let summary = state
        .resources
        .update_resource(id, &patch)
        .await?
        .ok_or_else(resource_not_found)?;

    if let Some(pending) = pending {
        pending.commit();
        state
            .storage
            .remove_best_effort(&existing.resource.file_url)
            .await;
    }

    tracing::info!(user_id = %viewer, resource_id = %id, "Resource updated");
    Ok(view(summary, viewer, origin))
}

pub async fn delete_resource(state: &AppState, viewer: Uuid, id: Uuid) -> AppResult<()> {
    let existing = owned_resource(state, viewer, id, "delete").await?;

    if !state.resources.delete_resource(id).await? {
        return Err(resource_not_found());
    }
    state
        .storage
        .remove_best_effort(&existing.resource.file_url)
        .await;

    tracing::info!(user_id = %viewer, resource_id = %id, "Resource deleted");
    Ok(())
}

/// Path and content type for inline display of a PDF or image.
pub async fn preview_file(state: &AppState, filename: &str) -> AppResult<(PathBuf, &'static str)> {
    if !is_previewable(filename) {
        return Err(AppError::bad_request("Preview is not available for this file type"));
    }
    let path = state.storage.resolve(filename).await?;
    Ok((path, preview_content_type(filename)))
}

#[derive(Debug)]
pub struct FileDownload {
    pub path: PathBuf,
    pub disposition: HeaderValue,
}

/// Resolves a download and bumps the counter of every resource stored
/// under that name. Nothing is counted unless the response headers for
/// the file can be built.
pub async fn download_file(state: &AppState, filename: &str) -> AppResult<FileDownload> {
    let path = state.storage.resolve(filename).await?;
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
        .map_err(|_| AppError::bad_request("Invalid file path"))?;

    let file_url = format!("{}{}", UPLOAD_URL_PREFIX, filename);
    let updated = state.resources.increment_downloads(&file_url).await?;
    tracing::debug!(file_url, updated, "Download counted");

    Ok(FileDownload { path, disposition })
}
