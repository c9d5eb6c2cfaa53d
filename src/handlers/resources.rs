use axum::{
    body::Body,
    extract::{rejection::QueryRejection, Multipart, Path, Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use std::path::Path as FsPath;
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use super::{created, done, ok, parse_id, query_params, HandlerResult};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::origin::RequestOrigin;
use crate::services::listing::ResourceListParams;
use crate::services::resources::{self, ResourceForm};
use crate::services::storage::IncomingFile;
use crate::services::AppState;

const ENTITY: &str = "resource";

/// Collects the text fields and the single `file` part of a resource form.
async fn read_form(mut multipart: Multipart) -> AppResult<ResourceForm> {
    let mut form = ResourceForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == "file" {
            if form.file.is_some() {
                return Err(AppError::bad_request("Only one file may be uploaded per request"));
            }
            let original_name = field.file_name().unwrap_or("file").to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::bad_request(e.body_text()))?;
            form.file = Some(IncomingFile {
                original_name,
                content_type,
                bytes,
            });
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| AppError::bad_request(e.body_text()))?;
        match name.as_str() {
            "title" => form.title = Some(value),
            "description" => form.description = Some(value),
            "category" => form.category = Some(value),
            "subject" => form.subject = Some(value),
            "groupId" => form.group_id = Some(value),
            other => tracing::debug!(field = other, "Ignoring unknown form field"),
        }
    }

    Ok(form)
}

async fn file_body(path: &FsPath) -> AppResult<Body> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to open {:?}: {}", path, e))?;
    Ok(Body::from_stream(ReaderStream::new(file)))
}

pub async fn list_resources(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    origin: RequestOrigin,
    params: Result<Query<ResourceListParams>, QueryRejection>,
) -> HandlerResult {
    let page =
        resources::list_resources(&state, user.id, origin.as_str(), query_params(params)?).await?;
    ok(page, "Resources retrieved successfully")
}

pub async fn create_resource(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    origin: RequestOrigin,
    multipart: Multipart,
) -> HandlerResult {
    let form = read_form(multipart).await?;
    let resource = resources::create_resource(&state, user.id, origin.as_str(), form).await?;
    created(resource, "Resource uploaded successfully")
}

pub async fn get_resource(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    origin: RequestOrigin,
    Path(id): Path<String>,
) -> HandlerResult {
    let id = parse_id(&id, ENTITY)?;
    let resource = resources::get_resource(&state, user.id, origin.as_str(), id).await?;
    ok(resource, "Resource retrieved successfully")
}

pub async fn update_resource(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    origin: RequestOrigin,
    Path(id): Path<String>,
    multipart: Multipart,
) -> HandlerResult {
    let id = parse_id(&id, ENTITY)?;
    let form = read_form(multipart).await?;
    let resource = resources::update_resource(&state, user.id, origin.as_str(), id, form).await?;
    ok(resource, "Resource updated successfully")
}

pub async fn delete_resource(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> HandlerResult {
    resources::delete_resource(&state, user.id, parse_id(&id, ENTITY)?).await?;
    done("Resource deleted successfully")
}

pub async fn preview_file(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(filename): Path<String>,
) -> AppResult<Response> {
    let (path, content_type) = resources::preview_file(&state, &filename).await?;
    let body = file_body(&path).await?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(content_type)),
            (header::CONTENT_DISPOSITION, HeaderValue::from_static("inline")),
            (header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*")),
            (header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("GET")),
        ],
        body,
    )
        .into_response())
}

pub async fn download_file(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(filename): Path<String>,
) -> AppResult<Response> {
    let download = resources::download_file(&state, &filename).await?;
    let body = file_body(&download.path).await?;

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            ),
            (header::CONTENT_DISPOSITION, download.disposition),
        ],
        body,
    )
        .into_response())
}
