//! Resource tests
//!
//! Covers uploads and their files on disk, the owner-only guard, download
//! counting, the listing filters, and the preview/download path guards.

mod common;

use async_trait::async_trait;
use bytes::Bytes;
use mockall::mock;
use std::sync::Arc;
use uuid::Uuid;

use common::{pdf, resource_form, stored_name, TestApp, ORIGIN};
use peernova::error::{AppError, StoreError, StoreResult};
use peernova::models::resource::{NewResource, ResourcePatch, ResourceSummary, UploadStats};
use peernova::models::Category;
use peernova::repository::ResourceStore;
use peernova::services::listing::{ResourceListParams, ResourceQuery};
use peernova::services::resources::{self, ResourceForm};
use peernova::services::storage::IncomingFile;
use peernova::services::AppState;

mock! {
    pub Resources {}

    #[async_trait]
    impl ResourceStore for Resources {
        async fn create_resource(&self, new: NewResource) -> StoreResult<ResourceSummary>;
        async fn find_resource(&self, id: Uuid) -> StoreResult<Option<ResourceSummary>>;
        async fn list_resources(&self, query: &ResourceQuery) -> StoreResult<(Vec<ResourceSummary>, i64)>;
        async fn update_resource(&self, id: Uuid, patch: &ResourcePatch) -> StoreResult<Option<ResourceSummary>>;
        async fn delete_resource(&self, id: Uuid) -> StoreResult<bool>;
        async fn increment_downloads(&self, file_url: &str) -> StoreResult<u64>;
        async fn resources_owned_by(&self, user_id: Uuid, limit: i64) -> StoreResult<Vec<ResourceSummary>>;
        async fn upload_stats(&self, user_id: Uuid) -> StoreResult<UploadStats>;
        async fn file_urls_for_group(&self, group_id: Uuid) -> StoreResult<Vec<String>>;
        async fn file_urls_for_user(&self, user_id: Uuid) -> StoreResult<Vec<String>>;
    }
}

fn text_form(title: &str) -> ResourceForm {
    ResourceForm {
        title: Some(title.to_string()),
        ..Default::default()
    }
}

// ===== Upload =====

#[tokio::test]
async fn test_upload_round_trip_and_category_alias() {
    let app = TestApp::new();
    let ada = app.user("Ada").await;

    let created = resources::create_resource(
        &app.state,
        ada,
        ORIGIN,
        resource_form("Sorting slides", "Presentation/Slides", Some(pdf("Sorting Deck.pdf"))),
    )
    .await
    .unwrap();

    assert_eq!(created.category, Category::PresentationSlides);
    assert_eq!(created.file_name, "Sorting Deck.pdf");
    assert!(created.file_url.starts_with("http://localhost:5000/uploads/"));
    assert!(created.is_owner);
    assert_eq!(created.download_count, 0);
    assert_eq!(app.stored_files(), 1);

    let fetched = resources::get_resource(&app.state, ada, ORIGIN, created.id).await.unwrap();
    assert_eq!(fetched.title, "Sorting slides");
    assert_eq!(fetched.uploaded_by, "Ada");
    assert!(fetched.preview_url.is_some(), "PDF detail should carry a preview URL");

    let listed = resources::list_resources(
        &app.state,
        ada,
        ORIGIN,
        ResourceListParams {
            category: Some("PresentationSlides".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(listed.total, 1);
    assert_eq!(listed.items[0].id, created.id);
    assert!(listed.items[0].preview_url.is_none(), "Listing omits preview URLs");
}

#[tokio::test]
async fn test_upload_without_file_is_validation_error() {
    let app = TestApp::new();
    let ada = app.user("Ada").await;

    let result = resources::create_resource(&app.state, ada, ORIGIN, resource_form("Notes", "Notes", None)).await;
    match result {
        Err(AppError::Validation(errors)) => {
            assert!(errors.iter().any(|e| e == "file: File is required"), "errors: {:?}", errors)
        }
        other => panic!("expected validation error, got {:?}", other.map(|r| r.id)),
    }
    assert_eq!(app.stored_files(), 0);
}

#[tokio::test]
async fn test_disallowed_mime_type_writes_nothing() {
    let app = TestApp::new();
    let ada = app.user("Ada").await;
    let script = IncomingFile {
        original_name: "run.sh".into(),
        content_type: "application/x-sh".into(),
        bytes: Bytes::from_static(b"#!/bin/sh\necho hi\n"),
    };

    let result = resources::create_resource(&app.state, ada, ORIGIN, resource_form("Script", "Code", Some(script))).await;
    assert!(matches!(result, Err(AppError::BadRequest(msg)) if msg.starts_with("Invalid file type")));
    assert_eq!(app.stored_files(), 0);
    assert_eq!(app.store.resource_rows(), 0);
}

#[tokio::test]
async fn test_store_failure_leaves_no_orphan_file() {
    let app = TestApp::new();
    let ada = app.user("Ada").await;

    let mut mock = MockResources::new();
    mock.expect_create_resource()
        .times(1)
        .returning(|_| Err(StoreError::Database(sqlx::Error::PoolTimedOut)));

    let state = AppState::from_parts(
        app.store.clone(),
        app.store.clone(),
        Arc::new(mock),
        app.store.clone(),
        app.state.config.clone(),
    );

    let result = resources::create_resource(&state, ada, ORIGIN, resource_form("Notes", "Notes", Some(pdf("a.pdf")))).await;
    assert!(matches!(result, Err(AppError::Internal(_))));
    assert_eq!(app.stored_files(), 0, "Written file must be removed when the insert fails");
}

#[tokio::test]
async fn test_group_resource_requires_membership() {
    let app = TestApp::new();
    let owner = app.user("Owner").await;
    let outsider = app.user("Outsider").await;
    let group = peernova::services::groups::create_group(
        &app.state,
        owner,
        common::group_request("Graph Club", "Other", 10),
    )
    .await
    .unwrap();

    let mut form = resource_form("Notes", "Notes", Some(pdf("a.pdf")));
    form.group_id = Some(group.id.to_string());
    let result = resources::create_resource(&app.state, outsider, ORIGIN, form).await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));
    assert_eq!(app.stored_files(), 0);

    let mut form = resource_form("Notes", "Notes", Some(pdf("a.pdf")));
    form.group_id = Some("not-a-uuid".into());
    let result = resources::create_resource(&app.state, owner, ORIGIN, form).await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));
}

#[tokio::test]
async fn test_upload_cooldown() {
    let app = TestApp::with_config(|config| config.upload_cooldown_secs = 60);
    let ada = app.user("Ada").await;

    resources::create_resource(&app.state, ada, ORIGIN, resource_form("First", "Notes", Some(pdf("1.pdf"))))
        .await
        .unwrap();
    let second =
        resources::create_resource(&app.state, ada, ORIGIN, resource_form("Second", "Notes", Some(pdf("2.pdf")))).await;

    assert!(matches!(second, Err(AppError::TooManyRequests(_))));
    assert_eq!(app.stored_files(), 1);
}

// ===== Update and delete =====

#[tokio::test]
async fn test_non_owner_cannot_modify() {
    let app = TestApp::new();
    let ada = app.user("Ada").await;
    let eve = app.user("Eve").await;
    let created = resources::create_resource(&app.state, ada, ORIGIN, resource_form("Notes", "Notes", Some(pdf("a.pdf"))))
        .await
        .unwrap();

    let update = resources::update_resource(&app.state, eve, ORIGIN, created.id, text_form("Stolen")).await;
    assert!(matches!(update, Err(AppError::Forbidden(_))));

    let delete = resources::delete_resource(&app.state, eve, created.id).await;
    assert!(matches!(delete, Err(AppError::Forbidden(_))));

    let fetched = resources::get_resource(&app.state, eve, ORIGIN, created.id).await.unwrap();
    assert_eq!(fetched.title, "Notes");
    assert!(!fetched.is_owner);
    assert_eq!(app.stored_files(), 1);
}

#[tokio::test]
async fn test_replacing_file_removes_old_one() {
    let app = TestApp::new();
    let ada = app.user("Ada").await;
    let created = resources::create_resource(&app.state, ada, ORIGIN, resource_form("Notes", "Notes", Some(pdf("v1.pdf"))))
        .await
        .unwrap();
    let old_name = stored_name(&created.file_url);

    let form = ResourceForm {
        file: Some(pdf("v2.pdf")),
        ..Default::default()
    };
    let updated = resources::update_resource(&app.state, ada, ORIGIN, created.id, form).await.unwrap();

    assert_eq!(updated.file_name, "v2.pdf");
    assert_eq!(updated.title, "Notes");
    assert_eq!(app.stored_files(), 1);
    assert!(!app.dir.path().join(&old_name).exists(), "Old file must be removed");
    assert!(app.dir.path().join(stored_name(&updated.file_url)).exists());
}

#[tokio::test]
async fn test_delete_removes_row_and_file() {
    let app = TestApp::new();
    let ada = app.user("Ada").await;
    let created = resources::create_resource(&app.state, ada, ORIGIN, resource_form("Notes", "Notes", Some(pdf("a.pdf"))))
        .await
        .unwrap();

    resources::delete_resource(&app.state, ada, created.id).await.unwrap();

    assert_eq!(app.stored_files(), 0);
    assert!(matches!(
        resources::get_resource(&app.state, ada, ORIGIN, created.id).await,
        Err(AppError::NotFound(_))
    ));
}

// ===== Download and preview =====

#[tokio::test]
async fn test_download_increments_count_once() {
    let app = TestApp::new();
    let ada = app.user("Ada").await;
    let created = resources::create_resource(&app.state, ada, ORIGIN, resource_form("Notes", "Notes", Some(pdf("a.pdf"))))
        .await
        .unwrap();
    let name = stored_name(&created.file_url);

    let download = resources::download_file(&app.state, &name).await.unwrap();
    assert!(download.path.ends_with(&name));
    assert_eq!(
        download.disposition.to_str().unwrap(),
        format!("attachment; filename=\"{}\"", name)
    );

    let fetched = resources::get_resource(&app.state, ada, ORIGIN, created.id).await.unwrap();
    assert_eq!(fetched.download_count, 1);
}

#[tokio::test]
async fn test_unservable_file_name_is_not_counted() {
    let app = TestApp::new();
    let ada = app.user("Ada").await;
    let name = "bad\u{1}name.pdf";
    std::fs::write(app.dir.path().join(name), b"%PDF-1.4").unwrap();

    let row = app
        .store
        .create_resource(NewResource {
            title: "Control chars".into(),
            description: "File name unusable in a header".into(),
            category: Category::Notes,
            subject: None,
            file_url: format!("/uploads/{}", name),
            file_name: name.into(),
            uploaded_by: ada,
            group_id: None,
        })
        .await
        .unwrap();

    let result = resources::download_file(&app.state, name).await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));

    let stored = app.store.find_resource(row.resource.id).await.unwrap().unwrap();
    assert_eq!(stored.resource.download_count, 0);
}

#[tokio::test]
async fn test_path_traversal_is_rejected() {
    let app = TestApp::new();
    for name in ["../etc/passwd", "..", "a/b.pdf", "..\\x.pdf"] {
        let result = resources::download_file(&app.state, name).await;
        assert!(
            matches!(result, Err(AppError::BadRequest(_))),
            "{} must be rejected",
            name
        );
    }

    let missing = resources::download_file(&app.state, "missing.pdf").await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_preview_only_for_pdf_and_images() {
    let app = TestApp::new();
    let ada = app.user("Ada").await;
    let archive = IncomingFile {
        original_name: "code.zip".into(),
        content_type: "application/zip".into(),
        bytes: Bytes::from_static(b"PK\x03\x04"),
    };
    let zip = resources::create_resource(&app.state, ada, ORIGIN, resource_form("Code dump", "Code", Some(archive)))
        .await
        .unwrap();
    assert!(zip.preview_url.is_none());

    let result = resources::preview_file(&app.state, &stored_name(&zip.file_url)).await;
    assert!(matches!(result, Err(AppError::BadRequest(msg)) if msg.contains("Preview is not available")));

    let doc = resources::create_resource(&app.state, ada, ORIGIN, resource_form("Notes", "PDF", Some(pdf("n.pdf"))))
        .await
        .unwrap();
    let (_, content_type) = resources::preview_file(&app.state, &stored_name(&doc.file_url)).await.unwrap();
    assert_eq!(content_type, "application/pdf");
}

// ===== Listing =====

#[tokio::test]
async fn test_listing_sort_and_search() {
    let app = TestApp::new();
    let ada = app.user("Ada").await;
    for title in ["Graphs primer", "Heaps cheat sheet", "Graph coloring"] {
        resources::create_resource(&app.state, ada, ORIGIN, resource_form(title, "Notes", Some(pdf("x.pdf"))))
            .await
            .unwrap();
    }

    let page = resources::list_resources(
        &app.state,
        ada,
        ORIGIN,
        ResourceListParams {
            search: Some("graph".into()),
            sort: Some("alpha".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let titles: Vec<_> = page.items.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["Graph coloring", "Graphs primer"]);

    let bad = resources::list_resources(
        &app.state,
        ada,
        ORIGIN,
        ResourceListParams {
            date: Some("decade".into()),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(bad, Err(AppError::BadRequest(_))));
}
