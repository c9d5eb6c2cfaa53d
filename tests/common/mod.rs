//! Shared fixtures for the integration tests: an in-memory store, a
//! throwaway upload directory, and a few request builders.

#![allow(dead_code)]

use bytes::Bytes;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

use peernova::config::Config;
use peernova::repository::MemoryStore;
use peernova::services::auth::{self, SignupRequest};
use peernova::services::groups::GroupRequest;
use peernova::services::resources::ResourceForm;
use peernova::services::storage::IncomingFile;
use peernova::services::AppState;

pub const ORIGIN: &str = "http://localhost:5000";

pub struct TestApp {
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
    pub dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().expect("create upload dir");
        let mut config = Config::for_tests(dir.path());
        adjust(&mut config);

        let store = Arc::new(MemoryStore::new());
        let state = Arc::new(AppState::with_store(store.clone(), config));
        Self { state, store, dir }
    }

    /// Registers a user and returns their id.
    pub async fn user(&self, name: &str) -> Uuid {
        let response = auth::signup(
            &self.state,
            SignupRequest {
                name: Some(name.to_string()),
                email: Some(format!("{}@campus.edu", name.to_lowercase())),
                password: Some("secret123".to_string()),
                confirm_password: Some("secret123".to_string()),
            },
        )
        .await
        .expect("signup");
        response.user.id
    }

    pub fn stored_files(&self) -> usize {
        count_files(self.dir.path())
    }
}

pub fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| entries.filter_map(Result::ok).count())
        .unwrap_or(0)
}

pub fn group_request(name: &str, subject: &str, max_members: i64) -> GroupRequest {
    serde_json::from_value(json!({
        "name": name,
        "description": "Weekly study sessions for the course",
        "subject": subject,
        "maxMembers": max_members,
    }))
    .expect("group request")
}

pub fn pdf(name: &str) -> IncomingFile {
    IncomingFile {
        original_name: name.to_string(),
        content_type: "application/pdf".to_string(),
        bytes: Bytes::from_static(b"%PDF-1.4\n% test document\n"),
    }
}

pub fn resource_form(title: &str, category: &str, file: Option<IncomingFile>) -> ResourceForm {
    ResourceForm {
        title: Some(title.to_string()),
        description: Some("Lecture material for week three".to_string()),
        category: Some(category.to_string()),
        subject: Some("Algorithms".to_string()),
        group_id: None,
        file,
    }
}

/// Stored file name of a relative or absolute upload URL.
pub fn stored_name(file_url: &str) -> String {
    file_url.rsplit('/').next().unwrap_or_default().to_string()
}
