//! Profile, account, and settings tests

mod common;

use common::{group_request, pdf, resource_form, stored_name, TestApp, ORIGIN};
use peernova::error::AppError;
use peernova::models::settings::{SettingsPatch, Theme};
use peernova::services::auth::{self, LoginRequest};
use peernova::services::profile::{self, ChangePasswordRequest, UpdateProfileRequest};
use peernova::services::{groups, resources, settings};

fn password_change(old: &str, new: &str, confirm: &str) -> ChangePasswordRequest {
    ChangePasswordRequest {
        old_password: Some(old.to_string()),
        new_password: Some(new.to_string()),
        confirm_password: Some(confirm.to_string()),
    }
}

// ===== Profile aggregation =====

#[tokio::test]
async fn test_profile_stats_and_recent_activity() {
    let app = TestApp::new();
    let ada = app.user("Ada").await;
    let bob = app.user("Bob").await;

    let own = groups::create_group(&app.state, ada, group_request("Algo Night", "DSA", 10)).await.unwrap();
    let other = groups::create_group(&app.state, bob, group_request("React Lab", "Web Dev", 10)).await.unwrap();
    groups::join_group(&app.state, ada, other.id).await.unwrap();

    let notes = resources::create_resource(&app.state, ada, ORIGIN, resource_form("Notes", "Notes", Some(pdf("n.pdf"))))
        .await
        .unwrap();
    resources::create_resource(&app.state, ada, ORIGIN, resource_form("Slides", "PDF", Some(pdf("s.pdf"))))
        .await
        .unwrap();
    let name = stored_name(&notes.file_url);
    resources::download_file(&app.state, &name).await.unwrap();
    resources::download_file(&app.state, &name).await.unwrap();

    let view = profile::get_profile(&app.state, ada, ORIGIN).await.unwrap();

    assert_eq!(view.user.name, "Ada");
    assert_eq!(view.stats.groups_created, 1);
    assert_eq!(view.stats.groups_joined, 2, "Owned groups count as memberships");
    assert_eq!(view.stats.resources_uploaded, 2);
    assert_eq!(view.stats.total_downloads, 2);

    assert_eq!(view.owned_groups.len(), 1);
    assert_eq!(view.owned_groups[0].id, own.id);
    assert!(view.owned_groups[0].is_owner);

    let joined: Vec<_> = view.joined_groups.iter().map(|g| g.id).collect();
    assert_eq!(joined, vec![other.id], "Joined list excludes owned groups");
    assert!(view.joined_groups[0].joined_at.is_some());

    assert_eq!(view.owned_resources.len(), 2);
    assert_eq!(view.owned_resources[0].title, "Slides", "Newest upload first");
    assert!(view.owned_resources[0].file_url.starts_with(ORIGIN));
}

#[tokio::test]
async fn test_empty_profile() {
    let app = TestApp::new();
    let ada = app.user("Ada").await;

    let view = profile::get_profile(&app.state, ada, ORIGIN).await.unwrap();
    assert_eq!(view.stats.groups_created, 0);
    assert_eq!(view.stats.total_downloads, 0);
    assert!(view.owned_groups.is_empty() && view.joined_groups.is_empty());
    assert!(!view.member_since_label.is_empty());
}

// ===== Account =====

#[tokio::test]
async fn test_update_profile_name() {
    let app = TestApp::new();
    let ada = app.user("Ada").await;

    let updated = profile::update_profile(
        &app.state,
        ada,
        UpdateProfileRequest {
            full_name: Some("  Ada Lovelace ".into()),
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.name, "Ada Lovelace");

    let too_short = profile::update_profile(
        &app.state,
        ada,
        UpdateProfileRequest {
            full_name: Some("A".into()),
        },
    )
    .await;
    assert!(matches!(too_short, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_change_password_then_login() {
    let app = TestApp::new();
    let ada = app.user("Ada").await;

    let wrong = profile::change_password(&app.state, ada, password_change("nope123", "newsecret", "newsecret")).await;
    assert!(matches!(wrong, Err(AppError::BadRequest(msg)) if msg == "Old password is incorrect"));

    let mismatch = profile::change_password(&app.state, ada, password_change("secret123", "newsecret", "other")).await;
    assert!(matches!(mismatch, Err(AppError::Validation(_))));

    profile::change_password(&app.state, ada, password_change("secret123", "newsecret", "newsecret"))
        .await
        .unwrap();

    let old_login = auth::login(
        &app.state,
        LoginRequest {
            email: Some("ada@campus.edu".into()),
            password: Some("secret123".into()),
        },
    )
    .await;
    assert!(matches!(old_login, Err(AppError::Unauthorized(_))));

    let new_login = auth::login(
        &app.state,
        LoginRequest {
            email: Some("ADA@campus.edu".into()),
            password: Some("newsecret".into()),
        },
    )
    .await
    .unwrap();
    assert_eq!(new_login.user.id, ada);
}

#[tokio::test]
async fn test_delete_account_cascades_and_removes_files() {
    let app = TestApp::new();
    let ada = app.user("Ada").await;
    let bob = app.user("Bob").await;

    let group = groups::create_group(&app.state, ada, group_request("Algo Night", "DSA", 10)).await.unwrap();
    groups::join_group(&app.state, bob, group.id).await.unwrap();

    let mut shared = resource_form("Bob notes", "Notes", Some(pdf("bob.pdf")));
    shared.group_id = Some(group.id.to_string());
    resources::create_resource(&app.state, bob, ORIGIN, shared).await.unwrap();
    resources::create_resource(&app.state, ada, ORIGIN, resource_form("Ada notes", "Notes", Some(pdf("ada.pdf"))))
        .await
        .unwrap();
    let kept = resources::create_resource(&app.state, bob, ORIGIN, resource_form("Bob solo", "Notes", Some(pdf("solo.pdf"))))
        .await
        .unwrap();
    assert_eq!(app.stored_files(), 3);

    profile::delete_account(&app.state, ada).await.unwrap();

    assert_eq!(app.store.membership_rows(group.id), 0);
    assert_eq!(app.store.resource_rows(), 1, "Only Bob's unrelated upload survives");
    assert_eq!(app.stored_files(), 1);
    assert!(app.dir.path().join(stored_name(&kept.file_url)).exists());

    let login = auth::login(
        &app.state,
        LoginRequest {
            email: Some("ada@campus.edu".into()),
            password: Some("secret123".into()),
        },
    )
    .await;
    assert!(login.is_err());
}

// ===== Settings =====

#[tokio::test]
async fn test_settings_defaults_and_partial_update() {
    let app = TestApp::new();
    let ada = app.user("Ada").await;

    let initial = settings::get_settings(&app.state, ada).await.unwrap();
    assert_eq!(initial.preferences.theme, Theme::Dark);
    assert!(initial.preferences.email_notifications);

    let updated = settings::update_settings(
        &app.state,
        ada,
        SettingsPatch {
            theme: Some(Theme::Light),
            private_profile: Some(true),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.preferences.theme, Theme::Light);
    assert!(updated.preferences.private_profile);
    assert!(updated.preferences.in_app_notifications, "Absent fields keep their value");

    let again = settings::get_settings(&app.state, ada).await.unwrap();
    assert_eq!(again.preferences, updated.preferences);
}
