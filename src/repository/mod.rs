pub mod group_repo;
pub mod memory;
pub mod resource_repo;
pub mod settings_repo;
pub mod user_repo;

use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::models::group::{
    GroupPatch, GroupSummary, GroupUpdate, JoinOutcome, JoinedGroup, MemberDetail, NewGroup,
};
use crate::models::resource::{NewResource, ResourcePatch, ResourceSummary, UploadStats};
use crate::models::settings::{Settings, SettingsPatch};
use crate::models::user::{NewUser, User};
use crate::services::listing::{GroupQuery, ResourceQuery};

pub use memory::MemoryStore;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `StoreError::Conflict` when the email is taken.
    async fn create_user(&self, new: NewUser) -> StoreResult<User>;
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn update_user_name(&self, id: Uuid, name: &str) -> StoreResult<Option<User>>;
    async fn update_password(&self, id: Uuid, password_hash: &str) -> StoreResult<bool>;
    /// Cascades to owned groups, memberships, uploaded resources and settings.
    async fn delete_user(&self, id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait GroupStore: Send + Sync {
    /// Inserts the group and the owner's membership atomically.
    async fn create_group(&self, new: NewGroup) -> StoreResult<GroupSummary>;
    async fn find_group(&self, id: Uuid) -> StoreResult<Option<GroupSummary>>;
    /// Returns one page of matches plus the total match count.
    async fn list_groups(&self, query: &GroupQuery) -> StoreResult<(Vec<GroupSummary>, i64)>;
    /// Subset of `group_ids` the user is a member of.
    async fn memberships_among(&self, user_id: Uuid, group_ids: &[Uuid])
        -> StoreResult<HashSet<Uuid>>;
    async fn is_member(&self, group_id: Uuid, user_id: Uuid) -> StoreResult<bool>;
    /// Members ordered by join time, oldest first.
    async fn group_members(&self, group_id: Uuid) -> StoreResult<Vec<MemberDetail>>;
    /// Applies the patch; a lowered `max_members` is checked against the
    /// live member count under the same lock as concurrent joins.
    async fn update_group(&self, id: Uuid, patch: &GroupPatch) -> StoreResult<GroupUpdate>;
    /// Cascades to memberships and the group's resources.
    async fn delete_group(&self, id: Uuid) -> StoreResult<bool>;
    /// Capacity check and insert happen atomically.
    async fn join_group(&self, group_id: Uuid, user_id: Uuid) -> StoreResult<JoinOutcome>;
    async fn leave_group(&self, group_id: Uuid, user_id: Uuid) -> StoreResult<bool>;
    async fn groups_owned_by(&self, user_id: Uuid, limit: i64) -> StoreResult<Vec<GroupSummary>>;
    async fn groups_joined_by(&self, user_id: Uuid, limit: i64) -> StoreResult<Vec<JoinedGroup>>;
    async fn count_groups_owned(&self, user_id: Uuid) -> StoreResult<i64>;
    async fn count_memberships(&self, user_id: Uuid) -> StoreResult<i64>;
}

#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn create_resource(&self, new: NewResource) -> StoreResult<ResourceSummary>;
    async fn find_resource(&self, id: Uuid) -> StoreResult<Option<ResourceSummary>>;
    async fn list_resources(&self, query: &ResourceQuery)
        -> StoreResult<(Vec<ResourceSummary>, i64)>;
    async fn update_resource(&self, id: Uuid, patch: &ResourcePatch)
        -> StoreResult<Option<ResourceSummary>>;
    async fn delete_resource(&self, id: Uuid) -> StoreResult<bool>;
    /// Bumps the counter of every resource stored at `file_url`.
    async fn increment_downloads(&self, file_url: &str) -> StoreResult<u64>;
    async fn resources_owned_by(&self, user_id: Uuid, limit: i64)
        -> StoreResult<Vec<ResourceSummary>>;
    async fn upload_stats(&self, user_id: Uuid) -> StoreResult<UploadStats>;
    /// Stored file URLs that a group deletion would cascade over.
    async fn file_urls_for_group(&self, group_id: Uuid) -> StoreResult<Vec<String>>;
    /// Stored file URLs that an account deletion would cascade over.
    async fn file_urls_for_user(&self, user_id: Uuid) -> StoreResult<Vec<String>>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_or_create_settings(&self, user_id: Uuid) -> StoreResult<Settings>;
    async fn upsert_settings(&self, user_id: Uuid, patch: &SettingsPatch) -> StoreResult<Settings>;
}

/// Every persistence concern the service needs.
pub trait Store: UserStore + GroupStore + ResourceStore + SettingsStore {}

impl<T> Store for T where T: UserStore + GroupStore + ResourceStore + SettingsStore {}

/// Postgres-backed store; the trait impls live in the `*_repo` modules.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
