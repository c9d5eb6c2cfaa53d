//! In-memory store used by tests and by development runs without a
//! database. All tables sit behind one lock, which also makes the
//! capacity check in `join_group` atomic.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::{GroupStore, ResourceStore, SettingsStore, UserStore};
use crate::error::{StoreError, StoreResult};
use crate::models::group::{
    GroupPatch, GroupSummary, GroupUpdate, JoinOutcome, JoinedGroup, MemberDetail, NewGroup,
    StudyGroup,
};
use crate::models::resource::{NewResource, Resource, ResourcePatch, ResourceSummary, UploadStats};
use crate::models::settings::{Settings, SettingsPatch};
use crate::models::user::{NewUser, User};
use crate::services::listing::{GroupQuery, ResourceQuery};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    groups: HashMap<Uuid, StudyGroup>,
    /// (group id, user id) -> joined at
    memberships: HashMap<(Uuid, Uuid), DateTime<Utc>>,
    resources: HashMap<Uuid, Resource>,
    settings: HashMap<Uuid, Settings>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl Tables {
    /// Strictly increasing timestamps keep creation order observable even
    /// when two rows are written within the clock's resolution.
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_timestamp {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_timestamp = Some(now);
        now
    }

    fn user_name(&self, id: Uuid) -> String {
        self.users
            .get(&id)
            .map(|u| u.name.clone())
            .unwrap_or_default()
    }

    fn member_count(&self, group_id: Uuid) -> i64 {
        self.memberships
            .keys()
            .filter(|(g, _)| *g == group_id)
            .count() as i64
    }

    fn group_summary(&self, group: &StudyGroup) -> GroupSummary {
        GroupSummary {
            group: group.clone(),
            owner_name: self.user_name(group.owner_id),
            member_count: self.member_count(group.id),
        }
    }

    fn resource_summary(&self, resource: &Resource) -> ResourceSummary {
        ResourceSummary {
            resource: resource.clone(),
            uploader_name: self.user_name(resource.uploaded_by),
        }
    }

    fn remove_group(&mut self, group_id: Uuid) -> bool {
        if self.groups.remove(&group_id).is_none() {
            return false;
        }
        self.memberships.retain(|(g, _), _| *g != group_id);
        self.resources.retain(|_, r| r.group_id != Some(group_id));
        true
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of membership rows for a group.
    pub fn membership_rows(&self, group_id: Uuid) -> usize {
        self.tables.lock().member_count(group_id) as usize
    }

    /// Number of resource rows across all users.
    pub fn resource_rows(&self) -> usize {
        self.tables.lock().resources.len()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.lock();
        if tables.users.values().any(|u| u.email == new.email) {
            return Err(StoreError::Conflict);
        }
        let mut user = User::from_new(new);
        user.created_at = tables.next_timestamp();
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.tables.lock().users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .tables
            .lock()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn update_user_name(&self, id: Uuid, name: &str) -> StoreResult<Option<User>> {
        let mut tables = self.tables.lock();
        Ok(tables.users.get_mut(&id).map(|user| {
            user.name = name.to_string();
            user.clone()
        }))
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> StoreResult<bool> {
        let mut tables = self.tables.lock();
        match tables.users.get_mut(&id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.lock();
        if tables.users.remove(&id).is_none() {
            return Ok(false);
        }

        let owned: Vec<Uuid> = tables
            .groups
            .values()
            .filter(|g| g.owner_id == id)
            .map(|g| g.id)
            .collect();
        for group_id in owned {
            tables.remove_group(group_id);
        }

        tables.memberships.retain(|(_, u), _| *u != id);
        tables.resources.retain(|_, r| r.uploaded_by != id);
        tables.settings.remove(&id);
        Ok(true)
    }
}

#[async_trait]
impl GroupStore for MemoryStore {
    async fn create_group(&self, new: NewGroup) -> StoreResult<GroupSummary> {
        let mut tables = self.tables.lock();
        let created_at = tables.next_timestamp();
        let group = StudyGroup {
            id: Uuid::new_v4(),
            name: new.name,
            description: new.description,
            subject: new.subject,
            max_members: new.max_members,
            owner_id: new.owner_id,
            created_at,
        };
        tables.memberships.insert((group.id, group.owner_id), created_at);
        tables.groups.insert(group.id, group.clone());
        Ok(tables.group_summary(&group))
    }

    async fn find_group(&self, id: Uuid) -> StoreResult<Option<GroupSummary>> {
        let tables = self.tables.lock();
        Ok(tables.groups.get(&id).map(|g| tables.group_summary(g)))
    }

    async fn list_groups(&self, query: &GroupQuery) -> StoreResult<(Vec<GroupSummary>, i64)> {
        let tables = self.tables.lock();
        let mut matches: Vec<GroupSummary> = tables
            .groups
            .values()
            .map(|g| tables.group_summary(g))
            .filter(|s| query.matches(s))
            .collect();
        matches.sort_by(|a, b| query.sort.compare(a, b));

        let total = matches.len() as i64;
        let items = matches
            .into_iter()
            .skip(query.page.offset() as usize)
            .take(query.page.limit as usize)
            .collect();
        Ok((items, total))
    }

    async fn memberships_among(
        &self,
        user_id: Uuid,
        group_ids: &[Uuid],
    ) -> StoreResult<HashSet<Uuid>> {
        let tables = self.tables.lock();
        Ok(group_ids
            .iter()
            .copied()
            .filter(|g| tables.memberships.contains_key(&(*g, user_id)))
            .collect())
    }

    async fn is_member(&self, group_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        Ok(self
            .tables
            .lock()
            .memberships
            .contains_key(&(group_id, user_id)))
    }

    async fn group_members(&self, group_id: Uuid) -> StoreResult<Vec<MemberDetail>> {
        let tables = self.tables.lock();
        let mut members: Vec<MemberDetail> = tables
            .memberships
            .iter()
            .filter(|((g, _), _)| *g == group_id)
            .filter_map(|((_, u), joined_at)| {
                tables.users.get(u).map(|user| MemberDetail {
                    user: user.public(),
                    joined_at: *joined_at,
                })
            })
            .collect();
        members.sort_by(|a, b| a.joined_at.cmp(&b.joined_at));
        Ok(members)
    }

    async fn update_group(&self, id: Uuid, patch: &GroupPatch) -> StoreResult<GroupUpdate> {
        let mut tables = self.tables.lock();
        let member_count = tables.member_count(id);

        let Some(group) = tables.groups.get_mut(&id) else {
            return Ok(GroupUpdate::GroupMissing);
        };

        if let Some(max) = patch.max_members {
            if i64::from(max) < member_count {
                return Ok(GroupUpdate::BelowMemberCount(member_count));
            }
        }

        if let Some(name) = &patch.name {
            group.name = name.clone();
        }
        if let Some(description) = &patch.description {
            group.description = description.clone();
        }
        if let Some(subject) = patch.subject {
            group.subject = subject;
        }
        if let Some(max) = patch.max_members {
            group.max_members = max;
        }

        let group = group.clone();
        Ok(GroupUpdate::Updated(tables.group_summary(&group)))
    }

    async fn delete_group(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.tables.lock().remove_group(id))
    }

    async fn join_group(&self, group_id: Uuid, user_id: Uuid) -> StoreResult<JoinOutcome> {
        let mut tables = self.tables.lock();
        let Some(max_members) = tables.groups.get(&group_id).map(|g| g.max_members) else {
            return Ok(JoinOutcome::GroupMissing);
        };
        if tables.memberships.contains_key(&(group_id, user_id)) {
            return Ok(JoinOutcome::AlreadyMember);
        }
        if tables.member_count(group_id) >= i64::from(max_members) {
            return Ok(JoinOutcome::Full);
        }
        let joined_at = tables.next_timestamp();
        tables.memberships.insert((group_id, user_id), joined_at);
        Ok(JoinOutcome::Joined)
    }

    async fn leave_group(&self, group_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        Ok(self
            .tables
            .lock()
            .memberships
            .remove(&(group_id, user_id))
            .is_some())
    }

    async fn groups_owned_by(&self, user_id: Uuid, limit: i64) -> StoreResult<Vec<GroupSummary>> {
        let tables = self.tables.lock();
        let mut owned: Vec<&StudyGroup> = tables
            .groups
            .values()
            .filter(|g| g.owner_id == user_id)
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|g| tables.group_summary(g))
            .collect())
    }

    async fn groups_joined_by(&self, user_id: Uuid, limit: i64) -> StoreResult<Vec<JoinedGroup>> {
        let tables = self.tables.lock();
        let mut joined: Vec<JoinedGroup> = tables
            .memberships
            .iter()
            .filter(|((_, u), _)| *u == user_id)
            .filter_map(|((g, _), joined_at)| {
                tables
                    .groups
                    .get(g)
                    .filter(|group| group.owner_id != user_id)
                    .map(|group| JoinedGroup {
                        summary: tables.group_summary(group),
                        joined_at: *joined_at,
                    })
            })
            .collect();
        joined.sort_by(|a, b| b.joined_at.cmp(&a.joined_at));
        joined.truncate(limit.max(0) as usize);
        Ok(joined)
    }

    async fn count_groups_owned(&self, user_id: Uuid) -> StoreResult<i64> {
        Ok(self
            .tables
            .lock()
            .groups
            .values()
            .filter(|g| g.owner_id == user_id)
            .count() as i64)
    }

    async fn count_memberships(&self, user_id: Uuid) -> StoreResult<i64> {
        Ok(self
            .tables
            .lock()
            .memberships
            .keys()
            .filter(|(_, u)| *u == user_id)
            .count() as i64)
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn create_resource(&self, new: NewResource) -> StoreResult<ResourceSummary> {
        let mut tables = self.tables.lock();
        let created_at = tables.next_timestamp();
        let resource = Resource {
            id: Uuid::new_v4(),
            title: new.title,
            description: new.description,
            category: new.category,
            subject: new.subject,
            file_url: new.file_url,
            file_name: new.file_name,
            uploaded_by: new.uploaded_by,
            group_id: new.group_id,
            download_count: 0,
            created_at,
        };
        tables.resources.insert(resource.id, resource.clone());
        Ok(tables.resource_summary(&resource))
    }

    async fn find_resource(&self, id: Uuid) -> StoreResult<Option<ResourceSummary>> {
        let tables = self.tables.lock();
        Ok(tables.resources.get(&id).map(|r| tables.resource_summary(r)))
    }

    async fn list_resources(
        &self,
        query: &ResourceQuery,
    ) -> StoreResult<(Vec<ResourceSummary>, i64)> {
        let tables = self.tables.lock();
        let mut matches: Vec<&Resource> = tables
            .resources
            .values()
            .filter(|r| query.matches(r))
            .collect();
        matches.sort_by(|a, b| query.sort.compare(a, b));

        let total = matches.len() as i64;
        let items = matches
            .into_iter()
            .skip(query.page.offset() as usize)
            .take(query.page.limit as usize)
            .map(|r| tables.resource_summary(r))
            .collect();
        Ok((items, total))
    }

    async fn update_resource(
        &self,
        id: Uuid,
        patch: &ResourcePatch,
    ) -> StoreResult<Option<ResourceSummary>> {
        let mut tables = self.tables.lock();
        let Some(resource) = tables.resources.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(title) = &patch.title {
            resource.title = title.clone();
        }
        if let Some(description) = &patch.description {
            resource.description = description.clone();
        }
        if let Some(category) = patch.category {
            resource.category = category;
        }
        if let Some(subject) = &patch.subject {
            resource.subject = subject.clone();
        }
        if let Some(file_url) = &patch.file_url {
            resource.file_url = file_url.clone();
        }
        if let Some(file_name) = &patch.file_name {
            resource.file_name = file_name.clone();
        }

        let resource = resource.clone();
        Ok(Some(tables.resource_summary(&resource)))
    }

    async fn delete_resource(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.tables.lock().resources.remove(&id).is_some())
    }

    async fn increment_downloads(&self, file_url: &str) -> StoreResult<u64> {
        let mut tables = self.tables.lock();
        let mut updated = 0;
        for resource in tables.resources.values_mut().filter(|r| r.file_url == file_url) {
            resource.download_count += 1;
            updated += 1;
        }
        Ok(updated)
    }

    async fn resources_owned_by(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> StoreResult<Vec<ResourceSummary>> {
        let tables = self.tables.lock();
        let mut owned: Vec<&Resource> = tables
            .resources
            .values()
            .filter(|r| r.uploaded_by == user_id)
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|r| tables.resource_summary(r))
            .collect())
    }

    async fn upload_stats(&self, user_id: Uuid) -> StoreResult<UploadStats> {
        let tables = self.tables.lock();
        Ok(tables
            .resources
            .values()
            .filter(|r| r.uploaded_by == user_id)
            .fold(UploadStats::default(), |mut stats, r| {
                stats.resources_uploaded += 1;
                stats.total_downloads += r.download_count;
                stats
            }))
    }

    async fn file_urls_for_group(&self, group_id: Uuid) -> StoreResult<Vec<String>> {
        Ok(self
            .tables
            .lock()
            .resources
            .values()
            .filter(|r| r.group_id == Some(group_id))
            .map(|r| r.file_url.clone())
            .collect())
    }

    async fn file_urls_for_user(&self, user_id: Uuid) -> StoreResult<Vec<String>> {
        let tables = self.tables.lock();
        let owned_groups: HashSet<Uuid> = tables
            .groups
            .values()
            .filter(|g| g.owner_id == user_id)
            .map(|g| g.id)
            .collect();
        Ok(tables
            .resources
            .values()
            .filter(|r| {
                r.uploaded_by == user_id
                    || r.group_id.map_or(false, |g| owned_groups.contains(&g))
            })
            .map(|r| r.file_url.clone())
            .collect())
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get_or_create_settings(&self, user_id: Uuid) -> StoreResult<Settings> {
        let mut tables = self.tables.lock();
        Ok(tables
            .settings
            .entry(user_id)
            .or_insert_with(|| Settings::defaults_for(user_id))
            .clone())
    }

    async fn upsert_settings(&self, user_id: Uuid, patch: &SettingsPatch) -> StoreResult<Settings> {
        let mut tables = self.tables.lock();
        let settings = tables
            .settings
            .entry(user_id)
            .or_insert_with(|| Settings::defaults_for(user_id));
        settings.apply(patch);
        Ok(settings.clone())
    }
}
