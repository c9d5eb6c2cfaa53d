//! Listing engine shared by the study-group and resource endpoints.
//!
//! Raw query strings are validated into typed queries here. The Postgres
//! store translates a query into SQL; the in-memory store evaluates the
//! same query through `matches` and `compare`, so both backends agree on
//! filtering, ordering, and totals.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::group::{GroupSummary, GroupView};
use crate::models::resource::Resource;
use crate::models::{Category, Subject};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 12;
pub const MAX_LIMIT: i64 = 50;
/// Largest page whose offset still fits in an `i64` at `MAX_LIMIT`.
pub const MAX_PAGE: i64 = i64::MAX / MAX_LIMIT;

/// File extensions served by the inline preview endpoint.
pub const PREVIEW_EXTENSIONS: [&str; 6] = ["pdf", "jpg", "jpeg", "png", "gif", "webp"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageRequest {
    pub fn parse(page: Option<&str>, limit: Option<&str>) -> AppResult<Self> {
        let mut errors = Vec::new();

        let page = match non_empty(page) {
            None => DEFAULT_PAGE,
            Some(raw) => match raw.parse::<i64>() {
                Ok(p) if (1..=MAX_PAGE).contains(&p) => p,
                _ => {
                    errors.push("page: Page must be a positive integer".to_string());
                    DEFAULT_PAGE
                }
            },
        };

        let limit = match non_empty(limit) {
            None => DEFAULT_LIMIT,
            Some(raw) => match raw.parse::<i64>() {
                Ok(l) if (1..=MAX_LIMIT).contains(&l) => l,
                _ => {
                    errors.push(format!("limit: Limit must be between 1 and {}", MAX_LIMIT));
                    DEFAULT_LIMIT
                }
            },
        };

        if !errors.is_empty() {
            return Err(AppError::validation(errors));
        }

        Ok(Self { page, limit })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            page: request.page,
            limit: request.limit,
            total_pages: total_pages(total, request.limit),
        }
    }
}

/// `ceil(total / limit)`.
pub fn total_pages(total: i64, limit: i64) -> i64 {
    if limit <= 0 || total <= 0 {
        return 0;
    }
    (total + limit - 1) / limit
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DateRange {
    Week,
    Month,
    Year,
}

impl DateRange {
    pub fn parse(input: &str) -> Option<Self> {
        match input {
            "week" => Some(DateRange::Week),
            "month" => Some(DateRange::Month),
            "year" => Some(DateRange::Year),
            _ => None,
        }
    }

    pub fn days(&self) -> i64 {
        match self {
            DateRange::Week => 7,
            DateRange::Month => 30,
            DateRange::Year => 365,
        }
    }

    /// Inclusive lower bound; there is no upper bound.
    pub fn lower_bound(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(self.days())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemberBucket {
    UnderFive,
    FiveToTen,
    OverTen,
}

impl MemberBucket {
    pub fn parse(input: &str) -> Option<Self> {
        match input {
            "lt5" => Some(MemberBucket::UnderFive),
            "5to10" => Some(MemberBucket::FiveToTen),
            "gt10" => Some(MemberBucket::OverTen),
            _ => None,
        }
    }

    pub fn contains(&self, member_count: i64) -> bool {
        match self {
            MemberBucket::UnderFive => member_count < 5,
            MemberBucket::FiveToTen => (5..=10).contains(&member_count),
            MemberBucket::OverTen => member_count > 10,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GroupSort {
    #[default]
    Newest,
    Oldest,
    Alpha,
    MostMembers,
}

impl GroupSort {
    pub fn parse(input: &str) -> Option<Self> {
        match input {
            "newest" => Some(GroupSort::Newest),
            "oldest" => Some(GroupSort::Oldest),
            "alpha" => Some(GroupSort::Alpha),
            "most-members" => Some(GroupSort::MostMembers),
            _ => None,
        }
    }

    pub fn compare(&self, a: &GroupSummary, b: &GroupSummary) -> Ordering {
        let primary = match self {
            GroupSort::Newest => b.group.created_at.cmp(&a.group.created_at),
            GroupSort::Oldest => a.group.created_at.cmp(&b.group.created_at),
            GroupSort::Alpha => fold_cmp(&a.group.name, &b.group.name),
            GroupSort::MostMembers => b
                .member_count
                .cmp(&a.member_count)
                .then_with(|| b.group.created_at.cmp(&a.group.created_at)),
        };
        primary.then_with(|| a.group.id.cmp(&b.group.id))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResourceSort {
    #[default]
    Newest,
    Oldest,
    Alpha,
    MostDownloaded,
}

impl ResourceSort {
    pub fn parse(input: &str) -> Option<Self> {
        match input {
            "newest" => Some(ResourceSort::Newest),
            "oldest" => Some(ResourceSort::Oldest),
            "alpha" => Some(ResourceSort::Alpha),
            "most-downloaded" => Some(ResourceSort::MostDownloaded),
            _ => None,
        }
    }

    pub fn compare(&self, a: &Resource, b: &Resource) -> Ordering {
        let primary = match self {
            ResourceSort::Newest => b.created_at.cmp(&a.created_at),
            ResourceSort::Oldest => a.created_at.cmp(&b.created_at),
            ResourceSort::Alpha => fold_cmp(&a.title, &b.title),
            ResourceSort::MostDownloaded => b
                .download_count
                .cmp(&a.download_count)
                .then_with(|| b.created_at.cmp(&a.created_at)),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

/// Raw query string of `GET /api/study-groups`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct GroupListParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub subjects: Option<String>,
    pub members: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct GroupQuery {
    pub search: Option<String>,
    pub subjects: Vec<Subject>,
    pub members: Option<MemberBucket>,
    pub sort: GroupSort,
    pub page: PageRequest,
}

impl GroupListParams {
    pub fn into_query(self) -> AppResult<GroupQuery> {
        let page = PageRequest::parse(self.page.as_deref(), self.limit.as_deref())?;

        let mut subjects = Vec::new();
        if let Some(raw) = non_empty(self.subjects.as_deref()) {
            for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let subject = Subject::parse(item)
                    .ok_or_else(|| AppError::bad_request(format!("Invalid subject filter: {}", item)))?;
                if !subjects.contains(&subject) {
                    subjects.push(subject);
                }
            }
        }

        let members = non_empty(self.members.as_deref())
            .map(|raw| {
                MemberBucket::parse(raw)
                    .ok_or_else(|| AppError::bad_request(format!("Invalid member filter: {}", raw)))
            })
            .transpose()?;

        let sort = non_empty(self.sort.as_deref())
            .map(|raw| {
                GroupSort::parse(raw)
                    .ok_or_else(|| AppError::bad_request(format!("Invalid sort option: {}", raw)))
            })
            .transpose()?
            .unwrap_or_default();

        Ok(GroupQuery {
            search: non_empty(self.search.as_deref()).map(str::to_string),
            subjects,
            members,
            sort,
            page,
        })
    }
}

impl GroupQuery {
    pub fn matches(&self, summary: &GroupSummary) -> bool {
        let group = &summary.group;

        if let Some(search) = &self.search {
            if !contains_ignore_case(&group.name, search)
                && !contains_ignore_case(&group.description, search)
            {
                return false;
            }
        }

        if !self.subjects.is_empty() && !self.subjects.contains(&group.subject) {
            return false;
        }

        match self.members {
            Some(bucket) => bucket.contains(summary.member_count),
            None => true,
        }
    }
}

/// Raw query string of `GET /api/resources`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceListParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub category: Option<String>,
    pub date: Option<String>,
    pub group_id: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct ResourceQuery {
    pub search: Option<String>,
    pub category: Option<Category>,
    pub created_after: Option<DateTime<Utc>>,
    pub group_id: Option<Uuid>,
    pub sort: ResourceSort,
    pub page: PageRequest,
}

impl ResourceListParams {
    pub fn into_query(self, now: DateTime<Utc>) -> AppResult<ResourceQuery> {
        let page = PageRequest::parse(self.page.as_deref(), self.limit.as_deref())?;

        let category = non_empty(self.category.as_deref())
            .map(|raw| {
                Category::parse(raw)
                    .ok_or_else(|| AppError::bad_request(format!("Invalid category filter: {}", raw)))
            })
            .transpose()?;

        let created_after = non_empty(self.date.as_deref())
            .map(|raw| {
                DateRange::parse(raw)
                    .map(|range| range.lower_bound(now))
                    .ok_or_else(|| AppError::bad_request(format!("Invalid date filter: {}", raw)))
            })
            .transpose()?;

        let group_id = non_empty(self.group_id.as_deref())
            .map(|raw| {
                Uuid::parse_str(raw).map_err(|_| AppError::bad_request("Invalid study group ID"))
            })
            .transpose()?;

        let sort = non_empty(self.sort.as_deref())
            .map(|raw| {
                ResourceSort::parse(raw)
                    .ok_or_else(|| AppError::bad_request(format!("Invalid sort option: {}", raw)))
            })
            .transpose()?
            .unwrap_or_default();

        Ok(ResourceQuery {
            search: non_empty(self.search.as_deref()).map(str::to_string),
            category,
            created_after,
            group_id,
            sort,
            page,
        })
    }
}

impl ResourceQuery {
    pub fn matches(&self, resource: &Resource) -> bool {
        if let Some(search) = &self.search {
            if !contains_ignore_case(&resource.title, search)
                && !contains_ignore_case(&resource.description, search)
            {
                return false;
            }
        }

        if let Some(category) = self.category {
            if resource.category != category {
                return false;
            }
        }

        if let Some(after) = self.created_after {
            if resource.created_at < after {
                return false;
            }
        }

        if let Some(group_id) = self.group_id {
            if resource.group_id != Some(group_id) {
                return false;
            }
        }

        true
    }
}

/// Attaches viewer-relative flags. `member_of` holds the ids of the page's
/// groups the viewer belongs to, fetched in one batch.
pub fn annotate_groups(
    summaries: Vec<GroupSummary>,
    viewer: Uuid,
    member_of: &HashSet<Uuid>,
) -> Vec<GroupView> {
    summaries
        .into_iter()
        .map(|summary| {
            let is_owner = summary.group.owner_id == viewer;
            let is_member = member_of.contains(&summary.group.id);
            GroupView::new(summary, is_owner, is_member)
        })
        .collect()
}

/// Prefixes a stored relative path with the request origin unless the
/// stored value is already absolute.
pub fn absolute_url(origin: &str, file_url: &str) -> String {
    if file_url.starts_with("http://") || file_url.starts_with("https://") {
        return file_url.to_string();
    }
    let origin = origin.trim_end_matches('/');
    if file_url.starts_with('/') {
        format!("{}{}", origin, file_url)
    } else {
        format!("{}/{}", origin, file_url)
    }
}

pub fn is_previewable(file_name: &str) -> bool {
    extension_of(file_name)
        .map(|ext| PREVIEW_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

pub fn preview_url(origin: &str, file_url: &str) -> Option<String> {
    let stored_name = file_url.rsplit('/').next().filter(|n| !n.is_empty())?;
    if !is_previewable(stored_name) {
        return None;
    }
    Some(format!(
        "{}/api/resources/preview/{}",
        origin.trim_end_matches('/'),
        stored_name
    ))
}

pub fn extension_of(file_name: &str) -> Option<String> {
    std::path::Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Escapes `LIKE` metacharacters and wraps the term for substring search.
pub fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for c in search.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Case-folded comparison, matching `ORDER BY LOWER(..)` in SQL.
fn fold_cmp(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
