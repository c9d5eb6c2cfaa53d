use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::user::PublicUser;
use super::vocabulary::Subject;
use crate::utils::format_date_label;

pub const DEFAULT_MAX_MEMBERS: i32 = 50;

#[derive(Clone, Debug)]
pub struct StudyGroup {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub subject: Subject,
    pub max_members: i32,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A group row joined with its owner's name and live member count.
#[derive(Clone, Debug)]
pub struct GroupSummary {
    pub group: StudyGroup,
    pub owner_name: String,
    pub member_count: i64,
}

#[derive(Clone, Debug)]
pub struct NewGroup {
    pub name: String,
    pub description: String,
    pub subject: Subject,
    pub max_members: i32,
    pub owner_id: Uuid,
}

/// Field-level partial update; `None` leaves the column untouched.
#[derive(Clone, Debug, Default)]
pub struct GroupPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub subject: Option<Subject>,
    pub max_members: Option<i32>,
}

#[derive(Clone, Debug)]
pub struct MemberDetail {
    pub user: PublicUser,
    pub joined_at: DateTime<Utc>,
}

/// A group the user joined without owning it.
#[derive(Clone, Debug)]
pub struct JoinedGroup {
    pub summary: GroupSummary,
    pub joined_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    AlreadyMember,
    Full,
    GroupMissing,
}

#[derive(Clone, Debug)]
pub enum GroupUpdate {
    Updated(GroupSummary),
    BelowMemberCount(i64),
    GroupMissing,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupView {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub subject: Subject,
    pub max_members: i32,
    pub member_count: i64,
    pub is_owner: bool,
    pub is_member: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub created_at_label: String,
}

impl GroupView {
    pub fn new(summary: GroupSummary, is_owner: bool, is_member: bool) -> Self {
        let GroupSummary {
            group,
            owner_name,
            member_count,
        } = summary;

        Self {
            id: group.id,
            name: group.name,
            description: group.description,
            subject: group.subject,
            max_members: group.max_members,
            member_count,
            is_owner,
            is_member,
            created_by: owner_name,
            created_at: group.created_at,
            created_at_label: format_date_label(group.created_at),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberView {
    pub user: PublicUser,
    pub joined_at: DateTime<Utc>,
    pub joined_at_label: String,
}

impl From<MemberDetail> for MemberView {
    fn from(member: MemberDetail) -> Self {
        Self {
            joined_at_label: format_date_label(member.joined_at),
            user: member.user,
            joined_at: member.joined_at,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDetailView {
    #[serde(flatten)]
    pub group: GroupView,
    pub members: Vec<MemberView>,
}
