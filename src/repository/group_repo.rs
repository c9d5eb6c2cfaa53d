use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};
use std::collections::HashSet;
use uuid::Uuid;

use super::{GroupStore, PgStore};
use crate::error::{StoreError, StoreResult};
use crate::models::group::{
    GroupPatch, GroupSummary, GroupUpdate, JoinOutcome, JoinedGroup, MemberDetail, NewGroup,
    StudyGroup,
};
use crate::models::user::PublicUser;
use crate::models::Subject;
use crate::services::listing::{like_pattern, GroupQuery, GroupSort, MemberBucket};

/// Groups with owner name and live member count. Filters reference the
/// derived table alias `g`.
const GROUP_SELECT: &str = "SELECT sg.id, sg.name, sg.description, sg.subject, sg.max_members, \
     sg.owner_id, sg.created_at, u.name AS owner_name, \
     (SELECT COUNT(*) FROM study_group_members m WHERE m.group_id = sg.id) AS member_count \
     FROM study_groups sg JOIN users u ON u.id = sg.owner_id";

#[derive(sqlx::FromRow)]
struct GroupRow {
    id: Uuid,
    name: String,
    description: String,
    subject: String,
    max_members: i32,
    owner_id: Uuid,
    created_at: DateTime<Utc>,
    owner_name: String,
    member_count: i64,
}

impl TryFrom<GroupRow> for GroupSummary {
    type Error = StoreError;

    fn try_from(row: GroupRow) -> Result<Self, Self::Error> {
        let subject = Subject::parse(&row.subject).ok_or_else(|| {
            StoreError::Database(sqlx::Error::Decode(
                format!("unknown subject in study_groups: {}", row.subject).into(),
            ))
        })?;

        Ok(GroupSummary {
            group: StudyGroup {
                id: row.id,
                name: row.name,
                description: row.description,
                subject,
                max_members: row.max_members,
                owner_id: row.owner_id,
                created_at: row.created_at,
            },
            owner_name: row.owner_name,
            member_count: row.member_count,
        })
    }
}

#[derive(sqlx::FromRow)]
struct JoinedGroupRow {
    #[sqlx(flatten)]
    group: GroupRow,
    joined_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct MemberRow {
    id: Uuid,
    name: String,
    email: String,
    joined_at: DateTime<Utc>,
}

fn into_summaries(rows: Vec<GroupRow>) -> StoreResult<Vec<GroupSummary>> {
    rows.into_iter().map(GroupSummary::try_from).collect()
}

fn push_group_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &GroupQuery) {
    builder.push(" WHERE TRUE");

    if let Some(search) = &query.search {
        let pattern = like_pattern(search);
        builder
            .push(" AND (g.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR g.description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }

    if !query.subjects.is_empty() {
        builder.push(" AND g.subject IN (");
        let mut separated = builder.separated(", ");
        for subject in &query.subjects {
            separated.push_bind(subject.as_str());
        }
        separated.push_unseparated(")");
    }

    if let Some(bucket) = query.members {
        builder.push(match bucket {
            MemberBucket::UnderFive => " AND g.member_count < 5",
            MemberBucket::FiveToTen => " AND g.member_count BETWEEN 5 AND 10",
            MemberBucket::OverTen => " AND g.member_count > 10",
        });
    }
}

fn group_order(sort: GroupSort) -> &'static str {
    match sort {
        GroupSort::Newest => " ORDER BY g.created_at DESC, g.id",
        GroupSort::Oldest => " ORDER BY g.created_at ASC, g.id",
        GroupSort::Alpha => " ORDER BY LOWER(g.name) COLLATE \"C\" ASC, g.id",
        GroupSort::MostMembers => " ORDER BY g.member_count DESC, g.created_at DESC, g.id",
    }
}

#[async_trait]
impl GroupStore for PgStore {
    async fn create_group(&self, new: NewGroup) -> StoreResult<GroupSummary> {
        let id = Uuid::new_v4();
        let mut tx = self.pool().begin().await?;

        sqlx::query(
            "INSERT INTO study_groups (id, name, description, subject, max_members, owner_id) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(id)
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.subject.as_str())
        .bind(new.max_members)
        .bind(new.owner_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO study_group_members (group_id, user_id) VALUES ($1, $2)")
            .bind(id)
            .bind(new.owner_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.find_group(id)
            .await?
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))
    }

    async fn find_group(&self, id: Uuid) -> StoreResult<Option<GroupSummary>> {
        let sql = format!("{} WHERE sg.id = $1", GROUP_SELECT);
        let row = sqlx::query_as::<_, GroupRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        row.map(GroupSummary::try_from).transpose()
    }

    async fn list_groups(&self, query: &GroupQuery) -> StoreResult<(Vec<GroupSummary>, i64)> {
        let mut page = QueryBuilder::<Postgres>::new("SELECT * FROM (");
        page.push(GROUP_SELECT).push(") AS g");
        push_group_filters(&mut page, query);
        page.push(group_order(query.sort))
            .push(" LIMIT ")
            .push_bind(query.page.limit)
            .push(" OFFSET ")
            .push_bind(query.page.offset());

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM (");
        count.push(GROUP_SELECT).push(") AS g");
        push_group_filters(&mut count, query);

        let (rows, (total,)) = tokio::try_join!(
            page.build_query_as::<GroupRow>().fetch_all(self.pool()),
            count.build_query_as::<(i64,)>().fetch_one(self.pool()),
        )?;

        Ok((into_summaries(rows)?, total))
    }

    async fn memberships_among(
        &self,
        user_id: Uuid,
        group_ids: &[Uuid],
    ) -> StoreResult<HashSet<Uuid>> {
        if group_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT group_id FROM study_group_members WHERE user_id = $1 AND group_id = ANY($2)",
        )
        .bind(user_id)
        .bind(group_ids)
        .fetch_all(self.pool())
        .await?;

        Ok(ids.into_iter().collect())
    }

    async fn is_member(&self, group_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM study_group_members WHERE group_id = $1 AND user_id = $2)",
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_one(self.pool())
        .await?;

        Ok(exists)
    }

    async fn group_members(&self, group_id: Uuid) -> StoreResult<Vec<MemberDetail>> {
        let rows = sqlx::query_as::<_, MemberRow>(
            "SELECT u.id, u.name, u.email, m.joined_at \
             FROM study_group_members m JOIN users u ON u.id = m.user_id \
             WHERE m.group_id = $1 ORDER BY m.joined_at ASC",
        )
        .bind(group_id)
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| MemberDetail {
                user: PublicUser {
                    id: row.id,
                    name: row.name,
                    email: row.email,
                },
                joined_at: row.joined_at,
            })
            .collect())
    }

    async fn update_group(&self, id: Uuid, patch: &GroupPatch) -> StoreResult<GroupUpdate> {
        let mut tx = self.pool().begin().await?;

        // Row lock serializes this check against concurrent joins.
        let locked = sqlx::query_scalar::<_, i32>(
            "SELECT max_members FROM study_groups WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        if locked.is_none() {
            return Ok(GroupUpdate::GroupMissing);
        }

        if let Some(max) = patch.max_members {
            let member_count = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM study_group_members WHERE group_id = $1",
            )
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

            if i64::from(max) < member_count {
                return Ok(GroupUpdate::BelowMemberCount(member_count));
            }
        }

        sqlx::query(
            "UPDATE study_groups SET \
                name = COALESCE($2, name), \
                description = COALESCE($3, description), \
                subject = COALESCE($4, subject), \
                max_members = COALESCE($5, max_members) \
             WHERE id = $1",
        )
        .bind(id)
        .bind(patch.name.as_deref())
        .bind(patch.description.as_deref())
        .bind(patch.subject.map(|s| s.as_str()))
        .bind(patch.max_members)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        match self.find_group(id).await? {
            Some(summary) => Ok(GroupUpdate::Updated(summary)),
            None => Ok(GroupUpdate::GroupMissing),
        }
    }

    async fn delete_group(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM study_groups WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn join_group(&self, group_id: Uuid, user_id: Uuid) -> StoreResult<JoinOutcome> {
        let mut tx = self.pool().begin().await?;

        let max_members = sqlx::query_scalar::<_, i32>(
            "SELECT max_members FROM study_groups WHERE id = $1 FOR UPDATE",
        )
        .bind(group_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(max_members) = max_members else {
            return Ok(JoinOutcome::GroupMissing);
        };

        let already = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM study_group_members WHERE group_id = $1 AND user_id = $2)",
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        if already {
            return Ok(JoinOutcome::AlreadyMember);
        }

        let member_count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM study_group_members WHERE group_id = $1",
        )
        .bind(group_id)
        .fetch_one(&mut *tx)
        .await?;

        if member_count >= i64::from(max_members) {
            return Ok(JoinOutcome::Full);
        }

        sqlx::query("INSERT INTO study_group_members (group_id, user_id) VALUES ($1, $2)")
            .bind(group_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(JoinOutcome::Joined)
    }

    async fn leave_group(&self, group_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let result =
            sqlx::query("DELETE FROM study_group_members WHERE group_id = $1 AND user_id = $2")
                .bind(group_id)
                .bind(user_id)
                .execute(self.pool())
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn groups_owned_by(&self, user_id: Uuid, limit: i64) -> StoreResult<Vec<GroupSummary>> {
        let sql = format!(
            "{} WHERE sg.owner_id = $1 ORDER BY sg.created_at DESC LIMIT $2",
            GROUP_SELECT
        );
        let rows = sqlx::query_as::<_, GroupRow>(&sql)
            .bind(user_id)
            .bind(limit)
            .fetch_all(self.pool())
            .await?;

        into_summaries(rows)
    }

    async fn groups_joined_by(&self, user_id: Uuid, limit: i64) -> StoreResult<Vec<JoinedGroup>> {
        let rows = sqlx::query_as::<_, JoinedGroupRow>(
            "SELECT sg.id, sg.name, sg.description, sg.subject, sg.max_members, \
                    sg.owner_id, sg.created_at, u.name AS owner_name, \
                    (SELECT COUNT(*) FROM study_group_members c WHERE c.group_id = sg.id) AS member_count, \
                    m.joined_at \
             FROM study_group_members m \
             JOIN study_groups sg ON sg.id = m.group_id \
             JOIN users u ON u.id = sg.owner_id \
             WHERE m.user_id = $1 AND sg.owner_id <> $1 \
             ORDER BY m.joined_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(JoinedGroup {
                    summary: GroupSummary::try_from(row.group)?,
                    joined_at: row.joined_at,
                })
            })
            .collect()
    }

    async fn count_groups_owned(&self, user_id: Uuid) -> StoreResult<i64> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM study_groups WHERE owner_id = $1")
                .bind(user_id)
                .fetch_one(self.pool())
                .await?;

        Ok(count)
    }

    async fn count_memberships(&self, user_id: Uuid) -> StoreResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM study_group_members WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(self.pool())
        .await?;

        Ok(count)
    }
}
