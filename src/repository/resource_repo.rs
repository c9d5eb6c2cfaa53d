use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::{PgStore, ResourceStore};
use crate::error::{StoreError, StoreResult};
use crate::models::resource::{NewResource, Resource, ResourcePatch, ResourceSummary, UploadStats};
use crate::models::Category;
use crate::services::listing::{like_pattern, ResourceQuery, ResourceSort};

const RESOURCE_SELECT: &str = "SELECT r.id, r.title, r.description, r.category, r.subject, \
     r.file_url, r.file_name, r.uploaded_by, r.group_id, r.download_count, r.created_at, \
     u.name AS uploader_name \
     FROM resources r JOIN users u ON u.id = r.uploaded_by";

#[derive(sqlx::FromRow)]
struct ResourceRow {
    id: Uuid,
    title: String,
    description: String,
    category: String,
    subject: Option<String>,
    file_url: String,
    file_name: String,
    uploaded_by: Uuid,
    group_id: Option<Uuid>,
    download_count: i64,
    created_at: DateTime<Utc>,
    uploader_name: String,
}

impl TryFrom<ResourceRow> for ResourceSummary {
    type Error = StoreError;

    fn try_from(row: ResourceRow) -> Result<Self, Self::Error> {
        let category = Category::parse(&row.category).ok_or_else(|| {
            StoreError::Database(sqlx::Error::Decode(
                format!("unknown category in resources: {}", row.category).into(),
            ))
        })?;

        Ok(ResourceSummary {
            resource: Resource {
                id: row.id,
                title: row.title,
                description: row.description,
                category,
                subject: row.subject,
                file_url: row.file_url,
                file_name: row.file_name,
                uploaded_by: row.uploaded_by,
                group_id: row.group_id,
                download_count: row.download_count,
                created_at: row.created_at,
            },
            uploader_name: row.uploader_name,
        })
    }
}

fn into_summaries(rows: Vec<ResourceRow>) -> StoreResult<Vec<ResourceSummary>> {
    rows.into_iter().map(ResourceSummary::try_from).collect()
}

fn push_resource_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &ResourceQuery) {
    builder.push(" WHERE TRUE");

    if let Some(search) = &query.search {
        let pattern = like_pattern(search);
        builder
            .push(" AND (r.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR r.description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }

    if let Some(category) = query.category {
        builder
            .push(" AND r.category = ")
            .push_bind(category.as_str());
    }

    if let Some(after) = query.created_after {
        builder.push(" AND r.created_at >= ").push_bind(after);
    }

    if let Some(group_id) = query.group_id {
        builder.push(" AND r.group_id = ").push_bind(group_id);
    }
}

fn resource_order(sort: ResourceSort) -> &'static str {
    match sort {
        ResourceSort::Newest => " ORDER BY r.created_at DESC, r.id",
        ResourceSort::Oldest => " ORDER BY r.created_at ASC, r.id",
        ResourceSort::Alpha => " ORDER BY LOWER(r.title) COLLATE \"C\" ASC, r.id",
        ResourceSort::MostDownloaded => {
            " ORDER BY r.download_count DESC, r.created_at DESC, r.id"
        }
    }
}

#[async_trait]
impl ResourceStore for PgStore {
    async fn create_resource(&self, new: NewResource) -> StoreResult<ResourceSummary> {
        let id = Uuid::new_v4();

        sqlx::query(
            "INSERT INTO resources \
                (id, title, description, category, subject, file_url, file_name, uploaded_by, group_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(id)
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.category.as_str())
        .bind(new.subject.as_deref())
        .bind(&new.file_url)
        .bind(&new.file_name)
        .bind(new.uploaded_by)
        .bind(new.group_id)
        .execute(self.pool())
        .await?;

        self.find_resource(id)
            .await?
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))
    }

    async fn find_resource(&self, id: Uuid) -> StoreResult<Option<ResourceSummary>> {
        let sql = format!("{} WHERE r.id = $1", RESOURCE_SELECT);
        let row = sqlx::query_as::<_, ResourceRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        row.map(ResourceSummary::try_from).transpose()
    }

    async fn list_resources(
        &self,
        query: &ResourceQuery,
    ) -> StoreResult<(Vec<ResourceSummary>, i64)> {
        let mut page = QueryBuilder::<Postgres>::new(RESOURCE_SELECT);
        push_resource_filters(&mut page, query);
        page.push(resource_order(query.sort))
            .push(" LIMIT ")
            .push_bind(query.page.limit)
            .push(" OFFSET ")
            .push_bind(query.page.offset());

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM resources r");
        push_resource_filters(&mut count, query);

        let (rows, (total,)) = tokio::try_join!(
            page.build_query_as::<ResourceRow>().fetch_all(self.pool()),
            count.build_query_as::<(i64,)>().fetch_one(self.pool()),
        )?;

        Ok((into_summaries(rows)?, total))
    }

    async fn update_resource(
        &self,
        id: Uuid,
        patch: &ResourcePatch,
    ) -> StoreResult<Option<ResourceSummary>> {
        let (set_subject, subject) = match &patch.subject {
            Some(value) => (true, value.as_deref()),
            None => (false, None),
        };

        let result = sqlx::query(
            "UPDATE resources SET \
                title = COALESCE($2, title), \
                description = COALESCE($3, description), \
                category = COALESCE($4, category), \
                subject = CASE WHEN $5 THEN $6 ELSE subject END, \
                file_url = COALESCE($7, file_url), \
                file_name = COALESCE($8, file_name) \
             WHERE id = $1",
        )
        .bind(id)
        .bind(patch.title.as_deref())
        .bind(patch.description.as_deref())
        .bind(patch.category.map(|c| c.as_str()))
        .bind(set_subject)
        .bind(subject)
        .bind(patch.file_url.as_deref())
        .bind(patch.file_name.as_deref())
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.find_resource(id).await
    }

    async fn delete_resource(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM resources WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn increment_downloads(&self, file_url: &str) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE resources SET download_count = download_count + 1 WHERE file_url = $1",
        )
        .bind(file_url)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected())
    }

    async fn resources_owned_by(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> StoreResult<Vec<ResourceSummary>> {
        let sql = format!(
            "{} WHERE r.uploaded_by = $1 ORDER BY r.created_at DESC LIMIT $2",
            RESOURCE_SELECT
        );
        let rows = sqlx::query_as::<_, ResourceRow>(&sql)
            .bind(user_id)
            .bind(limit)
            .fetch_all(self.pool())
            .await?;

        into_summaries(rows)
    }

    async fn upload_stats(&self, user_id: Uuid) -> StoreResult<UploadStats> {
        let (resources_uploaded, total_downloads) = sqlx::query_as::<_, (i64, i64)>(
            "SELECT COUNT(*), COALESCE(SUM(download_count), 0)::BIGINT \
             FROM resources WHERE uploaded_by = $1",
        )
        .bind(user_id)
        .fetch_one(self.pool())
        .await?;

        Ok(UploadStats {
            resources_uploaded,
            total_downloads,
        })
    }

    async fn file_urls_for_group(&self, group_id: Uuid) -> StoreResult<Vec<String>> {
        let urls =
            sqlx::query_scalar::<_, String>("SELECT file_url FROM resources WHERE group_id = $1")
                .bind(group_id)
                .fetch_all(self.pool())
                .await?;

        Ok(urls)
    }

    async fn file_urls_for_user(&self, user_id: Uuid) -> StoreResult<Vec<String>> {
        let urls = sqlx::query_scalar::<_, String>(
            "SELECT file_url FROM resources \
             WHERE uploaded_by = $1 \
                OR group_id IN (SELECT id FROM study_groups WHERE owner_id = $1)",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        Ok(urls)
    }
}
