use async_trait::async_trait;
use uuid::Uuid;

use super::{PgStore, SettingsStore};
use crate::error::StoreResult;
use crate::models::settings::{Settings, SettingsPatch, Theme};

#[derive(sqlx::FromRow)]
struct SettingsRow {
    user_id: Uuid,
    email_notifications: bool,
    in_app_notifications: bool,
    private_profile: bool,
    hide_activity: bool,
    theme: String,
}

impl From<SettingsRow> for Settings {
    fn from(row: SettingsRow) -> Self {
        Settings {
            user_id: row.user_id,
            email_notifications: row.email_notifications,
            in_app_notifications: row.in_app_notifications,
            private_profile: row.private_profile,
            hide_activity: row.hide_activity,
            // The column carries a CHECK constraint, so only known themes arrive.
            theme: Theme::parse(&row.theme).unwrap_or_default(),
        }
    }
}

const SETTINGS_COLUMNS: &str =
    "user_id, email_notifications, in_app_notifications, private_profile, hide_activity, theme";

#[async_trait]
impl SettingsStore for PgStore {
    async fn get_or_create_settings(&self, user_id: Uuid) -> StoreResult<Settings> {
        sqlx::query("INSERT INTO settings (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(self.pool())
            .await?;

        let sql = format!("SELECT {} FROM settings WHERE user_id = $1", SETTINGS_COLUMNS);
        let row = sqlx::query_as::<_, SettingsRow>(&sql)
            .bind(user_id)
            .fetch_one(self.pool())
            .await?;

        Ok(row.into())
    }

    async fn upsert_settings(&self, user_id: Uuid, patch: &SettingsPatch) -> StoreResult<Settings> {
        let sql = format!(
            "INSERT INTO settings ({cols}) \
             VALUES ($1, COALESCE($2, TRUE), COALESCE($3, TRUE), COALESCE($4, FALSE), \
                     COALESCE($5, FALSE), COALESCE($6, 'dark')) \
             ON CONFLICT (user_id) DO UPDATE SET \
                email_notifications = COALESCE($2, settings.email_notifications), \
                in_app_notifications = COALESCE($3, settings.in_app_notifications), \
                private_profile = COALESCE($4, settings.private_profile), \
                hide_activity = COALESCE($5, settings.hide_activity), \
                theme = COALESCE($6, settings.theme) \
             RETURNING {cols}",
            cols = SETTINGS_COLUMNS
        );

        let row = sqlx::query_as::<_, SettingsRow>(&sql)
            .bind(user_id)
            .bind(patch.email_notifications)
            .bind(patch.in_app_notifications)
            .bind(patch.private_profile)
            .bind(patch.hide_activity)
            .bind(patch.theme.map(|t| t.as_str()))
            .fetch_one(self.pool())
            .await?;

        Ok(row.into())
    }
}
