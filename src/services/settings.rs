use serde::Serialize;
use uuid::Uuid;

use super::AppState;
use crate::error::AppResult;
use crate::models::settings::{Settings, SettingsPatch};

/// Response shape of the settings endpoints.
#[derive(Debug, Serialize)]
pub struct SettingsView {
    pub preferences: Settings,
}

pub async fn get_settings(state: &AppState, user_id: Uuid) -> AppResult<SettingsView> {
    let preferences = state.settings.get_or_create_settings(user_id).await?;
    Ok(SettingsView { preferences })
}

pub async fn update_settings(
    state: &AppState,
    user_id: Uuid,
    patch: SettingsPatch,
) -> AppResult<SettingsView> {
    let preferences = state.settings.upsert_settings(user_id, &patch).await?;
    tracing::info!(%user_id, "Settings updated");
    Ok(SettingsView { preferences })
}
