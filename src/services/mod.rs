pub mod auth;
pub mod groups;
pub mod listing;
pub mod profile;
pub mod rate_limit;
pub mod resources;
pub mod settings;
pub mod storage;

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::repository::{GroupStore, ResourceStore, SettingsStore, Store, UserStore};

pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub groups: Arc<dyn GroupStore>,
    pub resources: Arc<dyn ResourceStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub config: Config,
    pub storage: storage::FileStorage,
    pub upload_limiter: rate_limit::UploadLimiter,
}

impl AppState {
    /// State backed by one store serving every concern.
    pub fn with_store<S>(store: Arc<S>, config: Config) -> Self
    where
        S: Store + 'static,
    {
        Self::from_parts(
            store.clone(),
            store.clone(),
            store.clone(),
            store,
            config,
        )
    }

    pub fn from_parts(
        users: Arc<dyn UserStore>,
        groups: Arc<dyn GroupStore>,
        resources: Arc<dyn ResourceStore>,
        settings: Arc<dyn SettingsStore>,
        config: Config,
    ) -> Self {
        let storage = storage::FileStorage::new(config.upload_dir.clone(), config.max_upload_size);
        let upload_limiter =
            rate_limit::UploadLimiter::new(Duration::from_secs(config.upload_cooldown_secs));

        Self {
            users,
            groups,
            resources,
            settings,
            config,
            storage,
            upload_limiter,
        }
    }
}
