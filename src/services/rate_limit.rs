use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// One upload per user per cooldown window.
pub struct UploadLimiter {
    cooldown: Duration,
    last_upload: DashMap<Uuid, Instant>,
}

impl UploadLimiter {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_upload: DashMap::new(),
        }
    }

    /// Records an upload attempt, failing if the previous one was too recent.
    pub fn check(&self, user_id: Uuid) -> AppResult<()> {
        if self.cooldown.is_zero() {
            return Ok(());
        }

        let now = Instant::now();
        // Expired windows carry no state; drop them before touching the entry.
        self.last_upload
            .retain(|_, last| now.duration_since(*last) < self.cooldown);

        match self.last_upload.entry(user_id) {
            Entry::Occupied(mut entry) => {
                if now.duration_since(*entry.get()) < self.cooldown {
                    tracing::debug!(%user_id, "Upload rejected by cooldown");
                    return Err(AppError::TooManyRequests(format!(
                        "Too many upload requests. Please wait {} seconds between uploads.",
                        self.cooldown.as_secs()
                    )));
                }
                entry.insert(now);
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
            }
        }

        Ok(())
    }

    /// Users with an open cooldown window.
    pub fn tracked_users(&self) -> usize {
        self.last_upload.len()
    }
}
