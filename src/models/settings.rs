use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl Theme {
    pub fn parse(input: &str) -> Option<Self> {
        match input {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub user_id: Uuid,
    pub email_notifications: bool,
    pub in_app_notifications: bool,
    pub private_profile: bool,
    pub hide_activity: bool,
    pub theme: Theme,
}

impl Settings {
    pub fn defaults_for(user_id: Uuid) -> Self {
        Self {
            user_id,
            email_notifications: true,
            in_app_notifications: true,
            private_profile: false,
            hide_activity: false,
            theme: Theme::Dark,
        }
    }

    pub fn apply(&mut self, patch: &SettingsPatch) {
        if let Some(v) = patch.email_notifications {
            self.email_notifications = v;
        }
        if let Some(v) = patch.in_app_notifications {
            self.in_app_notifications = v;
        }
        if let Some(v) = patch.private_profile {
            self.private_profile = v;
        }
        if let Some(v) = patch.hide_activity {
            self.hide_activity = v;
        }
        if let Some(v) = patch.theme {
            self.theme = v;
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub email_notifications: Option<bool>,
    pub in_app_notifications: Option<bool>,
    pub private_profile: Option<bool>,
    pub hide_activity: Option<bool>,
    pub theme: Option<Theme>,
}
