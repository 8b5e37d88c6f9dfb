use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{NotifyError, Result};

pub const DEFAULT_PROFILE_ID: &str = "__default_profile";

pub const IMAGE_URL_KEY: &str = "image_url";
pub const OPEN_URL_KEY: &str = "open_url";
pub const GROUP_KEY: &str = "notification_group";
pub const GROUP_SUMMARY_KEY: &str = "notification_group_summary";

pub type UserData = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Button {
    pub title: String,
    #[serde(default, rename = "data", skip_serializing_if = "BTreeMap::is_empty")]
    pub user_data: UserData,
}

impl Button {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            user_data: UserData::new(),
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.user_data.insert(key.into(), value.into());
        self
    }
}

/// A single notification as it is stored, fired and rendered.
///
/// The packed form (see [`Notification::to_packed`]) is what the schedule
/// registry and the receipt log persist.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub id: i32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, rename = "at", skip_serializing_if = "is_zero_i64")]
    pub trigger_at_epoch_millis: i64,
    #[serde(default, rename = "every", skip_serializing_if = "is_zero_i32")]
    pub interval_seconds: i32,
    #[serde(default, rename = "data", skip_serializing_if = "BTreeMap::is_empty")]
    pub user_data: UserData,
    #[serde(default, rename = "profile", skip_serializing_if = "String::is_empty")]
    pub profile_id: String,
    #[serde(default = "no_badge", rename = "badge", skip_serializing_if = "is_no_badge")]
    pub badge_number: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<Button>,
}

impl Notification {
    pub fn new(id: i32, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            text: text.into(),
            trigger_at_epoch_millis: 0,
            interval_seconds: 0,
            user_data: UserData::new(),
            profile_id: String::new(),
            badge_number: -1,
            buttons: Vec::new(),
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.trigger_at_epoch_millis != 0
    }

    pub fn is_repeating(&self) -> bool {
        self.interval_seconds > 0
    }

    pub fn interval_millis(&self) -> i64 {
        i64::from(self.interval_seconds) * 1000
    }

    pub fn uses_default_profile(&self) -> bool {
        self.profile_id.is_empty() || self.profile_id == DEFAULT_PROFILE_ID
    }

    pub fn image_url(&self) -> Option<&str> {
        self.user_data
            .get(IMAGE_URL_KEY)
            .map(String::as_str)
            .filter(|url| !url.trim().is_empty())
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval_seconds < 0 {
            return Err(NotifyError::InvalidNotification(format!(
                "notification {} has a negative interval ({}s)",
                self.id, self.interval_seconds
            )));
        }
        if self.trigger_at_epoch_millis < 0 {
            return Err(NotifyError::InvalidNotification(format!(
                "notification {} has a trigger before the epoch ({})",
                self.id, self.trigger_at_epoch_millis
            )));
        }
        Ok(())
    }

    pub fn to_packed(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|source| NotifyError::Encode {
            id: self.id,
            source,
        })
    }

    pub fn from_packed(packed: &str) -> serde_json::Result<Self> {
        serde_json::from_str(packed)
    }
}

/// Caller-facing description of a notification before it has an id and a
/// trigger time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationRequest {
    pub id: Option<i32>,
    pub title: String,
    pub text: String,
    pub user_data: UserData,
    pub profile_id: Option<String>,
    pub badge_number: Option<i32>,
    pub buttons: Vec<Button>,
}

impl NotificationRequest {
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: i32) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_profile(mut self, profile_id: impl Into<String>) -> Self {
        self.profile_id = Some(profile_id.into());
        self
    }

    pub fn with_badge(mut self, badge_number: i32) -> Self {
        self.badge_number = Some(badge_number);
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.user_data.insert(key.into(), value.into());
        self
    }

    pub fn with_button(mut self, button: Button) -> Self {
        self.buttons.push(button);
        self
    }

    /// Fixes the id and trigger of the request.
    pub fn into_notification(
        self,
        id: i32,
        trigger_at_epoch_millis: i64,
        interval_seconds: i32,
    ) -> Notification {
        Notification {
            id,
            title: self.title,
            text: self.text,
            trigger_at_epoch_millis,
            interval_seconds,
            user_data: self.user_data,
            profile_id: self.profile_id.unwrap_or_default(),
            badge_number: self.badge_number.unwrap_or(-1),
            buttons: self.buttons,
        }
    }
}

fn no_badge() -> i32 {
    -1
}

fn is_no_badge(value: &i32) -> bool {
    *value == -1
}

fn is_zero_i64(value: &i64) -> bool {
    *value == 0
}

fn is_zero_i32(value: &i32) -> bool {
    *value == 0
}
