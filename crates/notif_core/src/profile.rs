use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::notification::{Notification, DEFAULT_PROFILE_ID, GROUP_KEY, GROUP_SUMMARY_KEY};
use crate::preferences::GroupingMode;
use crate::store::{PersistentStore, StoreEdit};

const PROFILE_PREFIX: &str = "profile.";
const ALL_IN_ONE_GROUP: &str = "__ALL";

/// A named bundle of rendering preferences.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub high_priority: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small_icon_bg_color: Option<u32>,
}

impl Profile {
    pub fn default_profile() -> Self {
        Self {
            id: DEFAULT_PROFILE_ID.to_string(),
            name: "Default".to_string(),
            description: String::new(),
            high_priority: false,
            small_icon_bg_color: None,
        }
    }

    pub fn is_default(&self) -> bool {
        self.id == DEFAULT_PROFILE_ID
    }
}

/// Persisted profiles, keyed by id.
#[derive(Clone)]
pub struct ProfileRegistry {
    store: Arc<dyn PersistentStore>,
}

impl ProfileRegistry {
    pub fn new(store: Arc<dyn PersistentStore>) -> Self {
        Self { store }
    }

    /// Store edits registering `profiles`; invalid entries are dropped with a warning.
    pub(crate) fn edits(profiles: &[Profile]) -> Vec<StoreEdit> {
        profiles
            .iter()
            .filter_map(|profile| {
                if profile.id.trim().is_empty() {
                    tracing::warn!(name = %profile.name, "skipping profile without an id");
                    return None;
                }
                match serde_json::to_string(profile) {
                    Ok(encoded) => Some(StoreEdit::put_text(
                        format!("{PROFILE_PREFIX}{}", profile.id),
                        encoded,
                    )),
                    Err(err) => {
                        tracing::warn!(id = %profile.id, %err, "unable to encode profile");
                        None
                    }
                }
            })
            .collect()
    }

    pub fn register(&self, profiles: &[Profile]) -> Result<(), StorageError> {
        self.store.apply(Self::edits(profiles))
    }

    pub fn get(&self, id: &str) -> Option<Profile> {
        let raw = self.store.get_text(&format!("{PROFILE_PREFIX}{id}"))?;
        match serde_json::from_str(&raw) {
            Ok(profile) => Some(profile),
            Err(err) => {
                tracing::warn!(id, %err, "ignoring unreadable profile");
                None
            }
        }
    }

    pub fn ids(&self) -> Vec<String> {
        self.store
            .keys_with_prefix(PROFILE_PREFIX)
            .into_iter()
            .filter_map(|key| key.strip_prefix(PROFILE_PREFIX).map(str::to_string))
            .collect()
    }

    /// The notification's own profile, else the registered default, else the built-in default.
    pub fn resolve(&self, notification: &Notification) -> Profile {
        if !notification.uses_default_profile() {
            if let Some(profile) = self.get(&notification.profile_id) {
                return profile;
            }
            tracing::debug!(
                id = notification.id,
                profile = %notification.profile_id,
                "unknown profile, falling back to default"
            );
        }
        self.get(DEFAULT_PROFILE_ID)
            .unwrap_or_else(Profile::default_profile)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationGroup {
    pub key: String,
    pub summary: bool,
}

pub fn resolve_group(
    mode: GroupingMode,
    profile: &Profile,
    notification: &Notification,
) -> Option<NotificationGroup> {
    let key = match mode {
        GroupingMode::None => return None,
        GroupingMode::ByProfile => profile.id.clone(),
        GroupingMode::FromUserData => notification.user_data.get(GROUP_KEY)?.clone(),
        GroupingMode::AllInOneGroup => ALL_IN_ONE_GROUP.to_string(),
    };
    Some(NotificationGroup {
        key,
        summary: notification.user_data.contains_key(GROUP_SUMMARY_KEY),
    })
}

/// Parses the JSON array of profile settings handed over by the host.
pub fn parse_profiles(raw: &str) -> serde_json::Result<Vec<Profile>> {
    serde_json::from_str(raw)
}
