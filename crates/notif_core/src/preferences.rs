use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::profile::Profile;
use crate::store::{PersistentStore, StoreEdit};

const NOTIFICATIONS_ENABLED: &str = "prefs.notifications_enabled";
const PUSH_ENABLED: &str = "prefs.push_enabled";
const SHOW_MODE: &str = "prefs.show_mode";
const GROUPING_MODE: &str = "prefs.grouping_mode";
const SHOW_LATEST_ONLY: &str = "prefs.show_latest_only";
const WILL_HANDLE_RECEIVED: &str = "prefs.will_handle_received";
const INCREMENTAL_ID: &str = "prefs.incremental_id";
const START_ID: &str = "prefs.start_id";
const RESTORE_ON_REBOOT: &str = "prefs.restore_on_reboot";
const FIELD_PREFIX: &str = "prefs.field.";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ShowMode {
    #[default]
    WhenClosedOrBackground,
    WhenClosed,
    Always,
}

impl ShowMode {
    fn code(self) -> i64 {
        match self {
            ShowMode::WhenClosedOrBackground => 0,
            ShowMode::WhenClosed => 1,
            ShowMode::Always => 2,
        }
    }

    fn from_code(code: i64) -> Self {
        match code {
            0 => ShowMode::WhenClosedOrBackground,
            1 => ShowMode::WhenClosed,
            _ => ShowMode::Always,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "when_closed_or_background" | "background" => Some(ShowMode::WhenClosedOrBackground),
            "when_closed" | "closed" => Some(ShowMode::WhenClosed),
            "always" => Some(ShowMode::Always),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GroupingMode {
    #[default]
    None,
    ByProfile,
    FromUserData,
    AllInOneGroup,
}

impl GroupingMode {
    fn code(self) -> i64 {
        match self {
            GroupingMode::None => 0,
            GroupingMode::ByProfile => 1,
            GroupingMode::FromUserData => 2,
            GroupingMode::AllInOneGroup => 3,
        }
    }

    fn from_code(code: i64) -> Self {
        match code {
            1 => GroupingMode::ByProfile,
            2 => GroupingMode::FromUserData,
            3 => GroupingMode::AllInOneGroup,
            _ => GroupingMode::None,
        }
    }
}

/// Where push payload fields live. Paths use `/` to descend into nested objects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PayloadFieldNames {
    pub title: String,
    pub text: String,
    pub user_data: String,
    pub profile: String,
    pub id: String,
    pub badge: String,
    pub buttons: String,
}

impl Default for PayloadFieldNames {
    fn default() -> Self {
        Self {
            title: "title".into(),
            text: "text".into(),
            user_data: String::new(),
            profile: "notification_profile".into(),
            id: "id".into(),
            badge: "badge_number".into(),
            buttons: "buttons".into(),
        }
    }
}

impl PayloadFieldNames {
    fn entries(&self) -> [(&'static str, &String); 7] {
        [
            ("title", &self.title),
            ("text", &self.text),
            ("user_data", &self.user_data),
            ("profile", &self.profile),
            ("id", &self.id),
            ("badge", &self.badge),
            ("buttons", &self.buttons),
        ]
    }
}

/// Everything the host hands over at initialisation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub will_handle_received: bool,
    pub start_id: i32,
    pub incremental_id: bool,
    pub show_mode: ShowMode,
    pub restore_on_reboot: bool,
    pub grouping_mode: GroupingMode,
    pub show_latest_only: bool,
    pub field_names: PayloadFieldNames,
    pub profiles: Vec<Profile>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            will_handle_received: false,
            start_id: 0,
            incremental_id: false,
            show_mode: ShowMode::default(),
            restore_on_reboot: false,
            grouping_mode: GroupingMode::default(),
            show_latest_only: false,
            field_names: PayloadFieldNames::default(),
            profiles: Vec::new(),
        }
    }
}

impl Settings {
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    pub(crate) fn edits(&self) -> Vec<StoreEdit> {
        let mut edits = vec![
            StoreEdit::put_flag(WILL_HANDLE_RECEIVED, self.will_handle_received),
            StoreEdit::put_flag(INCREMENTAL_ID, self.incremental_id),
            StoreEdit::put_int(START_ID, i64::from(self.start_id)),
            StoreEdit::put_int(SHOW_MODE, self.show_mode.code()),
            StoreEdit::put_int(GROUPING_MODE, self.grouping_mode.code()),
            StoreEdit::put_flag(SHOW_LATEST_ONLY, self.show_latest_only),
            StoreEdit::put_flag(RESTORE_ON_REBOOT, self.restore_on_reboot),
        ];
        for (name, path) in self.field_names.entries() {
            edits.push(StoreEdit::put_text(format!("{FIELD_PREFIX}{name}"), path.clone()));
        }
        edits
    }
}

/// Typed view over the persisted preference keys. Reads always hit the store.
#[derive(Clone)]
pub struct Preferences {
    store: Arc<dyn PersistentStore>,
}

impl Preferences {
    pub fn new(store: Arc<dyn PersistentStore>) -> Self {
        Self { store }
    }

    pub fn notifications_enabled(&self) -> bool {
        self.store.get_flag(NOTIFICATIONS_ENABLED).unwrap_or(true)
    }

    pub fn set_notifications_enabled(&self, enabled: bool) -> Result<(), StorageError> {
        self.store.put(StoreEdit::put_flag(NOTIFICATIONS_ENABLED, enabled))
    }

    pub fn push_enabled(&self) -> bool {
        self.store.get_flag(PUSH_ENABLED).unwrap_or(true)
    }

    pub fn set_push_enabled(&self, enabled: bool) -> Result<(), StorageError> {
        self.store.put(StoreEdit::put_flag(PUSH_ENABLED, enabled))
    }

    pub fn show_mode(&self) -> ShowMode {
        self.store
            .get_int(SHOW_MODE)
            .map(ShowMode::from_code)
            .unwrap_or_default()
    }

    pub fn set_show_mode(&self, mode: ShowMode) -> Result<(), StorageError> {
        self.store.put(StoreEdit::put_int(SHOW_MODE, mode.code()))
    }

    pub fn grouping_mode(&self) -> GroupingMode {
        self.store
            .get_int(GROUPING_MODE)
            .map(GroupingMode::from_code)
            .unwrap_or_default()
    }

    pub fn show_latest_only(&self) -> bool {
        self.store.get_flag(SHOW_LATEST_ONLY).unwrap_or(false)
    }

    pub fn will_handle_received(&self) -> bool {
        self.store.get_flag(WILL_HANDLE_RECEIVED).unwrap_or(false)
    }

    pub fn incremental_id(&self) -> bool {
        self.store.get_flag(INCREMENTAL_ID).unwrap_or(false)
    }

    pub fn start_id(&self) -> i32 {
        self.store
            .get_int(START_ID)
            .and_then(|value| i32::try_from(value).ok())
            .unwrap_or(0)
    }

    pub fn restore_on_reboot(&self) -> bool {
        self.store.get_flag(RESTORE_ON_REBOOT).unwrap_or(false)
    }

    pub fn set_restore_on_reboot(&self, restore: bool) -> Result<(), StorageError> {
        self.store.put(StoreEdit::put_flag(RESTORE_ON_REBOOT, restore))
    }

    pub fn field_names(&self) -> PayloadFieldNames {
        let defaults = PayloadFieldNames::default();
        let read = |name: &str, fallback: &String| {
            self.store
                .get_text(&format!("{FIELD_PREFIX}{name}"))
                .unwrap_or_else(|| fallback.clone())
        };
        PayloadFieldNames {
            title: read("title", &defaults.title),
            text: read("text", &defaults.text),
            user_data: read("user_data", &defaults.user_data),
            profile: read("profile", &defaults.profile),
            id: read("id", &defaults.id),
            badge: read("badge", &defaults.badge),
            buttons: read("buttons", &defaults.buttons),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn fresh_store_reports_defaults() {
        let prefs = Preferences::new(Arc::new(MemoryStore::new()));
        assert!(prefs.notifications_enabled());
        assert!(prefs.push_enabled());
        assert_eq!(prefs.show_mode(), ShowMode::WhenClosedOrBackground);
        assert_eq!(prefs.grouping_mode(), GroupingMode::None);
        assert!(!prefs.restore_on_reboot());
        assert_eq!(prefs.field_names(), PayloadFieldNames::default());
    }

    #[test]
    fn settings_edits_are_read_back() {
        let store = Arc::new(MemoryStore::new());
        let settings = Settings {
            will_handle_received: true,
            start_id: 100,
            incremental_id: true,
            show_mode: ShowMode::Always,
            restore_on_reboot: true,
            grouping_mode: GroupingMode::FromUserData,
            show_latest_only: true,
            field_names: PayloadFieldNames {
                title: "data/headline".into(),
                ..PayloadFieldNames::default()
            },
            profiles: Vec::new(),
        };
        store.apply(settings.edits()).unwrap();

        let prefs = Preferences::new(store);
        assert!(prefs.will_handle_received());
        assert_eq!(prefs.start_id(), 100);
        assert!(prefs.incremental_id());
        assert_eq!(prefs.show_mode(), ShowMode::Always);
        assert!(prefs.restore_on_reboot());
        assert_eq!(prefs.grouping_mode(), GroupingMode::FromUserData);
        assert!(prefs.show_latest_only());
        assert_eq!(prefs.field_names().title, "data/headline");
        assert_eq!(prefs.field_names().text, "text");
    }

    #[test]
    fn settings_json_fills_missing_fields_with_defaults() {
        let settings = Settings::from_json(
            r#"{"show_mode": "when_closed", "field_names": {"text": "message"}}"#,
        )
        .unwrap();
        assert_eq!(settings.show_mode, ShowMode::WhenClosed);
        assert_eq!(settings.field_names.text, "message");
        assert_eq!(settings.field_names.title, "title");
        assert!(!settings.restore_on_reboot);
    }

    #[test]
    fn show_mode_parsing_accepts_short_names() {
        assert_eq!(ShowMode::parse("Always"), Some(ShowMode::Always));
        assert_eq!(ShowMode::parse("when-closed"), Some(ShowMode::WhenClosed));
        assert_eq!(ShowMode::parse("background"), Some(ShowMode::WhenClosedOrBackground));
        assert_eq!(ShowMode::parse("sometimes"), None);
    }
}
