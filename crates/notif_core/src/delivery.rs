use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{RenderError, StorageError};
use crate::notification::Notification;
use crate::platform::{render_actions, Bitmap, HostPresence, HostState, RenderRequest, Renderer};
use crate::preferences::{Preferences, ShowMode};
use crate::profile::{resolve_group, ProfileRegistry};
use crate::store::{PersistentStore, StoreEdit};

const BADGE_COUNT: &str = "badge.count";
const RECEIVED_LOG: &str = "received.log";
/// Oldest receipts are dropped past this many undrained entries.
pub const MAX_RECEIPTS: usize = 256;

#[derive(Clone)]
pub struct BadgeState {
    store: Arc<dyn PersistentStore>,
    renderer: Arc<dyn Renderer>,
}

impl BadgeState {
    pub fn new(store: Arc<dyn PersistentStore>, renderer: Arc<dyn Renderer>) -> Self {
        Self { store, renderer }
    }

    pub fn get(&self) -> i32 {
        self.store
            .get_int(BADGE_COUNT)
            .and_then(|value| i32::try_from(value).ok())
            .unwrap_or(0)
    }

    /// `0` clears the launcher badge.
    pub fn set(&self, count: i32) -> Result<(), StorageError> {
        self.renderer.apply_badge(count);
        self.store
            .put(StoreEdit::put_int(BADGE_COUNT, i64::from(count)))
    }
}

/// Delivered notifications waiting for the host to collect them.
pub struct ReceiptLog {
    store: Arc<dyn PersistentStore>,
    lock: Mutex<()>,
}

impl ReceiptLog {
    pub fn new(store: Arc<dyn PersistentStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    pub fn append(&self, notification: &Notification) -> Result<(), StorageError> {
        let _guard = self.lock.lock();
        let mut entries = self.read_entries();
        entries.push(notification.clone());
        if entries.len() > MAX_RECEIPTS {
            let dropped = entries.len() - MAX_RECEIPTS;
            entries.drain(..dropped);
            tracing::warn!(dropped, "received-notification log full, dropping oldest entries");
        }
        let encoded = serde_json::to_string(&entries)?;
        self.store.put(StoreEdit::put_text(RECEIVED_LOG, encoded))
    }

    /// Returns everything logged so far, oldest first, and empties the log.
    pub fn drain(&self) -> Result<Vec<Notification>, StorageError> {
        let _guard = self.lock.lock();
        let entries = self.read_entries();
        if self.store.get(RECEIVED_LOG).is_some() {
            self.store.put(StoreEdit::remove(RECEIVED_LOG))?;
        }
        Ok(entries)
    }

    pub fn len(&self) -> usize {
        let _guard = self.lock.lock();
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_entries(&self) -> Vec<Notification> {
        let Some(raw) = self.store.get_text(RECEIVED_LOG) else {
            return Vec::new();
        };
        match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(%err, "discarding unreadable received-notification log");
                Vec::new()
            }
        }
    }
}

/// What happened to one notification on its way through the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub shown: bool,
    pub rendered: bool,
    pub render_error: Option<RenderError>,
    pub cleared_previous: bool,
    pub badge_updated: bool,
    pub logged: bool,
}

pub struct DeliveryPipeline {
    prefs: Preferences,
    profiles: ProfileRegistry,
    badge: BadgeState,
    receipts: Arc<ReceiptLog>,
    renderer: Arc<dyn Renderer>,
    host: Arc<dyn HostState>,
}

impl DeliveryPipeline {
    pub fn new(
        prefs: Preferences,
        profiles: ProfileRegistry,
        badge: BadgeState,
        receipts: Arc<ReceiptLog>,
        renderer: Arc<dyn Renderer>,
        host: Arc<dyn HostState>,
    ) -> Self {
        Self {
            prefs,
            profiles,
            badge,
            receipts,
            renderer,
            host,
        }
    }

    pub fn should_show(&self) -> bool {
        let presence = self.host.presence();
        match self.prefs.show_mode() {
            ShowMode::WhenClosedOrBackground => presence != HostPresence::Foreground,
            ShowMode::WhenClosed => presence == HostPresence::Closed,
            ShowMode::Always => true,
        }
    }

    /// Runs every delivery step. Each step's failure is logged and does not stop the next.
    pub fn deliver(&self, notification: &Notification, bitmap: Option<Bitmap>) -> DeliveryReport {
        let mut report = DeliveryReport {
            shown: self.prefs.notifications_enabled() && self.should_show(),
            ..DeliveryReport::default()
        };

        if report.shown && self.prefs.show_latest_only() {
            self.renderer.hide_all();
            report.cleared_previous = true;
        }

        if notification.badge_number >= 0 {
            match self.badge.set(notification.badge_number) {
                Ok(()) => report.badge_updated = true,
                Err(err) => {
                    tracing::error!(id = notification.id, %err, "unable to persist badge number");
                }
            }
        }

        if report.shown {
            let request = self.render_request(notification, bitmap);
            match self.renderer.render(&request) {
                Ok(handle) => {
                    tracing::debug!(id = notification.id, handle = handle.0, "notification rendered");
                    report.rendered = true;
                }
                Err(err) => {
                    tracing::error!(id = notification.id, %err, "unable to render notification");
                    report.render_error = Some(err);
                }
            }
        } else {
            tracing::debug!(
                id = notification.id,
                enabled = self.prefs.notifications_enabled(),
                "notification not shown"
            );
        }

        if self.prefs.will_handle_received() {
            match self.receipts.append(notification) {
                Ok(()) => report.logged = true,
                Err(err) => {
                    tracing::error!(id = notification.id, %err, "unable to log received notification");
                }
            }
        }

        report
    }

    pub fn render_request(&self, notification: &Notification, bitmap: Option<Bitmap>) -> RenderRequest {
        let profile = self.profiles.resolve(notification);
        let group = resolve_group(self.prefs.grouping_mode(), &profile, notification);
        RenderRequest {
            notification: notification.clone(),
            actions: render_actions(notification),
            profile,
            group,
            bitmap,
        }
    }
}
