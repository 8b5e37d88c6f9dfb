use std::collections::BTreeMap;

use notif_core::error::RenderError;
use notif_core::platform::{RenderHandle, RenderRequest, Renderer};
use notif_core::Notification;
use parking_lot::Mutex;
use tracing::info;

/// Renders notifications as log lines and remembers which are visible.
#[derive(Default)]
pub struct LogRenderer {
    visible: Mutex<BTreeMap<i32, Notification>>,
}

impl LogRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visible(&self, id: i32) -> Option<Notification> {
        self.visible.lock().get(&id).cloned()
    }

    pub fn visible_ids(&self) -> Vec<i32> {
        self.visible.lock().keys().copied().collect()
    }
}

impl Renderer for LogRenderer {
    fn render(&self, request: &RenderRequest) -> Result<RenderHandle, RenderError> {
        let notification = &request.notification;
        let buttons: Vec<&str> = request
            .actions
            .iter()
            .map(|action| action.title.as_str())
            .collect();
        info!(
            id = notification.id,
            title = %notification.title,
            text = %notification.text,
            profile = %request.profile.id,
            group = ?request.group.as_ref().map(|group| group.key.as_str()),
            image_bytes = request.bitmap.as_ref().map_or(0, |bitmap| bitmap.bytes.len()),
            ?buttons,
            "notification shown"
        );
        self.visible
            .lock()
            .insert(notification.id, notification.clone());
        Ok(RenderHandle(notification.id))
    }

    fn hide(&self, id: i32) {
        if self.visible.lock().remove(&id).is_some() {
            info!(id, "notification hidden");
        }
    }

    fn hide_all(&self) {
        let mut visible = self.visible.lock();
        if !visible.is_empty() {
            info!(count = visible.len(), "all notifications hidden");
            visible.clear();
        }
    }

    fn apply_badge(&self, count: i32) {
        info!(count, "badge updated");
    }
}
