use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::RenderError;
use crate::notification::Notification;
use crate::profile::{NotificationGroup, Profile};

const BUTTON_ID_BASE: i32 = 0x8080_0000_u32 as i32;
const BUTTONS_PER_NOTIFICATION_MAX: i32 = 64;
const BUTTON_ID_PRIME: i32 = 104_729;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderAction {
    pub title: String,
    pub action_id: i32,
}

/// Everything a platform renderer needs to build one notification.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub notification: Notification,
    pub profile: Profile,
    pub group: Option<NotificationGroup>,
    pub actions: Vec<RenderAction>,
    pub bitmap: Option<Bitmap>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderHandle(pub i32);

/// Platform-specific notification adapters implement this trait.
pub trait Renderer: Send + Sync {
    fn render(&self, request: &RenderRequest) -> Result<RenderHandle, RenderError>;
    fn hide(&self, id: i32);
    fn hide_all(&self);

    /// Launcher badge. Platforms without one ignore it.
    fn apply_badge(&self, _count: i32) {}
}

/// Platform timers. Timers are lost on reboot; the schedule registry is what survives.
pub trait AlarmDriver: Send + Sync {
    fn arm(&self, id: i32, at_monotonic_millis: i64, exact: bool);
    fn arm_repeating(&self, id: i32, first_at_monotonic_millis: i64, interval_millis: i64);
    fn disarm(&self, id: i32);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPresence {
    Closed,
    Background,
    Foreground,
}

pub trait HostState: Send + Sync {
    fn presence(&self) -> HostPresence;

    fn is_foreground(&self) -> bool {
        self.presence() == HostPresence::Foreground
    }
}

/// Host presence flipped by lifecycle callbacks.
#[derive(Debug)]
pub struct SharedHostState {
    presence: AtomicU8,
}

impl SharedHostState {
    pub fn new(presence: HostPresence) -> Self {
        Self {
            presence: AtomicU8::new(encode_presence(presence)),
        }
    }

    pub fn set(&self, presence: HostPresence) {
        self.presence
            .store(encode_presence(presence), Ordering::SeqCst);
    }
}

impl Default for SharedHostState {
    fn default() -> Self {
        Self::new(HostPresence::Closed)
    }
}

impl HostState for SharedHostState {
    fn presence(&self) -> HostPresence {
        match self.presence.load(Ordering::SeqCst) {
            0 => HostPresence::Closed,
            1 => HostPresence::Background,
            _ => HostPresence::Foreground,
        }
    }
}

fn encode_presence(presence: HostPresence) -> u8 {
    match presence {
        HostPresence::Closed => 0,
        HostPresence::Background => 1,
        HostPresence::Foreground => 2,
    }
}

/// Action id for a notification button, chosen to stay clear of notification ids.
pub fn button_action_id(notification_id: i32, button_index: usize) -> i32 {
    let index = i32::try_from(button_index).unwrap_or(i32::MAX);
    BUTTON_ID_BASE
        .wrapping_add((notification_id % BUTTON_ID_PRIME).wrapping_mul(BUTTONS_PER_NOTIFICATION_MAX))
        .wrapping_add(index)
}

pub(crate) fn render_actions(notification: &Notification) -> Vec<RenderAction> {
    notification
        .buttons
        .iter()
        .enumerate()
        .map(|(index, button)| RenderAction {
            title: button.title.clone(),
            action_id: button_action_id(notification.id, index),
        })
        .collect()
}
