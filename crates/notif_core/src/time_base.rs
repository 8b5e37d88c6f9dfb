use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use crate::notification::Notification;

pub const OVERDUE_ONE_SHOT_DELAY_MILLIS: i64 = 1_000;

pub trait Clock: Send + Sync {
    /// Wall-clock time, milliseconds since the unix epoch.
    fn now_epoch_millis(&self) -> i64;

    /// Milliseconds on a clock that never jumps with wall-clock changes.
    fn monotonic_millis(&self) -> i64;
}

#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_epoch_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }

    fn monotonic_millis(&self) -> i64 {
        i64::try_from(self.origin.elapsed().as_millis()).unwrap_or(i64::MAX)
    }
}

#[derive(Debug, Default)]
pub struct ManualClock {
    epoch_millis: AtomicI64,
    monotonic_millis: AtomicI64,
}

impl ManualClock {
    pub fn new(epoch_millis: i64, monotonic_millis: i64) -> Self {
        Self {
            epoch_millis: AtomicI64::new(epoch_millis),
            monotonic_millis: AtomicI64::new(monotonic_millis),
        }
    }

    pub fn advance(&self, millis: i64) {
        self.epoch_millis.fetch_add(millis, Ordering::SeqCst);
        self.monotonic_millis.fetch_add(millis, Ordering::SeqCst);
    }

    /// Simulates a reboot: wall time keeps going, the monotonic clock restarts.
    pub fn reboot(&self, monotonic_millis: i64) {
        self.monotonic_millis.store(monotonic_millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_epoch_millis(&self) -> i64 {
        self.epoch_millis.load(Ordering::SeqCst)
    }

    fn monotonic_millis(&self) -> i64 {
        self.monotonic_millis.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmPlan {
    pub effective_trigger_epoch_millis: i64,
    pub at_monotonic_millis: i64,
    pub interval_millis: Option<i64>,
}

#[derive(Clone)]
pub struct TimeBase {
    clock: Arc<dyn Clock>,
}

impl TimeBase {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn now_epoch_millis(&self) -> i64 {
        self.clock.now_epoch_millis()
    }

    pub fn monotonic_millis(&self) -> i64 {
        self.clock.monotonic_millis()
    }

    pub fn to_absolute_trigger(&self, trigger_in_seconds: i32) -> i64 {
        if trigger_in_seconds == 0 {
            return 0;
        }
        self.clock
            .now_epoch_millis()
            .saturating_add(i64::from(trigger_in_seconds) * 1000)
    }

    pub fn to_monotonic_target(&self, epoch_millis: i64, now_epoch_millis: i64) -> i64 {
        self.clock
            .monotonic_millis()
            .saturating_add(epoch_millis.saturating_sub(now_epoch_millis))
    }

    pub fn plan(&self, notification: &Notification) -> ArmPlan {
        let now = self.clock.now_epoch_millis();
        let trigger = notification.trigger_at_epoch_millis;
        if notification.is_repeating() {
            let interval = notification.interval_millis();
            let effective = if trigger < now {
                fast_forward(trigger, now, interval)
            } else {
                trigger
            };
            ArmPlan {
                effective_trigger_epoch_millis: effective,
                at_monotonic_millis: self.to_monotonic_target(effective, now),
                interval_millis: Some(interval),
            }
        } else {
            let effective = clamp_overdue(trigger, now);
            ArmPlan {
                effective_trigger_epoch_millis: effective,
                at_monotonic_millis: self.to_monotonic_target(effective, now),
                interval_millis: None,
            }
        }
    }
}

pub fn fast_forward(trigger_epoch_millis: i64, now_epoch_millis: i64, interval_millis: i64) -> i64 {
    if interval_millis <= 0 || trigger_epoch_millis >= now_epoch_millis {
        return trigger_epoch_millis;
    }
    let lag = i128::from(trigger_epoch_millis) - i128::from(now_epoch_millis);
    let offset = lag.rem_euclid(i128::from(interval_millis));
    // offset < interval_millis, so it fits back into an i64
    now_epoch_millis.saturating_add(i64::try_from(offset).unwrap_or(interval_millis - 1))
}

pub fn clamp_overdue(trigger_epoch_millis: i64, now_epoch_millis: i64) -> i64 {
    if trigger_epoch_millis < now_epoch_millis {
        now_epoch_millis.saturating_add(OVERDUE_ONE_SHOT_DELAY_MILLIS)
    } else {
        trigger_epoch_millis
    }
}
