use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use notif_core::platform::AlarmDriver;
use notif_core::time_base::Clock;
use parking_lot::{Condvar, Mutex};

#[derive(Debug, Clone, Copy)]
struct Timer {
    at: i64,
    interval: Option<i64>,
}

#[derive(Default)]
struct TimerTable {
    timers: HashMap<i32, Timer>,
    shutdown: bool,
}

struct Shared {
    table: Mutex<TimerTable>,
    wake: Condvar,
}

/// In-process alarm driver: one timer thread, fired ids delivered on a channel.
///
/// Timers live in memory only, like platform alarms across a reboot.
pub struct ThreadAlarmDriver {
    shared: Arc<Shared>,
    fires: Receiver<i32>,
    worker: Option<JoinHandle<()>>,
}

impl ThreadAlarmDriver {
    pub fn start(clock: Arc<dyn Clock>) -> std::io::Result<Self> {
        let shared = Arc::new(Shared {
            table: Mutex::new(TimerTable::default()),
            wake: Condvar::new(),
        });
        let (sender, fires) = unbounded();
        let worker = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("notif-alarms".into())
                .spawn(move || run_timers(&shared, clock.as_ref(), &sender))?
        };
        Ok(Self {
            shared,
            fires,
            worker: Some(worker),
        })
    }

    pub fn fires(&self) -> Receiver<i32> {
        self.fires.clone()
    }

    pub fn armed_ids(&self) -> Vec<i32> {
        let mut ids: Vec<i32> = self.shared.table.lock().timers.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn set(&self, id: i32, timer: Timer) {
        self.shared.table.lock().timers.insert(id, timer);
        self.shared.wake.notify_one();
    }
}

impl AlarmDriver for ThreadAlarmDriver {
    fn arm(&self, id: i32, at_monotonic_millis: i64, exact: bool) {
        tracing::debug!(id, at = at_monotonic_millis, exact, "arming alarm");
        self.set(
            id,
            Timer {
                at: at_monotonic_millis,
                interval: None,
            },
        );
    }

    fn arm_repeating(&self, id: i32, first_at_monotonic_millis: i64, interval_millis: i64) {
        tracing::debug!(id, at = first_at_monotonic_millis, interval_millis, "arming repeating alarm");
        self.set(
            id,
            Timer {
                at: first_at_monotonic_millis,
                interval: Some(interval_millis.max(1)),
            },
        );
    }

    fn disarm(&self, id: i32) {
        if self.shared.table.lock().timers.remove(&id).is_some() {
            tracing::debug!(id, "alarm disarmed");
            self.shared.wake.notify_one();
        }
    }
}

impl Drop for ThreadAlarmDriver {
    fn drop(&mut self) {
        self.shared.table.lock().shutdown = true;
        self.shared.wake.notify_one();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("alarm thread panicked");
            }
        }
    }
}

fn run_timers(shared: &Shared, clock: &dyn Clock, sender: &Sender<i32>) {
    let mut table = shared.table.lock();
    while !table.shutdown {
        let now = clock.monotonic_millis();
        let mut due: Vec<(i32, i64)> = Vec::new();
        table.timers.retain(|id, timer| {
            if timer.at > now {
                return true;
            }
            due.push((*id, timer.at));
            match timer.interval {
                Some(interval) => {
                    let missed = now.saturating_sub(timer.at) / interval + 1;
                    timer.at = timer.at.saturating_add(missed.saturating_mul(interval));
                    true
                }
                None => false,
            }
        });
        due.sort_by_key(|(_, at)| *at);
        for (id, _) in due {
            if sender.send(id).is_err() {
                tracing::debug!(id, "alarm receiver dropped");
            }
        }

        match table.timers.values().map(|timer| timer.at).min() {
            Some(next) => {
                let wait = u64::try_from(next - now).unwrap_or(0);
                shared.wake.wait_for(&mut table, Duration::from_millis(wait));
            }
            None => shared.wake.wait(&mut table),
        }
    }
}
