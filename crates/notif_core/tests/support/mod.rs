#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use notif_core::enrichment::ImageFetcher;
use notif_core::error::{FetchError, RenderError, StorageError};
use notif_core::platform::{
    AlarmDriver, Bitmap, HostPresence, RenderHandle, RenderRequest, Renderer, SharedHostState,
};
use notif_core::store::{MemoryStore, PersistentStore, StoreEdit, StoreValue};
use notif_core::time_base::ManualClock;
use notif_core::NotificationScheduler;
use parking_lot::Mutex;

pub const NOW: i64 = 1_700_000_000_000;
pub const MONO: i64 = 10_000;

#[derive(Debug, Clone)]
pub enum RenderEvent {
    Render(RenderRequest),
    Hide(i32),
    HideAll,
    Badge(i32),
}

#[derive(Default)]
pub struct RecordingRenderer {
    events: Mutex<Vec<RenderEvent>>,
    failing: AtomicBool,
}

impl RecordingRenderer {
    pub fn fail_renders(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<RenderEvent> {
        self.events.lock().clone()
    }

    pub fn rendered(&self) -> Vec<RenderRequest> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                RenderEvent::Render(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn rendered_ids(&self) -> Vec<i32> {
        self.rendered()
            .iter()
            .map(|request| request.notification.id)
            .collect()
    }
}

impl Renderer for RecordingRenderer {
    fn render(&self, request: &RenderRequest) -> Result<RenderHandle, RenderError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RenderError::MissingResource("icon".into()));
        }
        self.events.lock().push(RenderEvent::Render(request.clone()));
        Ok(RenderHandle(request.notification.id))
    }

    fn hide(&self, id: i32) {
        self.events.lock().push(RenderEvent::Hide(id));
    }

    fn hide_all(&self) {
        self.events.lock().push(RenderEvent::HideAll);
    }

    fn apply_badge(&self, count: i32) {
        self.events.lock().push(RenderEvent::Badge(count));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlarmEvent {
    Arm { id: i32, at: i64, exact: bool },
    ArmRepeating { id: i32, first_at: i64, interval: i64 },
    Disarm(i32),
}

#[derive(Default)]
pub struct RecordingAlarmDriver {
    events: Mutex<Vec<AlarmEvent>>,
}

impl RecordingAlarmDriver {
    pub fn events(&self) -> Vec<AlarmEvent> {
        self.events.lock().clone()
    }
}

impl AlarmDriver for RecordingAlarmDriver {
    fn arm(&self, id: i32, at_monotonic_millis: i64, exact: bool) {
        self.events.lock().push(AlarmEvent::Arm {
            id,
            at: at_monotonic_millis,
            exact,
        });
    }

    fn arm_repeating(&self, id: i32, first_at_monotonic_millis: i64, interval_millis: i64) {
        self.events.lock().push(AlarmEvent::ArmRepeating {
            id,
            first_at: first_at_monotonic_millis,
            interval: interval_millis,
        });
    }

    fn disarm(&self, id: i32) {
        self.events.lock().push(AlarmEvent::Disarm(id));
    }
}

/// Returns the url as the image bytes.
pub struct EchoFetcher;

impl ImageFetcher for EchoFetcher {
    fn fetch(&self, url: &str) -> Result<Bitmap, FetchError> {
        if url.starts_with("broken://") {
            return Err(FetchError::Download("connection reset".into()));
        }
        Ok(Bitmap {
            bytes: url.as_bytes().to_vec(),
        })
    }
}

/// Memory store whose writes can be switched to fail, like a full disk.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    full: AtomicBool,
}

impl FlakyStore {
    pub fn fill_disk(&self) {
        self.full.store(true, Ordering::SeqCst);
    }
}

impl PersistentStore for FlakyStore {
    fn get(&self, key: &str) -> Option<StoreValue> {
        self.inner.get(key)
    }

    fn apply(&self, edits: Vec<StoreEdit>) -> Result<(), StorageError> {
        if self.full.load(Ordering::SeqCst) {
            return Err(StorageError::Rejected("disk full".into()));
        }
        self.inner.apply(edits)
    }

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.inner.keys_with_prefix(prefix)
    }
}

pub struct Harness {
    pub scheduler: NotificationScheduler,
    pub renderer: Arc<RecordingRenderer>,
    pub alarms: Arc<RecordingAlarmDriver>,
    pub host: Arc<SharedHostState>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    pub fn with_store(store: Arc<dyn PersistentStore>) -> Self {
        Self::build(store, Arc::new(ManualClock::new(NOW, MONO)), false)
    }

    pub fn with_image_fetcher() -> Self {
        Self::build(
            Arc::new(MemoryStore::new()),
            Arc::new(ManualClock::new(NOW, MONO)),
            true,
        )
    }

    pub fn build(store: Arc<dyn PersistentStore>, clock: Arc<ManualClock>, images: bool) -> Self {
        let renderer = Arc::new(RecordingRenderer::default());
        let alarms = Arc::new(RecordingAlarmDriver::default());
        let host = Arc::new(SharedHostState::new(HostPresence::Closed));
        let mut builder = NotificationScheduler::builder()
            .with_store(store)
            .with_renderer(renderer.clone())
            .with_alarm_driver(alarms.clone())
            .with_host_state(host.clone())
            .with_clock(clock.clone());
        if images {
            builder = builder.with_image_fetcher(Arc::new(EchoFetcher));
        }
        let scheduler = builder.build().expect("build scheduler");
        Self {
            scheduler,
            renderer,
            alarms,
            host,
            clock,
        }
    }
}
