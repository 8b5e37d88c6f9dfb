use std::sync::Arc;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::delivery::{BadgeState, DeliveryPipeline, DeliveryReport, ReceiptLog};
use crate::enrichment::{DeliveryOrigin, EnrichmentCompletion, EnrichmentQueue, ImageFetcher};
use crate::error::{NotifyError, Result};
use crate::ids::IdentifierAllocator;
use crate::notification::{Notification, NotificationRequest, UserData, OPEN_URL_KEY};
use crate::platform::{AlarmDriver, HostState, Renderer, SharedHostState};
use crate::preferences::{Preferences, Settings};
use crate::profile::ProfileRegistry;
use crate::registry::{Registration, ScheduleRegistry};
use crate::store::{MemoryStore, PersistentStore};
use crate::time_base::{Clock, SystemClock, TimeBase};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickedNotification {
    pub notification: Notification,
    pub clicked_button_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickAction {
    OpenUrl(String),
    ActivateHost,
}

pub struct NotificationScheduler {
    store: Arc<dyn PersistentStore>,
    prefs: Preferences,
    profiles: ProfileRegistry,
    registry: ScheduleRegistry,
    ids: IdentifierAllocator,
    time: TimeBase,
    badge: BadgeState,
    receipts: Arc<ReceiptLog>,
    pipeline: DeliveryPipeline,
    renderer: Arc<dyn Renderer>,
    alarms: Arc<dyn AlarmDriver>,
    enrichment: Option<EnrichmentQueue>,
    clicked: Mutex<Option<ClickedNotification>>,
}

pub struct NotificationSchedulerBuilder {
    store: Option<Arc<dyn PersistentStore>>,
    renderer: Option<Arc<dyn Renderer>>,
    alarms: Option<Arc<dyn AlarmDriver>>,
    host: Option<Arc<dyn HostState>>,
    clock: Option<Arc<dyn Clock>>,
    image_fetcher: Option<Arc<dyn ImageFetcher>>,
}

impl NotificationSchedulerBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            renderer: None,
            alarms: None,
            host: None,
            clock: None,
            image_fetcher: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn PersistentStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn with_alarm_driver(mut self, alarms: Arc<dyn AlarmDriver>) -> Self {
        self.alarms = Some(alarms);
        self
    }

    pub fn with_host_state(mut self, host: Arc<dyn HostState>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_image_fetcher(mut self, fetcher: Arc<dyn ImageFetcher>) -> Self {
        self.image_fetcher = Some(fetcher);
        self
    }

    pub fn build(self) -> Result<NotificationScheduler> {
        let renderer = self
            .renderer
            .ok_or(NotifyError::MissingCollaborator("renderer"))?;
        let alarms = self
            .alarms
            .ok_or(NotifyError::MissingCollaborator("alarm driver"))?;
        let store: Arc<dyn PersistentStore> = match self.store {
            Some(store) => store,
            None => Arc::new(MemoryStore::new()),
        };
        let host: Arc<dyn HostState> = match self.host {
            Some(host) => host,
            None => Arc::new(SharedHostState::default()),
        };
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock::new()),
        };

        let prefs = Preferences::new(Arc::clone(&store));
        let profiles = ProfileRegistry::new(Arc::clone(&store));
        let badge = BadgeState::new(Arc::clone(&store), Arc::clone(&renderer));
        let receipts = Arc::new(ReceiptLog::new(Arc::clone(&store)));
        let pipeline = DeliveryPipeline::new(
            prefs.clone(),
            profiles.clone(),
            badge.clone(),
            Arc::clone(&receipts),
            Arc::clone(&renderer),
            host,
        );

        Ok(NotificationScheduler {
            registry: ScheduleRegistry::new(Arc::clone(&store)),
            ids: IdentifierAllocator::new(prefs.clone()),
            time: TimeBase::new(clock),
            enrichment: self.image_fetcher.map(EnrichmentQueue::new),
            clicked: Mutex::new(None),
            store,
            prefs,
            profiles,
            badge,
            receipts,
            pipeline,
            renderer,
            alarms,
        })
    }
}

impl Default for NotificationSchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationScheduler {
    pub fn builder() -> NotificationSchedulerBuilder {
        NotificationSchedulerBuilder::new()
    }

    #[instrument(skip(self, settings))]
    pub fn initialize(&self, settings: &Settings) -> Result<()> {
        let mut edits = settings.edits();
        edits.extend(ProfileRegistry::edits(&settings.profiles));
        self.store.apply(edits)?;
        self.ids.reseed(settings.start_id);
        info!(
            profiles = settings.profiles.len(),
            show_mode = ?settings.show_mode,
            "notification settings initialised"
        );
        Ok(())
    }

    #[instrument(skip(self, request))]
    pub fn post(&self, request: NotificationRequest) -> Result<i32> {
        let id = self.resolve_id(&request);
        self.post_notification(request.into_notification(id, 0, 0))?;
        Ok(id)
    }

    #[instrument(skip(self, request))]
    pub fn schedule(&self, trigger_in_seconds: i32, request: NotificationRequest) -> Result<i32> {
        let id = self.resolve_id(&request);
        let trigger = self.time.to_absolute_trigger(trigger_in_seconds);
        self.schedule_notification(request.into_notification(id, trigger, 0))?;
        Ok(id)
    }

    #[instrument(skip(self, request))]
    pub fn schedule_repeating(
        &self,
        first_trigger_in_seconds: i32,
        interval_seconds: i32,
        request: NotificationRequest,
    ) -> Result<i32> {
        if interval_seconds <= 0 {
            return Err(NotifyError::InvalidNotification(format!(
                "repeating notification needs a positive interval, got {interval_seconds}s"
            )));
        }
        let id = self.resolve_id(&request);
        let trigger =
            self.time.now_epoch_millis() + i64::from(first_trigger_in_seconds) * 1000;
        self.schedule_notification(request.into_notification(id, trigger, interval_seconds))?;
        Ok(id)
    }

    pub fn post_notification(&self, notification: Notification) -> Result<Option<DeliveryReport>> {
        notification.validate()?;
        debug!(id = notification.id, "posting notification");
        Ok(self.dispatch(notification, DeliveryOrigin::Posted))
    }

    pub fn schedule_notification(&self, notification: Notification) -> Result<()> {
        notification.validate()?;
        let id = notification.id;
        let packed = notification.to_packed()?;
        match self.registry.register(id, &packed)? {
            Registration::Added => debug!(id, "scheduled notification registered"),
            Registration::AlreadyPresent(existing) if existing != packed => {
                self.registry.replace(id, &packed)?;
                debug!(id, "scheduled notification replaced");
            }
            Registration::AlreadyPresent(_) => debug!(id, "scheduled notification unchanged"),
        }
        self.arm(&notification);
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn cancel(&self, id: i32) -> Result<()> {
        self.renderer.hide(id);
        self.alarms.disarm(id);
        if let Some(enrichment) = &self.enrichment {
            enrichment.cancel(id);
        }
        if !self.registry.unregister(id)? {
            debug!(id, "cancel for an id that was not scheduled");
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn cancel_all(&self) -> Result<()> {
        self.renderer.hide_all();
        if let Some(enrichment) = &self.enrichment {
            enrichment.cancel_all();
        }
        for id in self.registry.list_ids() {
            self.cancel(id)?;
        }
        Ok(())
    }

    pub fn hide(&self, id: i32) {
        self.renderer.hide(id);
    }

    pub fn hide_all(&self) {
        self.renderer.hide_all();
    }

    /// Timer callback. Returns `None` when there was nothing to deliver, or
    /// when delivery waits on an image download.
    #[instrument(skip(self))]
    pub fn on_fire(&self, id: i32) -> Result<Option<DeliveryReport>> {
        let Some(packed) = self.registry.get(id) else {
            debug!(id, "fired id has no scheduled entry");
            return Ok(None);
        };
        let notification = match Notification::from_packed(&packed) {
            Ok(notification) => notification,
            Err(source) => {
                warn!(id, %source, "dropping unreadable scheduled entry");
                self.alarms.disarm(id);
                self.registry.unregister(id)?;
                return Err(NotifyError::CorruptEntry { id, source });
            }
        };

        let repeating = notification.is_repeating();
        let report = self.dispatch(notification, DeliveryOrigin::Fired);
        if report.is_some() && !repeating {
            self.registry.unregister(id)?;
        }
        Ok(report)
    }

    #[instrument(skip(self))]
    pub fn restore_on_boot(&self) -> Result<usize> {
        if !self.prefs.restore_on_reboot() {
            debug!("restore on reboot disabled");
            return Ok(0);
        }

        let mut restored = 0;
        for id in self.registry.list_ids() {
            let Some(packed) = self.registry.get(id) else {
                warn!(id, "scheduled id without an entry");
                self.registry.unregister(id)?;
                continue;
            };
            match Notification::from_packed(&packed) {
                Ok(notification) => {
                    self.arm(&notification);
                    restored += 1;
                }
                Err(err) => {
                    warn!(id, %err, "dropping unreadable scheduled entry");
                    self.registry.unregister(id)?;
                }
            }
        }
        info!(restored, "scheduled notifications restored");
        Ok(restored)
    }

    pub fn enrichment_completions(&self) -> Option<Receiver<EnrichmentCompletion>> {
        self.enrichment.as_ref().map(EnrichmentQueue::completions)
    }

    pub fn process_enrichment(&self, completion: EnrichmentCompletion) -> Result<Option<DeliveryReport>> {
        let Some(enrichment) = &self.enrichment else {
            return Ok(None);
        };
        let id = completion.notification.id;
        if !enrichment.take_completed(&completion) {
            debug!(id, "dropping completion of a cancelled image fetch");
            return Ok(None);
        }

        let bitmap = match completion.bitmap {
            Ok(bitmap) => Some(bitmap),
            Err(err) => {
                warn!(id, %err, "delivering without image");
                None
            }
        };
        let report = self.pipeline.deliver(&completion.notification, bitmap);
        if completion.origin == DeliveryOrigin::Fired && !completion.notification.is_repeating() {
            self.registry.unregister(id)?;
        }
        Ok(Some(report))
    }

    pub fn drain_enrichment(&self) -> Result<usize> {
        let Some(receiver) = self.enrichment_completions() else {
            return Ok(0);
        };
        let mut processed = 0;
        while let Ok(completion) = receiver.try_recv() {
            if self.process_enrichment(completion)?.is_some() {
                processed += 1;
            }
        }
        Ok(processed)
    }

    pub fn notifications_enabled(&self) -> bool {
        self.prefs.notifications_enabled()
    }

    pub fn set_notifications_enabled(&self, enabled: bool) -> Result<()> {
        self.prefs.set_notifications_enabled(enabled)?;
        Ok(())
    }

    pub fn badge(&self) -> i32 {
        self.badge.get()
    }

    pub fn set_badge(&self, count: i32) -> Result<()> {
        self.badge.set(count)?;
        Ok(())
    }

    pub fn drain_received_log(&self) -> Result<Vec<Notification>> {
        Ok(self.receipts.drain()?)
    }

    pub fn record_click(
        &self,
        notification: Notification,
        clicked_button_index: Option<usize>,
    ) -> ClickAction {
        let button = clicked_button_index.and_then(|index| notification.buttons.get(index));
        let user_data = button.map_or(&notification.user_data, |button| &button.user_data);
        let action = click_action(user_data);
        if button.is_some() {
            self.renderer.hide(notification.id);
        }
        debug!(id = notification.id, ?clicked_button_index, ?action, "notification clicked");
        *self.clicked.lock() = Some(ClickedNotification {
            notification,
            clicked_button_index,
        });
        action
    }

    pub fn poll_clicked_notification(&self) -> Option<ClickedNotification> {
        self.clicked.lock().take()
    }

    pub fn next_id(&self) -> i32 {
        self.ids.next()
    }

    pub fn scheduled_ids(&self) -> Vec<i32> {
        self.registry.list_ids()
    }

    pub fn scheduled_notification(&self, id: i32) -> Option<Notification> {
        let packed = self.registry.get(id)?;
        Notification::from_packed(&packed).ok()
    }

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    pub fn profiles(&self) -> &ProfileRegistry {
        &self.profiles
    }

    fn resolve_id(&self, request: &NotificationRequest) -> i32 {
        request.id.unwrap_or_else(|| self.ids.next())
    }

    fn arm(&self, notification: &Notification) {
        let plan = self.time.plan(notification);
        match plan.interval_millis {
            Some(interval) => {
                self.alarms
                    .arm_repeating(notification.id, plan.at_monotonic_millis, interval)
            }
            None => self
                .alarms
                .arm(notification.id, plan.at_monotonic_millis, true),
        }
        debug!(
            id = notification.id,
            trigger = plan.effective_trigger_epoch_millis,
            "alarm armed"
        );
    }

    fn dispatch(&self, notification: Notification, origin: DeliveryOrigin) -> Option<DeliveryReport> {
        if let (Some(enrichment), Some(url)) = (&self.enrichment, notification.image_url()) {
            let url = url.to_string();
            let id = notification.id;
            match enrichment.submit(notification.clone(), url, origin) {
                Ok(()) => return None,
                Err(err) => warn!(id, %err, "unable to start image fetch, delivering without image"),
            }
        }
        Some(self.pipeline.deliver(&notification, None))
    }
}

fn click_action(user_data: &UserData) -> ClickAction {
    match user_data.get(OPEN_URL_KEY).map(|url| url.trim()) {
        Some(url) if !url.is_empty() => {
            if url.contains("://") {
                ClickAction::OpenUrl(url.to_string())
            } else {
                ClickAction::OpenUrl(format!("http://{url}"))
            }
        }
        _ => ClickAction::ActivateHost,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_url_gets_a_scheme_when_missing() {
        let mut data = UserData::new();
        assert_eq!(click_action(&data), ClickAction::ActivateHost);
        data.insert(OPEN_URL_KEY.into(), "example.com/offer".into());
        assert_eq!(
            click_action(&data),
            ClickAction::OpenUrl("http://example.com/offer".into())
        );
        data.insert(OPEN_URL_KEY.into(), "https://example.com".into());
        assert_eq!(
            click_action(&data),
            ClickAction::OpenUrl("https://example.com".into())
        );
    }

    #[test]
    fn builder_requires_renderer_and_alarm_driver() {
        let result = NotificationScheduler::builder().build();
        assert!(matches!(
            result,
            Err(NotifyError::MissingCollaborator("renderer"))
        ));
    }
}
