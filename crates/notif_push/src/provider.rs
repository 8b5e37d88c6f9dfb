use std::sync::Arc;

use notif_core::error::StorageError;
use notif_core::NotificationScheduler;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::instrument;

use crate::payload::ingest_external_payload;

pub trait PushProvider: Send + Sync {
    fn name(&self) -> &str;
    fn is_available(&self) -> bool;
    fn enable(&self);
    fn disable(&self);
}

pub trait RegistrationListener: Send + Sync {
    fn on_registered(&self, provider: &str, registration_id: &str);
}

pub struct PushGateway {
    scheduler: Arc<NotificationScheduler>,
    provider: RwLock<Option<Arc<dyn PushProvider>>>,
    listener: Option<Arc<dyn RegistrationListener>>,
}

impl PushGateway {
    pub fn new(scheduler: Arc<NotificationScheduler>) -> Self {
        Self {
            scheduler,
            provider: RwLock::new(None),
            listener: None,
        }
    }

    pub fn with_registration_listener(mut self, listener: Arc<dyn RegistrationListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Picks the provider among the requested `candidates`, in priority
    /// order; a later available candidate replaces an earlier one.
    ///
    /// Returns `false` only when push was requested and no candidate is available.
    #[instrument(skip(self, candidates))]
    pub fn initialize(&self, candidates: Vec<Arc<dyn PushProvider>>) -> bool {
        let requested = !candidates.is_empty();
        let mut selected: Option<Arc<dyn PushProvider>> = None;
        for candidate in candidates {
            if candidate.is_available() {
                selected = Some(candidate);
            } else {
                tracing::info!(provider = candidate.name(), "push provider unavailable");
            }
        }

        let Some(provider) = selected else {
            *self.provider.write() = None;
            return !requested;
        };

        if self.scheduler.preferences().push_enabled() {
            provider.enable();
        } else {
            provider.disable();
        }
        tracing::info!(provider = provider.name(), "push provider selected");
        *self.provider.write() = Some(provider);
        true
    }

    pub fn provider_name(&self) -> Option<String> {
        self.provider
            .read()
            .as_ref()
            .map(|provider| provider.name().to_string())
    }

    pub fn set_push_notifications_enabled(&self, enabled: bool) -> Result<(), StorageError> {
        let prefs = self.scheduler.preferences();
        if prefs.push_enabled() == enabled {
            return Ok(());
        }
        prefs.set_push_enabled(enabled)?;
        if let Some(provider) = self.provider.read().as_ref() {
            if enabled {
                provider.enable();
            } else {
                provider.disable();
            }
        }
        Ok(())
    }

    pub fn push_notifications_enabled(&self) -> bool {
        let prefs = self.scheduler.preferences();
        self.provider.read().is_some() && prefs.notifications_enabled() && prefs.push_enabled()
    }

    #[instrument(skip(self, fields))]
    pub fn on_message(&self, fields: &Map<String, Value>) -> Option<i32> {
        let prefs = self.scheduler.preferences();
        if !prefs.push_enabled() {
            tracing::debug!("push disabled, ignoring message");
            return None;
        }

        let payload = match ingest_external_payload(fields, &prefs.field_names()) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(%err, "ignoring malformed push message");
                return None;
            }
        };

        let mut request = payload.into_request();
        let id = match request.id {
            Some(id) => id,
            None => self.scheduler.next_id(),
        };
        request.id = Some(id);

        match self.scheduler.post(request) {
            Ok(id) => Some(id),
            Err(err) => {
                tracing::error!(id, %err, "unable to post push notification");
                None
            }
        }
    }

    pub fn on_message_json(&self, raw: &str) -> Option<i32> {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(fields)) => self.on_message(&fields),
            Ok(other) => {
                tracing::warn!(kind = %json_kind(&other), "push message is not a JSON object");
                None
            }
            Err(err) => {
                tracing::warn!(%err, "push message is not valid JSON");
                None
            }
        }
    }

    pub fn on_registered(&self, provider: &str, registration_id: &str) {
        tracing::info!(provider, "push registration received");
        match &self.listener {
            Some(listener) => listener.on_registered(provider, registration_id),
            None => tracing::debug!(provider, "no registration listener attached"),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
