use std::sync::Arc;

use notif_core::error::RenderError;
use notif_core::platform::{AlarmDriver, RenderHandle, RenderRequest, Renderer};
use notif_core::preferences::{PayloadFieldNames, Settings};
use notif_core::NotificationScheduler;
use notif_push::{PushGateway, PushProvider, RegistrationListener};
use parking_lot::Mutex;
use serde_json::json;

#[derive(Default)]
struct CapturingRenderer {
    rendered: Mutex<Vec<RenderRequest>>,
}

impl Renderer for CapturingRenderer {
    fn render(&self, request: &RenderRequest) -> Result<RenderHandle, RenderError> {
        self.rendered.lock().push(request.clone());
        Ok(RenderHandle(request.notification.id))
    }

    fn hide(&self, _id: i32) {}

    fn hide_all(&self) {}
}

struct IdleAlarms;

impl AlarmDriver for IdleAlarms {
    fn arm(&self, _id: i32, _at_monotonic_millis: i64, _exact: bool) {}

    fn arm_repeating(&self, _id: i32, _first_at_monotonic_millis: i64, _interval_millis: i64) {}

    fn disarm(&self, _id: i32) {}
}

struct FakeProvider {
    name: &'static str,
    available: bool,
    toggles: Mutex<Vec<bool>>,
}

impl FakeProvider {
    fn new(name: &'static str, available: bool) -> Arc<Self> {
        Arc::new(Self {
            name,
            available,
            toggles: Mutex::new(Vec::new()),
        })
    }

    fn toggles(&self) -> Vec<bool> {
        self.toggles.lock().clone()
    }
}

impl PushProvider for FakeProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn enable(&self) {
        self.toggles.lock().push(true);
    }

    fn disable(&self) {
        self.toggles.lock().push(false);
    }
}

#[derive(Default)]
struct RecordingListener {
    registrations: Mutex<Vec<(String, String)>>,
}

impl RegistrationListener for RecordingListener {
    fn on_registered(&self, provider: &str, registration_id: &str) {
        self.registrations
            .lock()
            .push((provider.to_string(), registration_id.to_string()));
    }
}

fn build_gateway(settings: Settings) -> (Arc<CapturingRenderer>, Arc<NotificationScheduler>, PushGateway) {
    let renderer = Arc::new(CapturingRenderer::default());
    let scheduler = NotificationScheduler::builder()
        .with_renderer(renderer.clone())
        .with_alarm_driver(Arc::new(IdleAlarms))
        .build()
        .expect("build scheduler");
    scheduler.initialize(&settings).expect("initialize");
    let scheduler = Arc::new(scheduler);
    let gateway = PushGateway::new(Arc::clone(&scheduler));
    (renderer, scheduler, gateway)
}

#[test]
fn alert_only_message_is_posted_with_its_text() {
    let (renderer, _, gateway) = build_gateway(Settings::default());
    let id = gateway.on_message_json(r#"{"alert": "hello"}"#);

    assert!(id.is_some());
    let rendered = renderer.rendered.lock();
    assert_eq!(rendered.len(), 1);
    assert_eq!(rendered[0].notification.text, "hello");
}

#[test]
fn object_text_falls_back_to_alert() {
    let (renderer, _, gateway) = build_gateway(Settings::default());
    assert!(gateway
        .on_message_json(r#"{"text": {"nested": 1}, "alert": "hello"}"#)
        .is_some());
    assert_eq!(renderer.rendered.lock()[0].notification.text, "hello");
}

#[test]
fn messages_without_id_take_allocated_ids() {
    let (renderer, _, gateway) = build_gateway(Settings {
        incremental_id: true,
        start_id: 500,
        ..Settings::default()
    });

    assert_eq!(gateway.on_message_json(r#"{"title": "a", "text": "b"}"#), Some(500));
    assert_eq!(gateway.on_message_json(r#"{"title": "a", "text": "b"}"#), Some(501));
    assert_eq!(
        gateway.on_message_json(r#"{"title": "a", "text": "b", "id": "9"}"#),
        Some(9)
    );
    assert_eq!(renderer.rendered.lock().len(), 3);
}

#[test]
fn configured_field_names_are_used() {
    let (renderer, _, gateway) = build_gateway(Settings {
        field_names: PayloadFieldNames {
            title: "data/heading".into(),
            text: "data/message".into(),
            ..PayloadFieldNames::default()
        },
        ..Settings::default()
    });

    let fields = json!({"data": {"heading": "Raid", "message": "Boss spawned", "zone": "4"}});
    let fields = fields.as_object().unwrap();
    gateway.on_message(fields).unwrap();

    let rendered = renderer.rendered.lock();
    assert_eq!(rendered[0].notification.title, "Raid");
    assert_eq!(rendered[0].notification.text, "Boss spawned");
}

#[test]
fn malformed_and_disabled_messages_post_nothing() {
    let (renderer, scheduler, gateway) = build_gateway(Settings::default());

    assert_eq!(gateway.on_message_json(r#"{"af-uinstall-tracking": "1"}"#), None);
    assert_eq!(gateway.on_message_json("[1, 2]"), None);
    assert_eq!(gateway.on_message_json("not json"), None);

    scheduler.preferences().set_push_enabled(false).unwrap();
    assert_eq!(gateway.on_message_json(r#"{"title": "t", "text": "x"}"#), None);
    assert!(renderer.rendered.lock().is_empty());
}

#[test]
fn later_available_provider_wins() {
    let (_, _, gateway) = build_gateway(Settings::default());
    let firebase = FakeProvider::new("FCM", true);
    let amazon = FakeProvider::new("ADM", true);

    assert!(gateway.initialize(vec![
        firebase.clone() as Arc<dyn PushProvider>,
        amazon.clone(),
    ]));
    assert_eq!(gateway.provider_name().as_deref(), Some("ADM"));
    assert_eq!(amazon.toggles(), vec![true]);
    assert!(firebase.toggles().is_empty());
    assert!(gateway.push_notifications_enabled());
}

#[test]
fn unavailable_providers_leave_push_off() {
    let (_, _, gateway) = build_gateway(Settings::default());
    let firebase = FakeProvider::new("FCM", false);

    assert!(!gateway.initialize(vec![firebase as Arc<dyn PushProvider>]));
    assert!(gateway.provider_name().is_none());
    assert!(!gateway.push_notifications_enabled());

    assert!(gateway.initialize(Vec::new()));
}

#[test]
fn provider_is_toggled_only_when_the_flag_changes() {
    let (_, scheduler, gateway) = build_gateway(Settings::default());
    let firebase = FakeProvider::new("FCM", true);
    gateway.initialize(vec![firebase.clone() as Arc<dyn PushProvider>]);

    gateway.set_push_notifications_enabled(true).unwrap();
    gateway.set_push_notifications_enabled(false).unwrap();
    gateway.set_push_notifications_enabled(false).unwrap();
    gateway.set_push_notifications_enabled(true).unwrap();

    assert_eq!(firebase.toggles(), vec![true, false, true]);
    assert!(scheduler.preferences().push_enabled());

    scheduler.set_notifications_enabled(false).unwrap();
    assert!(!gateway.push_notifications_enabled());
}

#[test]
fn registrations_reach_the_listener() {
    let (_, scheduler, _) = build_gateway(Settings::default());
    let listener = Arc::new(RecordingListener::default());
    let gateway = PushGateway::new(scheduler).with_registration_listener(listener.clone());

    gateway.on_registered("FCM", "token-123");
    assert_eq!(
        listener.registrations.lock().clone(),
        vec![("FCM".to_string(), "token-123".to_string())]
    );
}
