use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use anyhow::{bail, Context, Result};
use crossbeam_channel::{never, select, unbounded, Receiver, Sender};
use notif_core::enrichment::EnrichmentCompletion;
use notif_core::platform::{HostPresence, SharedHostState};
use notif_core::preferences::{Settings, ShowMode};
use notif_core::service::ClickAction;
use notif_core::store::FileStore;
use notif_core::time_base::SystemClock;
use notif_core::{Notification, NotificationScheduler};
use notif_push::{PushGateway, PushProvider, RegistrationListener};
use tracing::{debug, info, warn};

use crate::alarm::ThreadAlarmDriver;
use crate::command::{Command, HELP};
use crate::fetcher::FileImageFetcher;
use crate::renderer::LogRenderer;

#[derive(Clone, Debug, PartialEq)]
pub struct HostConfig {
    pub store_path: PathBuf,
    pub settings_path: Option<PathBuf>,
    pub show_mode: Option<ShowMode>,
    pub restore_on_reboot: Option<bool>,
    pub incremental_id: Option<bool>,
    pub start_id: Option<i32>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("notifications.json"),
            settings_path: None,
            show_mode: None,
            restore_on_reboot: None,
            incremental_id: None,
            start_id: None,
        }
    }
}

impl HostConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self::from_lookup(|key| std::env::var(key).ok()))
    }

    /// Builds a config from `lookup`; values that fail to parse are ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(path) = lookup("NOTIF_STORE_PATH") {
            if !path.trim().is_empty() {
                config.store_path = PathBuf::from(path.trim());
            }
        }
        if let Some(path) = lookup("NOTIF_SETTINGS_PATH") {
            if !path.trim().is_empty() {
                config.settings_path = Some(PathBuf::from(path.trim()));
            }
        }
        if let Some(mode) = lookup("NOTIF_SHOW_MODE") {
            config.show_mode = ShowMode::parse(&mode);
        }
        if let Some(flag) = lookup("NOTIF_RESTORE_ON_REBOOT") {
            config.restore_on_reboot = parse_flag(&flag);
        }
        if let Some(flag) = lookup("NOTIF_INCREMENTAL_ID") {
            config.incremental_id = parse_flag(&flag);
        }
        if let Some(start) = lookup("NOTIF_START_ID") {
            config.start_id = start.trim().parse::<i32>().ok();
        }
        config
    }

    /// Settings from the optional JSON file, with the env overrides applied on top.
    pub fn load_settings(&self) -> Result<Settings> {
        let mut settings = match &self.settings_path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("unable to read settings {}", path.display()))?;
                Settings::from_json(&raw)
                    .with_context(|| format!("invalid settings in {}", path.display()))?
            }
            None => Settings::default(),
        };
        if let Some(mode) = self.show_mode {
            settings.show_mode = mode;
        }
        if let Some(restore) = self.restore_on_reboot {
            settings.restore_on_reboot = restore;
        }
        if let Some(incremental) = self.incremental_id {
            settings.incremental_id = incremental;
        }
        if let Some(start) = self.start_id {
            settings.start_id = start;
        }
        Ok(settings)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Push provider for messages typed into the host; always reachable.
struct LocalPushProvider;

impl PushProvider for LocalPushProvider {
    fn name(&self) -> &str {
        "local"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn enable(&self) {
        info!(provider = self.name(), "push delivery enabled");
    }

    fn disable(&self) {
        info!(provider = self.name(), "push delivery disabled");
    }
}

struct LoggingRegistrationListener;

impl RegistrationListener for LoggingRegistrationListener {
    fn on_registered(&self, provider: &str, registration_id: &str) {
        info!(provider, registration_id, "push registration received");
    }
}

/// A running scheduler wired to in-process platform services.
pub struct Host {
    scheduler: Arc<NotificationScheduler>,
    gateway: PushGateway,
    renderer: Arc<LogRenderer>,
    presence: Arc<SharedHostState>,
    alarms: Arc<ThreadAlarmDriver>,
}

impl Host {
    pub fn start(config: &HostConfig) -> Result<Self> {
        let settings = config.load_settings()?;
        let store = FileStore::open(&config.store_path)
            .with_context(|| format!("unable to open store {}", config.store_path.display()))?;
        let clock = Arc::new(SystemClock::new());
        let alarms = Arc::new(
            ThreadAlarmDriver::start(clock.clone()).context("unable to start alarm thread")?,
        );
        let renderer = Arc::new(LogRenderer::new());
        let presence = Arc::new(SharedHostState::new(HostPresence::Background));

        let scheduler = NotificationScheduler::builder()
            .with_store(Arc::new(store))
            .with_clock(clock)
            .with_renderer(renderer.clone())
            .with_alarm_driver(alarms.clone())
            .with_host_state(presence.clone())
            .with_image_fetcher(Arc::new(FileImageFetcher))
            .build()?;
        scheduler.initialize(&settings)?;
        let restored = scheduler.restore_on_boot()?;
        let scheduler = Arc::new(scheduler);

        let gateway = PushGateway::new(Arc::clone(&scheduler))
            .with_registration_listener(Arc::new(LoggingRegistrationListener));
        if !gateway.initialize(vec![Arc::new(LocalPushProvider) as Arc<dyn PushProvider>]) {
            warn!("no push provider available");
        }
        gateway.on_registered("local", "local-host");

        info!(
            store = %config.store_path.display(),
            restored,
            scheduled = scheduler.scheduled_ids().len(),
            "notification host ready"
        );
        Ok(Self {
            scheduler,
            gateway,
            renderer,
            presence,
            alarms,
        })
    }

    pub fn scheduler(&self) -> &NotificationScheduler {
        &self.scheduler
    }

    pub fn renderer(&self) -> &LogRenderer {
        &self.renderer
    }

    pub fn alarm_fires(&self) -> Receiver<i32> {
        self.alarms.fires()
    }

    pub fn enrichment_completions(&self) -> Receiver<EnrichmentCompletion> {
        self.scheduler.enrichment_completions().unwrap_or_else(never)
    }

    pub fn on_alarm(&self, id: i32) {
        match self.scheduler.on_fire(id) {
            Ok(Some(report)) => debug!(id, ?report, "alarm delivered"),
            Ok(None) => debug!(id, "alarm had nothing to deliver"),
            Err(err) => warn!(id, %err, "alarm delivery failed"),
        }
    }

    pub fn on_enrichment(&self, completion: EnrichmentCompletion) {
        let id = completion.notification.id;
        if let Err(err) = self.scheduler.process_enrichment(completion) {
            warn!(id, %err, "deferred delivery failed");
        }
    }

    /// Runs one command and returns the text to print, if any.
    pub fn execute(&self, command: Command) -> Result<Option<String>> {
        let reply = match command {
            Command::Post(args) => {
                let id = self.scheduler.post(args.into())?;
                Some(format!("posted {id}"))
            }
            Command::Schedule { seconds, args } => {
                let id = self.scheduler.schedule(seconds, args.into())?;
                Some(format!("scheduled {id} in {seconds}s"))
            }
            Command::Repeat {
                first,
                interval,
                args,
            } => {
                let id = self.scheduler.schedule_repeating(first, interval, args.into())?;
                Some(format!("scheduled {id} in {first}s, every {interval}s"))
            }
            Command::Cancel(id) => {
                self.scheduler.cancel(id)?;
                None
            }
            Command::CancelAll => {
                self.scheduler.cancel_all()?;
                None
            }
            Command::Hide(id) => {
                self.scheduler.hide(id);
                None
            }
            Command::HideAll => {
                self.scheduler.hide_all();
                None
            }
            Command::Fire(id) => match self.scheduler.on_fire(id)? {
                Some(report) if report.shown => Some(format!("fired {id}")),
                Some(_) => Some(format!("fired {id} without showing it")),
                None => Some(format!("nothing scheduled under {id}")),
            },
            Command::Push(raw) => match self.gateway.on_message_json(&raw) {
                Some(id) => Some(format!("pushed {id}")),
                None => Some("push message ignored".to_string()),
            },
            Command::Badge(None) => Some(format!("badge {}", self.scheduler.badge())),
            Command::Badge(Some(count)) => {
                self.scheduler.set_badge(count)?;
                None
            }
            Command::Enable(enabled) => {
                self.scheduler.set_notifications_enabled(enabled)?;
                None
            }
            Command::PushEnable(enabled) => {
                self.gateway.set_push_notifications_enabled(enabled)?;
                None
            }
            Command::Presence(presence) => {
                self.presence.set(presence);
                None
            }
            Command::Click { id, button } => {
                let notification = self.find(id)?;
                match self.scheduler.record_click(notification, button) {
                    ClickAction::OpenUrl(url) => Some(format!("open {url}")),
                    ClickAction::ActivateHost => Some("activate host".to_string()),
                }
            }
            Command::Clicked => Some(match self.scheduler.poll_clicked_notification() {
                Some(clicked) => {
                    let packed = clicked.notification.to_packed()?;
                    match clicked.clicked_button_index {
                        Some(index) => format!("{packed} (button {index})"),
                        None => packed,
                    }
                }
                None => "no click".to_string(),
            }),
            Command::Received => {
                let received = self.scheduler.drain_received_log()?;
                Some(serde_json::to_string(&received)?)
            }
            Command::Ids => Some(format!(
                "scheduled {:?}, shown {:?}, armed {:?}",
                self.scheduler.scheduled_ids(),
                self.renderer.visible_ids(),
                self.alarms.armed_ids()
            )),
            Command::Help => Some(HELP.to_string()),
            Command::Quit => None,
        };
        Ok(reply)
    }

    fn find(&self, id: i32) -> Result<Notification> {
        if let Some(notification) = self.renderer.visible(id) {
            return Ok(notification);
        }
        if let Some(notification) = self.scheduler.scheduled_notification(id) {
            return Ok(notification);
        }
        bail!("notification {id} is neither shown nor scheduled")
    }
}

pub fn run(config: HostConfig) -> Result<()> {
    let host = Host::start(&config)?;
    let (sender, lines) = unbounded();
    spawn_stdin_reader(sender)?;
    let fires = host.alarm_fires();
    let completions = host.enrichment_completions();

    loop {
        select! {
            recv(lines) -> line => {
                let Ok(line) = line else {
                    info!("input closed, shutting down");
                    break;
                };
                if !handle_line(&host, &line) {
                    break;
                }
            }
            recv(fires) -> id => {
                if let Ok(id) = id {
                    host.on_alarm(id);
                }
            }
            recv(completions) -> completion => {
                if let Ok(completion) = completion {
                    host.on_enrichment(completion);
                }
            }
        }
    }
    Ok(())
}

/// Returns `false` once the user asked to quit.
fn handle_line(host: &Host, line: &str) -> bool {
    if line.trim().is_empty() {
        return true;
    }
    match Command::parse(line) {
        Ok(Command::Quit) => return false,
        Ok(command) => match host.execute(command) {
            Ok(Some(reply)) => println!("{reply}"),
            Ok(None) => {}
            Err(err) => eprintln!("error: {err:#}"),
        },
        Err(err) => eprintln!("{err:#}"),
    }
    true
}

fn spawn_stdin_reader(sender: Sender<String>) -> io::Result<()> {
    thread::Builder::new()
        .name("notif-stdin".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if sender.send(line).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(%err, "unable to read input");
                        break;
                    }
                }
            }
        })?;
    Ok(())
}
