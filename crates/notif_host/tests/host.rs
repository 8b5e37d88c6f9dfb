use std::time::Duration;

use notif_host::app::{Host, HostConfig};
use notif_host::command::Command;
use tempfile::TempDir;

fn config(temp: &TempDir) -> HostConfig {
    HostConfig {
        store_path: temp.path().join("store.json"),
        restore_on_reboot: Some(true),
        ..HostConfig::default()
    }
}

fn run(host: &Host, line: &str) -> Option<String> {
    let command = Command::parse(line).expect("parse command");
    host.execute(command).expect("execute command")
}

#[test]
fn posted_notification_can_be_clicked() {
    let temp = tempfile::tempdir().expect("tempdir");
    let host = Host::start(&config(&temp)).expect("start host");

    let reply = run(
        &host,
        r#"post {"id":5,"title":"Update","text":"Ready","data":{"open_url":"example.com/notes"}}"#,
    );
    assert_eq!(reply.as_deref(), Some("posted 5"));
    assert_eq!(host.renderer().visible_ids(), vec![5]);

    assert_eq!(run(&host, "click 5").as_deref(), Some("open http://example.com/notes"));
    let clicked = run(&host, "clicked").unwrap();
    assert!(clicked.contains("\"Update\""), "{clicked}");
    assert_eq!(run(&host, "clicked").as_deref(), Some("no click"));
    assert!(host.execute(Command::Click { id: 77, button: None }).is_err());
}

#[test]
fn scheduled_notification_fires_from_the_alarm_thread() {
    let temp = tempfile::tempdir().expect("tempdir");
    let host = Host::start(&config(&temp)).expect("start host");

    run(&host, r#"schedule 1 {"id":12,"title":"Tea","text":"Steeped"}"#);
    assert!(host.renderer().visible_ids().is_empty());

    let fired = host
        .alarm_fires()
        .recv_timeout(Duration::from_secs(5))
        .expect("alarm fired");
    assert_eq!(fired, 12);
    host.on_alarm(fired);

    assert_eq!(host.renderer().visible_ids(), vec![12]);
    assert!(host.scheduler().scheduled_ids().is_empty());
}

#[test]
fn scheduled_notifications_survive_a_restart() {
    let temp = tempfile::tempdir().expect("tempdir");
    {
        let host = Host::start(&config(&temp)).expect("start host");
        run(&host, r#"schedule 600 {"id":3,"title":"Later","text":"x"}"#);
        run(&host, r#"repeat 600 3600 {"id":4,"title":"Hourly","text":"x"}"#);
        run(&host, "badge 2");
    }

    let host = Host::start(&config(&temp)).expect("restart host");
    assert_eq!(host.scheduler().scheduled_ids(), vec![3, 4]);
    let ids = run(&host, "ids").unwrap();
    assert!(ids.contains("armed [3, 4]"), "{ids}");
    assert_eq!(run(&host, "badge").as_deref(), Some("badge 2"));

    run(&host, "cancel-all");
    assert!(host.scheduler().scheduled_ids().is_empty());
}

#[test]
fn image_notifications_render_after_loading() {
    let temp = tempfile::tempdir().expect("tempdir");
    let image = temp.path().join("banner.png");
    std::fs::write(&image, [9u8; 16]).unwrap();
    let host = Host::start(&config(&temp)).expect("start host");

    let line = format!(
        r#"post {{"id":8,"title":"Sale","text":"Now","data":{{"image_url":"file://{}"}}}}"#,
        image.display()
    );
    run(&host, &line);
    assert!(host.renderer().visible_ids().is_empty());

    let completion = host
        .enrichment_completions()
        .recv_timeout(Duration::from_secs(5))
        .expect("image loaded");
    host.on_enrichment(completion);
    assert_eq!(host.renderer().visible_ids(), vec![8]);
}

#[test]
fn push_messages_and_toggles() {
    let temp = tempfile::tempdir().expect("tempdir");
    let host = Host::start(&config(&temp)).expect("start host");

    assert_eq!(
        run(&host, r#"push {"id":"21","title":"Hi","text":"there"}"#).as_deref(),
        Some("pushed 21")
    );
    run(&host, "push-enable off");
    assert_eq!(
        run(&host, r#"push {"title":"Hi","text":"again"}"#).as_deref(),
        Some("push message ignored")
    );

    run(&host, "enable off");
    assert!(!host.scheduler().notifications_enabled());
    assert_eq!(
        run(&host, r#"post {"id":30,"title":"Quiet","text":"x"}"#).as_deref(),
        Some("posted 30")
    );
    assert!(!host.renderer().visible_ids().contains(&30));
}
