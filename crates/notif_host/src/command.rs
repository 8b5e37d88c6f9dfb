use anyhow::{anyhow, bail, Context, Result};
use notif_core::notification::{Button, UserData};
use notif_core::platform::HostPresence;
use notif_core::NotificationRequest;
use serde::Deserialize;

/// Notification fields as typed on the command line, e.g.
/// `{"title":"Sale","text":"50% off","badge":3}`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RequestArgs {
    pub id: Option<i32>,
    pub title: String,
    pub text: String,
    pub data: UserData,
    pub profile: Option<String>,
    pub badge: Option<i32>,
    pub buttons: Vec<Button>,
}

impl From<RequestArgs> for NotificationRequest {
    fn from(args: RequestArgs) -> Self {
        NotificationRequest {
            id: args.id,
            title: args.title,
            text: args.text,
            user_data: args.data,
            profile_id: args.profile,
            badge_number: args.badge,
            buttons: args.buttons,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Post(RequestArgs),
    Schedule { seconds: i32, args: RequestArgs },
    Repeat { first: i32, interval: i32, args: RequestArgs },
    Cancel(i32),
    CancelAll,
    Hide(i32),
    HideAll,
    Fire(i32),
    Push(String),
    Badge(Option<i32>),
    Enable(bool),
    PushEnable(bool),
    Presence(HostPresence),
    Click { id: i32, button: Option<usize> },
    Clicked,
    Received,
    Ids,
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        let command = match verb {
            "post" => Command::Post(request_args(rest)?),
            "schedule" => {
                let (seconds, rest) = leading_int(rest, "seconds")?;
                Command::Schedule {
                    seconds,
                    args: request_args(rest)?,
                }
            }
            "repeat" => {
                let (first, rest) = leading_int(rest, "first trigger seconds")?;
                let (interval, rest) = leading_int(rest, "interval seconds")?;
                Command::Repeat {
                    first,
                    interval,
                    args: request_args(rest)?,
                }
            }
            "cancel" => Command::Cancel(leading_int(rest, "id")?.0),
            "cancel-all" => Command::CancelAll,
            "hide" => Command::Hide(leading_int(rest, "id")?.0),
            "hide-all" => Command::HideAll,
            "fire" => Command::Fire(leading_int(rest, "id")?.0),
            "push" => {
                if rest.is_empty() {
                    bail!("push needs a JSON payload");
                }
                Command::Push(rest.to_string())
            }
            "badge" if rest.is_empty() => Command::Badge(None),
            "badge" => Command::Badge(Some(leading_int(rest, "badge number")?.0)),
            "enable" => Command::Enable(switch(rest)?),
            "push-enable" => Command::PushEnable(switch(rest)?),
            "presence" => Command::Presence(presence(rest)?),
            "click" => {
                let (id, rest) = leading_int(rest, "id")?;
                let button = if rest.is_empty() {
                    None
                } else {
                    Some(
                        rest.parse::<usize>()
                            .with_context(|| format!("invalid button index `{rest}`"))?,
                    )
                };
                Command::Click { id, button }
            }
            "clicked" => Command::Clicked,
            "received" => Command::Received,
            "ids" => Command::Ids,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => bail!("unknown command `{other}`, try `help`"),
        };
        Ok(command)
    }
}

pub const HELP: &str = "\
commands:
  post <json>                      show a notification now
  schedule <secs> <json>           show once after <secs>
  repeat <first> <every> <json>    show after <first> secs, then every <every> secs
  cancel <id> | cancel-all         cancel scheduled notifications
  hide <id> | hide-all             hide shown notifications
  fire <id>                        fire a scheduled notification now
  push <json>                      feed a push message
  badge [n]                        read or set the badge
  enable on|off                    toggle notifications
  push-enable on|off               toggle push notifications
  presence closed|background|foreground
  click <id> [button]              simulate a tap
  clicked | received | ids         inspect state
  quit";

fn request_args(raw: &str) -> Result<RequestArgs> {
    if raw.is_empty() {
        bail!("missing notification JSON");
    }
    serde_json::from_str(raw).with_context(|| format!("invalid notification JSON `{raw}`"))
}

fn leading_int<'a>(raw: &'a str, what: &str) -> Result<(i32, &'a str)> {
    let (head, tail) = raw.split_once(char::is_whitespace).unwrap_or((raw, ""));
    if head.is_empty() {
        bail!("missing {what}");
    }
    let value = head
        .parse::<i32>()
        .with_context(|| format!("invalid {what} `{head}`"))?;
    Ok((value, tail.trim()))
}

fn switch(raw: &str) -> Result<bool> {
    match raw {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        other => Err(anyhow!("expected on or off, got `{other}`")),
    }
}

fn presence(raw: &str) -> Result<HostPresence> {
    match raw {
        "closed" => Ok(HostPresence::Closed),
        "background" => Ok(HostPresence::Background),
        "foreground" => Ok(HostPresence::Foreground),
        other => Err(anyhow!("unknown presence `{other}`")),
    }
}
