use notif_core::notification::{Button, UserData};
use notif_core::preferences::PayloadFieldNames;
use notif_core::NotificationRequest;
use serde_json::{Map, Value};
use thiserror::Error;

const LEGACY_TEXT_KEYS: [&str; 2] = ["alert", "body"];
const LEGACY_BUTTONS_KEY: &str = "o";
const BUTTON_TITLE_KEYS: [&str; 2] = ["title", "n"];
const PATH_SEPARATOR: char = '/';

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedField<T> {
    Found(T),
    Missing,
    Malformed(String),
}

impl<T> ParsedField<T> {
    pub fn or_missing(self, fallback: impl FnOnce() -> ParsedField<T>) -> ParsedField<T> {
        match self {
            ParsedField::Missing => fallback(),
            other => other,
        }
    }

    pub fn found(self) -> Option<T> {
        match self {
            ParsedField::Found(value) => Some(value),
            ParsedField::Missing | ParsedField::Malformed(_) => None,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("push payload has neither `{title_path}` nor `{text_path}`; it may be a service message")]
pub struct MalformedPayloadError {
    pub title_path: String,
    pub text_path: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ButtonParseError {
    #[error("button {index} is not an object")]
    NotAnObject { index: usize },

    #[error("button {index} has no title")]
    MissingTitle { index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestedPayload {
    pub id: Option<i32>,
    pub title: String,
    pub text: String,
    pub user_data: UserData,
    pub profile_id: Option<String>,
    pub badge_number: Option<i32>,
    pub buttons: Vec<Button>,
}

impl IngestedPayload {
    pub fn into_request(self) -> NotificationRequest {
        NotificationRequest {
            id: self.id,
            title: self.title,
            text: self.text,
            user_data: self.user_data,
            profile_id: self.profile_id,
            badge_number: self.badge_number,
            buttons: self.buttons,
        }
    }
}

/// Maps the fields of a push message onto a notification.
///
/// Every extracted field is removed from the working copy so that, with an
/// empty user-data path, the leftovers become the user data.
pub fn ingest_external_payload(
    fields: &Map<String, Value>,
    names: &PayloadFieldNames,
) -> Result<IngestedPayload, MalformedPayloadError> {
    let mut payload = fields.clone();

    let title = take_string(&mut payload, &names.title);
    let mut text = usable_text(take_string(&mut payload, &names.text), &names.text);
    for key in LEGACY_TEXT_KEYS {
        text = text.or_missing(|| usable_text(take_string(&mut payload, key), key));
    }

    let (title, text) = match (title.found(), text.found()) {
        (None, None) => {
            return Err(MalformedPayloadError {
                title_path: names.title.clone(),
                text_path: names.text.clone(),
            })
        }
        (title, text) => (
            title.unwrap_or_else(|| not_present(&names.title)),
            text.unwrap_or_else(|| not_present(&names.text)),
        ),
    };

    let profile_id = take_string(&mut payload, &names.profile).found();
    let badge_number = take_int(&mut payload, &names.badge);
    let id = take_int(&mut payload, &names.id);
    let buttons = take_value(&mut payload, &names.buttons)
        .or_missing(|| take_value(&mut payload, LEGACY_BUTTONS_KEY));
    let buttons = parse_buttons(buttons);

    let user_data = if segments(&names.user_data).is_empty() {
        flatten(&payload)
    } else {
        match object_at(&mut payload, &segments(&names.user_data)) {
            Some(object) => flatten(object),
            None => {
                tracing::debug!(path = %names.user_data, "user data path not found, using payload root");
                flatten(&payload)
            }
        }
    };

    Ok(IngestedPayload {
        id: log_malformed(id, &names.id),
        title,
        text,
        user_data,
        profile_id,
        badge_number: log_malformed(badge_number, &names.badge),
        buttons,
    })
}

fn not_present(path: &str) -> String {
    format!("\"{path}\" not present in the push payload; check the configured payload field names")
}

fn usable_text(field: ParsedField<String>, path: &str) -> ParsedField<String> {
    match field {
        ParsedField::Malformed(raw) => {
            tracing::warn!(path, raw = %raw, "ignoring non-string push payload text");
            ParsedField::Missing
        }
        other => other,
    }
}

fn log_malformed(field: ParsedField<i32>, path: &str) -> Option<i32> {
    match field {
        ParsedField::Found(value) if value != -1 => Some(value),
        ParsedField::Found(_) | ParsedField::Missing => None,
        ParsedField::Malformed(raw) => {
            tracing::warn!(path, raw = %raw, "ignoring non-numeric push payload field");
            None
        }
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.split(PATH_SEPARATOR)
        .filter(|segment| !segment.is_empty())
        .collect()
}

fn object_at<'a>(root: &'a mut Map<String, Value>, segments: &[&str]) -> Option<&'a mut Map<String, Value>> {
    let mut current = root;
    for segment in segments {
        let slot = current.get_mut(*segment)?;
        let decoded = match slot {
            Value::String(raw) => serde_json::from_str::<Value>(raw)
                .ok()
                .filter(Value::is_object),
            _ => None,
        };
        if let Some(decoded) = decoded {
            *slot = decoded;
        }
        current = slot.as_object_mut()?;
    }
    Some(current)
}

fn take_value(root: &mut Map<String, Value>, path: &str) -> ParsedField<Value> {
    let segments = segments(path);
    let Some((last, parents)) = segments.split_last() else {
        return ParsedField::Missing;
    };
    let Some(parent) = object_at(root, parents) else {
        return ParsedField::Missing;
    };
    match parent.remove(*last) {
        None | Some(Value::Null) => ParsedField::Missing,
        Some(value) => ParsedField::Found(value),
    }
}

fn take_string(root: &mut Map<String, Value>, path: &str) -> ParsedField<String> {
    match take_value(root, path) {
        ParsedField::Found(Value::String(value)) => ParsedField::Found(value),
        ParsedField::Found(value @ (Value::Number(_) | Value::Bool(_))) => {
            ParsedField::Found(value.to_string())
        }
        ParsedField::Found(value) => ParsedField::Malformed(value.to_string()),
        ParsedField::Missing => ParsedField::Missing,
        ParsedField::Malformed(raw) => ParsedField::Malformed(raw),
    }
}

fn take_int(root: &mut Map<String, Value>, path: &str) -> ParsedField<i32> {
    match take_value(root, path) {
        ParsedField::Found(Value::Number(number)) => number
            .as_i64()
            .and_then(|value| i32::try_from(value).ok())
            .map_or_else(|| ParsedField::Malformed(number.to_string()), ParsedField::Found),
        ParsedField::Found(Value::String(raw)) => match raw.trim().parse::<i32>() {
            Ok(value) => ParsedField::Found(value),
            Err(_) => ParsedField::Malformed(raw),
        },
        ParsedField::Found(value) => ParsedField::Malformed(value.to_string()),
        ParsedField::Missing => ParsedField::Missing,
        ParsedField::Malformed(raw) => ParsedField::Malformed(raw),
    }
}

fn parse_buttons(field: ParsedField<Value>) -> Vec<Button> {
    let entries = match field {
        ParsedField::Found(Value::Array(entries)) => entries,
        ParsedField::Found(Value::String(raw)) => match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(entries)) => entries,
            _ => {
                tracing::warn!(raw = %raw, "push payload buttons are not a JSON array");
                return Vec::new();
            }
        },
        ParsedField::Found(other) => {
            tracing::warn!(raw = %other, "push payload buttons are not a JSON array");
            return Vec::new();
        }
        ParsedField::Missing | ParsedField::Malformed(_) => return Vec::new(),
    };

    entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match parse_button(index, entry) {
            Ok(button) => Some(button),
            Err(err) => {
                tracing::warn!(%err, "skipping push payload button");
                None
            }
        })
        .collect()
}

fn parse_button(index: usize, entry: Value) -> Result<Button, ButtonParseError> {
    let Value::Object(mut fields) = entry else {
        return Err(ButtonParseError::NotAnObject { index });
    };
    let title = BUTTON_TITLE_KEYS
        .iter()
        .find_map(|key| match fields.remove(*key) {
            Some(Value::String(title)) => Some(title),
            _ => None,
        })
        .ok_or(ButtonParseError::MissingTitle { index })?;
    Ok(Button {
        title,
        user_data: flatten(&fields),
    })
}

fn flatten(fields: &Map<String, Value>) -> UserData {
    fields
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| {
            let value = match value {
                Value::String(value) => value.clone(),
                other => other.to_string(),
            };
            (key.clone(), value)
        })
        .collect()
}
