//! Conversation messages and their on-disk representation.

use chrono::{Local, NaiveDateTime, SubsecRound};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::warn;
use url::Url;

use crate::error::ValidationError;

/// Timestamp format used in the history document.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Label shown in the chat list and in exported transcripts.
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Assistant => "Assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Role {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(ValidationError::UnknownRole(other.to_string())),
        }
    }
}

/// Image reference carried by a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    LocalPath(PathBuf),
    RemoteUrl(Url),
}

impl Attachment {
    /// Classify a raw string from the history document. Anything that parses
    /// as an http(s) URL is remote, everything else is a filesystem path.
    pub fn classify(raw: &str) -> Self {
        match Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Attachment::RemoteUrl(url),
            _ => Attachment::LocalPath(PathBuf::from(raw)),
        }
    }
}

impl fmt::Display for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attachment::LocalPath(path) => write!(f, "{}", path.display()),
            Attachment::RemoteUrl(url) => f.write_str(url.as_str()),
        }
    }
}

/// One conversation turn. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredMessage", into = "StoredMessage")]
pub struct Message {
    role: Role,
    content: String,
    timestamp: NaiveDateTime,
    attachment: Option<Attachment>,
}

impl Message {
    pub fn new(
        role: Role,
        content: impl Into<String>,
        timestamp: NaiveDateTime,
        attachment: Option<Attachment>,
    ) -> Result<Self, ValidationError> {
        let content = content.into();
        if content.trim().is_empty() && attachment.is_none() {
            return Err(ValidationError::EmptyMessage);
        }
        Ok(Self {
            role,
            content,
            timestamp: timestamp.trunc_subsecs(0),
            attachment,
        })
    }

    /// Build a message stamped with the current local time.
    pub fn now(
        role: Role,
        content: impl Into<String>,
        attachment: Option<Attachment>,
    ) -> Result<Self, ValidationError> {
        Self::new(role, content, now_seconds(), attachment)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn attachment(&self) -> Option<&Attachment> {
        self.attachment.as_ref()
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

pub(crate) fn now_seconds() -> NaiveDateTime {
    Local::now().naive_local().trunc_subsecs(0)
}

/// Raw record as it appears in the history document. Every field is
/// optional so one bad record never breaks the structural parse of the
/// whole array.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct StoredMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl From<Message> for StoredMessage {
    fn from(message: Message) -> Self {
        Self::from(&message)
    }
}

impl From<&Message> for StoredMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: Some(message.role.as_str().to_string()),
            content: Some(message.content.clone()),
            timestamp: Some(message.timestamp.format(TIMESTAMP_FORMAT).to_string()),
            image: message.attachment.as_ref().map(ToString::to_string),
        }
    }
}

impl TryFrom<StoredMessage> for Message {
    type Error = ValidationError;

    fn try_from(stored: StoredMessage) -> Result<Self, Self::Error> {
        let role = Role::try_from(stored.role.as_deref().unwrap_or_default())?;
        let timestamp = match stored.timestamp.as_deref() {
            Some(raw) => NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).unwrap_or_else(|e| {
                warn!(
                    target: "colloquy::message",
                    "Unparseable timestamp {:?} ({}), using current time", raw, e
                );
                now_seconds()
            }),
            None => {
                warn!(target: "colloquy::message", "Message without timestamp, using current time");
                now_seconds()
            }
        };
        let attachment = stored
            .image
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .map(Attachment::classify);
        Message::new(role, stored.content.unwrap_or_default(), timestamp, attachment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 17)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn empty_message_without_attachment_is_rejected() {
        assert_eq!(
            Message::new(Role::User, "   ", at(9, 0, 0), None),
            Err(ValidationError::EmptyMessage)
        );
        let with_image = Message::new(
            Role::User,
            "",
            at(9, 0, 0),
            Some(Attachment::LocalPath("cat.png".into())),
        );
        assert!(with_image.is_ok());
    }

    #[test]
    fn serde_preserves_fields_at_second_precision() {
        let ts = at(14, 3, 59) + chrono::Duration::milliseconds(750);
        let message = Message::new(
            Role::Assistant,
            "Привет, world",
            ts,
            Some(Attachment::classify("http://localhost:5000/uploads/a.png")),
        )
        .unwrap();

        let json = serde_json::to_string(&message).unwrap();
        assert!(json.contains("\"timestamp\":\"2024-05-17T14:03:59\""));
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, message);
        assert_eq!(back.timestamp(), at(14, 3, 59));
    }

    #[test]
    fn bad_timestamp_falls_back_to_now() {
        let before = now_seconds();
        let stored = StoredMessage {
            role: Some("user".into()),
            content: Some("hello".into()),
            timestamp: Some("yesterday-ish".into()),
            image: None,
        };
        let message = Message::try_from(stored).unwrap();
        assert!(message.timestamp() >= before);
    }

    #[test]
    fn unknown_role_is_rejected() {
        let stored = StoredMessage {
            role: Some("system".into()),
            content: Some("x".into()),
            timestamp: None,
            image: None,
        };
        assert_eq!(
            Message::try_from(stored),
            Err(ValidationError::UnknownRole("system".into()))
        );
    }

    #[test]
    fn attachment_classification() {
        assert!(matches!(
            Attachment::classify("https://example.com/cat.jpg"),
            Attachment::RemoteUrl(_)
        ));
        assert!(matches!(
            Attachment::classify("/home/me/cat.jpg"),
            Attachment::LocalPath(_)
        ));
        assert!(matches!(
            Attachment::classify("C:\\pics\\cat.jpg"),
            Attachment::LocalPath(_)
        ));
    }
}
