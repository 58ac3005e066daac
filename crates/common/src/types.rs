//! Transport-neutral inbound types.
//!
//! Transport adapters convert their native events into [`Update`]s; the
//! dispatch pipeline never sees anything platform specific.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

/// Identifies one chat. Key into session storage.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ConversationId(pub i64);

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConversationId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|source| Error::InvalidId {
                value: s.to_string(),
                source,
            })
    }
}

impl From<i64> for ConversationId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Kind of chat an update arrived from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    #[default]
    Private,
    Group,
    Channel,
}

/// What an inbound message carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    /// Plain text; `data` holds the text.
    #[default]
    Text,
    /// An uploaded file; `data` holds a direct download link.
    Document,
    /// A shared contact card.
    Contact,
    /// A shared location.
    Location,
    /// Inline keyboard button press; `data` holds the callback payload.
    Callback,
}

/// The user who sent an update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    pub id: i64,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
}

impl Sender {
    /// Display name: "first last", or the username when both are empty.
    pub fn display_name(&self) -> String {
        let last = self.last_name.as_deref().unwrap_or("");
        let name = format!("{} {last}", self.first_name).trim().to_string();
        if name.is_empty() {
            self.username.clone().unwrap_or_default()
        } else {
            name
        }
    }
}

/// Contact card. `last_name` and `user_id` may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub phone_number: String,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub user_id: Option<i64>,
}

/// A point on the map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// The body of an update, in neutral form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub conversation_id: ConversationId,
    pub chat_type: ChatType,
    pub kind: PayloadKind,
    /// Text, callback data, or a direct file link depending on `kind`.
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    pub from: Sender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl InboundMessage {
    /// Shorthand for a private text message, mostly useful in tests and demos.
    pub fn text(conversation_id: impl Into<ConversationId>, text: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            data: text.into(),
            ..Default::default()
        }
    }
}

/// One update from the transport. Updates without a body (service events the
/// adapter does not translate) are dropped by the dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<InboundMessage>,
}

impl Update {
    pub fn new(id: i64, message: InboundMessage) -> Self {
        Self {
            id,
            message: Some(message),
        }
    }

    pub fn empty(id: i64) -> Self {
        Self { id, message: None }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_conversation_id() {
        assert_eq!(
            "-1001234".parse::<ConversationId>().unwrap(),
            ConversationId(-1001234)
        );
        assert!(" 42 ".parse::<ConversationId>().is_ok());
    }

    #[test]
    fn parse_conversation_id_rejects_garbage() {
        let err = "chat".parse::<ConversationId>().unwrap_err();
        assert!(err.to_string().contains("chat"));
    }

    #[test]
    fn display_name_falls_back_to_username() {
        let sender = Sender {
            username: Some("kitty".into()),
            ..Default::default()
        };
        assert_eq!(sender.display_name(), "kitty");

        let sender = Sender {
            first_name: "Ada".into(),
            last_name: Some("Lovelace".into()),
            ..Default::default()
        };
        assert_eq!(sender.display_name(), "Ada Lovelace");
    }

    #[test]
    fn update_deserializes_without_body() {
        let update: Update = serde_json::from_str(r#"{"id": 7}"#).unwrap();
        assert_eq!(update.id, 7);
        assert!(update.message.is_none());
    }
}
