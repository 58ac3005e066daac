//! Outbound replies.
//!
//! A [`Reply`] is immutable once built; handlers hand it to the reply stream
//! and the transport adapter turns it into the right API call.

use std::path::PathBuf;

use {
    chatmux_common::types::ConversationId,
    serde::{Deserialize, Serialize},
};

/// Where a media reply's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "value", rename_all = "snake_case")]
pub enum FileSource {
    /// A local file, uploaded by the transport.
    Path(PathBuf),
    /// A public URL the remote service fetches itself.
    Url(String),
    /// An identifier the remote service already knows (e.g. a sticker id).
    FileId(String),
}

impl From<&str> for FileSource {
    fn from(value: &str) -> Self {
        if value.starts_with("http://") || value.starts_with("https://") {
            Self::Url(value.to_string())
        } else {
            Self::Path(PathBuf::from(value))
        }
    }
}

impl From<String> for FileSource {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<PathBuf> for FileSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

/// A button on a reply keyboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "text", rename_all = "snake_case")]
pub enum KeyboardButton {
    /// Sends its label back as a text message.
    Text(String),
    /// Asks the user to share their phone number.
    RequestContact(String),
    /// Asks the user to share their location.
    RequestLocation(String),
}

impl KeyboardButton {
    pub fn label(&self) -> &str {
        match self {
            Self::Text(text) | Self::RequestContact(text) | Self::RequestLocation(text) => text,
        }
    }
}

impl From<&str> for KeyboardButton {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// What pressing an inline button does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InlineAction {
    /// Delivers the payload back as a callback update.
    Callback(String),
    /// Opens a link.
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineButton {
    pub text: String,
    pub action: InlineAction,
}

impl InlineButton {
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            action: InlineAction::Callback(data.into()),
        }
    }

    pub fn url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            action: InlineAction::Url(url.into()),
        }
    }
}

/// Presentation options for text replies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyOptions {
    pub disable_preview: bool,
    pub markdown: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplyKind {
    Text {
        text: String,
        #[serde(default)]
        options: ReplyOptions,
    },
    Sticker {
        file: FileSource,
    },
    Photo {
        file: FileSource,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
    Audio {
        file: FileSource,
    },
    Document {
        file: FileSource,
    },
    /// Text with a custom reply keyboard.
    Keyboard {
        text: String,
        rows: Vec<Vec<KeyboardButton>>,
        one_time: bool,
    },
    /// Text with buttons attached to the message itself.
    InlineKeyboard {
        text: String,
        rows: Vec<Vec<InlineButton>>,
    },
    Location {
        latitude: f64,
        longitude: f64,
    },
}

/// One outbound message addressed to a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub chat_id: ConversationId,
    #[serde(flatten)]
    pub kind: ReplyKind,
}

impl Reply {
    pub fn new(chat_id: ConversationId, kind: ReplyKind) -> Self {
        Self { chat_id, kind }
    }

    pub fn text(chat_id: ConversationId, text: impl Into<String>) -> Self {
        Self::new(chat_id, ReplyKind::Text {
            text: text.into(),
            options: ReplyOptions::default(),
        })
    }

    /// Short name of the reply kind, for logs.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            ReplyKind::Text { .. } => "text",
            ReplyKind::Sticker { .. } => "sticker",
            ReplyKind::Photo { .. } => "photo",
            ReplyKind::Audio { .. } => "audio",
            ReplyKind::Document { .. } => "document",
            ReplyKind::Keyboard { .. } => "keyboard",
            ReplyKind::InlineKeyboard { .. } => "inline_keyboard",
            ReplyKind::Location { .. } => "location",
        }
    }

    /// The text body, for kinds that have one.
    pub fn text_body(&self) -> Option<&str> {
        match &self.kind {
            ReplyKind::Text { text, .. }
            | ReplyKind::Keyboard { text, .. }
            | ReplyKind::InlineKeyboard { text, .. } => Some(text),
            ReplyKind::Photo { caption, .. } => caption.as_deref(),
            _ => None,
        }
    }
}

/// Build reply-keyboard rows from plain labels.
///
/// ```
/// use chatmux_channels::buttons;
///
/// let rows = buttons([vec!["Cats", "Dogs"], vec!["Back"]]);
/// assert_eq!(rows.len(), 2);
/// assert_eq!(rows[0][1].label(), "Dogs");
/// ```
pub fn buttons<R, S>(rows: impl IntoIterator<Item = R>) -> Vec<Vec<KeyboardButton>>
where
    R: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    rows.into_iter()
        .map(|row| {
            row.into_iter()
                .map(|label| KeyboardButton::Text(label.as_ref().to_string()))
                .collect()
        })
        .collect()
}

/// Build inline-keyboard rows from `(text, callback data)` pairs.
pub fn inline_buttons<R, T, D>(rows: impl IntoIterator<Item = R>) -> Vec<Vec<InlineButton>>
where
    R: IntoIterator<Item = (T, D)>,
    T: Into<String>,
    D: Into<String>,
{
    rows.into_iter()
        .map(|row| {
            row.into_iter()
                .map(|(text, data)| InlineButton::callback(text, data))
                .collect()
        })
        .collect()
}
