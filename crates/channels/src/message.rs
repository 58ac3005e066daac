use std::path::{Path, PathBuf};

use {
    chatmux_common::types::{ChatType, ConversationId, InboundMessage, PayloadKind, Sender},
    tracing::debug,
};

use crate::{
    error::{Error, Result},
    reply::{FileSource, InlineButton, KeyboardButton, Reply, ReplyKind, ReplyOptions},
    stream::ReplySender,
};

/// Variables captured while matching a route, in pattern order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vars(Vec<(String, String)>);

impl Vars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name`, replacing an earlier value but keeping its position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Captured values only, left to right.
    pub fn values(&self) -> Vec<&str> {
        self.0.iter().map(|(_, value)| value.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Vars {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut vars = Self::new();
        for (name, value) in iter {
            vars.insert(name, value);
        }
        vars
    }
}

/// One inbound message as seen by a handler.
///
/// Owned by the dispatch task that resolved it. Replies go out through the
/// attached stream; every `reply_*` helper waits until the forwarder has
/// taken the reply.
#[derive(Debug)]
pub struct Message {
    pub inbound: InboundMessage,
    pub vars: Vars,
    replies: ReplySender,
}

impl Message {
    pub fn new(inbound: InboundMessage, vars: Vars, replies: ReplySender) -> Self {
        Self {
            inbound,
            vars,
            replies,
        }
    }

    /// Text, callback payload, or file link, depending on [`Self::kind`].
    pub fn text(&self) -> &str {
        &self.inbound.data
    }

    pub fn kind(&self) -> PayloadKind {
        self.inbound.kind
    }

    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars.get(name)
    }

    pub fn conversation_id(&self) -> ConversationId {
        self.inbound.conversation_id
    }

    pub fn chat_type(&self) -> ChatType {
        self.inbound.chat_type
    }

    pub fn from(&self) -> &Sender {
        &self.inbound.from
    }

    /// Emit a fully built reply.
    pub async fn send(&self, reply: Reply) -> Result<()> {
        self.replies.send(reply).await
    }

    async fn send_kind(&self, kind: ReplyKind) -> Result<()> {
        self.send(Reply::new(self.conversation_id(), kind)).await
    }

    pub async fn reply(&self, text: impl Into<String>) -> Result<()> {
        self.reply_with(text, ReplyOptions::default()).await
    }

    pub async fn reply_with(&self, text: impl Into<String>, options: ReplyOptions) -> Result<()> {
        self.send_kind(ReplyKind::Text {
            text: text.into(),
            options,
        })
        .await
    }

    pub async fn reply_sticker(&self, file: impl Into<FileSource>) -> Result<()> {
        self.send_kind(ReplyKind::Sticker { file: file.into() })
            .await
    }

    pub async fn reply_photo(
        &self,
        file: impl Into<FileSource>,
        caption: Option<&str>,
    ) -> Result<()> {
        self.send_kind(ReplyKind::Photo {
            file: file.into(),
            caption: caption.map(str::to_string),
        })
        .await
    }

    pub async fn reply_audio(&self, file: impl Into<FileSource>) -> Result<()> {
        self.send_kind(ReplyKind::Audio { file: file.into() }).await
    }

    pub async fn reply_document(&self, file: impl Into<FileSource>) -> Result<()> {
        self.send_kind(ReplyKind::Document { file: file.into() })
            .await
    }

    /// Text with a reply keyboard; see [`crate::buttons`].
    pub async fn reply_keyboard(
        &self,
        text: impl Into<String>,
        rows: Vec<Vec<KeyboardButton>>,
        one_time: bool,
    ) -> Result<()> {
        self.send_kind(ReplyKind::Keyboard {
            text: text.into(),
            rows,
            one_time,
        })
        .await
    }

    pub async fn reply_inline_keyboard(
        &self,
        text: impl Into<String>,
        rows: Vec<Vec<InlineButton>>,
    ) -> Result<()> {
        self.send_kind(ReplyKind::InlineKeyboard {
            text: text.into(),
            rows,
        })
        .await
    }

    pub async fn reply_location(&self, latitude: f64, longitude: f64) -> Result<()> {
        self.send_kind(ReplyKind::Location {
            latitude,
            longitude,
        })
        .await
    }

    /// Fetch the attached document into `dir` and return the written path.
    ///
    /// The directory is created if needed; the file is named after the last
    /// segment of the download link.
    pub async fn download(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        if self.kind() != PayloadKind::Document {
            return Err(Error::NothingToDownload);
        }
        let url = self.var("url").unwrap_or_else(|| self.text());
        let name = file_name_from_url(url)
            .ok_or_else(|| Error::invalid_input(format!("no file name in link: {url}")))?;

        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;

        let bytes = reqwest::get(url)
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::external("download failed", e))?
            .bytes()
            .await
            .map_err(|e| Error::external("download failed", e))?;

        let path = dir.join(name);
        tokio::fs::write(&path, &bytes).await?;
        debug!(
            conversation_id = %self.conversation_id(),
            path = %path.display(),
            bytes = bytes.len(),
            "document downloaded"
        );
        Ok(path)
    }
}

/// Last non-empty path segment of `url`, ignoring query and fragment.
fn file_name_from_url(url: &str) -> Option<&str> {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    let path = &url[..end];
    let path = path.split_once("://").map_or(path, |(_, rest)| rest);
    // Skip the host so a bare domain has no file name.
    let (_, path) = path.split_once('/')?;
    path.rsplit('/').find(|segment| !segment.is_empty())
}
