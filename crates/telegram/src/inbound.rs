//! Bot API updates into neutral [`InboundMessage`]s.

use {
    chatmux_common::types::{
        ChatType, Contact, ConversationId, InboundMessage, Location, PayloadKind, Sender,
    },
    teloxide::{
        Bot,
        requests::Requester,
        types::{
            CallbackQuery, Chat, ChatKind, MediaKind, Message, MessageKind, PublicChatKind,
            UpdateKind, User, UserId,
        },
    },
    tracing::{debug, warn},
};

use crate::{Error, Result};

const FILE_BASE_URL: &str = "https://api.telegram.org/file";

/// Convert one update body. `Ok(None)` means the update carries nothing the
/// router understands.
pub async fn from_update_kind(bot: &Bot, kind: UpdateKind) -> Result<Option<InboundMessage>> {
    match kind {
        UpdateKind::Message(msg) => from_message(bot, &msg).await,
        UpdateKind::CallbackQuery(query) => from_callback(bot, &query).await,
        other => {
            debug!("ignoring non-message update: {other:?}");
            Ok(None)
        },
    }
}

/// Text, document, contact and location messages. Documents are resolved
/// to a direct download link with `getFile`.
pub async fn from_message(bot: &Bot, msg: &Message) -> Result<Option<InboundMessage>> {
    let MessageKind::Common(common) = &msg.kind else {
        return Ok(None);
    };

    let mut inbound = InboundMessage {
        conversation_id: ConversationId(msg.chat.id.0),
        chat_type: classify_chat(&msg.chat),
        from: msg.from.as_ref().map(sender_from_user).unwrap_or_default(),
        ..Default::default()
    };

    match &common.media_kind {
        MediaKind::Text(t) => inbound.data = t.text.clone(),
        MediaKind::Document(d) => {
            inbound.kind = PayloadKind::Document;
            inbound.data = file_link(bot, &d.document.file.id).await?;
            inbound.caption = d.caption.clone();
        },
        MediaKind::Contact(c) => {
            inbound.kind = PayloadKind::Contact;
            inbound.data = c.contact.phone_number.clone();
            inbound.contact = Some(Contact {
                phone_number: c.contact.phone_number.clone(),
                first_name: c.contact.first_name.clone(),
                last_name: c.contact.last_name.clone(),
                user_id: c.contact.user_id.map(user_id),
            });
        },
        MediaKind::Location(loc) => {
            let location = Location {
                latitude: loc.location.latitude,
                longitude: loc.location.longitude,
            };
            inbound.kind = PayloadKind::Location;
            inbound.data = location_data(&location);
            inbound.location = Some(location);
        },
        _ => {
            debug!(chat_id = msg.chat.id.0, "ignoring unsupported media kind");
            return Ok(None);
        },
    }

    Ok(Some(inbound))
}

/// Inline button presses. The query is answered right away so the client
/// stops showing a spinner, whether or not a route matches.
pub async fn from_callback(bot: &Bot, query: &CallbackQuery) -> Result<Option<InboundMessage>> {
    if let Err(e) = bot.answer_callback_query(&query.id).await {
        warn!(error = %e, "failed to answer callback query");
    }

    let Some(data) = query.data.clone() else {
        return Ok(None);
    };
    let Some(chat) = query.message.as_ref().map(|m| m.chat()) else {
        debug!("callback query without a message, ignoring");
        return Ok(None);
    };

    Ok(Some(InboundMessage {
        conversation_id: ConversationId(chat.id.0),
        chat_type: classify_chat(chat),
        kind: PayloadKind::Callback,
        data,
        from: sender_from_user(&query.from),
        ..Default::default()
    }))
}

/// Resolve a file id to a link that can be fetched without the Bot API.
pub async fn file_link(bot: &Bot, file_id: &str) -> Result<String> {
    let file = bot.get_file(file_id).await?;
    if file.path.is_empty() {
        return Err(Error::MissingFilePath {
            file_id: file_id.to_string(),
        });
    }
    Ok(file_url(bot.token(), &file.path))
}

/// `https://api.telegram.org/file/bot<token>/<path>`
pub fn file_url(token: &str, file_path: &str) -> String {
    format!("{FILE_BASE_URL}/bot{token}/{file_path}")
}

pub fn classify_chat(chat: &Chat) -> ChatType {
    match &chat.kind {
        ChatKind::Private(_) => ChatType::Private,
        ChatKind::Public(p) => match p.kind {
            PublicChatKind::Channel(_) => ChatType::Channel,
            _ => ChatType::Group,
        },
    }
}

fn sender_from_user(user: &User) -> Sender {
    Sender {
        id: user_id(user.id),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        username: user.username.clone(),
        language_code: user.language_code.clone(),
    }
}

// Telegram user ids fit in 52 bits.
fn user_id(id: UserId) -> i64 {
    id.0 as i64
}

fn location_data(location: &Location) -> String {
    format!("{},{}", location.latitude, location.longitude)
}
