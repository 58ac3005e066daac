//! Conversation-facing message types and the reply stream.
//!
//! A [`Message`] is what a route handler receives: the inbound update, the
//! variables the router captured, and the sending half of a rendezvous
//! [`reply_channel`]. Replies flow through the channel to whatever
//! [`ChannelOutbound`] the transport provides.

pub mod error;
pub mod gating;
pub mod message;
pub mod outbound;
pub mod reply;
pub mod stream;

pub use {
    error::{Error, Result},
    gating::Principal,
    message::{Message, Vars},
    outbound::ChannelOutbound,
    reply::{
        FileSource, InlineAction, InlineButton, KeyboardButton, Reply, ReplyKind, ReplyOptions,
        buttons, inline_buttons,
    },
    stream::{ReplyReceiver, ReplySender, reply_channel},
};
