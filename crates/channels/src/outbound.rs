use std::sync::Arc;

use {anyhow::Result, async_trait::async_trait, chatmux_common::types::ConversationId};

use crate::reply::Reply;

/// Delivers replies to a messaging platform. Each transport implements this.
#[async_trait]
pub trait ChannelOutbound: Send + Sync {
    /// Send one reply. The caller logs failures; retrying is up to the
    /// implementation.
    async fn send(&self, reply: &Reply) -> Result<()>;

    /// Send a "typing" indicator. No-op by default.
    async fn send_typing(&self, _chat_id: ConversationId) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<T: ChannelOutbound + ?Sized> ChannelOutbound for Arc<T> {
    async fn send(&self, reply: &Reply) -> Result<()> {
        (**self).send(reply).await
    }

    async fn send_typing(&self, chat_id: ConversationId) -> Result<()> {
        (**self).send_typing(chat_id).await
    }
}
