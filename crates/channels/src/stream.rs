//! Rendezvous reply stream between one handler invocation and its forwarder.
//!
//! [`ReplySender::send`] resolves only after the forwarder has taken the
//! reply, so a handler can never run ahead of delivery and replies stay in
//! emission order. The dispatch pipeline owns the [`ReplyReceiver`] and closes
//! it once the handler has returned; later sends fail with
//! [`Error::ReplyChannelClosed`].

use tokio::sync::{mpsc, oneshot};

use crate::{
    error::{Error, Result},
    reply::Reply,
};

struct Envelope {
    reply: Reply,
    taken: oneshot::Sender<()>,
}

/// Producer half, owned by the [`Message`](crate::Message) given to a handler.
#[derive(Debug)]
pub struct ReplySender {
    tx: mpsc::Sender<Envelope>,
}

/// Consumer half, drained by the dispatch pipeline's forwarder.
pub struct ReplyReceiver {
    rx: mpsc::Receiver<Envelope>,
    closed: bool,
}

/// Create a rendezvous reply stream.
pub fn reply_channel() -> (ReplySender, ReplyReceiver) {
    // One slot plus the ack makes every send a hand-off.
    let (tx, rx) = mpsc::channel(1);
    (ReplySender { tx }, ReplyReceiver { rx, closed: false })
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope")
            .field("reply", &self.reply)
            .finish_non_exhaustive()
    }
}

impl ReplySender {
    /// Hand `reply` to the forwarder, waiting until it has been taken.
    pub async fn send(&self, reply: Reply) -> Result<()> {
        let (taken, ack) = oneshot::channel();
        self.tx
            .send(Envelope { reply, taken })
            .await
            .map_err(|_| Error::ReplyChannelClosed)?;
        ack.await.map_err(|_| Error::ReplyChannelClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl ReplyReceiver {
    /// Next reply, or `None` once the stream is closed and drained or every
    /// sender is gone.
    pub async fn recv(&mut self) -> Option<Reply> {
        let Envelope { reply, taken } = self.rx.recv().await?;
        // The sender may have given up waiting; that does not un-take the reply.
        let _ = taken.send(());
        Some(reply)
    }

    /// Refuse further sends. Replies already handed over can still be
    /// drained with [`recv`](Self::recv). Returns `false` if the stream was
    /// already closed.
    pub fn close(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;
        self.rx.close();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
