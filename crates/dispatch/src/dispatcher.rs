//! The per-update pipeline.
//!
//! Each update is resolved to a handler, the handler is wrapped in the
//! middleware chain and run, and its replies are forwarded to the transport by
//! a companion task. The reply stream is closed only after the handler has
//! returned, whether it finished, failed or panicked.

use std::{any::Any, panic::AssertUnwindSafe, sync::Arc};

use {
    chatmux_channels::{ChannelOutbound, Message, Reply, ReplyReceiver, Vars, reply_channel},
    chatmux_common::types::{ConversationId, PayloadKind, Update},
    chatmux_routing::{Mux, Resolution},
    futures::FutureExt,
    tokio::{
        sync::{mpsc, oneshot},
        task::JoinSet,
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use crate::{
    Result,
    middleware::{Middleware, compose},
    report::{DispatchOutcome, DispatchReport, DropReason},
};

/// Runs updates through a fully registered mux.
pub struct Dispatcher {
    mux: Box<dyn Mux>,
    middlewares: Vec<Middleware>,
    outbound: Arc<dyn ChannelOutbound>,
    bot_names: Vec<String>,
}

#[derive(Debug, Default, Clone, Copy)]
struct ForwardStats {
    forwarded: usize,
    failures: usize,
}

impl Dispatcher {
    pub(crate) fn new(
        mux: Box<dyn Mux>,
        middlewares: Vec<Middleware>,
        outbound: Arc<dyn ChannelOutbound>,
        bot_names: Vec<String>,
    ) -> Self {
        Self {
            mux,
            middlewares,
            outbound,
            bot_names,
        }
    }

    pub fn mux(&self) -> &dyn Mux {
        self.mux.as_ref()
    }

    /// Clear navigation state for `conversation_id`.
    pub async fn reset(&self, conversation_id: ConversationId) -> Result<()> {
        self.mux.reset(conversation_id).await?;
        Ok(())
    }

    /// Process one update to completion.
    ///
    /// Never fails: unmatched input, handler errors and panics, and transport
    /// errors all end up in the returned report.
    pub async fn dispatch(&self, update: Update) -> DispatchReport {
        let update_id = update.id;
        let Some(mut inbound) = update.message else {
            debug!(update_id, "update without message dropped");
            return DispatchReport::dropped(update_id, None, DropReason::NoMessage);
        };
        let conversation_id = inbound.conversation_id;

        let resolution = if inbound.kind == PayloadKind::Document {
            self.mux.file_handler().map(|handler| {
                let vars: Vars = [("url", inbound.data.as_str())].into_iter().collect();
                Resolution::new(handler.clone(), vars)
            })
        } else {
            inbound.data = trim_bot_name(&inbound.data, &self.bot_names);
            match self.mux.resolve(conversation_id, &inbound.data).await {
                Ok(resolution) => resolution,
                Err(e) => {
                    error!(update_id, %conversation_id, error = %e, "route resolution failed");
                    return DispatchReport::dropped(
                        update_id,
                        Some(conversation_id),
                        DropReason::ResolveFailed(e.to_string()),
                    );
                },
            }
        };

        let Some(Resolution { handler, vars }) = resolution else {
            debug!(update_id, %conversation_id, "no handler, update dropped");
            return DispatchReport::dropped(
                update_id,
                Some(conversation_id),
                DropReason::NoHandler,
            );
        };

        let route = handler.path().to_string();
        let callback = compose(handler.callback(), &self.middlewares);
        let (replies, receiver) = reply_channel();
        let (done_tx, done_rx) = oneshot::channel();

        let forwarder = tokio::spawn(forward_replies(
            receiver,
            done_rx,
            Arc::clone(&self.outbound),
            conversation_id,
        ));

        let message = Message::new(inbound, vars, replies);
        let outcome = match AssertUnwindSafe(callback(message)).catch_unwind().await {
            Ok(Ok(())) => DispatchOutcome::Completed,
            Ok(Err(e)) => {
                error!(update_id, %conversation_id, route = %route, error = %e, "handler failed");
                DispatchOutcome::HandlerError(format!("{e:#}"))
            },
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!(update_id, %conversation_id, route = %route, panic = %reason, "handler panicked");
                DispatchOutcome::HandlerPanicked(reason)
            },
        };

        // The handler has returned: let the forwarder close the stream.
        let _ = done_tx.send(());
        let stats = match forwarder.await {
            Ok(stats) => stats,
            Err(e) => {
                error!(update_id, %conversation_id, error = %e, "reply forwarder failed");
                ForwardStats::default()
            },
        };

        let report = DispatchReport {
            update_id,
            conversation_id: Some(conversation_id),
            handler: Some(route),
            replies_forwarded: stats.forwarded,
            send_failures: stats.failures,
            outcome,
        };
        debug!(
            update_id,
            %conversation_id,
            handler = report.handler.as_deref().unwrap_or_default(),
            replies = report.replies_forwarded,
            send_failures = report.send_failures,
            outcome = ?report.outcome,
            "update dispatched"
        );
        report
    }

    /// Dispatch every update from `updates` concurrently.
    ///
    /// When the channel closes, in-flight dispatches are awaited. When
    /// `cancel` fires, before or during that wait, they are aborted.
    pub async fn serve(
        self: Arc<Self>,
        mut updates: mpsc::Receiver<Update>,
        cancel: CancellationToken,
    ) {
        let mut in_flight = JoinSet::new();
        info!("dispatcher started");

        let cancelled = loop {
            tokio::select! {
                () = cancel.cancelled() => break true,
                update = updates.recv() => {
                    let Some(update) = update else {
                        info!("update channel closed");
                        break false;
                    };
                    let dispatcher = Arc::clone(&self);
                    in_flight.spawn(async move { dispatcher.dispatch(update).await });
                },
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    log_join(joined);
                },
            }
        };

        let pending = in_flight.len();
        if !cancelled && pending > 0 {
            info!(pending, "waiting for in-flight updates");
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    joined = in_flight.join_next() => match joined {
                        Some(joined) => log_join(joined),
                        None => break,
                    },
                }
            }
        }
        if !in_flight.is_empty() {
            warn!(pending = in_flight.len(), "dispatcher cancelled, aborting in-flight updates");
            in_flight.shutdown().await;
        }
        info!("dispatcher stopped");
    }
}

fn log_join(joined: std::result::Result<DispatchReport, tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "dispatch task failed");
    }
}

/// Drain `replies` into `outbound` until the handler is done, then close the
/// stream and flush whatever was already handed over.
async fn forward_replies(
    mut replies: ReplyReceiver,
    done: oneshot::Receiver<()>,
    outbound: Arc<dyn ChannelOutbound>,
    conversation_id: ConversationId,
) -> ForwardStats {
    let mut stats = ForwardStats::default();
    tokio::pin!(done);

    loop {
        tokio::select! {
            biased;
            reply = replies.recv() => match reply {
                Some(reply) => deliver(&reply, outbound.as_ref(), conversation_id, &mut stats).await,
                None => break,
            },
            _ = &mut done => break,
        }
    }

    replies.close();
    while let Some(reply) = replies.recv().await {
        deliver(&reply, outbound.as_ref(), conversation_id, &mut stats).await;
    }
    stats
}

async fn deliver(
    reply: &Reply,
    outbound: &dyn ChannelOutbound,
    conversation_id: ConversationId,
    stats: &mut ForwardStats,
) {
    match outbound.send(reply).await {
        Ok(()) => stats.forwarded += 1,
        Err(e) => {
            stats.failures += 1;
            warn!(
                %conversation_id,
                kind = reply.kind_name(),
                error = %e,
                "error dispatching reply"
            );
        },
    }
}

/// Strip a trailing `@botname` from the first word, so `/help@my_bot` routes
/// like `/help`.
pub fn trim_bot_name(text: &str, bot_names: &[String]) -> String {
    let (first, rest) = match text.split_once(' ') {
        Some((first, rest)) => (first, Some(rest)),
        None => (text, None),
    };
    let trimmed = first
        .rsplit_once('@')
        .filter(|(_, suffix)| bot_names.iter().any(|name| name.eq_ignore_ascii_case(suffix)))
        .map_or(first, |(command, _)| command);
    match rest {
        Some(rest) => format!("{trimmed} {rest}"),
        None => trimmed.to_string(),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
