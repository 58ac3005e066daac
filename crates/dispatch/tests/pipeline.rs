#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use {
    async_trait::async_trait,
    chatmux_channels::{ChannelOutbound, Error as ChannelError, Principal, Reply},
    chatmux_common::types::{ConversationId, InboundMessage, PayloadKind, Update},
    chatmux_dispatch::{
        DispatchOutcome, DropReason, Server, ServerOptions, middleware_fn, new_auth,
    },
    chatmux_routing::{FlatMux, ROUTE_BACK, RouterMux, handler_fn},
    chatmux_sessions::{InMemoryStorage, SessionStorage},
    tokio::sync::{mpsc, oneshot},
    tokio_util::sync::CancellationToken,
};

/// Records every reply; fails sends whose text is "fail".
#[derive(Default)]
struct Recorder {
    sent: Mutex<Vec<Reply>>,
}

impl Recorder {
    fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.text_body().unwrap_or_default().to_string())
            .collect()
    }

    fn texts_for(&self, chat: i64) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.chat_id == ConversationId(chat))
            .map(|r| r.text_body().unwrap_or_default().to_string())
            .collect()
    }
}

#[async_trait]
impl ChannelOutbound for Recorder {
    async fn send(&self, reply: &Reply) -> anyhow::Result<()> {
        if reply.text_body() == Some("fail") {
            anyhow::bail!("network unreachable");
        }
        self.sent.lock().unwrap().push(reply.clone());
        Ok(())
    }
}

fn no_help() -> ServerOptions {
    ServerOptions {
        help: false,
        ..Default::default()
    }
}

fn text(chat: i64, body: &str) -> Update {
    Update::new(0, InboundMessage::text(chat, body))
}

#[tokio::test]
async fn replies_arrive_in_emission_order() {
    let mut server = Server::new(FlatMux::new(), no_help()).unwrap();
    server
        .handle_func(
            "/count {n}",
            handler_fn(|msg| async move {
                let n: usize = msg.var("n").unwrap_or("0").parse()?;
                for i in 1..=n {
                    msg.reply(i.to_string()).await?;
                    if i % 2 == 0 {
                        tokio::time::sleep(Duration::from_millis(5)).await;
                    }
                }
                Ok(())
            }),
            None,
        )
        .unwrap();

    let recorder = Arc::new(Recorder::default());
    let dispatcher = server.into_dispatcher(recorder.clone());
    let report = dispatcher.dispatch(text(1, "/count 6")).await;

    assert_eq!(report.outcome, DispatchOutcome::Completed);
    assert_eq!(report.handler.as_deref(), Some("/count {n}"));
    assert_eq!(report.replies_forwarded, 6);
    assert_eq!(recorder.texts(), ["1", "2", "3", "4", "5", "6"]);
}

#[tokio::test]
async fn handler_error_is_isolated() {
    let mut server = Server::new(FlatMux::new(), no_help()).unwrap();
    server
        .handle_func(
            "/broken",
            handler_fn(|msg| async move {
                msg.reply("before").await?;
                anyhow::bail!("database down")
            }),
            None,
        )
        .unwrap();

    let recorder = Arc::new(Recorder::default());
    let dispatcher = server.into_dispatcher(recorder.clone());
    let report = dispatcher.dispatch(text(1, "/broken")).await;

    assert!(matches!(report.outcome, DispatchOutcome::HandlerError(ref e) if e.contains("database down")));
    assert_eq!(report.replies_forwarded, 1);
    assert_eq!(recorder.texts(), ["before"]);
}

#[tokio::test]
async fn handler_panic_is_isolated() {
    let mut server = Server::new(FlatMux::new(), no_help()).unwrap();
    server
        .handle_func(
            "/panic",
            handler_fn(|msg| async move {
                msg.reply("last words").await?;
                panic!("handler exploded");
            }),
            None,
        )
        .unwrap();
    server.handle("/ok", "still alive", None).unwrap();

    let recorder = Arc::new(Recorder::default());
    let dispatcher = server.into_dispatcher(recorder.clone());

    let report = dispatcher.dispatch(text(1, "/panic")).await;
    assert_eq!(
        report.outcome,
        DispatchOutcome::HandlerPanicked("handler exploded".into())
    );
    assert_eq!(report.replies_forwarded, 1);

    let report = dispatcher.dispatch(text(1, "/ok")).await;
    assert!(report.is_completed());
    assert_eq!(recorder.texts(), ["last words", "still alive"]);
}

#[tokio::test]
async fn send_failures_are_counted_not_fatal() {
    let mut server = Server::new(FlatMux::new(), no_help()).unwrap();
    server
        .handle_func(
            "/mixed",
            handler_fn(|msg| async move {
                msg.reply("one").await?;
                msg.reply("fail").await?;
                msg.reply("three").await?;
                Ok(())
            }),
            None,
        )
        .unwrap();

    let recorder = Arc::new(Recorder::default());
    let dispatcher = server.into_dispatcher(recorder.clone());
    let report = dispatcher.dispatch(text(1, "/mixed")).await;

    assert!(report.is_completed());
    assert_eq!(report.replies_forwarded, 2);
    assert_eq!(report.send_failures, 1);
    assert_eq!(recorder.texts(), ["one", "three"]);
}

#[tokio::test]
async fn updates_without_message_or_handler_are_dropped() {
    let server = Server::new(FlatMux::new(), no_help()).unwrap();
    let recorder = Arc::new(Recorder::default());
    let dispatcher = server.into_dispatcher(recorder.clone());

    let report = dispatcher.dispatch(Update::empty(9)).await;
    assert_eq!(report.outcome, DispatchOutcome::Dropped(DropReason::NoMessage));
    assert_eq!(report.conversation_id, None);

    let report = dispatcher.dispatch(text(3, "hello?")).await;
    assert_eq!(report.outcome, DispatchOutcome::Dropped(DropReason::NoHandler));
    assert_eq!(report.conversation_id, Some(ConversationId(3)));
    assert!(recorder.texts().is_empty());
}

#[tokio::test]
async fn documents_go_to_file_handler() {
    let mut server = Server::new(FlatMux::new(), no_help()).unwrap();
    server.handle("{anything}", "text handler", None).unwrap();
    server.handle_file(
        handler_fn(|msg| async move {
            let url = msg.var("url").unwrap_or_default().to_string();
            msg.reply(format!("got {url}")).await?;
            Ok(())
        }),
        None,
    );

    let recorder = Arc::new(Recorder::default());
    let dispatcher = server.into_dispatcher(recorder.clone());
    let inbound = InboundMessage {
        kind: PayloadKind::Document,
        ..InboundMessage::text(1, "https://files.example/doc.pdf")
    };
    let report = dispatcher.dispatch(Update::new(1, inbound)).await;

    assert_eq!(report.handler.as_deref(), Some("file"));
    assert_eq!(recorder.texts(), ["got https://files.example/doc.pdf"]);
}

#[tokio::test]
async fn documents_without_file_handler_skip_default() {
    let mut server = Server::new(FlatMux::new(), no_help()).unwrap();
    server.handle_default(
        handler_fn(|msg| async move {
            msg.reply("default").await?;
            Ok(())
        }),
        None,
    );

    let recorder = Arc::new(Recorder::default());
    let dispatcher = server.into_dispatcher(recorder.clone());
    let inbound = InboundMessage {
        kind: PayloadKind::Document,
        ..InboundMessage::text(1, "https://files.example/doc.pdf")
    };
    let report = dispatcher.dispatch(Update::new(1, inbound)).await;

    assert_eq!(report.outcome, DispatchOutcome::Dropped(DropReason::NoHandler));
    assert!(recorder.texts().is_empty());
}

#[tokio::test]
async fn menu_navigation_through_dispatcher() {
    let storage = Arc::new(InMemoryStorage::new());
    let mut server = Server::new(RouterMux::new(storage.clone()), no_help()).unwrap();
    server.handle("/", "main menu", None).unwrap();
    server.handle("/pets", "pets menu", None).unwrap();
    server.handle("/pets/cat", "meow", None).unwrap();
    server.handle_default(
        handler_fn(|msg| async move {
            msg.reply("unknown").await?;
            Ok(())
        }),
        None,
    );
    server.set_alias(ROUTE_BACK, &["Back"]);
    server.set_alias("/pets", &["Pets"]);

    let recorder = Arc::new(Recorder::default());
    let dispatcher = server.into_dispatcher(recorder.clone());
    for input in ["Pets", "/cat", "/dog", "Back", "Back"] {
        dispatcher.dispatch(text(4, input)).await;
    }

    assert_eq!(recorder.texts(), [
        "pets menu",
        "meow",
        "unknown",
        "pets menu",
        "main menu"
    ]);
    assert_eq!(
        storage.get(ConversationId(4)).await.unwrap().as_deref(),
        Some("/")
    );

    dispatcher.dispatch(text(4, "Pets")).await;
    dispatcher.reset(ConversationId(4)).await.unwrap();
    assert!(storage.get(ConversationId(4)).await.unwrap().is_none());
}

#[tokio::test]
async fn leaked_message_cannot_send_after_return() {
    let (result_tx, result_rx) = oneshot::channel();
    let result_tx = Arc::new(Mutex::new(Some(result_tx)));

    let mut server = Server::new(FlatMux::new(), no_help()).unwrap();
    server
        .handle_func(
            "/leak",
            handler_fn(move |msg| {
                let result_tx = Arc::clone(&result_tx);
                async move {
                    msg.reply("in time").await?;
                    tokio::spawn(async move {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        let outcome = msg.reply("too late").await;
                        if let Some(tx) = result_tx.lock().unwrap().take() {
                            let _ = tx.send(outcome);
                        }
                    });
                    Ok(())
                }
            }),
            None,
        )
        .unwrap();

    let recorder = Arc::new(Recorder::default());
    let dispatcher = server.into_dispatcher(recorder.clone());
    let report = tokio::time::timeout(Duration::from_secs(1), dispatcher.dispatch(text(1, "/leak")))
        .await
        .unwrap();
    assert_eq!(report.replies_forwarded, 1);

    let late = result_rx.await.unwrap();
    assert!(matches!(late, Err(ChannelError::ReplyChannelClosed)));
    assert_eq!(recorder.texts(), ["in time"]);
}

#[tokio::test]
async fn middleware_runs_first_registered_first() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let mut server = Server::new(FlatMux::new(), no_help()).unwrap();
    for name in ["outer", "inner"] {
        let order = Arc::clone(&order);
        server.add_middleware(middleware_fn(move |msg, next| {
            order.lock().unwrap().push(name);
            next(msg)
        }));
    }
    server.handle("/x", "done", None).unwrap();

    let dispatcher = server.into_dispatcher(Arc::new(Recorder::default()));
    dispatcher.dispatch(text(1, "/x")).await;
    assert_eq!(*order.lock().unwrap(), ["outer", "inner"]);
}

#[tokio::test]
async fn auth_middleware_blocks_strangers() {
    let mut server = Server::new(FlatMux::new(), no_help()).unwrap();
    server.add_middleware(new_auth(vec![Principal::Username("ada".into())]));
    server.handle("/secret", "42", None).unwrap();

    let recorder = Arc::new(Recorder::default());
    let dispatcher = server.into_dispatcher(recorder.clone());

    let mut stranger = InboundMessage::text(1, "/secret");
    stranger.from.username = Some("eve".into());
    dispatcher.dispatch(Update::new(1, stranger)).await;

    let mut friend = InboundMessage::text(2, "/secret");
    friend.from.username = Some("ada".into());
    dispatcher.dispatch(Update::new(2, friend)).await;

    assert_eq!(recorder.texts_for(1), ["Access denied for user eve"]);
    assert_eq!(recorder.texts_for(2), ["42"]);
}

#[tokio::test]
async fn slow_conversation_does_not_block_others() {
    let mut server = Server::new(FlatMux::new(), no_help()).unwrap();
    server
        .handle_func(
            "/slow",
            handler_fn(|msg| async move {
                tokio::time::sleep(Duration::from_millis(300)).await;
                msg.reply("slow done").await?;
                Ok(())
            }),
            None,
        )
        .unwrap();
    server.handle("/fast", "fast done", None).unwrap();

    let recorder = Arc::new(Recorder::default());
    let dispatcher = server.into_dispatcher(recorder.clone());
    let (tx, rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let serving = tokio::spawn(dispatcher.serve(rx, cancel.clone()));

    tx.send(text(1, "/slow")).await.unwrap();
    tx.send(text(2, "/fast")).await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(recorder.texts(), ["fast done"]);

    // Closing the channel waits for the in-flight slow update.
    drop(tx);
    tokio::time::timeout(Duration::from_secs(2), serving)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(recorder.texts(), ["fast done", "slow done"]);
    assert!(!cancel.is_cancelled());
}

#[tokio::test]
async fn cancel_aborts_stuck_handler() {
    let mut server = Server::new(FlatMux::new(), no_help()).unwrap();
    server
        .handle_func(
            "/stuck",
            handler_fn(|msg| async move {
                msg.reply("working on it").await?;
                std::future::pending::<()>().await;
                Ok(())
            }),
            None,
        )
        .unwrap();

    let recorder = Arc::new(Recorder::default());
    let (tx, rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let serving = tokio::spawn(server.serve(recorder.clone(), rx, cancel.clone()));

    tx.send(text(1, "/stuck")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(recorder.texts(), ["working on it"]);

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(2), serving)
        .await
        .expect("serve returns after cancel")
        .unwrap();
    drop(tx);
}

#[tokio::test]
async fn cancel_interrupts_drain_after_channel_closed() {
    let mut server = Server::new(FlatMux::new(), no_help()).unwrap();
    server
        .handle_func(
            "/stuck",
            handler_fn(|_msg| async move {
                std::future::pending::<()>().await;
                Ok(())
            }),
            None,
        )
        .unwrap();

    let (tx, rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let serving = tokio::spawn(server.serve(Arc::new(Recorder::default()), rx, cancel.clone()));

    tx.send(text(1, "/stuck")).await.unwrap();
    drop(tx);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!serving.is_finished());

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(2), serving)
        .await
        .expect("serve returns after cancel")
        .unwrap();
}
