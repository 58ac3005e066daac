//! Wiring from configuration to a running bot.

use std::{path::Path, sync::Arc};

use {
    anyhow::Context,
    chatmux_channels::Principal,
    chatmux_config::{ChatmuxConfig, RouterMode, SessionBackend, Severity, UnhandledNode, validate},
    chatmux_dispatch::{Server, ServerOptions, format_help, new_auth},
    chatmux_routing::{FlatMux, RouterMux, UnhandledNodePolicy},
    chatmux_sessions::{InMemoryStorage, SessionStorage, SqliteStorage},
    chatmux_telegram::{TelegramBot, TelegramConfig},
    secrecy::ExposeSecret,
    tokio::sync::mpsc,
    tokio_util::sync::CancellationToken,
    tracing::{error, info, warn},
};

use crate::demo;

/// Load `path` if given, otherwise discover a config file, then apply
/// environment overrides.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<ChatmuxConfig> {
    let mut config = match path {
        Some(path) => chatmux_config::load_config(path)?,
        None => chatmux_config::discover_and_load(),
    };
    chatmux_config::apply_env_overrides(&mut config);
    Ok(config)
}

/// Build the demo server the way `config` describes it.
pub async fn build_server(config: &ChatmuxConfig) -> anyhow::Result<Server> {
    let options = ServerOptions {
        help: config.router.help,
        bot_names: config.bot.usernames.clone(),
    };

    let mut server = match config.router.mode {
        RouterMode::Flat => Server::new(FlatMux::new(), options)?,
        RouterMode::Router => {
            let storage = open_storage(config).await?;
            let mux =
                RouterMux::new(storage).with_policy(unhandled_policy(config.router.unhandled_node));
            Server::new(mux, options)?
        },
    };

    demo::register(&mut server)?;

    if config.auth.is_enabled() {
        let allow = parse_allowlist(&config.auth.allow)?;
        info!(entries = allow.len(), "auth middleware enabled");
        server.add_middleware(new_auth(allow));
    }

    Ok(server)
}

async fn open_storage(config: &ChatmuxConfig) -> anyhow::Result<Arc<dyn SessionStorage>> {
    let storage: Arc<dyn SessionStorage> = match config.sessions.backend {
        SessionBackend::Memory => Arc::new(InMemoryStorage::new()),
        SessionBackend::Sqlite => {
            let url = &config.sessions.sqlite_url;
            let storage = SqliteStorage::connect(url)
                .await
                .with_context(|| format!("failed to open session database {url}"))?;
            Arc::new(storage)
        },
    };
    Ok(storage)
}

fn unhandled_policy(setting: UnhandledNode) -> UnhandledNodePolicy {
    match setting {
        UnhandledNode::Fallback => UnhandledNodePolicy::Fallback,
        UnhandledNode::Noop => UnhandledNodePolicy::Noop,
    }
}

fn parse_allowlist(entries: &[String]) -> anyhow::Result<Vec<Principal>> {
    entries
        .iter()
        .map(|entry| {
            entry
                .parse::<Principal>()
                .with_context(|| format!("invalid auth.allow entry {entry:?}"))
        })
        .collect()
}

/// `chatmux routes`: print what `/help` would answer.
pub async fn print_routes(config: &ChatmuxConfig) -> anyhow::Result<()> {
    // Listing routes never needs persisted state.
    let mut config = config.clone();
    config.sessions.backend = SessionBackend::Memory;

    let server = build_server(&config).await?;
    println!("{}", format_help(&server.mux().routes()));
    Ok(())
}

/// `chatmux run`: poll Telegram and serve until Ctrl-C.
///
/// The first Ctrl-C stops polling; updates already received are still
/// dispatched. A second Ctrl-C abandons them.
pub async fn run(config: ChatmuxConfig) -> anyhow::Result<()> {
    let validation = validate(&config);
    for d in &validation.diagnostics {
        match d.severity {
            Severity::Error => error!(path = d.path, "{}", d.message),
            Severity::Warning => warn!(path = d.path, "{}", d.message),
        }
    }
    if validation.has_errors() {
        anyhow::bail!("invalid configuration; run `chatmux check` for details");
    }

    let token = config
        .bot
        .token
        .as_ref()
        .filter(|_| config.bot.has_token())
        .context("no bot token; set bot.token or CHATMUX_TOKEN")?;
    let telegram = TelegramConfig {
        poll_timeout_secs: config.telegram.poll_timeout_secs,
        request_timeout_secs: config.telegram.request_timeout_secs,
        ..TelegramConfig::new(token.expose_secret().as_str())
    };

    let mut server = build_server(&config).await?;
    let bot = TelegramBot::connect(&telegram).await?;
    if let Some(name) = bot.username() {
        server.add_bot_name(name);
    }

    let (tx, rx) = mpsc::channel(config.telegram.update_buffer);
    let polling = bot.start_polling(tx);
    let shutdown = CancellationToken::new();
    let dispatcher = server.into_dispatcher(Arc::new(bot.outbound()));
    let mut serve = tokio::spawn(dispatcher.serve(rx, shutdown.clone()));

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("shutting down, waiting for in-flight updates");
            polling.cancel();
        },
        () = polling.cancelled() => warn!("telegram polling ended"),
    }

    tokio::select! {
        joined = &mut serve => joined?,
        result = tokio::signal::ctrl_c() => {
            result?;
            warn!("second interrupt, aborting in-flight updates");
            shutdown.cancel();
            serve.await?;
        },
    }

    info!("chatmux stopped");
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        async_trait::async_trait,
        chatmux_channels::{ChannelOutbound, Reply, ReplyKind},
        chatmux_common::types::{InboundMessage, Location, PayloadKind, Sender, Update},
        chatmux_dispatch::Dispatcher,
        std::sync::Mutex,
    };

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<Reply>>,
    }

    impl Recorder {
        fn take(&self) -> Vec<Reply> {
            std::mem::take(&mut *self.sent.lock().unwrap())
        }

        fn take_texts(&self) -> Vec<String> {
            self.take()
                .iter()
                .map(|r| r.text_body().unwrap_or_default().to_string())
                .collect()
        }
    }

    #[async_trait]
    impl ChannelOutbound for Recorder {
        async fn send(&self, reply: &Reply) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(reply.clone());
            Ok(())
        }
    }

    async fn demo(config: &ChatmuxConfig) -> (Arc<Dispatcher>, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let server = build_server(config).await.unwrap();
        (server.into_dispatcher(recorder.clone()), recorder)
    }

    async fn say(dispatcher: &Dispatcher, body: &str) {
        let report = dispatcher
            .dispatch(Update::new(1, InboundMessage::text(7, body)))
            .await;
        assert!(report.is_completed(), "{body}: {:?}", report.outcome);
    }

    #[tokio::test]
    async fn menu_navigation_with_aliases() {
        let (dispatcher, recorder) = demo(&ChatmuxConfig::default()).await;

        say(&dispatcher, "/start").await;
        let replies = recorder.take();
        assert!(matches!(&replies[0].kind, ReplyKind::Keyboard { text, .. } if text == "Main menu"));

        say(&dispatcher, "Pets").await;
        assert_eq!(recorder.take_texts(), ["Pick a pet"]);

        say(&dispatcher, "Cat").await;
        let replies = recorder.take();
        assert_eq!(replies[0].kind_name(), "inline_keyboard");

        say(&dispatcher, "/adopt").await;
        assert_eq!(recorder.take_texts(), ["Congratulations, the cat is yours."]);

        say(&dispatcher, "Back").await;
        assert_eq!(recorder.take_texts(), ["Meow. Take this cat home?"]);

        say(&dispatcher, "Home").await;
        assert_eq!(recorder.take_texts(), ["Main menu"]);

        say(&dispatcher, "Say hello there").await;
        assert_eq!(recorder.take_texts(), ["hello there"]);
    }

    #[tokio::test]
    async fn unknown_input_and_shared_location_hit_default() {
        let (dispatcher, recorder) = demo(&ChatmuxConfig::default()).await;

        say(&dispatcher, "purple").await;
        assert_eq!(recorder.take_texts(), ["Sorry, I don't understand \"purple\""]);

        let inbound = InboundMessage {
            kind: PayloadKind::Location,
            data: "48.8566,2.3522".into(),
            location: Some(Location {
                latitude: 48.8566,
                longitude: 2.3522,
            }),
            ..InboundMessage::text(7, "")
        };
        dispatcher.dispatch(Update::new(2, inbound)).await;
        let replies = recorder.take();
        assert_eq!(replies[0].text_body(), Some("You are at 48.8566, 2.3522"));
        assert_eq!(replies[1].kind, ReplyKind::Location {
            latitude: 48.8566,
            longitude: 2.3522
        });
    }

    #[tokio::test]
    async fn flat_mode_uses_full_paths() {
        let mut config = ChatmuxConfig::default();
        config.router.mode = RouterMode::Flat;
        let (dispatcher, recorder) = demo(&config).await;

        say(&dispatcher, "/pets/cat/adopt").await;
        assert_eq!(recorder.take_texts(), ["Congratulations, the cat is yours."]);

        say(&dispatcher, "/help").await;
        let help = recorder.take_texts().remove(0);
        assert!(help.contains("/say {text} - repeat after me"), "{help}");
    }

    #[tokio::test]
    async fn allowlist_blocks_strangers() {
        let mut config = ChatmuxConfig::default();
        config.auth.allow = vec!["@ada".into()];
        let (dispatcher, recorder) = demo(&config).await;

        let stranger = InboundMessage {
            from: Sender {
                id: 9,
                username: Some("mallory".into()),
                ..Default::default()
            },
            ..InboundMessage::text(7, "/start")
        };
        dispatcher.dispatch(Update::new(1, stranger)).await;
        assert_eq!(recorder.take_texts(), ["Access denied for user mallory"]);

        let ada = InboundMessage {
            from: Sender {
                id: 1,
                username: Some("Ada".into()),
                ..Default::default()
            },
            ..InboundMessage::text(7, "/start")
        };
        dispatcher.dispatch(Update::new(2, ada)).await;
        assert_eq!(recorder.take_texts(), ["Main menu"]);
    }

    #[tokio::test]
    async fn sqlite_sessions_survive_a_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ChatmuxConfig::default();
        config.sessions.backend = SessionBackend::Sqlite;
        config.sessions.sqlite_url = format!("sqlite://{}", dir.path().join("s.db").display());

        let (dispatcher, recorder) = demo(&config).await;
        say(&dispatcher, "Pets").await;
        recorder.take();
        drop(dispatcher);

        let (dispatcher, recorder) = demo(&config).await;
        say(&dispatcher, "Dog").await;
        assert_eq!(recorder.take()[0].kind_name(), "text");
    }

    #[test]
    fn bad_allowlist_entry_is_reported() {
        let err = parse_allowlist(&["user:abc".into()]).unwrap_err();
        assert!(format!("{err:#}").contains("user:abc"));
        assert_eq!(parse_allowlist(&["@ada".into(), "chat:-100".into()]).unwrap().len(), 2);
    }

    #[test]
    fn policy_mapping() {
        assert_eq!(unhandled_policy(UnhandledNode::Fallback), UnhandledNodePolicy::Fallback);
        assert_eq!(unhandled_policy(UnhandledNode::Noop), UnhandledNodePolicy::Noop);
    }

    #[test]
    fn explicit_config_path_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.toml");
        std::fs::write(&path, "[router]\nmode = \"flat\"\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.router.mode, RouterMode::Flat);
    }
}
