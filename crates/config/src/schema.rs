//! Config schema types (bot, router, sessions, auth, telegram).

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatmuxConfig {
    pub bot: BotConfig,
    pub router: RouterConfig,
    pub sessions: SessionsConfig,
    pub auth: AuthConfig,
    pub telegram: TelegramSection,
}

/// Bot identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Bot API token. Redacted in `Debug` output.
    #[serde(serialize_with = "serialize_option_secret")]
    pub token: Option<Secret<String>>,
    /// Extra names stripped from `/command@name`. The transport adds the
    /// bot's own username at startup.
    pub usernames: Vec<String>,
}

impl BotConfig {
    pub fn has_token(&self) -> bool {
        self.token
            .as_ref()
            .is_some_and(|t| !t.expose_secret().trim().is_empty())
    }
}

/// Which multiplexer routes messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouterMode {
    /// Stateless pattern matching.
    Flat,
    /// Per-conversation menu navigation.
    #[default]
    Router,
}

/// Behaviour when navigation lands on a node without a handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnhandledNode {
    /// Stay put and run the default handler.
    #[default]
    Fallback,
    /// Move there and run nothing.
    Noop,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub mode: RouterMode,
    pub unhandled_node: UnhandledNode,
    /// Register a `/help` route.
    pub help: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            mode: RouterMode::default(),
            unhandled_node: UnhandledNode::default(),
            help: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    /// Lost on restart.
    #[default]
    Memory,
    Sqlite,
}

/// Where navigation state is kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    pub backend: SessionBackend,
    pub sqlite_url: String,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            backend: SessionBackend::default(),
            sqlite_url: "sqlite://chatmux.db".into(),
        }
    }
}

/// Allowlist. Entries are `@username`, `user:<id>` or `chat:<id>`.
/// Empty disables the auth middleware entirely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub allow: Vec<String>,
}

impl AuthConfig {
    pub fn is_enabled(&self) -> bool {
        !self.allow.is_empty()
    }
}

/// Telegram long-polling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramSection {
    /// Long-poll timeout passed to `getUpdates`.
    pub poll_timeout_secs: u32,
    /// HTTP client timeout; must exceed the poll timeout.
    pub request_timeout_secs: u64,
    /// Capacity of the queue between the poller and the dispatcher.
    pub update_buffer: usize,
}

impl Default for TelegramSection {
    fn default() -> Self {
        Self {
            poll_timeout_secs: 30,
            request_timeout_secs: 45,
            update_buffer: 64,
        }
    }
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}
