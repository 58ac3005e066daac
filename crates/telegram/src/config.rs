use std::{fmt, time::Duration};

use secrecy::{ExposeSecret, Secret};

/// Connection settings for one bot.
#[derive(Clone)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    pub token: Secret<String>,
    /// Long-poll timeout passed to `getUpdates`.
    pub poll_timeout_secs: u32,
    /// HTTP client timeout. Must be longer than the poll timeout or every
    /// idle poll is cut off client-side.
    pub request_timeout_secs: u64,
}

impl TelegramConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Secret::new(token.into()),
            poll_timeout_secs: 30,
            request_timeout_secs: 45,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub(crate) fn token(&self) -> &str {
        self.token.expose_secret()
    }
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &"[REDACTED]")
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}
