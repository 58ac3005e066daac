//! Semantic checks on a loaded configuration.

use std::fmt;

use crate::schema::{ChatmuxConfig, SessionBackend};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. `telegram.update_buffer`.
    pub path: &'static str,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}: {}", self.severity, self.path, self.message)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    fn push(&mut self, severity: Severity, path: &'static str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            path,
            message: message.into(),
        });
    }
}

/// Check settings that parse fine but cannot work together.
///
/// A missing token is only a warning: commands that do not talk to the
/// transport (such as listing routes) run without one.
pub fn validate(config: &ChatmuxConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    if !config.bot.has_token() {
        result.push(
            Severity::Warning,
            "bot.token",
            "no bot token; set bot.token or CHATMUX_TOKEN",
        );
    }

    let telegram = &config.telegram;
    if telegram.request_timeout_secs <= u64::from(telegram.poll_timeout_secs) {
        result.push(
            Severity::Error,
            "telegram.request_timeout_secs",
            format!(
                "request timeout ({}s) must exceed the poll timeout ({}s)",
                telegram.request_timeout_secs, telegram.poll_timeout_secs
            ),
        );
    }
    if telegram.update_buffer == 0 {
        result.push(
            Severity::Error,
            "telegram.update_buffer",
            "update buffer must be at least 1",
        );
    }

    if config.sessions.backend == SessionBackend::Sqlite
        && config.sessions.sqlite_url.trim().is_empty()
    {
        result.push(
            Severity::Error,
            "sessions.sqlite_url",
            "sqlite backend selected but no database url given",
        );
    }

    if config.auth.allow.iter().any(|entry| entry.trim().is_empty()) {
        result.push(Severity::Error, "auth.allow", "empty allowlist entry");
    }

    result
}
