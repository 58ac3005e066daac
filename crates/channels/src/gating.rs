//! Who may talk to the bot.

use std::{fmt, str::FromStr};

use {
    chatmux_common::types::InboundMessage,
    serde::{Deserialize, Serialize},
};

use crate::error::Error;

/// One allowlist entry.
///
/// Written in config as `@name` or `name` (username, case-insensitive, `*`
/// wildcards allowed), `user:<id>` or `chat:<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Principal {
    Username(String),
    UserId(i64),
    ChatId(i64),
}

impl Principal {
    /// Whether the sender or chat of `inbound` is this principal.
    pub fn matches(&self, inbound: &InboundMessage) -> bool {
        match self {
            Self::Username(pattern) => inbound
                .from
                .username
                .as_deref()
                .is_some_and(|name| username_matches(pattern, name)),
            Self::UserId(id) => inbound.from.id == *id,
            Self::ChatId(id) => inbound.conversation_id.0 == *id,
        }
    }
}

/// Check whether `inbound` comes from an allowed principal.
///
/// An empty allowlist admits nobody.
pub fn is_allowed(inbound: &InboundMessage, allowlist: &[Principal]) -> bool {
    allowlist.iter().any(|principal| principal.matches(inbound))
}

fn username_matches(pattern: &str, name: &str) -> bool {
    let pattern = pattern.trim_start_matches('@').to_lowercase();
    let name = name.trim_start_matches('@').to_lowercase();
    if pattern.contains('*') {
        glob_match(&pattern, &name)
    } else {
        pattern == name
    }
}

/// Glob matching with `*` standing for any run of characters.
fn glob_match(pattern: &str, text: &str) -> bool {
    let mut parts = pattern.split('*');
    let prefix = parts.next().unwrap_or_default();
    let Some(rest) = text.strip_prefix(prefix) else {
        return false;
    };
    let parts: Vec<&str> = parts.collect();
    let Some((suffix, middle)) = parts.split_last() else {
        return rest.is_empty();
    };
    let Some(mut remaining) = rest.strip_suffix(suffix) else {
        return false;
    };
    for part in middle {
        match remaining.find(part) {
            Some(idx) => remaining = &remaining[idx + part.len()..],
            None => return false,
        }
    }
    true
}

impl FromStr for Principal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parse_id = |raw: &str| {
            raw.trim()
                .parse::<i64>()
                .map_err(|e| Error::invalid_input(format!("bad id in principal '{s}': {e}")))
        };
        if let Some(id) = s.strip_prefix("user:") {
            return Ok(Self::UserId(parse_id(id)?));
        }
        if let Some(id) = s.strip_prefix("chat:") {
            return Ok(Self::ChatId(parse_id(id)?));
        }
        let name = s.trim_start_matches('@');
        if name.is_empty() {
            return Err(Error::invalid_input("empty principal"));
        }
        Ok(Self::Username(name.to_string()))
    }
}

impl TryFrom<String> for Principal {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Principal> for String {
    fn from(principal: Principal) -> Self {
        principal.to_string()
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Username(name) => write!(f, "@{name}"),
            Self::UserId(id) => write!(f, "user:{id}"),
            Self::ChatId(id) => write!(f, "chat:{id}"),
        }
    }
}
