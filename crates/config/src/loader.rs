use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{env_subst::substitute_env, schema::ChatmuxConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "chatmux.toml",
    "chatmux.yaml",
    "chatmux.yml",
    "chatmux.json",
];

/// Environment variables that override `bot.token`, highest priority first.
const TOKEN_ENV_VARS: &[&str] = &["CHATMUX_TOKEN", "TELEGRAM_TOKEN"];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<ChatmuxConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./chatmux.{toml,yaml,yml,json}` (project-local)
/// 2. `<user config dir>/chatmux/chatmux.{toml,yaml,yml,json}`
///
/// Returns `ChatmuxConfig::default()` if no config file is found or the
/// file fails to parse.
pub fn discover_and_load() -> ChatmuxConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    ChatmuxConfig::default()
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .or_else(|| {
            let dir = config_dir()?;
            CONFIG_FILENAMES
                .iter()
                .map(|name| dir.join(name))
                .find(|p| p.exists())
        })
}

/// Returns the user-global config directory (`~/.config/chatmux/` on Linux).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "chatmux").map(|d| d.config_dir().to_path_buf())
}

/// Apply environment overrides from the process environment.
pub fn apply_env_overrides(config: &mut ChatmuxConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

fn apply_env_overrides_with(config: &mut ChatmuxConfig, lookup: impl Fn(&str) -> Option<String>) {
    let token = TOKEN_ENV_VARS.iter().find_map(|name| {
        lookup(name)
            .filter(|v| !v.trim().is_empty())
            .map(|v| (*name, v))
    });
    if let Some((name, token)) = token {
        debug!(var = name, "bot token taken from environment");
        config.bot.token = Some(Secret::new(token.trim().to_string()));
    }
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<ChatmuxConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
