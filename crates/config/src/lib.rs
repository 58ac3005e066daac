//! Configuration loading, validation and env substitution.
//!
//! Config files: `chatmux.toml`, `chatmux.yaml`, `chatmux.yml` or
//! `chatmux.json`, searched in `./` then the user config directory.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-default}` substitution anywhere in
//! the file.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{apply_env_overrides, config_dir, discover_and_load, find_config_file, load_config},
    schema::{
        AuthConfig, BotConfig, ChatmuxConfig, RouterConfig, RouterMode, SessionBackend,
        SessionsConfig, TelegramSection, UnhandledNode,
    },
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
