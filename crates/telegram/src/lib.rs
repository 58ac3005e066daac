//! Telegram transport for chatmux.
//!
//! Long-polls the Bot API with teloxide, turns each update into a neutral
//! [`Update`](chatmux_common::types::Update) and sends [`Reply`](chatmux_channels::Reply)
//! values back through [`TelegramOutbound`].

pub mod bot;
pub mod config;
pub mod error;
pub mod inbound;
pub mod outbound;

pub use {
    bot::TelegramBot,
    config::TelegramConfig,
    error::{Error, Result},
    outbound::TelegramOutbound,
};
