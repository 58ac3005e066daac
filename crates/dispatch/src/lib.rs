//! Update dispatch.
//!
//! A [`Server`] collects routes and middleware; [`Server::into_dispatcher`]
//! freezes it into a [`Dispatcher`] that runs each update as its own task,
//! forwards handler replies to a [`ChannelOutbound`](chatmux_channels::ChannelOutbound)
//! and reports the result as a [`DispatchReport`].

pub mod auth;
pub mod dispatcher;
pub mod error;
pub mod help;
pub mod middleware;
pub mod report;
pub mod server;

pub use {
    auth::new_auth,
    dispatcher::{Dispatcher, trim_bot_name},
    error::{Error, Result},
    help::{HELP_ROUTE, format_help},
    middleware::{Middleware, compose, middleware_fn},
    report::{DispatchOutcome, DispatchReport, DropReason},
    server::{Server, ServerOptions},
};
