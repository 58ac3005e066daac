//! Message routing.
//!
//! Two multiplexers implement [`Mux`]:
//! - [`FlatMux`] matches every message against all registered patterns, in
//!   registration order.
//! - [`RouterMux`] keeps each conversation on a node of a menu tree and
//!   matches input against that node's children, with the control inputs
//!   [`ROUTE_ROOT`], [`ROUTE_BACK`] and [`ROUTE_REFRESH`].
//!
//! Patterns use `{name}` placeholders; see [`Pattern`].

pub mod alias;
pub mod error;
pub mod flat;
pub mod handler;
pub mod mux;
pub mod pattern;
pub mod router;
pub mod tree;

pub use {
    alias::Aliases,
    error::{Error, Result},
    flat::FlatMux,
    handler::{Handler, HandlerFn, HandlerResult, handler_fn},
    mux::{Mux, ROUTE_BACK, ROUTE_REFRESH, ROUTE_ROOT, Resolution, RouteInfo},
    pattern::Pattern,
    router::{RouterMux, UnhandledNodePolicy},
    tree::{NodeId, RouteTree},
};
