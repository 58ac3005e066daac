use std::{future::Future, sync::Arc};

use {
    chatmux_channels::Message,
    chatmux_routing::{HandlerFn, HandlerResult, handler_fn},
};

/// Wraps a handler callback in another one.
pub type Middleware = Arc<dyn Fn(HandlerFn) -> HandlerFn + Send + Sync>;

/// Build a [`Middleware`] from an async function that receives the message
/// and the next callback in the chain.
///
/// ```
/// use chatmux_dispatch::middleware_fn;
///
/// let log = middleware_fn(|msg, next| async move {
///     tracing::info!(text = msg.text(), "incoming");
///     next(msg).await
/// });
/// # let _ = log;
/// ```
pub fn middleware_fn<F, Fut>(f: F) -> Middleware
where
    F: Fn(Message, HandlerFn) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    let f = Arc::new(f);
    Arc::new(move |next: HandlerFn| {
        let f = Arc::clone(&f);
        handler_fn(move |message| f(message, Arc::clone(&next)))
    })
}

/// Apply `middlewares` around `base`. The first registered middleware ends up
/// outermost and sees the message first.
pub fn compose(base: HandlerFn, middlewares: &[Middleware]) -> HandlerFn {
    middlewares
        .iter()
        .rev()
        .fold(base, |inner, middleware| middleware(inner))
}
