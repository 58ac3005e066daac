use std::{fmt, future::Future, sync::Arc};

use {
    chatmux_channels::{Message, Vars},
    futures::future::BoxFuture,
};

use crate::{Result, pattern::Pattern};

/// What a handler callback returns. Errors are logged by the dispatcher and
/// never reach the user.
pub type HandlerResult = anyhow::Result<()>;

/// A type-erased handler callback.
pub type HandlerFn = Arc<dyn Fn(Message) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Wrap an async closure as a [`HandlerFn`].
///
/// ```
/// use chatmux_routing::handler_fn;
///
/// let hello = handler_fn(|msg| async move {
///     msg.reply("hello").await?;
///     Ok(())
/// });
/// # let _ = hello;
/// ```
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |message| Box::pin(f(message)))
}

/// A registered callback plus the route it answers.
#[derive(Clone)]
pub struct Handler {
    path: String,
    pattern: Option<Pattern>,
    description: Option<String>,
    callback: HandlerFn,
}

impl Handler {
    /// A handler bound to a compiled route pattern.
    pub fn new(path: &str, callback: HandlerFn, description: Option<&str>) -> Result<Self> {
        Ok(Self {
            path: path.to_string(),
            pattern: Some(Pattern::compile(path)?),
            description: description.map(str::to_string),
            callback,
        })
    }

    /// A handler without a pattern of its own: default and file handlers, or a
    /// route tree node, which does the matching itself.
    pub fn unrouted(label: &str, callback: HandlerFn, description: Option<&str>) -> Self {
        Self {
            path: label.to_string(),
            pattern: None,
            description: description.map(str::to_string),
            callback,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn pattern(&self) -> Option<&Pattern> {
        self.pattern.as_ref()
    }

    pub fn callback(&self) -> HandlerFn {
        Arc::clone(&self.callback)
    }

    /// Match `input` against this handler's pattern. Unrouted handlers never match.
    pub fn matches(&self, input: &str) -> Option<Vars> {
        self.pattern.as_ref()?.captures(input)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("path", &self.path)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}
