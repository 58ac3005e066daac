use std::sync::{Arc, OnceLock};

use {
    chatmux_channels::ChannelOutbound,
    chatmux_common::types::{ConversationId, Update},
    chatmux_routing::{HandlerFn, Mux, handler_fn},
    tokio::sync::mpsc,
    tokio_util::sync::CancellationToken,
    tracing::info,
};

use crate::{
    Result,
    dispatcher::Dispatcher,
    help::{HELP_ROUTE, format_help, help_handler},
    middleware::Middleware,
};

/// Server-wide options.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Register a `/help` route listing every other route.
    pub help: bool,
    /// Names stripped from `/command@name`.
    pub bot_names: Vec<String>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            help: true,
            bot_names: Vec::new(),
        }
    }
}

/// Registration surface for a bot.
///
/// Routes, aliases and middleware are added through `&mut self`; the server
/// is then turned into a [`Dispatcher`] and fed updates.
pub struct Server {
    mux: Box<dyn Mux>,
    middlewares: Vec<Middleware>,
    bot_names: Vec<String>,
    help_text: Option<Arc<OnceLock<String>>>,
}

impl Server {
    pub fn new(mux: impl Mux + 'static, options: ServerOptions) -> Result<Self> {
        let mut server = Self {
            mux: Box::new(mux),
            middlewares: Vec::new(),
            bot_names: options.bot_names,
            help_text: None,
        };
        if options.help {
            let text = Arc::new(OnceLock::new());
            server.handle_func(
                HELP_ROUTE,
                help_handler(Arc::clone(&text)),
                Some("list commands"),
            )?;
            server.help_text = Some(text);
        }
        Ok(server)
    }

    pub fn mux(&self) -> &dyn Mux {
        self.mux.as_ref()
    }

    /// Route `path` to `callback`.
    pub fn handle_func(
        &mut self,
        path: &str,
        callback: HandlerFn,
        description: Option<&str>,
    ) -> Result<()> {
        self.mux.handle_func(path, callback, description)?;
        Ok(())
    }

    /// Route `path` to a fixed text reply.
    pub fn handle(&mut self, path: &str, reply: &str, description: Option<&str>) -> Result<()> {
        let reply: Arc<str> = reply.into();
        let callback = handler_fn(move |message| {
            let reply = Arc::clone(&reply);
            async move {
                message.reply(reply.as_ref()).await?;
                Ok(())
            }
        });
        self.handle_func(path, callback, description)
    }

    pub fn handle_default(&mut self, callback: HandlerFn, description: Option<&str>) {
        self.mux.handle_default(callback, description);
    }

    /// Handler for uploaded documents. The download link is in the `url` var.
    pub fn handle_file(&mut self, callback: HandlerFn, description: Option<&str>) {
        self.mux.handle_file(callback, description);
    }

    pub fn set_alias(&mut self, route: &str, aliases: &[&str]) {
        self.mux.set_alias(route, aliases);
    }

    /// Add a middleware. Middleware registered first runs first.
    pub fn add_middleware(&mut self, middleware: Middleware) {
        self.middlewares.push(middleware);
    }

    pub fn add_bot_name(&mut self, name: impl Into<String>) {
        self.bot_names.push(name.into());
    }

    /// Clear navigation state for `conversation_id`.
    pub async fn reset(&self, conversation_id: ConversationId) -> Result<()> {
        self.mux.reset(conversation_id).await?;
        Ok(())
    }

    /// Freeze registration and bind the server to a transport.
    pub fn into_dispatcher(self, outbound: Arc<dyn ChannelOutbound>) -> Arc<Dispatcher> {
        if let Some(text) = &self.help_text {
            let _ = text.set(format_help(&self.mux.routes()));
        }
        info!(
            routes = self.mux.routes().len(),
            middlewares = self.middlewares.len(),
            "server ready"
        );
        Arc::new(Dispatcher::new(
            self.mux,
            self.middlewares,
            outbound,
            self.bot_names,
        ))
    }

    /// Serve updates from `updates` until the channel closes or `cancel`
    /// fires.
    pub async fn serve(
        self,
        outbound: Arc<dyn ChannelOutbound>,
        updates: mpsc::Receiver<Update>,
        cancel: CancellationToken,
    ) {
        self.into_dispatcher(outbound).serve(updates, cancel).await;
    }
}
