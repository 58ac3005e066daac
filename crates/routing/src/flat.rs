use {async_trait::async_trait, chatmux_common::types::ConversationId, tracing::trace};

use crate::{
    Error, Result,
    alias::Aliases,
    handler::{Handler, HandlerFn},
    mux::{Mux, Resolution, RouteInfo},
};

/// Stateless mux: every message is matched against all patterns in
/// registration order and the first match wins.
#[derive(Debug, Default)]
pub struct FlatMux {
    handlers: Vec<Handler>,
    default_handler: Option<Handler>,
    file_handler: Option<Handler>,
    aliases: Aliases,
}

impl FlatMux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handlers(&self) -> &[Handler] {
        &self.handlers
    }
}

#[async_trait]
impl Mux for FlatMux {
    async fn resolve(
        &self,
        conversation_id: ConversationId,
        text: &str,
    ) -> Result<Option<Resolution>> {
        let input = self.aliases.resolve(text);
        for handler in &self.handlers {
            if let Some(vars) = handler.matches(&input) {
                trace!(%conversation_id, route = handler.path(), "flat route matched");
                return Ok(Some(Resolution::new(handler.clone(), vars)));
            }
        }
        Ok(self
            .default_handler
            .clone()
            .map(|handler| Resolution::new(handler, Default::default())))
    }

    fn handle_func(
        &mut self,
        path: &str,
        callback: HandlerFn,
        description: Option<&str>,
    ) -> Result<()> {
        if self.handlers.iter().any(|h| h.path() == path) {
            return Err(Error::DuplicateRoute {
                path: path.to_string(),
            });
        }
        self.handlers
            .push(Handler::new(path, callback, description)?);
        Ok(())
    }

    fn handle_default(&mut self, callback: HandlerFn, description: Option<&str>) {
        self.default_handler = Some(Handler::unrouted("default", callback, description));
    }

    fn handle_file(&mut self, callback: HandlerFn, description: Option<&str>) {
        self.file_handler = Some(Handler::unrouted("file", callback, description));
    }

    fn set_alias(&mut self, route: &str, aliases: &[&str]) {
        self.aliases.insert(route, aliases);
    }

    fn default_handler(&self) -> Option<&Handler> {
        self.default_handler.as_ref()
    }

    fn file_handler(&self) -> Option<&Handler> {
        self.file_handler.as_ref()
    }

    fn routes(&self) -> Vec<RouteInfo> {
        self.handlers
            .iter()
            .map(|h| RouteInfo {
                path: h.path().to_string(),
                description: h.description().map(str::to_string),
            })
            .collect()
    }

    async fn reset(&self, _conversation_id: ConversationId) -> Result<()> {
        Ok(())
    }
}
