use {async_trait::async_trait, chatmux_channels::Vars, chatmux_common::types::ConversationId};

use crate::{
    Result,
    handler::{Handler, HandlerFn},
};

/// Jump back to the root node.
pub const ROUTE_ROOT: &str = "/</>";
/// Go to the parent of the current node (root stays root).
pub const ROUTE_BACK: &str = "/<..>";
/// Re-run the current node.
pub const ROUTE_REFRESH: &str = "/<.>";

/// The handler chosen for a message and the variables bound while matching.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub handler: Handler,
    pub vars: Vars,
}

impl Resolution {
    pub fn new(handler: Handler, vars: Vars) -> Self {
        Self { handler, vars }
    }
}

/// A route as listed by the help handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    pub path: String,
    pub description: Option<String>,
}

/// Maps message text to a handler.
///
/// Registration happens up front through `&mut self`; resolution runs
/// concurrently from many dispatch tasks.
#[async_trait]
pub trait Mux: Send + Sync {
    /// Pick the handler for `text` sent in `conversation_id`.
    ///
    /// `Ok(None)` means nothing should run: no match and no default handler.
    async fn resolve(&self, conversation_id: ConversationId, text: &str)
    -> Result<Option<Resolution>>;

    fn handle_func(
        &mut self,
        path: &str,
        callback: HandlerFn,
        description: Option<&str>,
    ) -> Result<()>;

    /// Handler for input that matches nothing.
    fn handle_default(&mut self, callback: HandlerFn, description: Option<&str>);

    /// Handler for uploaded documents.
    fn handle_file(&mut self, callback: HandlerFn, description: Option<&str>);

    fn set_alias(&mut self, route: &str, aliases: &[&str]);

    fn default_handler(&self) -> Option<&Handler>;

    fn file_handler(&self) -> Option<&Handler>;

    /// Registered routes in listing order.
    fn routes(&self) -> Vec<RouteInfo>;

    /// Forget any per-conversation state.
    async fn reset(&self, conversation_id: ConversationId) -> Result<()>;
}
