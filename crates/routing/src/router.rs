//! Stateful menu navigation.
//!
//! Each conversation sits on one node of a [`RouteTree`]. Input is matched
//! against the children of that node only, so the same word can mean
//! different things in different menus. The current node's path lives in a
//! [`SessionStorage`] and is written back only when a move succeeds.

use std::sync::Arc;

use {
    async_trait::async_trait,
    chatmux_channels::Vars,
    chatmux_common::types::ConversationId,
    chatmux_sessions::{ConversationLocks, SessionStorage},
    tracing::{debug, warn},
};

use crate::{
    Error, Result,
    alias::Aliases,
    handler::{Handler, HandlerFn},
    mux::{Mux, ROUTE_BACK, ROUTE_REFRESH, ROUTE_ROOT, Resolution, RouteInfo},
    tree::{NodeId, RouteTree},
};

/// What happens when navigation lands on a node without a handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnhandledNodePolicy {
    /// Treat the node as a dead end: the move is not committed and the
    /// default handler runs. Control inputs (root, back, refresh) still move.
    #[default]
    Fallback,
    /// Commit the move and run nothing.
    Noop,
}

pub struct RouterMux {
    tree: RouteTree,
    storage: Arc<dyn SessionStorage>,
    locks: ConversationLocks,
    aliases: Aliases,
    default_handler: Option<Handler>,
    file_handler: Option<Handler>,
    policy: UnhandledNodePolicy,
}

enum Step {
    /// Matched a child or a control input.
    Move {
        target: NodeId,
        vars: Vars,
        control: bool,
    },
    NoMatch,
}

impl RouterMux {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            tree: RouteTree::new(),
            storage,
            locks: ConversationLocks::new(),
            aliases: Aliases::default(),
            default_handler: None,
            file_handler: None,
            policy: UnhandledNodePolicy::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: UnhandledNodePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn tree(&self) -> &RouteTree {
        &self.tree
    }

    /// Current node of `conversation_id`, `/` if it has none.
    pub async fn current_path(&self, conversation_id: ConversationId) -> Result<String> {
        let current = self.load_state(conversation_id).await?;
        Ok(self.tree.node(current).path().to_string())
    }

    async fn load_state(&self, conversation_id: ConversationId) -> Result<NodeId> {
        let Some(path) = self.storage.get(conversation_id).await? else {
            return Ok(NodeId::ROOT);
        };
        match self.tree.find(&path) {
            Some(id) => Ok(id),
            None => {
                warn!(%conversation_id, path = %path, "stored route no longer exists, starting from root");
                Ok(NodeId::ROOT)
            },
        }
    }

    fn step(&self, current: NodeId, input: &str) -> Step {
        let control = |target| Step::Move {
            target,
            vars: Vars::new(),
            control: true,
        };
        match input.trim() {
            ROUTE_ROOT => control(NodeId::ROOT),
            ROUTE_BACK => control(self.tree.parent_or_root(current)),
            ROUTE_REFRESH => control(current),
            other => {
                let segment = other.strip_prefix('/').unwrap_or(other);
                match self.tree.match_child(current, segment) {
                    Some((target, vars)) => Step::Move {
                        target,
                        vars,
                        control: false,
                    },
                    None => Step::NoMatch,
                }
            },
        }
    }

    fn fallback(&self) -> Option<Resolution> {
        self.default_handler
            .clone()
            .map(|handler| Resolution::new(handler, Vars::new()))
    }

    async fn resolve_locked(
        &self,
        conversation_id: ConversationId,
        text: &str,
    ) -> Result<Option<Resolution>> {
        let current = self.load_state(conversation_id).await?;
        let input = self.aliases.resolve(text);

        let (target, vars, control) = match self.step(current, &input) {
            Step::Move {
                target,
                vars,
                control,
            } => (target, vars, control),
            Step::NoMatch => {
                debug!(
                    %conversation_id,
                    from = self.tree.node(current).path(),
                    "no route matched, using default handler"
                );
                return Ok(self.fallback());
            },
        };

        let node = self.tree.node(target);
        let resolution = match (node.handler(), self.policy) {
            (Some(handler), _) => Some(Resolution::new(handler.clone(), vars)),
            (None, UnhandledNodePolicy::Noop) => None,
            (None, UnhandledNodePolicy::Fallback) if !control => {
                debug!(%conversation_id, path = node.path(), "route has no handler");
                return Ok(self.fallback());
            },
            (None, UnhandledNodePolicy::Fallback) => self.fallback(),
        };

        self.storage.set(conversation_id, node.path()).await?;
        debug!(%conversation_id, path = node.path(), "route committed");
        Ok(resolution)
    }
}

#[async_trait]
impl Mux for RouterMux {
    async fn resolve(
        &self,
        conversation_id: ConversationId,
        text: &str,
    ) -> Result<Option<Resolution>> {
        let guard = self.locks.lock(conversation_id).await;
        let result = self.resolve_locked(conversation_id, text).await;
        drop(guard);
        self.locks.forget(conversation_id);
        result
    }

    fn handle_func(
        &mut self,
        path: &str,
        callback: HandlerFn,
        description: Option<&str>,
    ) -> Result<()> {
        let id = self.tree.insert(path)?;
        let node_path = self.tree.node(id).path().to_string();
        if self.tree.node(id).handler().is_some() {
            return Err(Error::DuplicateRoute { path: node_path });
        }
        let handler = Handler::unrouted(&node_path, callback, description);
        self.tree.set_handler(id, handler);
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

    /// Children of the root: the top-level menu.
    fn routes(&self) -> Vec<RouteInfo> {
        self.tree
            .node(NodeId::ROOT)
            .children()
            .iter()
            .map(|id| {
                let node = self.tree.node(*id);
                RouteInfo {
                    path: node.path().to_string(),
                    description: node
                        .handler()
                        .and_then(Handler::description)
                        .map(str::to_string),
                }
            })
            .collect()
    }

    async fn reset(&self, conversation_id: ConversationId) -> Result<()> {
        let guard = self.locks.lock(conversation_id).await;
        let result = self.storage.reset(conversation_id).await;
        drop(guard);
        self.locks.forget(conversation_id);
        result.map_err(Error::from)
    }
}
