//! Arena-backed navigation tree.
//!
//! Nodes own their children by index; the parent link is a plain index, so
//! the tree has no reference cycles. A node's path (`/pets/cat`) is what the
//! session store remembers.

use std::collections::HashMap;

use chatmux_channels::Vars;

use crate::{Result, handler::Handler, pattern::Pattern};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub const ROOT: Self = Self(0);
}

#[derive(Debug)]
pub struct Node {
    path: String,
    pattern: Option<Pattern>,
    handler: Option<Handler>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn handler(&self) -> Option<&Handler> {
        self.handler.as_ref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

#[derive(Debug)]
pub struct RouteTree {
    nodes: Vec<Node>,
    by_path: HashMap<String, NodeId>,
}

impl Default for RouteTree {
    fn default() -> Self {
        let root = Node {
            path: "/".to_string(),
            pattern: None,
            handler: None,
            parent: None,
            children: Vec::new(),
        };
        Self {
            nodes: vec![root],
            by_path: HashMap::from([("/".to_string(), NodeId::ROOT)]),
        }
    }
}

impl RouteTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Look up a node by its stored path.
    pub fn find(&self, path: &str) -> Option<NodeId> {
        self.by_path.get(&normalize(path)).copied()
    }

    /// Create the node at `path` and any missing ancestors.
    ///
    /// Each `/`-separated segment is a pattern matched against one input.
    pub fn insert(&mut self, path: &str) -> Result<NodeId> {
        let path = normalize(path);
        if let Some(id) = self.by_path.get(&path) {
            return Ok(*id);
        }

        let mut current = NodeId::ROOT;
        let mut node_path = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            node_path.push('/');
            node_path.push_str(segment);
            current = match self.by_path.get(&node_path) {
                Some(id) => *id,
                None => self.push_child(current, &node_path, segment)?,
            };
        }
        Ok(current)
    }

    fn push_child(&mut self, parent: NodeId, path: &str, segment: &str) -> Result<NodeId> {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            path: path.to_string(),
            pattern: Some(Pattern::compile(segment)?),
            handler: None,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        self.by_path.insert(path.to_string(), id);
        Ok(id)
    }

    /// Attach `handler` to `id`, returning the one it replaced.
    pub fn set_handler(&mut self, id: NodeId, handler: Handler) -> Option<Handler> {
        self.nodes[id.0].handler.replace(handler)
    }

    /// First child of `id`, in registration order, whose segment matches `input`.
    pub fn match_child(&self, id: NodeId, input: &str) -> Option<(NodeId, Vars)> {
        self.node(id).children.iter().find_map(|child| {
            let pattern = self.node(*child).pattern.as_ref()?;
            pattern.captures(input).map(|vars| (*child, vars))
        })
    }

    pub fn parent_or_root(&self, id: NodeId) -> NodeId {
        self.node(id).parent.unwrap_or(NodeId::ROOT)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        // The root always exists.
        false
    }
}

/// `pets/cat/` and `/pets/cat` name the same node; the root is `/`.
fn normalize(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    format!("/{trimmed}")
}
