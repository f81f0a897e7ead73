//! Concurrent graph store
//!
//! One reader/writer lock guards the node map and the edge list. The lock is
//! only held inside a single method call, so callers can share a `&Graph`
//! across concurrently running expanders.

use super::model::{Edge, Node};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Outcome of a node write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeWrite {
    /// A new vertex was created
    Inserted,
    /// An existing vertex was replaced or enriched
    Updated,
    /// The node limit was reached and the id was new
    Rejected,
}

impl NodeWrite {
    /// Whether the id is present in the graph after the write
    pub fn is_present(self) -> bool {
        !matches!(self, NodeWrite::Rejected)
    }
}

#[derive(Debug, Default)]
struct GraphInner {
    nodes: HashMap<String, Node>,
    edges: Vec<Edge>,
}

/// Dependency graph shared by every expander in a run
#[derive(Debug, Default)]
pub struct Graph {
    inner: RwLock<GraphInner>,
    node_limit: Option<usize>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Graph that refuses new vertices once `limit` nodes exist
    pub fn with_node_limit(limit: usize) -> Self {
        Self {
            inner: RwLock::default(),
            node_limit: Some(limit),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, GraphInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, GraphInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn at_limit(&self, inner: &GraphInner) -> bool {
        self.node_limit.is_some_and(|limit| inner.nodes.len() >= limit)
    }

    /// Insert or replace a node (last writer wins)
    pub fn add_node(&self, node: Node) -> NodeWrite {
        let mut inner = self.write();
        if inner.nodes.contains_key(&node.id) {
            inner.nodes.insert(node.id.clone(), node);
            return NodeWrite::Updated;
        }
        if self.at_limit(&inner) {
            tracing::debug!("Node limit reached, not adding {}", node.id);
            return NodeWrite::Rejected;
        }
        inner.nodes.insert(node.id.clone(), node);
        NodeWrite::Inserted
    }

    /// Enrich an existing node with a richer record of the same resource
    ///
    /// Attributes and tags from `node` overwrite existing keys, empty scalar
    /// fields are filled. The resource type of an existing node is kept.
    pub fn merge_node(&self, node: Node) -> NodeWrite {
        self.write_merged(node, true)
    }

    /// Add a node unless it exists; an existing node only gains missing keys
    pub fn ensure_node(&self, node: Node) -> NodeWrite {
        self.write_merged(node, false)
    }

    fn write_merged(&self, node: Node, overwrite: bool) -> NodeWrite {
        let mut inner = self.write();
        if let Some(existing) = inner.nodes.get_mut(&node.id) {
            if existing.name.is_empty() || (overwrite && !node.name.is_empty()) {
                existing.name = node.name;
            }
            if existing.qualified_name.is_none() {
                existing.qualified_name = node.qualified_name;
            }
            if existing.region.is_empty() {
                existing.region = node.region;
            }
            if existing.account_id.is_empty() {
                existing.account_id = node.account_id;
            }
            for (key, value) in node.tags {
                if overwrite || !existing.tags.contains_key(&key) {
                    existing.tags.insert(key, value);
                }
            }
            for (key, value) in node.attributes {
                if overwrite || !existing.attributes.contains_key(&key) {
                    existing.attributes.insert(key, value);
                }
            }
            return NodeWrite::Updated;
        }
        if self.at_limit(&inner) {
            tracing::debug!("Node limit reached, not adding {}", node.id);
            return NodeWrite::Rejected;
        }
        inner.nodes.insert(node.id.clone(), node);
        NodeWrite::Inserted
    }

    /// Append an edge; returns false if either endpoint is missing
    pub fn add_edge(&self, edge: Edge) -> bool {
        let mut inner = self.write();
        if !inner.nodes.contains_key(&edge.source) || !inner.nodes.contains_key(&edge.target) {
            tracing::debug!(
                "Dropping edge {} -[{}]-> {}: endpoint not in graph",
                edge.source,
                edge.relation,
                edge.target
            );
            return false;
        }
        inner.edges.push(edge);
        true
    }

    /// Append an edge unless one with the same endpoints and relation exists
    ///
    /// The check and the insert happen under one write lock.
    pub fn add_edge_if_absent(&self, edge: Edge) -> bool {
        let mut inner = self.write();
        if !inner.nodes.contains_key(&edge.source) || !inner.nodes.contains_key(&edge.target) {
            return false;
        }
        if inner
            .edges
            .iter()
            .any(|e| e.same_link(&edge.source, &edge.target, &edge.relation))
        {
            return false;
        }
        inner.edges.push(edge);
        true
    }

    pub fn get_node(&self, id: &str) -> Option<Node> {
        self.read().nodes.get(id).cloned()
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.read().nodes.contains_key(id)
    }

    pub fn has_edge(&self, source: &str, target: &str, relation: &str) -> bool {
        self.read()
            .edges
            .iter()
            .any(|e| e.same_link(source, target, relation))
    }

    /// All nodes, sorted by id
    pub fn nodes(&self) -> Vec<Node> {
        let mut nodes: Vec<Node> = self.read().nodes.values().cloned().collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }

    /// All edges in insertion order
    pub fn edges(&self) -> Vec<Edge> {
        self.read().edges.clone()
    }

    pub fn edges_from(&self, id: &str) -> Vec<Edge> {
        self.read()
            .edges
            .iter()
            .filter(|e| e.source == id)
            .cloned()
            .collect()
    }

    pub fn edges_into(&self, id: &str) -> Vec<Edge> {
        self.read()
            .edges
            .iter()
            .filter(|e| e.target == id)
            .cloned()
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.read().nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.read().edges.len()
    }
}
