//! Built-in resource expanders
//!
//! Each expander owns the API clients it needs. They share [`Neighbors`],
//! which records discovered nodes and edges and collects the ids the
//! traversal should visit next.

mod container;
mod database;
mod dns;
mod function;
mod load_balancer;

pub use container::ContainerServiceExpander;
pub use database::DatabaseExpander;
pub use dns::{AliasRecord, DnsAliasResolver, normalize_dns_name};
pub use function::{FunctionExpander, classify_event_source};
pub use load_balancer::LoadBalancerExpander;

pub(crate) use container::{DEFAULT_CLUSTER, service_node};
pub(crate) use database::{cluster_node, instance_node};
pub(crate) use function::function_node;
pub(crate) use load_balancer::load_balancer_node;

use super::error::ExpansionFailure;
use crate::cloud::{ApiError, Arn, arn::short_name};
use crate::graph::{Edge, Evidence, Graph, Node, ResourceType};

/// Node for a resource identified by ARN; region and account come from the ARN
pub(crate) fn arn_node(arn: &str, resource_type: ResourceType, name: &str) -> Node {
    let name = if name.is_empty() { short_name(arn) } else { name };
    let node = Node::new(arn, resource_type, name).with_qualified_name(arn);
    match arn.parse::<Arn>() {
        Ok(parsed) => node.with_location(parsed.region, parsed.account_id),
        Err(_) => node,
    }
}

/// Node for a resource without an ARN (subnet, security group, IP target)
pub(crate) fn local_node(id: &str, resource_type: ResourceType, origin: &Node) -> Node {
    Node::new(id, resource_type, id).with_location(origin.region.clone(), origin.account_id.clone())
}

/// Records neighbors of one expanded node
pub(crate) struct Neighbors<'g> {
    graph: &'g Graph,
    origin: String,
    found: Vec<String>,
}

impl<'g> Neighbors<'g> {
    pub fn new(graph: &'g Graph, origin: &str) -> Self {
        Self {
            graph,
            origin: origin.to_string(),
            found: Vec::new(),
        }
    }

    /// Edge from the expanded node to `node`
    pub fn outgoing(&mut self, node: Node, relation: &str, evidence: Evidence) -> bool {
        let origin = self.origin.clone();
        self.link(&origin, node, relation, evidence, false)
    }

    /// Edge from `node` to the expanded node
    pub fn incoming(&mut self, node: Node, relation: &str, evidence: Evidence) -> bool {
        let origin = self.origin.clone();
        self.link(&origin, node, relation, evidence, true)
    }

    /// Edge from another discovered node to `node`
    pub fn chained(
        &mut self,
        source: &str,
        node: Node,
        relation: &str,
        evidence: Evidence,
    ) -> bool {
        self.link(source, node, relation, evidence, false)
    }

    /// Edge to a node already in the graph
    pub fn existing(
        &mut self,
        source: &str,
        target: &str,
        relation: &str,
        evidence: Evidence,
    ) -> bool {
        if !self.graph.has_node(target) {
            return false;
        }
        self.graph
            .add_edge_if_absent(Edge::new(source, target, relation, evidence));
        self.record(target);
        true
    }

    /// Ids found by another collaborator
    pub fn extend(&mut self, ids: Vec<String>) {
        for id in ids {
            self.record(&id);
        }
    }

    fn link(
        &mut self,
        anchor: &str,
        node: Node,
        relation: &str,
        evidence: Evidence,
        reverse: bool,
    ) -> bool {
        let id = node.id.clone();
        if !self.graph.ensure_node(node).is_present() {
            return false;
        }
        let edge = if reverse {
            Edge::new(id.as_str(), anchor, relation, evidence)
        } else {
            Edge::new(anchor, id.as_str(), relation, evidence)
        };
        self.graph.add_edge_if_absent(edge);
        self.record(&id);
        true
    }

    fn record(&mut self, id: &str) {
        if id != self.origin && !self.found.iter().any(|f| f == id) {
            self.found.push(id.to_string());
        }
    }

    pub fn into_ids(self) -> Vec<String> {
        self.found
    }

    /// Failure that keeps what was found so far
    pub fn fail(self, source: ApiError) -> ExpansionFailure {
        ExpansionFailure {
            node_id: self.origin,
            source,
            discovered: self.found,
        }
    }
}
