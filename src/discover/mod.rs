//! Discovery engine
//!
//! Identifies the root resource, then expands the graph breadth-first one
//! level at a time. Each level is fully expanded before the next begins;
//! nodes inside a level may be expanded concurrently.

pub mod error;
pub mod expanders;
pub mod heuristics;
pub mod identify;
pub mod registry;

pub use error::{DiscoveryError, ExpansionFailure};
pub use identify::{identify, parse_qualified};
pub use registry::{Expander, ExpanderRegistry};

use crate::cloud::CloudClients;
use crate::graph::{Graph, Node};
use futures::StreamExt;
use futures::stream;
use std::collections::{BTreeSet, HashSet};
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_MAX_DEPTH: usize = 2;
pub const DEFAULT_MAX_NODES: usize = 250;
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Bounds and switches for one discovery run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryOptions {
    /// Deepest level that is expanded; the root is level 0
    pub max_depth: usize,
    /// Hard ceiling on the number of nodes in the graph
    pub max_nodes: usize,
    /// Enabled heuristic tokens
    pub heuristics: BTreeSet<String>,
    /// Nodes expanded at the same time within one level
    pub concurrency: usize,
    /// Wall-clock limit for the whole run
    pub timeout: Option<Duration>,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_nodes: DEFAULT_MAX_NODES,
            heuristics: BTreeSet::new(),
            concurrency: DEFAULT_CONCURRENCY,
            timeout: None,
        }
    }
}

impl DiscoveryOptions {
    /// Reject options that cannot produce a meaningful run
    pub fn validate(&self) -> Result<(), DiscoveryError> {
        if self.max_nodes == 0 {
            return Err(DiscoveryError::InvalidOptions(
                "maxNodes must be greater than 0".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(DiscoveryError::InvalidOptions(
                "concurrency must be greater than 0".to_string(),
            ));
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(DiscoveryError::InvalidOptions(
                "timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Why the traversal ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// No unexplored neighbors remained
    Exhausted,
    /// Unexplored neighbors remained beyond the maximum depth
    DepthLimit,
    /// The node ceiling was reached
    NodeLimit,
    /// The run timeout expired
    TimedOut,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Exhausted => "exhausted",
            StopReason::DepthLimit => "depth limit",
            StopReason::NodeLimit => "node limit",
            StopReason::TimedOut => "timed out",
        }
    }
}

/// Result of a discovery run
#[derive(Debug)]
pub struct Discovery {
    pub root_id: String,
    pub graph: Graph,
    /// Ids expanded at each depth, in frontier order
    pub levels: Vec<Vec<String>>,
    pub stop: StopReason,
    /// Per-node failures that were absorbed
    pub failures: Vec<ExpansionFailure>,
}

/// Outcome of one dequeued node
enum Step {
    Expanded(Vec<String>),
    Failed(ExpansionFailure),
    Skipped,
    CapReached,
}

/// Runs discoveries against one set of cloud clients
pub struct Discoverer {
    clients: CloudClients,
    registry: ExpanderRegistry,
    options: DiscoveryOptions,
}

impl Discoverer {
    /// Discoverer with the built-in expanders
    pub fn new(clients: CloudClients, options: DiscoveryOptions) -> Self {
        let registry = ExpanderRegistry::with_defaults(&clients, &options.heuristics);
        Self::with_registry(clients, registry, options)
    }

    /// Discoverer with a caller-supplied registry
    pub fn with_registry(
        clients: CloudClients,
        registry: ExpanderRegistry,
        options: DiscoveryOptions,
    ) -> Self {
        Self {
            clients,
            registry,
            options,
        }
    }

    pub fn options(&self) -> &DiscoveryOptions {
        &self.options
    }

    /// Identify `raw` and discover everything reachable from it
    pub async fn discover(&self, raw: &str) -> Result<Discovery, DiscoveryError> {
        self.options.validate()?;
        let deadline = self.options.timeout.map(|t| Instant::now() + t);

        let root = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, identify(&self.clients, raw))
                .await
                .map_err(|_| DiscoveryError::Timeout(format!("identifying '{}'", raw)))??,
            None => identify(&self.clients, raw).await?,
        };
        tracing::info!(
            "Identified {} {} ({})",
            root.resource_type,
            root.name,
            root.id
        );

        Ok(self.run(root, deadline).await)
    }

    /// Discover everything reachable from an already identified root
    pub async fn traverse(&self, root: Node) -> Result<Discovery, DiscoveryError> {
        self.options.validate()?;
        let deadline = self.options.timeout.map(|t| Instant::now() + t);
        Ok(self.run(root, deadline).await)
    }

    async fn run(&self, root: Node, deadline: Option<Instant>) -> Discovery {
        let graph = Graph::with_node_limit(self.options.max_nodes);
        let root_id = root.id.clone();
        graph.add_node(root);

        let mut visited: HashSet<String> = HashSet::from([root_id.clone()]);
        let mut frontier = vec![root_id.clone()];
        let mut levels: Vec<Vec<String>> = Vec::new();
        let mut failures = Vec::new();
        let mut depth = 0;
        let mut stop = StopReason::Exhausted;

        'levels: while !frontier.is_empty() {
            if depth > self.options.max_depth {
                stop = StopReason::DepthLimit;
                break;
            }
            tracing::info!("Expanding level {} ({} nodes)", depth, frontier.len());

            let level = std::mem::take(&mut frontier);
            let mut expanded = Vec::with_capacity(level.len());
            let mut steps = stream::iter(level.iter())
                .map(|id| self.step(id, &graph))
                .buffered(self.options.concurrency);

            loop {
                let next = match deadline {
                    Some(deadline) => match tokio::time::timeout_at(deadline, steps.next()).await {
                        Ok(next) => next,
                        Err(_) => {
                            tracing::warn!("Discovery timed out at level {}", depth);
                            stop = StopReason::TimedOut;
                            levels.push(expanded);
                            break 'levels;
                        }
                    },
                    None => steps.next().await,
                };
                let Some((id, step)) = next else {
                    break;
                };

                let neighbors = match step {
                    Step::CapReached => {
                        tracing::warn!(
                            "Reached the limit of {} nodes, stopping discovery",
                            self.options.max_nodes
                        );
                        stop = StopReason::NodeLimit;
                        levels.push(expanded);
                        break 'levels;
                    }
                    Step::Skipped => continue,
                    Step::Expanded(neighbors) => neighbors,
                    Step::Failed(failure) => {
                        tracing::warn!("{}", failure);
                        let kept = failure.discovered.clone();
                        failures.push(failure);
                        kept
                    }
                };

                expanded.push(id.clone());
                for neighbor in neighbors {
                    if visited.insert(neighbor.clone()) {
                        frontier.push(neighbor);
                    }
                }
            }

            levels.push(expanded);
            depth += 1;
        }

        tracing::info!(
            "Discovery finished ({}): {} nodes, {} edges, {} failures",
            stop.as_str(),
            graph.node_count(),
            graph.edge_count(),
            failures.len()
        );

        Discovery {
            root_id,
            graph,
            levels,
            stop,
            failures,
        }
    }

    /// Expand one dequeued node
    async fn step<'a>(&self, id: &'a String, graph: &Graph) -> (&'a String, Step) {
        if graph.node_count() >= self.options.max_nodes {
            return (id, Step::CapReached);
        }
        let Some(node) = graph.get_node(id) else {
            tracing::debug!("Node {} vanished before expansion", id);
            return (id, Step::Skipped);
        };
        let Some(expander) = self.registry.get(&node.resource_type) else {
            tracing::debug!("No expander for {}, not expanding {}", node.resource_type, id);
            return (id, Step::Expanded(Vec::new()));
        };

        tracing::debug!("Expanding {} with {}", id, expander.name());
        match expander.expand(&node, graph).await {
            Ok(neighbors) => (id, Step::Expanded(neighbors)),
            Err(failure) => (id, Step::Failed(failure)),
        }
    }
}
