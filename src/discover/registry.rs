//! Expander contract and the type-keyed registry

use super::error::ExpansionFailure;
use super::expanders::{
    ContainerServiceExpander, DatabaseExpander, DnsAliasResolver, FunctionExpander,
    LoadBalancerExpander,
};
use super::heuristics::{self, HeuristicResolver};
use crate::cloud::CloudClients;
use crate::graph::{Graph, Node, ResourceType};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Turns one resource's configuration into graph nodes and edges
///
/// Implementations re-fetch the authoritative record for `node`, add every
/// related resource they can find to `graph`, and return the ids of those
/// neighbors. A failed required call is reported as an [`ExpansionFailure`]
/// carrying whatever was found before it.
#[async_trait]
pub trait Expander: Send + Sync {
    async fn expand(&self, node: &Node, graph: &Graph) -> Result<Vec<String>, ExpansionFailure>;

    /// Short name used in logs
    fn name(&self) -> &str;
}

/// Registry mapping resource types to their expanders
#[derive(Default, Clone)]
pub struct ExpanderRegistry {
    expanders: HashMap<ResourceType, Arc<dyn Expander>>,
}

impl ExpanderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in expanders wired to `clients`
    ///
    /// `heuristics` holds activation tokens; unknown tokens are logged and
    /// ignored.
    pub fn with_defaults(clients: &CloudClients, heuristics: &BTreeSet<String>) -> Self {
        for token in heuristics {
            if !heuristics::KNOWN.contains(&token.as_str()) {
                tracing::warn!("Ignoring unknown heuristic '{}'", token);
            }
        }

        let resolver = heuristics
            .contains(heuristics::RDS_ENDPOINT)
            .then(|| HeuristicResolver::new(clients.functions.clone(), clients.containers.clone()));

        let mut registry = Self::new();
        registry.register(
            ResourceType::LOAD_BALANCER,
            Arc::new(LoadBalancerExpander::new(
                clients.load_balancing.clone(),
                DnsAliasResolver::new(clients.dns.clone()),
            )),
        );
        registry.register(
            ResourceType::CONTAINER_SERVICE,
            Arc::new(ContainerServiceExpander::new(
                clients.containers.clone(),
                clients.scaling.clone(),
            )),
        );
        registry.register(
            ResourceType::FUNCTION,
            Arc::new(FunctionExpander::new(clients.functions.clone())),
        );

        let database: Arc<dyn Expander> =
            Arc::new(DatabaseExpander::new(clients.databases.clone(), resolver));
        registry.register(ResourceType::RELATIONAL_INSTANCE, database.clone());
        registry.register(ResourceType::RELATIONAL_CLUSTER, database);

        registry
    }

    /// Register an expander, replacing any previous one for the type
    pub fn register(&mut self, resource_type: ResourceType, expander: Arc<dyn Expander>) {
        tracing::debug!(
            "Registering expander '{}' for {}",
            expander.name(),
            resource_type
        );
        self.expanders.insert(resource_type, expander);
    }

    pub fn get(&self, resource_type: &ResourceType) -> Option<Arc<dyn Expander>> {
        self.expanders.get(resource_type).cloned()
    }

    pub fn contains(&self, resource_type: &ResourceType) -> bool {
        self.expanders.contains_key(resource_type)
    }

    /// Registered types, sorted
    pub fn types(&self) -> Vec<ResourceType> {
        let mut types: Vec<ResourceType> = self.expanders.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.expanders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expanders.is_empty()
    }
}
