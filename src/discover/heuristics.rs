//! Opt-in heuristic discovery
//!
//! Control-plane APIs do not say who connects to a database. The resolver
//! looks for compute resources whose environment mentions the database
//! endpoint and links them with heuristic evidence.

use super::expanders::{Neighbors, function_node, service_node};
use crate::cloud::{ContainerApi, FunctionApi, collect_pages, ops};
use crate::graph::{Evidence, Graph, Node, relation};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Activation token for the database endpoint heuristic
pub const RDS_ENDPOINT: &str = "rds-endpoint";

/// Every heuristic this build understands
pub const KNOWN: &[&str] = &[RDS_ENDPOINT];

/// Name of the first variable whose value contains `needle`
fn matching_variable<'a>(
    environment: &'a BTreeMap<String, String>,
    needle: &str,
) -> Option<&'a str> {
    environment
        .iter()
        .find(|(_, value)| value.contains(needle))
        .map(|(key, _)| key.as_str())
}

#[derive(Clone)]
pub struct HeuristicResolver {
    functions: Arc<dyn FunctionApi>,
    containers: Arc<dyn ContainerApi>,
}

impl HeuristicResolver {
    pub fn new(functions: Arc<dyn FunctionApi>, containers: Arc<dyn ContainerApi>) -> Self {
        Self {
            functions,
            containers,
        }
    }

    /// Link compute resources that reference `endpoint` to `store`
    ///
    /// Returns the ids of the consumers. Listing failures are logged and
    /// yield fewer results, never an error.
    pub async fn upstream_consumers(
        &self,
        store: &Node,
        endpoint: &str,
        graph: &Graph,
    ) -> Vec<String> {
        if endpoint.is_empty() {
            return Vec::new();
        }
        tracing::debug!("Searching for consumers of {} (heuristic)", endpoint);

        let mut found = Neighbors::new(graph, &store.id);
        self.scan_functions(endpoint, &mut found).await;
        self.scan_services(endpoint, &mut found).await;

        let consumers = found.into_ids();
        if !consumers.is_empty() {
            tracing::info!(
                "Heuristic found {} consumers of {}",
                consumers.len(),
                store.name
            );
        }
        consumers
    }

    async fn scan_functions(&self, endpoint: &str, found: &mut Neighbors<'_>) {
        let functions = match collect_pages(|token| self.functions.list_functions(token)).await {
            Ok(functions) => functions,
            Err(e) => {
                tracing::warn!("Heuristic could not list functions: {}", e);
                return;
            }
        };

        for function in &functions {
            if let Some(variable) = matching_variable(&function.environment, endpoint) {
                found.incoming(
                    function_node(function),
                    relation::CONNECTS_TO,
                    Evidence::inferred(ops::LIST_FUNCTIONS)
                        .with_field("EnvironmentVariable", variable)
                        .with_field("Endpoint", endpoint),
                );
            }
        }
    }

    async fn scan_services(&self, endpoint: &str, found: &mut Neighbors<'_>) {
        let clusters = match collect_pages(|token| self.containers.list_clusters(token)).await {
            Ok(clusters) => clusters,
            Err(e) => {
                tracing::warn!("Heuristic could not list clusters: {}", e);
                return;
            }
        };

        for cluster in &clusters {
            let services =
                match collect_pages(|token| self.containers.list_services(cluster, token)).await {
                    Ok(services) => services,
                    Err(e) => {
                        tracing::warn!("Heuristic could not list services in {}: {}", cluster, e);
                        continue;
                    }
                };

            for service_arn in &services {
                let service = match self.containers.describe_service(cluster, service_arn).await {
                    Ok(Some(service)) => service,
                    Ok(None) => continue,
                    Err(e) => {
                        tracing::debug!("Heuristic skipping {}: {}", service_arn, e);
                        continue;
                    }
                };
                let definition = match self
                    .containers
                    .describe_task_definition(&service.task_definition)
                    .await
                {
                    Ok(Some(definition)) => definition,
                    Ok(None) => continue,
                    Err(e) => {
                        tracing::debug!("Heuristic skipping {}: {}", service.task_definition, e);
                        continue;
                    }
                };

                let hit = definition.containers.iter().find_map(|container| {
                    matching_variable(&container.environment, endpoint)
                        .map(|variable| (container.name.as_str(), variable))
                });
                if let Some((container, variable)) = hit {
                    found.incoming(
                        service_node(&service),
                        relation::CONNECTS_TO,
                        Evidence::inferred(ops::DESCRIBE_TASK_DEFINITION)
                            .with_field("Container", container)
                            .with_field("EnvironmentVariable", variable)
                            .with_field("Endpoint", endpoint),
                    );
                }
            }
        }
    }
}
