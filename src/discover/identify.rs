//! Resource identification
//!
//! Turns the user's input into the root node of a discovery. ARNs are parsed
//! locally; anything else is treated as a friendly name and looked up
//! against each supported service in a fixed order.

use super::error::DiscoveryError;
use super::expanders::{
    DEFAULT_CLUSTER, cluster_node, function_node, instance_node, load_balancer_node, service_node,
};
use crate::cloud::{Arn, CloudClients, collect_pages};
use crate::graph::{Node, ResourceType};

/// Resolve `raw` to a root node
///
/// The input is used verbatim; surrounding whitespace is rejected rather than
/// stripped so the root's qualified name always equals what was given.
pub async fn identify(clients: &CloudClients, raw: &str) -> Result<Node, DiscoveryError> {
    if raw.trim().is_empty() {
        return Err(DiscoveryError::InvalidIdentifier("empty identifier".to_string()));
    }
    if raw.trim() != raw {
        return Err(invalid(raw, "surrounding whitespace"));
    }
    if raw.starts_with("arn:") {
        return parse_qualified(raw);
    }
    resolve_friendly_name(clients, raw).await
}

fn invalid(raw: &str, reason: &str) -> DiscoveryError {
    DiscoveryError::InvalidIdentifier(format!("{}: {}", raw, reason))
}

/// Classify a fully qualified identifier without any API call
///
/// The node's id and qualified name are the input unchanged.
pub fn parse_qualified(raw: &str) -> Result<Node, DiscoveryError> {
    let arn: Arn = raw.parse().map_err(|e| invalid(raw, &format!("{}", e)))?;

    let (resource_type, name, cluster, qualifier) = match arn.service.as_str() {
        "elasticloadbalancing" => {
            // loadbalancer/<app|net|gwy>/<name>/<id>
            let parts: Vec<&str> = arn.resource.split('/').collect();
            if parts.first() != Some(&"loadbalancer") || parts.len() < 4 {
                return Err(invalid(
                    raw,
                    "only load balancer ARNs are supported for elasticloadbalancing",
                ));
            }
            (ResourceType::LOAD_BALANCER, parts[parts.len() - 2], None, None)
        }
        "ecs" => {
            let parts: Vec<&str> = arn.resource.split('/').collect();
            match parts.as_slice() {
                ["service", cluster, name] => {
                    (ResourceType::CONTAINER_SERVICE, *name, Some(*cluster), None)
                }
                // Old ARN format without the cluster segment
                ["service", name] => (
                    ResourceType::CONTAINER_SERVICE,
                    *name,
                    Some(DEFAULT_CLUSTER),
                    None,
                ),
                _ => return Err(invalid(raw, "only service ARNs are supported for ecs")),
            }
        }
        "lambda" => {
            let parts: Vec<&str> = arn.resource.split(':').collect();
            match parts.as_slice() {
                ["function", name] => (ResourceType::FUNCTION, *name, None, None),
                ["function", name, qualifier] => {
                    (ResourceType::FUNCTION, *name, None, Some(*qualifier))
                }
                _ => return Err(invalid(raw, "only function ARNs are supported for lambda")),
            }
        }
        "rds" => match arn.resource.split_once(':') {
            Some(("db", name)) => (ResourceType::RELATIONAL_INSTANCE, name, None, None),
            Some(("cluster", name)) => (ResourceType::RELATIONAL_CLUSTER, name, None, None),
            _ => return Err(invalid(raw, "only db and cluster ARNs are supported for rds")),
        },
        other => return Err(invalid(raw, &format!("unsupported service '{}'", other))),
    };

    if name.is_empty() {
        return Err(invalid(raw, "missing resource name"));
    }

    let mut node = Node::new(raw, resource_type, name)
        .with_qualified_name(raw)
        .with_location(arn.region.clone(), arn.account_id.clone());
    if let Some(cluster) = cluster {
        node = node.with_attribute("cluster", cluster);
    }
    if let Some(qualifier) = qualifier {
        node = node.with_attribute("qualifier", qualifier);
    }
    Ok(node)
}

/// Try each service in priority order; the first hit wins
async fn resolve_friendly_name(clients: &CloudClients, name: &str) -> Result<Node, DiscoveryError> {
    tracing::debug!("Resolving friendly name '{}'", name);

    match collect_pages(|token| clients.load_balancing.list_load_balancers(token)).await {
        Ok(balancers) => {
            if let Some(lb) = balancers.iter().find(|lb| lb.name == name) {
                return Ok(load_balancer_node(lb));
            }
        }
        Err(e) => tracing::debug!("Load balancer lookup for '{}' failed: {}", name, e),
    }

    // Only `cluster/service` shaped names can be services
    if let Some((cluster, service)) = name.split_once('/') {
        if !service.contains('/') {
            match clients.containers.describe_service(cluster, service).await {
                Ok(Some(svc)) => return Ok(service_node(&svc)),
                Ok(None) => {}
                Err(e) => tracing::debug!("Service lookup for '{}' failed: {}", name, e),
            }
        }
    }

    match clients.functions.get_function(name).await {
        Ok(Some(function)) => return Ok(function_node(&function)),
        Ok(None) => {}
        Err(e) => tracing::debug!("Function lookup for '{}' failed: {}", name, e),
    }

    match clients.databases.describe_db_instance(name).await {
        Ok(Some(db)) => return Ok(instance_node(&db)),
        Ok(None) => {}
        Err(e) => tracing::debug!("Database instance lookup for '{}' failed: {}", name, e),
    }

    match clients.databases.describe_db_cluster(name).await {
        Ok(Some(cluster)) => return Ok(cluster_node(&cluster)),
        Ok(None) => {}
        Err(e) => tracing::debug!("Database cluster lookup for '{}' failed: {}", name, e),
    }

    Err(DiscoveryError::NotFound(format!(
        "no load balancer, service, function or database named '{}'",
        name
    )))
}
