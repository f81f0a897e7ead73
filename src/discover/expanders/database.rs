//! Relational database expander
//!
//! Handles both standalone instances and clusters. Related database
//! resources (subnet groups, parameter groups, members) get ARN ids built
//! from the store's own ARN, so an instance and its cluster converge on the
//! same vertices no matter which one is expanded first.

use super::{Neighbors, arn_node, local_node};
use crate::cloud::model::{DbCluster, DbInstance};
use crate::cloud::{ApiError, Arn, DatabaseApi, ops};
use crate::discover::error::ExpansionFailure;
use crate::discover::heuristics::HeuristicResolver;
use crate::discover::registry::Expander;
use crate::graph::{Evidence, Graph, Node, ResourceType, relation};
use async_trait::async_trait;
use std::sync::Arc;

pub struct DatabaseExpander {
    api: Arc<dyn DatabaseApi>,
    heuristics: Option<HeuristicResolver>,
}

/// Id of a related database resource, e.g. `subgrp:private`
fn related_id(base: Option<&Arn>, resource: String) -> String {
    match base {
        Some(arn) => arn.sibling(resource).to_string(),
        None => resource,
    }
}

/// Graph node for a described instance
pub(crate) fn instance_node(db: &DbInstance) -> Node {
    let mut node = arn_node(&db.arn, ResourceType::RELATIONAL_INSTANCE, &db.identifier)
        .with_attribute("engine", db.engine.as_str())
        .with_attribute("engineVersion", db.engine_version.as_str())
        .with_attribute("instanceClass", db.instance_class.as_str())
        .with_attribute("multiAz", db.multi_az);
    if let Some(endpoint) = &db.endpoint {
        node = node.with_attribute("endpoint", endpoint.address.as_str());
        if let Some(port) = endpoint.port {
            node = node.with_attribute("port", port);
        }
    }
    node
}

/// Graph node for a described cluster
pub(crate) fn cluster_node(cluster: &DbCluster) -> Node {
    let mut node = arn_node(&cluster.arn, ResourceType::RELATIONAL_CLUSTER, &cluster.identifier)
        .with_attribute("engine", cluster.engine.as_str())
        .with_attribute("engineVersion", cluster.engine_version.as_str());
    if let Some(endpoint) = &cluster.endpoint {
        node = node.with_attribute("endpoint", endpoint.as_str());
    }
    if let Some(reader) = &cluster.reader_endpoint {
        node = node.with_attribute("readerEndpoint", reader.as_str());
    }
    if let Some(port) = cluster.port {
        node = node.with_attribute("port", port);
    }
    node
}

impl DatabaseExpander {
    pub fn new(api: Arc<dyn DatabaseApi>, heuristics: Option<HeuristicResolver>) -> Self {
        Self { api, heuristics }
    }

    async fn expand_instance(
        &self,
        node: &Node,
        graph: &Graph,
    ) -> Result<Vec<String>, ExpansionFailure> {
        let mut found = Neighbors::new(graph, &node.id);
        let identifier = node.arn_or_id();

        let db = match self.api.describe_db_instance(identifier).await {
            Ok(Some(db)) => db,
            Ok(None) => {
                let missing = ApiError::not_found(ops::DESCRIBE_DB_INSTANCES, identifier);
                return Err(found.fail(missing));
            }
            Err(e) => return Err(found.fail(e)),
        };

        let mut enriched = instance_node(&db);
        enriched.id = node.id.clone();
        graph.merge_node(enriched);

        let base = db.arn.parse::<Arn>().or_else(|_| node.id.parse::<Arn>()).ok();
        let api_call = ops::DESCRIBE_DB_INSTANCES;

        if let Some(group) = &db.subnet_group {
            let group_id = related_id(base.as_ref(), format!("subgrp:{}", group.name));
            let group_node = arn_node(&group_id, ResourceType::SUBNET_GROUP, &group.name)
                .with_attribute("vpcId", group.vpc_id.as_str());
            let added = found.outgoing(
                group_node,
                relation::USES_SUBNET_GROUP,
                Evidence::observed(api_call).with_field("DBSubnetGroupName", &group.name),
            );
            if added {
                for subnet in &group.subnet_ids {
                    found.chained(
                        &group_id,
                        local_node(subnet, ResourceType::SUBNET, node),
                        relation::CONTAINS,
                        Evidence::observed(api_call).with_field("SubnetIdentifier", subnet),
                    );
                }
            }
        }

        for sg in &db.security_groups {
            found.outgoing(
                local_node(sg, ResourceType::SECURITY_GROUP, node),
                relation::USES_SECURITY_GROUP,
                Evidence::observed(api_call).with_field("VpcSecurityGroupId", sg),
            );
        }

        for group in &db.parameter_groups {
            let group_id = related_id(base.as_ref(), format!("pg:{}", group));
            found.outgoing(
                arn_node(&group_id, ResourceType::PARAMETER_GROUP, group),
                relation::USES_PARAMETER_GROUP,
                Evidence::observed(api_call).with_field("DBParameterGroupName", group),
            );
        }

        if let Some(cluster) = &db.cluster_identifier {
            let cluster_id = related_id(base.as_ref(), format!("cluster:{}", cluster));
            found.outgoing(
                arn_node(&cluster_id, ResourceType::RELATIONAL_CLUSTER, cluster),
                relation::MEMBER_OF,
                Evidence::observed(api_call).with_field("DBClusterIdentifier", cluster),
            );
        }

        if let (Some(resolver), Some(endpoint)) = (&self.heuristics, &db.endpoint) {
            let consumers = resolver
                .upstream_consumers(node, &endpoint.address, graph)
                .await;
            found.extend(consumers);
        }

        Ok(found.into_ids())
    }

    async fn expand_cluster(
        &self,
        node: &Node,
        graph: &Graph,
    ) -> Result<Vec<String>, ExpansionFailure> {
        let mut found = Neighbors::new(graph, &node.id);
        let identifier = node.arn_or_id();

        let cluster = match self.api.describe_db_cluster(identifier).await {
            Ok(Some(cluster)) => cluster,
            Ok(None) => {
                let missing = ApiError::not_found(ops::DESCRIBE_DB_CLUSTERS, identifier);
                return Err(found.fail(missing));
            }
            Err(e) => return Err(found.fail(e)),
        };

        let mut enriched = cluster_node(&cluster);
        enriched.id = node.id.clone();
        graph.merge_node(enriched);

        let base = cluster.arn.parse::<Arn>().or_else(|_| node.id.parse::<Arn>()).ok();
        let api_call = ops::DESCRIBE_DB_CLUSTERS;

        for member in &cluster.members {
            let member_id = related_id(base.as_ref(), format!("db:{}", member.instance_identifier));
            let role = if member.is_writer { "writer" } else { "reader" };
            found.outgoing(
                arn_node(&member_id, ResourceType::RELATIONAL_INSTANCE, &member.instance_identifier)
                    .with_attribute("clusterRole", role),
                relation::CONTAINS,
                Evidence::observed(api_call)
                    .with_field("DBInstanceIdentifier", &member.instance_identifier)
                    .with_field("IsClusterWriter", member.is_writer.to_string()),
            );
        }

        if let Some(group) = &cluster.subnet_group {
            let group_id = related_id(base.as_ref(), format!("subgrp:{}", group));
            found.outgoing(
                arn_node(&group_id, ResourceType::SUBNET_GROUP, group),
                relation::USES_SUBNET_GROUP,
                Evidence::observed(api_call).with_field("DBSubnetGroup", group),
            );
        }

        for sg in &cluster.security_groups {
            found.outgoing(
                local_node(sg, ResourceType::SECURITY_GROUP, node),
                relation::USES_SECURITY_GROUP,
                Evidence::observed(api_call).with_field("VpcSecurityGroupId", sg),
            );
        }

        if let Some(group) = &cluster.parameter_group {
            let group_id = related_id(base.as_ref(), format!("cluster-pg:{}", group));
            found.outgoing(
                arn_node(&group_id, ResourceType::CLUSTER_PARAMETER_GROUP, group),
                relation::USES_PARAMETER_GROUP,
                Evidence::observed(api_call).with_field("DBClusterParameterGroup", group),
            );
        }

        if let (Some(resolver), Some(endpoint)) = (&self.heuristics, &cluster.endpoint) {
            let consumers = resolver.upstream_consumers(node, endpoint, graph).await;
            found.extend(consumers);
        }

        Ok(found.into_ids())
    }
}

#[async_trait]
impl Expander for DatabaseExpander {
    async fn expand(&self, node: &Node, graph: &Graph) -> Result<Vec<String>, ExpansionFailure> {
        if node.resource_type == ResourceType::RELATIONAL_CLUSTER {
            self.expand_cluster(node, graph).await
        } else if node.resource_type == ResourceType::RELATIONAL_INSTANCE {
            self.expand_instance(node, graph).await
        } else {
            tracing::debug!("Database expander ignoring {} ({})", node.id, node.resource_type);
            Ok(Vec::new())
        }
    }

    fn name(&self) -> &str {
        "database"
    }
}
