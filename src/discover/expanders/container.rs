//! Container service expander

use super::{Neighbors, arn_node, local_node};
use crate::cloud::model::ContainerService;
use crate::cloud::{ApiError, ContainerApi, ScalingApi, collect_pages, ops};
use crate::discover::error::ExpansionFailure;
use crate::discover::registry::Expander;
use crate::graph::{Evidence, Graph, Node, ResourceType, relation};
use async_trait::async_trait;
use std::sync::Arc;

/// Cluster used by services created before cluster-qualified ARNs
pub(crate) const DEFAULT_CLUSTER: &str = "default";

pub struct ContainerServiceExpander {
    containers: Arc<dyn ContainerApi>,
    scaling: Arc<dyn ScalingApi>,
}

fn cluster_name(cluster_arn: &str) -> &str {
    cluster_arn.rsplit('/').next().unwrap_or(cluster_arn)
}

/// Graph node for a described service
pub(crate) fn service_node(svc: &ContainerService) -> Node {
    let mut node = arn_node(&svc.arn, ResourceType::CONTAINER_SERVICE, &svc.name)
        .with_attribute("cluster", cluster_name(&svc.cluster_arn))
        .with_attribute("desiredCount", svc.desired_count);
    if !svc.launch_type.is_empty() {
        node = node.with_attribute("launchType", svc.launch_type.as_str());
    }
    if !svc.task_definition.is_empty() {
        node = node.with_attribute("taskDefinition", svc.task_definition.as_str());
    }
    node
}

impl ContainerServiceExpander {
    pub fn new(containers: Arc<dyn ContainerApi>, scaling: Arc<dyn ScalingApi>) -> Self {
        Self {
            containers,
            scaling,
        }
    }

    async fn expand_task_definition(
        &self,
        svc: &ContainerService,
        graph: &Graph,
        found: &mut Neighbors<'_>,
    ) {
        let reference = svc.task_definition.as_str();
        let evidence =
            Evidence::observed(ops::DESCRIBE_SERVICES).with_field("TaskDefinition", reference);

        if graph.has_node(reference) {
            found.existing(&svc.arn, reference, relation::USES_TASK_DEFINITION, evidence);
            return;
        }

        let definition = match self.containers.describe_task_definition(reference).await {
            Ok(Some(definition)) => definition,
            Ok(None) => {
                tracing::warn!("Task definition {} not found", reference);
                return;
            }
            Err(e) => {
                tracing::warn!("Failed to describe task definition {}: {}", reference, e);
                return;
            }
        };

        let td_id = if definition.arn.is_empty() {
            reference.to_string()
        } else {
            definition.arn.clone()
        };
        if graph.has_node(&td_id) {
            found.existing(&svc.arn, &td_id, relation::USES_TASK_DEFINITION, evidence);
            return;
        }

        let td_node = arn_node(
            &td_id,
            ResourceType::TASK_DEFINITION,
            &format!("{}:{}", definition.family, definition.revision),
        )
        .with_attribute("family", definition.family.as_str())
        .with_attribute("revision", definition.revision)
        .with_attribute("networkMode", definition.network_mode.as_str());
        if !found.outgoing(td_node, relation::USES_TASK_DEFINITION, evidence) {
            return;
        }

        let roles = [
            (&definition.task_role_arn, relation::USES_TASK_ROLE, "TaskRoleArn"),
            (
                &definition.execution_role_arn,
                relation::USES_EXECUTION_ROLE,
                "ExecutionRoleArn",
            ),
        ];
        for (role, role_relation, field) in roles {
            if let Some(role) = role {
                found.chained(
                    &td_id,
                    arn_node(role, ResourceType::IAM_ROLE, ""),
                    role_relation,
                    Evidence::observed(ops::DESCRIBE_TASK_DEFINITION).with_field(field, role),
                );
            }
        }
    }

    async fn expand_scaling(&self, svc: &ContainerService, node: &Node, found: &mut Neighbors<'_>) {
        let resource_id = format!("service/{}/{}", cluster_name(&svc.cluster_arn), svc.name);

        let targets = match self.scaling.describe_scalable_targets(&resource_id).await {
            Ok(targets) => targets,
            Err(e) => {
                tracing::warn!("Failed to read scalable targets for {}: {}", resource_id, e);
                return;
            }
        };
        if targets.is_empty() {
            return;
        }

        let policies = match collect_pages(|token| {
            self.scaling.describe_scaling_policies(&resource_id, token)
        })
        .await
        {
            Ok(policies) => policies,
            Err(e) => {
                tracing::warn!("Failed to read scaling policies for {}: {}", resource_id, e);
                return;
            }
        };
        for policy in &policies {
            let policy_node = if policy.arn.is_empty() {
                local_node(&policy.name, ResourceType::SCALING_POLICY, node)
            } else {
                arn_node(&policy.arn, ResourceType::SCALING_POLICY, &policy.name)
            };
            found.outgoing(
                policy_node.with_attribute("policyType", policy.policy_type.as_str()),
                relation::HAS_SCALING_POLICY,
                Evidence::observed(ops::DESCRIBE_SCALING_POLICIES)
                    .with_field("ResourceId", &resource_id)
                    .with_field("PolicyType", &policy.policy_type),
            );
        }
    }
}

#[async_trait]
impl Expander for ContainerServiceExpander {
    async fn expand(&self, node: &Node, graph: &Graph) -> Result<Vec<String>, ExpansionFailure> {
        let mut found = Neighbors::new(graph, &node.id);
        let cluster = node.attribute_str("cluster").unwrap_or(DEFAULT_CLUSTER);
        let service = node.arn_or_id();

        let svc = match self.containers.describe_service(cluster, service).await {
            Ok(Some(svc)) => svc,
            Ok(None) => {
                return Err(found.fail(ApiError::not_found(ops::DESCRIBE_SERVICES, service)));
            }
            Err(e) => return Err(found.fail(e)),
        };

        let mut enriched = service_node(&svc);
        enriched.id = node.id.clone();
        graph.merge_node(enriched);

        // Edges hang off the node id, which may differ from the described ARN
        let svc = ContainerService {
            arn: node.id.clone(),
            ..svc
        };

        if !svc.cluster_arn.is_empty() {
            found.outgoing(
                arn_node(
                    &svc.cluster_arn,
                    ResourceType::CONTAINER_CLUSTER,
                    cluster_name(&svc.cluster_arn),
                ),
                relation::RUNS_IN,
                Evidence::observed(ops::DESCRIBE_SERVICES)
                    .with_field("ClusterArn", &svc.cluster_arn),
            );
        }

        if !svc.task_definition.is_empty() {
            self.expand_task_definition(&svc, graph, &mut found).await;
        }

        for lb in &svc.load_balancers {
            let Some(tg_arn) = &lb.target_group_arn else {
                continue;
            };
            let mut evidence = Evidence::observed(ops::DESCRIBE_SERVICES)
                .with_field("TargetGroupArn", tg_arn)
                .with_field("ContainerName", &lb.container_name);
            if let Some(port) = lb.container_port {
                evidence = evidence.with_field("ContainerPort", port.to_string());
            }
            if !found.existing(&svc.arn, tg_arn, relation::REGISTERS_WITH, evidence.clone()) {
                found.outgoing(
                    arn_node(tg_arn, ResourceType::TARGET_GROUP, ""),
                    relation::REGISTERS_WITH,
                    evidence,
                );
            }
        }

        if let Some(network) = &svc.network {
            for sg in &network.security_groups {
                found.outgoing(
                    local_node(sg, ResourceType::SECURITY_GROUP, node),
                    relation::USES_SECURITY_GROUP,
                    Evidence::observed(ops::DESCRIBE_SERVICES).with_field("SecurityGroups", sg),
                );
            }
            for subnet in &network.subnets {
                found.outgoing(
                    local_node(subnet, ResourceType::SUBNET, node),
                    relation::RUNS_IN_SUBNET,
                    Evidence::observed(ops::DESCRIBE_SERVICES).with_field("Subnets", subnet),
                );
            }
        }

        self.expand_scaling(&svc, node, &mut found).await;

        Ok(found.into_ids())
    }

    fn name(&self) -> &str {
        "container-service"
    }
}
