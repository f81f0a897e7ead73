//! Function expander

use super::{Neighbors, arn_node, local_node};
use crate::cloud::model::Function;
use crate::cloud::{ApiError, FunctionApi, collect_pages, ops};
use crate::discover::error::ExpansionFailure;
use crate::discover::registry::Expander;
use crate::graph::{Evidence, Graph, Node, ResourceType, relation};
use async_trait::async_trait;
use std::sync::Arc;

pub struct FunctionExpander {
    api: Arc<dyn FunctionApi>,
}

/// Resource type of an event source, from the service segment of its ARN
pub fn classify_event_source(arn: &str) -> ResourceType {
    if arn.contains(":sqs:") {
        ResourceType::QUEUE
    } else if arn.contains(":dynamodb:") {
        ResourceType::CHANGE_STREAM
    } else if arn.contains(":kinesis:") {
        ResourceType::SHARD_STREAM
    } else if arn.contains(":kafka:") {
        ResourceType::BROKER_CLUSTER
    } else {
        ResourceType::EVENT_SOURCE
    }
}

/// Graph node for a described function
pub(crate) fn function_node(function: &Function) -> Node {
    let mut node = arn_node(&function.arn, ResourceType::FUNCTION, &function.name);
    if !function.runtime.is_empty() {
        node = node.with_attribute("runtime", function.runtime.as_str());
    }
    if !function.handler.is_empty() {
        node = node.with_attribute("handler", function.handler.as_str());
    }
    node
}

impl FunctionExpander {
    pub fn new(api: Arc<dyn FunctionApi>) -> Self {
        Self { api }
    }

    async fn expand_event_sources(&self, function: &Function, found: &mut Neighbors<'_>) {
        let mappings = match collect_pages(|token| {
            self.api.list_event_source_mappings(&function.arn, token)
        })
        .await
        {
            Ok(mappings) => mappings,
            Err(e) => {
                tracing::warn!(
                    "Failed to list event source mappings for {}: {}",
                    function.arn,
                    e
                );
                return;
            }
        };

        for mapping in &mappings {
            if mapping.event_source_arn.is_empty() {
                continue;
            }
            let source = arn_node(
                &mapping.event_source_arn,
                classify_event_source(&mapping.event_source_arn),
                "",
            )
            .with_attribute("uuid", mapping.uuid.as_str());
            let mut evidence = Evidence::observed(ops::LIST_EVENT_SOURCE_MAPPINGS)
                .with_field("EventSourceArn", &mapping.event_source_arn)
                .with_field("UUID", &mapping.uuid)
                .with_field("State", &mapping.state);
            if let Some(batch_size) = mapping.batch_size {
                evidence = evidence.with_field("BatchSize", batch_size.to_string());
            }
            if !found.incoming(source, relation::TRIGGERS, evidence) {
                continue;
            }

            if let Some(destination) = &mapping.on_failure_destination {
                found.chained(
                    &mapping.event_source_arn,
                    arn_node(destination, ResourceType::EVENT_DESTINATION, ""),
                    relation::SENDS_FAILURES_TO,
                    Evidence::observed(ops::LIST_EVENT_SOURCE_MAPPINGS)
                        .with_field("Destination", destination),
                );
            }
        }
    }

    async fn expand_destinations(&self, function: &Function, found: &mut Neighbors<'_>) {
        // Most functions have no invoke config; any error means none
        let config = match self.api.get_event_invoke_config(&function.arn).await {
            Ok(Some(config)) => config,
            Ok(None) => return,
            Err(e) => {
                tracing::debug!("No event invoke config for {}: {}", function.arn, e);
                return;
            }
        };

        let destinations = [
            (&config.on_success, relation::SENDS_SUCCESS_TO, "OnSuccess"),
            (&config.on_failure, relation::SENDS_FAILURES_TO, "OnFailure"),
        ];
        for (destination, destination_relation, field) in destinations {
            if let Some(destination) = destination {
                found.outgoing(
                    arn_node(destination, ResourceType::EVENT_DESTINATION, ""),
                    destination_relation,
                    Evidence::observed(ops::GET_FUNCTION_EVENT_INVOKE_CONFIG)
                        .with_field(field, destination),
                );
            }
        }
    }
}

#[async_trait]
impl Expander for FunctionExpander {
    async fn expand(&self, node: &Node, graph: &Graph) -> Result<Vec<String>, ExpansionFailure> {
        let mut found = Neighbors::new(graph, &node.id);
        let name_or_arn = node.arn_or_id();

        let function = match self.api.get_function(name_or_arn).await {
            Ok(Some(function)) => function,
            Ok(None) => return Err(found.fail(ApiError::not_found(ops::GET_FUNCTION, name_or_arn))),
            Err(e) => return Err(found.fail(e)),
        };

        let mut enriched = function_node(&function);
        enriched.id = node.id.clone();
        graph.merge_node(enriched);

        if !function.role.is_empty() {
            found.outgoing(
                arn_node(&function.role, ResourceType::IAM_ROLE, ""),
                relation::USES_EXECUTION_ROLE,
                Evidence::observed(ops::GET_FUNCTION).with_field("Role", &function.role),
            );
        }

        if let Some(vpc) = &function.vpc {
            for sg in &vpc.security_group_ids {
                found.outgoing(
                    local_node(sg, ResourceType::SECURITY_GROUP, node),
                    relation::USES_SECURITY_GROUP,
                    Evidence::observed(ops::GET_FUNCTION).with_field("SecurityGroupIds", sg),
                );
            }
            for subnet in &vpc.subnet_ids {
                found.outgoing(
                    local_node(subnet, ResourceType::SUBNET, node),
                    relation::RUNS_IN_SUBNET,
                    Evidence::observed(ops::GET_FUNCTION).with_field("SubnetIds", subnet),
                );
            }
        }

        if let Some(dlq) = &function.dead_letter_target_arn {
            found.outgoing(
                arn_node(dlq, ResourceType::DEAD_LETTER_QUEUE, ""),
                relation::SENDS_FAILURES_TO,
                Evidence::observed(ops::GET_FUNCTION).with_field("TargetArn", dlq),
            );
        }

        self.expand_event_sources(&function, &mut found).await;
        self.expand_destinations(&function, &mut found).await;

        Ok(found.into_ids())
    }

    fn name(&self) -> &str {
        "function"
    }
}
