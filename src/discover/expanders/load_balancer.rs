//! Load balancer expander
//!
//! Walks load balancer -> listeners -> target groups -> registered targets,
//! and looks up DNS alias records pointing at the load balancer.

use super::dns::{AliasRecord, DnsAliasResolver};
use super::{Neighbors, arn_node, local_node};
use crate::cloud::model::{LoadBalancer, TargetGroup, TargetHealth};
use crate::cloud::{ApiError, LoadBalancingApi, collect_pages, ops};
use crate::discover::error::ExpansionFailure;
use crate::discover::registry::Expander;
use crate::graph::{Evidence, Graph, Node, ResourceType, relation};
use async_trait::async_trait;
use std::sync::Arc;

pub struct LoadBalancerExpander {
    api: Arc<dyn LoadBalancingApi>,
    dns: DnsAliasResolver,
}

/// Graph node for a described load balancer
pub(crate) fn load_balancer_node(lb: &LoadBalancer) -> Node {
    let mut node = arn_node(&lb.arn, ResourceType::LOAD_BALANCER, &lb.name)
        .with_attribute("dnsName", lb.dns_name.as_str())
        .with_attribute("scheme", lb.scheme.as_str())
        .with_attribute("lbType", lb.lb_type.as_str());
    if !lb.vpc_id.is_empty() {
        node = node.with_attribute("vpcId", lb.vpc_id.as_str());
    }
    node
}

fn target_group_node(tg: &TargetGroup) -> Node {
    let mut node = arn_node(&tg.arn, ResourceType::TARGET_GROUP, &tg.name)
        .with_attribute("protocol", tg.protocol.as_str())
        .with_attribute("targetType", tg.target_type.as_str());
    if let Some(port) = tg.port {
        node = node.with_attribute("port", port);
    }
    node
}

/// Node for a registered target, typed by the group's target type
fn target_node(target_type: &str, target: &TargetHealth, group: &Node) -> Node {
    let node = match target_type {
        "instance" => local_node(&target.target_id, ResourceType::COMPUTE_INSTANCE, group),
        "ip" => local_node(&target.target_id, ResourceType::IP_TARGET, group),
        "lambda" => arn_node(&target.target_id, ResourceType::FUNCTION, ""),
        "alb" => arn_node(&target.target_id, ResourceType::LOAD_BALANCER, ""),
        other => local_node(&target.target_id, ResourceType::new(other), group),
    };
    node.with_attribute("healthState", target.state.as_str())
}

fn record_node(alias: &AliasRecord, lb: &Node) -> Node {
    let record = &alias.record;
    let mut node = Node::new(
        alias.node_id(),
        ResourceType::DNS_RECORD,
        record.name.trim_end_matches('.'),
    )
    .with_location("", lb.account_id.clone())
    .with_attribute("zoneId", alias.zone.id.as_str())
    .with_attribute("zoneName", alias.zone.name.as_str())
    .with_attribute("recordType", record.record_type.as_str())
    .with_attribute("privateZone", alias.zone.private_zone);
    if let Some(set_id) = &record.set_identifier {
        node = node.with_attribute("setIdentifier", set_id.as_str());
    }
    node
}

impl LoadBalancerExpander {
    pub fn new(api: Arc<dyn LoadBalancingApi>, dns: DnsAliasResolver) -> Self {
        Self { api, dns }
    }

    /// Listeners, their rules, and everything behind them
    async fn expand_listeners(&self, lb: &LoadBalancer, graph: &Graph, found: &mut Neighbors<'_>) {
        let listeners =
            match collect_pages(|token| self.api.describe_listeners(&lb.arn, token)).await {
                Ok(listeners) => listeners,
                Err(e) => {
                    tracing::warn!("Failed to list listeners for {}: {}", lb.arn, e);
                    return;
                }
            };

        for listener in &listeners {
            let mut listener_node = arn_node(&listener.arn, ResourceType::LISTENER, "")
                .with_attribute("protocol", listener.protocol.as_str());
            if let Some(port) = listener.port {
                listener_node = listener_node.with_attribute("port", port);
                listener_node.name = format!("{}:{}", listener.protocol, port);
            }
            let evidence = Evidence::observed(ops::DESCRIBE_LISTENERS)
                .with_field("ListenerArn", &listener.arn);
            if !found.outgoing(listener_node, relation::HAS_LISTENER, evidence) {
                continue;
            }

            let mut forwards: Vec<(String, &'static str)> = Vec::new();
            for action in &listener.default_actions {
                for tg in action.target_groups() {
                    forwards.push((tg.to_string(), ops::DESCRIBE_LISTENERS));
                }
            }

            // Non-default rules can forward to additional groups
            match collect_pages(|token| self.api.describe_rules(&listener.arn, token)).await {
                Ok(rules) => {
                    for rule in rules.iter().filter(|r| !r.is_default) {
                        for action in &rule.actions {
                            for tg in action.target_groups() {
                                forwards.push((tg.to_string(), ops::DESCRIBE_RULES));
                            }
                        }
                    }
                }
                Err(e) => tracing::warn!("Failed to list rules for {}: {}", listener.arn, e),
            }

            let mut seen = std::collections::HashSet::new();
            for (tg_arn, api_call) in forwards {
                if seen.insert(tg_arn.clone()) {
                    self.expand_target_group(&listener.arn, &tg_arn, api_call, graph, found)
                        .await;
                }
            }
        }
    }

    async fn expand_target_group(
        &self,
        listener_arn: &str,
        tg_arn: &str,
        api_call: &str,
        graph: &Graph,
        found: &mut Neighbors<'_>,
    ) {
        let evidence = Evidence::observed(api_call).with_field("TargetGroupArn", tg_arn);

        // Reached before through another listener or a container service
        if graph.has_node(tg_arn) {
            found.existing(listener_arn, tg_arn, relation::FORWARDS_TO, evidence);
            return;
        }

        let group = match self.api.describe_target_group(tg_arn).await {
            Ok(Some(group)) => group,
            Ok(None) => {
                tracing::warn!("Target group {} not found", tg_arn);
                found.chained(
                    listener_arn,
                    arn_node(tg_arn, ResourceType::TARGET_GROUP, ""),
                    relation::FORWARDS_TO,
                    evidence,
                );
                return;
            }
            Err(e) => {
                tracing::warn!("Failed to describe target group {}: {}", tg_arn, e);
                found.chained(
                    listener_arn,
                    arn_node(tg_arn, ResourceType::TARGET_GROUP, ""),
                    relation::FORWARDS_TO,
                    evidence,
                );
                return;
            }
        };

        let group_node = target_group_node(&group);
        if !found.chained(listener_arn, group_node.clone(), relation::FORWARDS_TO, evidence) {
            return;
        }

        let targets = match self.api.describe_target_health(&group.arn).await {
            Ok(targets) => targets,
            Err(e) => {
                tracing::warn!("Failed to read target health for {}: {}", group.arn, e);
                return;
            }
        };
        for target in &targets {
            let mut evidence = Evidence::observed(ops::DESCRIBE_TARGET_HEALTH)
                .with_field("TargetId", &target.target_id)
                .with_field("State", &target.state);
            if let Some(port) = target.port {
                evidence = evidence.with_field("Port", port.to_string());
            }
            found.chained(
                &group.arn,
                target_node(&group.target_type, target, &group_node),
                relation::ROUTES_TO_TARGET,
                evidence,
            );
        }
    }
}

#[async_trait]
impl Expander for LoadBalancerExpander {
    async fn expand(&self, node: &Node, graph: &Graph) -> Result<Vec<String>, ExpansionFailure> {
        let mut found = Neighbors::new(graph, &node.id);
        let arn = node.arn_or_id();

        let lb = match self.api.describe_load_balancer(arn).await {
            Ok(Some(lb)) => lb,
            Ok(None) => {
                return Err(found.fail(ApiError::not_found(ops::DESCRIBE_LOAD_BALANCERS, arn)));
            }
            Err(e) => return Err(found.fail(e)),
        };

        let mut enriched = load_balancer_node(&lb);
        enriched.id = node.id.clone();
        match self.api.describe_tags(&lb.arn).await {
            Ok(tags) => enriched.tags = tags,
            Err(e) => tracing::warn!("Failed to read tags for {}: {}", lb.arn, e),
        }
        graph.merge_node(enriched);

        for sg in &lb.security_groups {
            found.outgoing(
                local_node(sg, ResourceType::SECURITY_GROUP, node),
                relation::USES_SECURITY_GROUP,
                Evidence::observed(ops::DESCRIBE_LOAD_BALANCERS).with_field("SecurityGroups", sg),
            );
        }

        for zone in &lb.availability_zones {
            let Some(subnet) = &zone.subnet_id else {
                continue;
            };
            let subnet_node = local_node(subnet, ResourceType::SUBNET, node)
                .with_attribute("availabilityZone", zone.zone_name.as_str());
            found.outgoing(
                subnet_node,
                relation::USES_SUBNET,
                Evidence::observed(ops::DESCRIBE_LOAD_BALANCERS)
                    .with_field("AvailabilityZone", &zone.zone_name)
                    .with_field("SubnetId", subnet),
            );
        }

        self.expand_listeners(&lb, graph, &mut found).await;

        if !lb.dns_name.is_empty() {
            match self.dns.aliases_for(&lb.dns_name).await {
                Ok(aliases) => {
                    for alias in &aliases {
                        let evidence = Evidence::observed(ops::LIST_RESOURCE_RECORD_SETS)
                            .with_field("HostedZoneId", &alias.zone.id)
                            .with_field("AliasTarget", &lb.dns_name);
                        found.incoming(record_node(alias, node), relation::ALIASES_TO, evidence);
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to look up DNS aliases for {}: {}", lb.dns_name, e)
                }
            }
        }

        Ok(found.into_ids())
    }

    fn name(&self) -> &str {
        "load-balancer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::Page;
    use crate::cloud::api::{MockDnsApi, MockLoadBalancingApi};
    use crate::cloud::model::{
        Action, AliasTarget, AvailabilityZone, HostedZone, Listener, RecordSet, Rule,
    };
    use std::collections::BTreeMap;

    const LB_ARN: &str =
        "arn:aws:elasticloadbalancing:us-east-1:111111111111:loadbalancer/app/web/abc";
    const LISTENER_ARN: &str =
        "arn:aws:elasticloadbalancing:us-east-1:111111111111:listener/app/web/abc/l1";
    const TG_ARN: &str = "arn:aws:elasticloadbalancing:us-east-1:111111111111:targetgroup/web/t1";
    const RULE_TG_ARN: &str =
        "arn:aws:elasticloadbalancing:us-east-1:111111111111:targetgroup/api/t2";

    fn load_balancer() -> LoadBalancer {
        LoadBalancer {
            arn: LB_ARN.to_string(),
            name: "web".to_string(),
            dns_name: "web-1.us-east-1.elb.amazonaws.com".to_string(),
            lb_type: "application".to_string(),
            security_groups: vec!["sg-1".to_string()],
            availability_zones: vec![AvailabilityZone {
                zone_name: "us-east-1a".to_string(),
                subnet_id: Some("subnet-a".to_string()),
            }],
            ..Default::default()
        }
    }

    fn forward(tg: &str) -> Action {
        Action {
            action_type: "forward".to_string(),
            target_group_arn: Some(tg.to_string()),
            ..Default::default()
        }
    }

    fn quiet_dns() -> DnsAliasResolver {
        let mut dns = MockDnsApi::new();
        dns.expect_list_hosted_zones()
            .returning(|_| Ok(Page::last(Vec::new())));
        DnsAliasResolver::new(Arc::new(dns))
    }

    fn root(graph: &Graph) -> Node {
        let node = arn_node(LB_ARN, ResourceType::LOAD_BALANCER, "web");
        graph.add_node(node.clone());
        node
    }

    fn healthy_api() -> MockLoadBalancingApi {
        let mut api = MockLoadBalancingApi::new();
        api.expect_describe_load_balancer()
            .returning(|_| Ok(Some(load_balancer())));
        api.expect_describe_tags().returning(|_| {
            Ok(BTreeMap::from([("team".to_string(), "payments".to_string())]))
        });
        api.expect_describe_listeners().returning(|_, _| {
            Ok(Page::last(vec![Listener {
                arn: LISTENER_ARN.to_string(),
                load_balancer_arn: LB_ARN.to_string(),
                port: Some(443),
                protocol: "HTTPS".to_string(),
                default_actions: vec![forward(TG_ARN)],
            }]))
        });
        api.expect_describe_rules().returning(|_, _| {
            Ok(Page::last(vec![
                Rule {
                    arn: "rule-default".to_string(),
                    is_default: true,
                    actions: vec![forward(TG_ARN)],
                    ..Default::default()
                },
                Rule {
                    arn: "rule-api".to_string(),
                    priority: "10".to_string(),
                    actions: vec![forward(RULE_TG_ARN)],
                    ..Default::default()
                },
            ]))
        });
        api.expect_describe_target_group().returning(|arn| {
            Ok(Some(TargetGroup {
                arn: arn.to_string(),
                name: "group".to_string(),
                target_type: "instance".to_string(),
                ..Default::default()
            }))
        });
        api.expect_describe_target_health().returning(|arn| {
            Ok(vec![TargetHealth {
                target_id: format!("i-{}", &arn[arn.len() - 2..]),
                port: Some(8080),
                state: "healthy".to_string(),
            }])
        });
        api
    }

    #[tokio::test]
    async fn test_expands_full_chain() {
        let graph = Graph::new();
        let node = root(&graph);
        let expander = LoadBalancerExpander::new(Arc::new(healthy_api()), quiet_dns());

        let found = expander.expand(&node, &graph).await.unwrap();

        assert!(found.contains(&"sg-1".to_string()));
        assert!(found.contains(&"subnet-a".to_string()));
        assert!(graph.has_edge(LB_ARN, LISTENER_ARN, relation::HAS_LISTENER));
        assert!(graph.has_edge(LISTENER_ARN, TG_ARN, relation::FORWARDS_TO));
        assert!(graph.has_edge(LISTENER_ARN, RULE_TG_ARN, relation::FORWARDS_TO));
        assert!(graph.has_edge(TG_ARN, "i-t1", relation::ROUTES_TO_TARGET));
        assert_eq!(
            graph.get_node("i-t2").unwrap().resource_type,
            ResourceType::COMPUTE_INSTANCE
        );
        assert_eq!(graph.get_node(LB_ARN).unwrap().tags["team"], "payments");
        assert_eq!(graph.get_node(LISTENER_ARN).unwrap().name, "HTTPS:443");
    }

    #[tokio::test]
    async fn test_missing_load_balancer_fails() {
        let graph = Graph::new();
        let node = root(&graph);
        let mut api = MockLoadBalancingApi::new();
        api.expect_describe_load_balancer().returning(|_| Ok(None));
        let expander = LoadBalancerExpander::new(Arc::new(api), quiet_dns());

        let err = expander.expand(&node, &graph).await.unwrap_err();
        assert_eq!(err.operation(), ops::DESCRIBE_LOAD_BALANCERS);
        assert!(err.discovered.is_empty());
    }

    #[tokio::test]
    async fn test_denied_listeners_keep_network_neighbors() {
        let graph = Graph::new();
        let node = root(&graph);
        let mut api = MockLoadBalancingApi::new();
        api.expect_describe_load_balancer()
            .returning(|_| Ok(Some(load_balancer())));
        api.expect_describe_tags().returning(|_| Ok(BTreeMap::new()));
        api.expect_describe_listeners().returning(|_, _| {
            Err(ApiError::AccessDenied {
                operation: ops::DESCRIBE_LISTENERS.to_string(),
                message: "denied".to_string(),
            })
        });
        let expander = LoadBalancerExpander::new(Arc::new(api), quiet_dns());

        let found = expander.expand(&node, &graph).await.unwrap();
        assert_eq!(found, vec!["sg-1".to_string(), "subnet-a".to_string()]);
    }

    #[tokio::test]
    async fn test_alias_records_point_at_load_balancer() {
        let graph = Graph::new();
        let node = root(&graph);
        let mut dns = MockDnsApi::new();
        dns.expect_list_hosted_zones().returning(|_| {
            Ok(Page::last(vec![HostedZone {
                id: "Z1".to_string(),
                name: "example.com.".to_string(),
                private_zone: false,
            }]))
        });
        dns.expect_list_record_sets().returning(|_, _| {
            Ok(Page::last(vec![RecordSet {
                name: "www.example.com.".to_string(),
                record_type: "A".to_string(),
                set_identifier: None,
                alias_target: Some(AliasTarget {
                    dns_name: "dualstack.WEB-1.us-east-1.elb.amazonaws.com.".to_string(),
                    ..Default::default()
                }),
            }]))
        });
        let resolver = DnsAliasResolver::new(Arc::new(dns));
        let expander = LoadBalancerExpander::new(Arc::new(healthy_api()), resolver);

        expander.expand(&node, &graph).await.unwrap();

        let record_id = "route53:Z1:www.example.com.:A";
        assert!(graph.has_edge(record_id, LB_ARN, relation::ALIASES_TO));
        assert_eq!(graph.get_node(record_id).unwrap().name, "www.example.com");
    }
}
