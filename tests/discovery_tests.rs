//! End-to-end discovery tests
//!
//! Traversal semantics are checked with a table-driven expander; service
//! behaviour is checked against the demo account snapshot.

use async_trait::async_trait;
use blast_radius::cloud::{AccountSnapshot, CloudClients, SnapshotApi};
use blast_radius::discover::{
    Discoverer, DiscoveryError, DiscoveryOptions, Expander, ExpanderRegistry, ExpansionFailure,
    StopReason,
};
use blast_radius::graph::{Edge, Evidence, Graph, Node, ResourceType, relation};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const TEST_TYPE: ResourceType = ResourceType::known("TestResource");

const LB_ARN: &str =
    "arn:aws:elasticloadbalancing:us-east-1:111111111111:loadbalancer/app/web/50dc6c495c0c9188";
const SERVICE_ARN: &str = "arn:aws:ecs:us-east-1:111111111111:service/prod/checkout";
const FUNCTION_ARN: &str = "arn:aws:lambda:us-east-1:111111111111:function:order-events";
const DB_ARN: &str = "arn:aws:rds:us-east-1:111111111111:db:orders-db";

/// Expands nodes from a fixed adjacency table
struct TableExpander {
    edges: HashMap<&'static str, Vec<&'static str>>,
    delay: Option<Duration>,
}

impl TableExpander {
    fn new(edges: &[(&'static str, &'static str)]) -> Self {
        let mut table: HashMap<&'static str, Vec<&'static str>> = HashMap::new();
        for &(source, target) in edges {
            table.entry(source).or_default().push(target);
        }
        Self {
            edges: table,
            delay: None,
        }
    }
}

#[async_trait]
impl Expander for TableExpander {
    async fn expand(&self, node: &Node, graph: &Graph) -> Result<Vec<String>, ExpansionFailure> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mut found = Vec::new();
        for target in self.edges.get(node.id.as_str()).into_iter().flatten() {
            if !graph.ensure_node(Node::new(*target, TEST_TYPE, *target)).is_present() {
                continue;
            }
            graph.add_edge_if_absent(Edge::new(
                node.id.as_str(),
                *target,
                "links-to",
                Evidence::observed("Table"),
            ));
            found.push(target.to_string());
        }
        Ok(found)
    }

    fn name(&self) -> &str {
        "table"
    }
}

fn empty_clients() -> CloudClients {
    CloudClients::from_shared(Arc::new(SnapshotApi::new(AccountSnapshot::default())))
}

fn table_discoverer(expander: TableExpander, options: DiscoveryOptions) -> Discoverer {
    let mut registry = ExpanderRegistry::new();
    registry.register(TEST_TYPE, Arc::new(expander));
    Discoverer::with_registry(empty_clients(), registry, options)
}

fn demo_clients() -> CloudClients {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("snapshots/demo.yaml");
    CloudClients::from_shared(Arc::new(SnapshotApi::load(&path).unwrap()))
}

fn demo_snapshot() -> AccountSnapshot {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("snapshots/demo.yaml");
    SnapshotApi::load(&path).unwrap().snapshot().clone()
}

fn heuristics(tokens: &[&str]) -> BTreeSet<String> {
    tokens.iter().map(|t| t.to_string()).collect()
}

#[tokio::test]
async fn test_diamond_levels() {
    let expander = TableExpander::new(&[("A", "B"), ("A", "C"), ("B", "D"), ("C", "D")]);
    let options = DiscoveryOptions {
        max_depth: 3,
        ..Default::default()
    };
    let discovery = table_discoverer(expander, options)
        .traverse(Node::new("A", TEST_TYPE, "A"))
        .await
        .unwrap();

    assert_eq!(
        discovery.levels,
        vec![vec!["A".to_string()], vec!["B".to_string(), "C".to_string()], vec!["D".to_string()]]
    );
    assert_eq!(discovery.graph.node_count(), 4);
    assert_eq!(discovery.graph.edge_count(), 4);
    assert_eq!(discovery.stop, StopReason::Exhausted);
}

#[tokio::test]
async fn test_single_node_cap() {
    for max_depth in [0, 1, 5] {
        let expander = TableExpander::new(&[("A", "B"), ("B", "C")]);
        let options = DiscoveryOptions {
            max_depth,
            max_nodes: 1,
            ..Default::default()
        };
        let discovery = table_discoverer(expander, options)
            .traverse(Node::new("A", TEST_TYPE, "A"))
            .await
            .unwrap();

        assert_eq!(discovery.graph.node_count(), 1);
        assert_eq!(discovery.graph.edge_count(), 0);
        assert_eq!(discovery.stop, StopReason::NodeLimit);
    }
}

#[tokio::test]
async fn test_node_cap_never_exceeded() {
    let edges: Vec<(&'static str, &'static str)> = vec![
        ("hub", "n1"),
        ("hub", "n2"),
        ("hub", "n3"),
        ("hub", "n4"),
        ("hub", "n5"),
        ("n1", "m1"),
        ("n2", "m2"),
    ];
    let options = DiscoveryOptions {
        max_depth: 4,
        max_nodes: 3,
        ..Default::default()
    };
    let discovery = table_discoverer(TableExpander::new(&edges), options)
        .traverse(Node::new("hub", TEST_TYPE, "hub"))
        .await
        .unwrap();

    assert!(discovery.graph.node_count() <= 3);
    assert_eq!(discovery.stop, StopReason::NodeLimit);
}

#[tokio::test]
async fn test_cycle_visited_once() {
    let expander =
        TableExpander::new(&[("a", "b"), ("b", "c"), ("c", "d"), ("d", "e"), ("e", "a")]);
    let options = DiscoveryOptions {
        max_depth: 10,
        ..Default::default()
    };
    let discovery = table_discoverer(expander, options)
        .traverse(Node::new("c", TEST_TYPE, "c"))
        .await
        .unwrap();

    let expanded: Vec<&String> = discovery.levels.iter().flatten().collect();
    assert_eq!(expanded.len(), 5);
    assert_eq!(discovery.graph.node_count(), 5);
    assert_eq!(discovery.stop, StopReason::Exhausted);
}

#[tokio::test]
async fn test_depth_limit_stops_before_next_level() {
    let expander = TableExpander::new(&[("a", "b"), ("b", "c"), ("c", "d")]);
    let options = DiscoveryOptions {
        max_depth: 1,
        ..Default::default()
    };
    let discovery = table_discoverer(expander, options)
        .traverse(Node::new("a", TEST_TYPE, "a"))
        .await
        .unwrap();

    // b is expanded at depth 1 and discovers c, which is never expanded
    assert_eq!(discovery.levels.len(), 2);
    assert!(discovery.graph.has_node("c"));
    assert!(!discovery.graph.has_node("d"));
    assert_eq!(discovery.stop, StopReason::DepthLimit);
}

#[tokio::test]
async fn test_every_level_reached_from_previous() {
    let expander =
        TableExpander::new(&[("r", "x"), ("r", "y"), ("x", "z"), ("y", "z"), ("z", "w")]);
    let options = DiscoveryOptions {
        max_depth: 5,
        concurrency: 2,
        ..Default::default()
    };
    let discovery = table_discoverer(expander, options)
        .traverse(Node::new("r", TEST_TYPE, "r"))
        .await
        .unwrap();

    for pair in discovery.levels.windows(2) {
        for id in &pair[1] {
            assert!(
                discovery
                    .graph
                    .edges_into(id)
                    .iter()
                    .any(|edge| pair[0].contains(&edge.source)),
                "{} was not discovered by the previous level",
                id
            );
        }
    }
}

#[tokio::test]
async fn test_timeout_returns_partial_graph() {
    let mut expander = TableExpander::new(&[("a", "b"), ("b", "c")]);
    expander.delay = Some(Duration::from_millis(200));
    let options = DiscoveryOptions {
        max_depth: 5,
        timeout: Some(Duration::from_millis(50)),
        ..Default::default()
    };
    let discovery = table_discoverer(expander, options)
        .traverse(Node::new("a", TEST_TYPE, "a"))
        .await
        .unwrap();

    assert_eq!(discovery.stop, StopReason::TimedOut);
    assert_eq!(discovery.graph.node_count(), 1);
}

#[tokio::test]
async fn test_invalid_options_rejected_before_any_call() {
    let options = DiscoveryOptions {
        concurrency: 0,
        ..Default::default()
    };
    let discoverer = Discoverer::new(empty_clients(), options);
    let err = discoverer.discover("anything").await.unwrap_err();
    assert!(matches!(err, DiscoveryError::InvalidOptions(_)));
}

#[tokio::test]
async fn test_load_balancer_blast_radius() {
    let discoverer = Discoverer::new(demo_clients(), DiscoveryOptions::default());
    let discovery = discoverer.discover("web").await.unwrap();
    let graph = &discovery.graph;

    assert_eq!(discovery.root_id, LB_ARN);
    assert!(discovery.failures.is_empty());
    assert_eq!(discovery.stop, StopReason::Exhausted);

    // sg, 2 subnets, listener, 2 target groups, 2 ip targets, 1 DNS record
    assert_eq!(graph.node_count(), 10);
    assert_eq!(graph.edge_count(), 9);

    let root = graph.get_node(LB_ARN).unwrap();
    assert_eq!(root.tags.get("team").map(String::as_str), Some("payments"));
    assert!(graph.has_edge(LB_ARN, "sg-0web", relation::USES_SECURITY_GROUP));
    assert!(graph.has_edge(
        "arn:aws:elasticloadbalancing:us-east-1:111111111111:targetgroup/checkout/73e2d6bc24d8a067",
        "10.0.1.15",
        relation::ROUTES_TO_TARGET,
    ));

    let record = "route53:Z0123456789ABCDEFGHIJ:www.example.com.:A";
    assert!(graph.has_edge(record, LB_ARN, relation::ALIASES_TO));
    assert_eq!(
        graph.get_node(record).unwrap().resource_type,
        ResourceType::DNS_RECORD
    );
}

#[tokio::test]
async fn test_service_blast_radius() {
    let discoverer = Discoverer::new(demo_clients(), DiscoveryOptions::default());
    let discovery = discoverer.discover("prod/checkout").await.unwrap();
    let graph = &discovery.graph;

    assert_eq!(discovery.root_id, SERVICE_ARN);
    assert!(graph.has_edge(
        SERVICE_ARN,
        "arn:aws:ecs:us-east-1:111111111111:cluster/prod",
        relation::RUNS_IN
    ));
    assert!(graph.has_edge(
        "arn:aws:ecs:us-east-1:111111111111:task-definition/checkout:7",
        "arn:aws:iam::111111111111:role/checkout-task",
        relation::USES_TASK_ROLE
    ));
    assert!(graph.has_edge(SERVICE_ARN, "subnet-0b", relation::RUNS_IN_SUBNET));
    let policies: Vec<Node> = graph
        .nodes()
        .into_iter()
        .filter(|n| n.resource_type == ResourceType::SCALING_POLICY)
        .collect();
    assert_eq!(policies.len(), 1);
    assert_eq!(policies[0].name, "cpu-target");
}

#[tokio::test]
async fn test_function_blast_radius() {
    let discoverer = Discoverer::new(demo_clients(), DiscoveryOptions::default());
    let discovery = discoverer.discover(FUNCTION_ARN).await.unwrap();
    let graph = &discovery.graph;

    let queue = "arn:aws:sqs:us-east-1:111111111111:orders";
    assert!(graph.has_edge(queue, FUNCTION_ARN, relation::TRIGGERS));
    assert_eq!(graph.get_node(queue).unwrap().resource_type, ResourceType::QUEUE);
    assert!(graph.has_edge(
        FUNCTION_ARN,
        "arn:aws:sqs:us-east-1:111111111111:order-events-dlq",
        relation::SENDS_FAILURES_TO
    ));
    assert!(graph.has_edge(
        FUNCTION_ARN,
        "arn:aws:sns:us-east-1:111111111111:order-alerts",
        relation::SENDS_FAILURES_TO
    ));
}

#[tokio::test]
async fn test_database_without_heuristics_has_no_consumers() {
    let discoverer = Discoverer::new(demo_clients(), DiscoveryOptions::default());
    let discovery = discoverer.discover("orders-db").await.unwrap();

    assert_eq!(discovery.root_id, DB_ARN);
    assert!(!discovery.graph.has_node(FUNCTION_ARN));
    assert!(discovery.graph.edges().iter().all(|e| !e.evidence.is_heuristic()));
    assert!(discovery.graph.has_node("arn:aws:rds:us-east-1:111111111111:subgrp:orders-private"));
}

#[tokio::test]
async fn test_database_heuristic_finds_consumers() {
    let options = DiscoveryOptions {
        heuristics: heuristics(&["rds-endpoint"]),
        ..Default::default()
    };
    let discoverer = Discoverer::new(demo_clients(), options);
    let discovery = discoverer.discover("orders-db").await.unwrap();
    let graph = &discovery.graph;

    let consumers: Vec<Edge> = graph
        .edges_into(DB_ARN)
        .into_iter()
        .filter(|e| e.relation == relation::CONNECTS_TO)
        .collect();
    let sources: BTreeSet<&str> = consumers.iter().map(|e| e.source.as_str()).collect();
    assert_eq!(sources, BTreeSet::from([FUNCTION_ARN, SERVICE_ARN]));
    assert!(consumers.iter().all(|e| e.evidence.is_heuristic()));

    // Consumers are expanded on the next level
    assert!(graph.has_edge(
        FUNCTION_ARN,
        "arn:aws:iam::111111111111:role/order-events",
        relation::USES_EXECUTION_ROLE
    ));
}

#[tokio::test]
async fn test_unknown_heuristic_ignored() {
    let options = DiscoveryOptions {
        heuristics: heuristics(&["guess-everything"]),
        ..Default::default()
    };
    let discovery = Discoverer::new(demo_clients(), options)
        .discover("orders-db")
        .await
        .unwrap();
    assert!(!discovery.graph.has_node(FUNCTION_ARN));
}

#[tokio::test]
async fn test_denied_secondary_calls_are_absorbed() {
    let mut snapshot = demo_snapshot();
    snapshot.denied_operations = BTreeSet::from([
        "DescribeTargetHealth".to_string(),
        "ListHostedZones".to_string(),
        "DescribeTags".to_string(),
    ]);
    let clients = CloudClients::from_shared(Arc::new(SnapshotApi::new(snapshot)));
    let discovery = Discoverer::new(clients, DiscoveryOptions::default())
        .discover("web")
        .await
        .unwrap();

    assert!(discovery.failures.is_empty());
    // Listener and target groups still found, targets and DNS record are not
    assert_eq!(discovery.graph.node_count(), 7);
}

#[tokio::test]
async fn test_denied_required_call_is_counted() {
    let mut snapshot = demo_snapshot();
    snapshot.denied_operations = BTreeSet::from(["GetFunction".to_string()]);
    let clients = CloudClients::from_shared(Arc::new(SnapshotApi::new(snapshot)));
    let discovery = Discoverer::new(clients, DiscoveryOptions::default())
        .discover(FUNCTION_ARN)
        .await
        .unwrap();

    assert_eq!(discovery.failures.len(), 1);
    assert_eq!(discovery.failures[0].node_id, FUNCTION_ARN);
    assert_eq!(discovery.graph.node_count(), 1);
}

#[tokio::test]
async fn test_unknown_root_is_fatal() {
    let err = Discoverer::new(demo_clients(), DiscoveryOptions::default())
        .discover("does-not-exist")
        .await
        .unwrap_err();
    assert!(matches!(err, DiscoveryError::NotFound(_)));
}
