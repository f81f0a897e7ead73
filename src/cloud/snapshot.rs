//! File-backed control-plane client
//!
//! Serves every API trait from an account snapshot (YAML or JSON). Used for
//! offline runs and as the fixture backend for integration tests.

use super::api::{ContainerApi, DatabaseApi, DnsApi, FunctionApi, LoadBalancingApi, ScalingApi};
use super::model::{
    ContainerService, DbCluster, DbInstance, EventInvokeConfig, EventSourceMapping, Function,
    HostedZone, Listener, LoadBalancer, RecordSet, Rule, ScalableTarget, ScalingPolicy,
    TargetGroup, TargetHealth, TaskDefinition,
};
use super::{ApiError, ApiResult, Page, ops};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

const DEFAULT_PAGE_SIZE: usize = 50;

/// Everything known about one account
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountSnapshot {
    /// Items returned per page by listing operations
    pub page_size: Option<usize>,
    /// Operations that fail with access denied
    pub denied_operations: BTreeSet<String>,

    pub load_balancers: Vec<LoadBalancer>,
    pub listeners: Vec<Listener>,
    pub rules: Vec<Rule>,
    pub target_groups: Vec<TargetGroup>,
    /// Keyed by target group ARN
    pub target_health: BTreeMap<String, Vec<TargetHealth>>,
    /// Keyed by resource ARN
    pub tags: BTreeMap<String, BTreeMap<String, String>>,

    /// Cluster ARNs without any service
    pub clusters: Vec<String>,
    pub services: Vec<ContainerService>,
    pub task_definitions: Vec<TaskDefinition>,
    pub scalable_targets: Vec<ScalableTarget>,
    pub scaling_policies: Vec<ScalingPolicy>,

    pub functions: Vec<Function>,
    pub event_source_mappings: Vec<EventSourceMapping>,
    pub event_invoke_configs: Vec<EventInvokeConfig>,

    pub db_instances: Vec<DbInstance>,
    pub db_clusters: Vec<DbCluster>,

    pub hosted_zones: Vec<ZoneSnapshot>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ZoneSnapshot {
    #[serde(flatten)]
    pub zone: HostedZone,
    pub record_sets: Vec<RecordSet>,
}

/// API client backed by an [`AccountSnapshot`]
#[derive(Debug, Clone)]
pub struct SnapshotApi {
    snapshot: AccountSnapshot,
    page_size: usize,
}

impl SnapshotApi {
    pub fn new(snapshot: AccountSnapshot) -> Self {
        let page_size = snapshot.page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
        Self {
            snapshot,
            page_size,
        }
    }

    /// Load a snapshot file; `.json` files are parsed as JSON, anything else as YAML
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read account snapshot: {}", path.display()))?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let snapshot: AccountSnapshot = if is_json {
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse account snapshot: {}", path.display()))?
        } else {
            serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse account snapshot: {}", path.display()))?
        };

        tracing::debug!(
            "Loaded account snapshot {} ({} load balancers, {} services, {} functions, {} databases)",
            path.display(),
            snapshot.load_balancers.len(),
            snapshot.services.len(),
            snapshot.functions.len(),
            snapshot.db_instances.len() + snapshot.db_clusters.len()
        );

        Ok(Self::new(snapshot))
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn snapshot(&self) -> &AccountSnapshot {
        &self.snapshot
    }

    fn guard(&self, operation: &str) -> ApiResult<()> {
        if self.snapshot.denied_operations.contains(operation) {
            return Err(ApiError::AccessDenied {
                operation: operation.to_string(),
                message: "not authorized by snapshot policy".to_string(),
            });
        }
        Ok(())
    }

    /// Offset-token pagination
    fn page<T: Clone>(
        &self,
        operation: &str,
        items: Vec<T>,
        next_token: Option<String>,
    ) -> ApiResult<Page<T>> {
        let start = match next_token {
            Some(token) => token.parse::<usize>().map_err(|_| ApiError::Service {
                operation: operation.to_string(),
                message: format!("invalid pagination token '{}'", token),
            })?,
            None => 0,
        };
        let end = (start + self.page_size).min(items.len());
        let page: Vec<T> = items.get(start..end).map(<[T]>::to_vec).unwrap_or_default();
        Ok(Page {
            items: page,
            next_token: (end < items.len()).then(|| end.to_string()),
        })
    }
}

/// Final path segment of an ARN, or the input itself
fn tail(id: &str) -> &str {
    id.rsplit('/').next().unwrap_or(id)
}

fn function_matches(function_arn: &str, function: &str) -> bool {
    function_arn == function || function_arn.ends_with(&format!(":function:{}", function))
}

#[async_trait]
impl LoadBalancingApi for SnapshotApi {
    async fn list_load_balancers(
        &self,
        next_token: Option<String>,
    ) -> ApiResult<Page<LoadBalancer>> {
        self.guard(ops::DESCRIBE_LOAD_BALANCERS)?;
        self.page(
            ops::DESCRIBE_LOAD_BALANCERS,
            self.snapshot.load_balancers.clone(),
            next_token,
        )
    }

    async fn describe_load_balancer(&self, arn: &str) -> ApiResult<Option<LoadBalancer>> {
        self.guard(ops::DESCRIBE_LOAD_BALANCERS)?;
        Ok(self
            .snapshot
            .load_balancers
            .iter()
            .find(|lb| lb.arn == arn)
            .cloned())
    }

    async fn describe_listeners(
        &self,
        load_balancer_arn: &str,
        next_token: Option<String>,
    ) -> ApiResult<Page<Listener>> {
        self.guard(ops::DESCRIBE_LISTENERS)?;
        let listeners = self
            .snapshot
            .listeners
            .iter()
            .filter(|l| l.load_balancer_arn == load_balancer_arn)
            .cloned()
            .collect();
        self.page(ops::DESCRIBE_LISTENERS, listeners, next_token)
    }

    async fn describe_rules(
        &self,
        listener_arn: &str,
        next_token: Option<String>,
    ) -> ApiResult<Page<Rule>> {
        self.guard(ops::DESCRIBE_RULES)?;
        let rules = self
            .snapshot
            .rules
            .iter()
            .filter(|r| r.listener_arn == listener_arn)
            .cloned()
            .collect();
        self.page(ops::DESCRIBE_RULES, rules, next_token)
    }

    async fn describe_target_group(&self, arn: &str) -> ApiResult<Option<TargetGroup>> {
        self.guard(ops::DESCRIBE_TARGET_GROUPS)?;
        Ok(self
            .snapshot
            .target_groups
            .iter()
            .find(|tg| tg.arn == arn)
            .cloned())
    }

    async fn describe_target_health(&self, target_group_arn: &str) -> ApiResult<Vec<TargetHealth>> {
        self.guard(ops::DESCRIBE_TARGET_HEALTH)?;
        Ok(self
            .snapshot
            .target_health
            .get(target_group_arn)
            .cloned()
            .unwrap_or_default())
    }

    async fn describe_tags(&self, arn: &str) -> ApiResult<BTreeMap<String, String>> {
        self.guard(ops::DESCRIBE_TAGS)?;
        Ok(self.snapshot.tags.get(arn).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl ContainerApi for SnapshotApi {
    async fn describe_service(
        &self,
        cluster: &str,
        service: &str,
    ) -> ApiResult<Option<ContainerService>> {
        self.guard(ops::DESCRIBE_SERVICES)?;
        Ok(self
            .snapshot
            .services
            .iter()
            .find(|s| {
                (s.cluster_arn == cluster || tail(&s.cluster_arn) == cluster)
                    && (s.arn == service || s.name == service)
            })
            .cloned())
    }

    async fn describe_task_definition(
        &self,
        task_definition: &str,
    ) -> ApiResult<Option<TaskDefinition>> {
        self.guard(ops::DESCRIBE_TASK_DEFINITION)?;
        let defs = &self.snapshot.task_definitions;
        let exact = defs.iter().find(|td| {
            td.arn == task_definition
                || format!("{}:{}", td.family, td.revision) == task_definition
        });
        // A bare family name resolves to the latest revision
        let latest = || {
            defs.iter()
                .filter(|td| td.family == task_definition)
                .max_by_key(|td| td.revision)
        };
        Ok(exact.or_else(latest).cloned())
    }

    async fn list_clusters(&self, next_token: Option<String>) -> ApiResult<Page<String>> {
        self.guard(ops::LIST_CLUSTERS)?;
        let clusters: BTreeSet<String> = self
            .snapshot
            .clusters
            .iter()
            .cloned()
            .chain(self.snapshot.services.iter().map(|s| s.cluster_arn.clone()))
            .collect();
        self.page(ops::LIST_CLUSTERS, clusters.into_iter().collect(), next_token)
    }

    async fn list_services(
        &self,
        cluster: &str,
        next_token: Option<String>,
    ) -> ApiResult<Page<String>> {
        self.guard(ops::LIST_SERVICES)?;
        let services = self
            .snapshot
            .services
            .iter()
            .filter(|s| s.cluster_arn == cluster || tail(&s.cluster_arn) == cluster)
            .map(|s| s.arn.clone())
            .collect();
        self.page(ops::LIST_SERVICES, services, next_token)
    }
}

#[async_trait]
impl ScalingApi for SnapshotApi {
    async fn describe_scalable_targets(&self, resource_id: &str) -> ApiResult<Vec<ScalableTarget>> {
        self.guard(ops::DESCRIBE_SCALABLE_TARGETS)?;
        Ok(self
            .snapshot
            .scalable_targets
            .iter()
            .filter(|t| t.resource_id == resource_id)
            .cloned()
            .collect())
    }

    async fn describe_scaling_policies(
        &self,
        resource_id: &str,
        next_token: Option<String>,
    ) -> ApiResult<Page<ScalingPolicy>> {
        self.guard(ops::DESCRIBE_SCALING_POLICIES)?;
        let policies = self
            .snapshot
            .scaling_policies
            .iter()
            .filter(|p| p.resource_id == resource_id)
            .cloned()
            .collect();
        self.page(ops::DESCRIBE_SCALING_POLICIES, policies, next_token)
    }
}

#[async_trait]
impl FunctionApi for SnapshotApi {
    async fn get_function(&self, name_or_arn: &str) -> ApiResult<Option<Function>> {
        self.guard(ops::GET_FUNCTION)?;
        Ok(self
            .snapshot
            .functions
            .iter()
            .find(|f| {
                f.name == name_or_arn
                    || f.arn == name_or_arn
                    || name_or_arn.starts_with(&format!("{}:", f.arn))
            })
            .cloned())
    }

    async fn list_functions(&self, next_token: Option<String>) -> ApiResult<Page<Function>> {
        self.guard(ops::LIST_FUNCTIONS)?;
        self.page(ops::LIST_FUNCTIONS, self.snapshot.functions.clone(), next_token)
    }

    async fn list_event_source_mappings(
        &self,
        function: &str,
        next_token: Option<String>,
    ) -> ApiResult<Page<EventSourceMapping>> {
        self.guard(ops::LIST_EVENT_SOURCE_MAPPINGS)?;
        let mappings = self
            .snapshot
            .event_source_mappings
            .iter()
            .filter(|m| function_matches(&m.function_arn, function))
            .cloned()
            .collect();
        self.page(ops::LIST_EVENT_SOURCE_MAPPINGS, mappings, next_token)
    }

    async fn get_event_invoke_config(
        &self,
        function: &str,
    ) -> ApiResult<Option<EventInvokeConfig>> {
        self.guard(ops::GET_FUNCTION_EVENT_INVOKE_CONFIG)?;
        Ok(self
            .snapshot
            .event_invoke_configs
            .iter()
            .find(|c| function_matches(&c.function_arn, function))
            .cloned())
    }
}

#[async_trait]
impl DatabaseApi for SnapshotApi {
    async fn describe_db_instance(&self, identifier: &str) -> ApiResult<Option<DbInstance>> {
        self.guard(ops::DESCRIBE_DB_INSTANCES)?;
        Ok(self
            .snapshot
            .db_instances
            .iter()
            .find(|db| db.identifier == identifier || db.arn == identifier)
            .cloned())
    }

    async fn describe_db_cluster(&self, identifier: &str) -> ApiResult<Option<DbCluster>> {
        self.guard(ops::DESCRIBE_DB_CLUSTERS)?;
        Ok(self
            .snapshot
            .db_clusters
            .iter()
            .find(|c| c.identifier == identifier || c.arn == identifier)
            .cloned())
    }
}

#[async_trait]
impl DnsApi for SnapshotApi {
    async fn list_hosted_zones(&self, next_token: Option<String>) -> ApiResult<Page<HostedZone>> {
        self.guard(ops::LIST_HOSTED_ZONES)?;
        let zones = self
            .snapshot
            .hosted_zones
            .iter()
            .map(|z| z.zone.clone())
            .collect();
        self.page(ops::LIST_HOSTED_ZONES, zones, next_token)
    }

    async fn list_record_sets(
        &self,
        zone_id: &str,
        next_token: Option<String>,
    ) -> ApiResult<Page<RecordSet>> {
        self.guard(ops::LIST_RESOURCE_RECORD_SETS)?;
        let zone = self
            .snapshot
            .hosted_zones
            .iter()
            .find(|z| z.zone.id == zone_id)
            .ok_or_else(|| ApiError::Service {
                operation: ops::LIST_RESOURCE_RECORD_SETS.to_string(),
                message: format!("no such hosted zone: {}", zone_id),
            })?;
        self.page(
            ops::LIST_RESOURCE_RECORD_SETS,
            zone.record_sets.clone(),
            next_token,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::collect_pages;
    use std::io::Write;

    fn snapshot_yaml() -> &'static str {
        r#"
pageSize: 1
deniedOperations: [DescribeRules]
loadBalancers:
  - arn: arn:aws:elasticloadbalancing:us-east-1:1:loadbalancer/app/web/abc
    name: web
    dnsName: web-123.us-east-1.elb.amazonaws.com
  - arn: arn:aws:elasticloadbalancing:us-east-1:1:loadbalancer/app/api/def
    name: api
services:
  - arn: arn:aws:ecs:us-east-1:1:service/prod/checkout
    name: checkout
    clusterArn: arn:aws:ecs:us-east-1:1:cluster/prod
    taskDefinition: checkout:3
taskDefinitions:
  - arn: arn:aws:ecs:us-east-1:1:task-definition/checkout:2
    family: checkout
    revision: 2
  - arn: arn:aws:ecs:us-east-1:1:task-definition/checkout:3
    family: checkout
    revision: 3
hostedZones:
  - id: Z1
    name: example.com.
    recordSets:
      - name: www.example.com.
        type: A
        aliasTarget:
          dnsName: web-123.us-east-1.elb.amazonaws.com.
"#
    }

    fn load() -> SnapshotApi {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(snapshot_yaml().as_bytes()).unwrap();
        SnapshotApi::load(file.path()).unwrap()
    }

    #[tokio::test]
    async fn test_paginates_with_page_size() {
        let api = load();
        let first = api.list_load_balancers(None).await.unwrap();
        assert_eq!(first.items.len(), 1);
        assert_eq!(first.next_token.as_deref(), Some("1"));

        let all = collect_pages(|token| api.list_load_balancers(token)).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_denied_operation() {
        let api = load();
        let err = api.describe_rules("listener", None).await.unwrap_err();
        assert!(matches!(err, ApiError::AccessDenied { .. }));
    }

    #[tokio::test]
    async fn test_service_lookup_by_cluster_name() {
        let api = load();
        let svc = api.describe_service("prod", "checkout").await.unwrap();
        assert!(svc.is_some());
        assert!(api.describe_service("staging", "checkout").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_task_definition_family_resolves_latest() {
        let api = load();
        let td = api.describe_task_definition("checkout").await.unwrap().unwrap();
        assert_eq!(td.revision, 3);
        let td = api.describe_task_definition("checkout:2").await.unwrap().unwrap();
        assert_eq!(td.revision, 2);
    }

    #[tokio::test]
    async fn test_zone_record_sets() {
        let api = load();
        let zones = api.list_hosted_zones(None).await.unwrap();
        assert_eq!(zones.items[0].name, "example.com.");
        let records = api.list_record_sets("Z1", None).await.unwrap();
        assert_eq!(records.items[0].record_type, "A");
    }
}
