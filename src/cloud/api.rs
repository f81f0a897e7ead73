//! Read-only control-plane API traits
//!
//! One trait per service. Paged operations take the token returned by the
//! previous page; `describe_*` operations return `Ok(None)` when the service
//! reports zero results.

use super::model::{
    ContainerService, DbCluster, DbInstance, EventInvokeConfig, EventSourceMapping, Function,
    HostedZone, Listener, LoadBalancer, RecordSet, Rule, ScalableTarget, ScalingPolicy,
    TargetGroup, TargetHealth, TaskDefinition,
};
use super::{ApiResult, Page};
use async_trait::async_trait;
use std::collections::BTreeMap;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoadBalancingApi: Send + Sync {
    async fn list_load_balancers(
        &self,
        next_token: Option<String>,
    ) -> ApiResult<Page<LoadBalancer>>;

    async fn describe_load_balancer(&self, arn: &str) -> ApiResult<Option<LoadBalancer>>;

    async fn describe_listeners(
        &self,
        load_balancer_arn: &str,
        next_token: Option<String>,
    ) -> ApiResult<Page<Listener>>;

    async fn describe_rules(
        &self,
        listener_arn: &str,
        next_token: Option<String>,
    ) -> ApiResult<Page<Rule>>;

    async fn describe_target_group(&self, arn: &str) -> ApiResult<Option<TargetGroup>>;

    async fn describe_target_health(&self, target_group_arn: &str) -> ApiResult<Vec<TargetHealth>>;

    async fn describe_tags(&self, arn: &str) -> ApiResult<BTreeMap<String, String>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContainerApi: Send + Sync {
    async fn describe_service(
        &self,
        cluster: &str,
        service: &str,
    ) -> ApiResult<Option<ContainerService>>;

    async fn describe_task_definition(
        &self,
        task_definition: &str,
    ) -> ApiResult<Option<TaskDefinition>>;

    /// Cluster ARNs
    async fn list_clusters(&self, next_token: Option<String>) -> ApiResult<Page<String>>;

    /// Service ARNs in one cluster
    async fn list_services(
        &self,
        cluster: &str,
        next_token: Option<String>,
    ) -> ApiResult<Page<String>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScalingApi: Send + Sync {
    async fn describe_scalable_targets(&self, resource_id: &str) -> ApiResult<Vec<ScalableTarget>>;

    async fn describe_scaling_policies(
        &self,
        resource_id: &str,
        next_token: Option<String>,
    ) -> ApiResult<Page<ScalingPolicy>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FunctionApi: Send + Sync {
    async fn get_function(&self, name_or_arn: &str) -> ApiResult<Option<Function>>;

    async fn list_functions(&self, next_token: Option<String>) -> ApiResult<Page<Function>>;

    async fn list_event_source_mappings(
        &self,
        function: &str,
        next_token: Option<String>,
    ) -> ApiResult<Page<EventSourceMapping>>;

    async fn get_event_invoke_config(&self, function: &str) -> ApiResult<Option<EventInvokeConfig>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DatabaseApi: Send + Sync {
    async fn describe_db_instance(&self, identifier: &str) -> ApiResult<Option<DbInstance>>;

    async fn describe_db_cluster(&self, identifier: &str) -> ApiResult<Option<DbCluster>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DnsApi: Send + Sync {
    async fn list_hosted_zones(&self, next_token: Option<String>) -> ApiResult<Page<HostedZone>>;

    async fn list_record_sets(
        &self,
        zone_id: &str,
        next_token: Option<String>,
    ) -> ApiResult<Page<RecordSet>>;
}
