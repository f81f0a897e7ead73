//! Live control-plane client
//!
//! Implements every API trait on the AWS SDK. Credentials and region come
//! from the standard provider chain (environment, shared config files, SSO,
//! instance metadata), optionally pinned to a named profile and region.

use super::api::{ContainerApi, DatabaseApi, DnsApi, FunctionApi, LoadBalancingApi, ScalingApi};
use super::model::{
    Action, AliasTarget, AvailabilityZone, AwsVpcConfiguration, ContainerDefinition,
    ContainerService, DbCluster, DbClusterMember, DbEndpoint, DbInstance, DbSubnetGroup,
    EventInvokeConfig, EventSourceMapping, Function, FunctionVpcConfig, HostedZone, Listener,
    LoadBalancer, RecordSet, Rule, ScalableTarget, ScalingPolicy, ServiceLoadBalancer,
    TargetGroup, TargetHealth, TaskDefinition,
};
use super::{ApiError, ApiResult, Page, collect_pages, ops};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_applicationautoscaling::types::ServiceNamespace;
use aws_sdk_route53::types::RrType;
use aws_smithy_types::error::display::DisplayErrorContext;
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Error codes that mean "no such resource" rather than a failed call
const MISSING_CODES: &[&str] = &[
    "LoadBalancerNotFound",
    "TargetGroupNotFound",
    "ClusterNotFoundException",
    "ServiceNotFoundException",
    "ResourceNotFoundException",
    "DBInstanceNotFound",
    "DBInstanceNotFoundFault",
    "DBClusterNotFoundFault",
    "NoSuchHostedZone",
];

const DENIED_CODES: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "UnauthorizedOperation",
    "UnauthorizedException",
    "NotAuthorized",
];

/// SDK accessors return `&str` for required members and `Option<&str>`
/// otherwise; enums expose the wire value through `AsRef<str>`.
trait Text {
    fn into_text(self) -> String;
}

impl<T: AsRef<str> + ?Sized> Text for &T {
    fn into_text(self) -> String {
        self.as_ref().to_string()
    }
}

impl<T: AsRef<str> + ?Sized> Text for Option<&T> {
    fn into_text(self) -> String {
        self.map(|v| v.as_ref().to_string()).unwrap_or_default()
    }
}

trait Number {
    fn into_number(self) -> Option<i64>;
}

impl Number for i32 {
    fn into_number(self) -> Option<i64> {
        Some(i64::from(self))
    }
}

impl Number for Option<i32> {
    fn into_number(self) -> Option<i64> {
        self.map(i64::from)
    }
}

trait Flag {
    fn into_flag(self) -> bool;
}

impl Flag for bool {
    fn into_flag(self) -> bool {
        self
    }
}

impl Flag for Option<bool> {
    fn into_flag(self) -> bool {
        self.unwrap_or_default()
    }
}

fn text(value: impl Text) -> String {
    value.into_text()
}

fn optional_text(value: impl Text) -> Option<String> {
    Some(value.into_text()).filter(|s| !s.is_empty())
}

fn port(value: impl Number) -> Option<u16> {
    value.into_number().and_then(|n| u16::try_from(n).ok())
}

fn count(value: impl Number) -> u32 {
    value
        .into_number()
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or_default()
}

fn flag(value: impl Flag) -> bool {
    value.into_flag()
}

/// Map an SDK failure onto [`ApiError`]
fn api_error<E>(operation: &str, err: E) -> ApiError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let message = err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(&err).to_string());
    let operation = operation.to_string();
    match err.code() {
        Some(code) if DENIED_CODES.contains(&code) => ApiError::AccessDenied { operation, message },
        Some(code) if MISSING_CODES.contains(&code) => ApiError::NotFound {
            operation,
            resource: message,
        },
        _ => ApiError::Service { operation, message },
    }
}

fn is_missing<E: ProvideErrorMetadata>(err: &E) -> bool {
    err.code().is_some_and(|code| MISSING_CODES.contains(&code))
}

/// Describe calls report unknown resources as `Ok(None)`
fn found<T, E>(operation: &str, result: Result<T, E>) -> ApiResult<Option<T>>
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    match result {
        Ok(output) => Ok(Some(output)),
        Err(e) if is_missing(&e) => Ok(None),
        Err(e) => Err(api_error(operation, e)),
    }
}

/// `/hostedzone/Z123` -> `Z123`
fn bare_zone_id(id: &str) -> &str {
    id.strip_prefix("/hostedzone/").unwrap_or(id)
}

/// Where `ListResourceRecordSets` resumes; the API pages on three fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct RecordCursor {
    name: String,
    record_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    identifier: Option<String>,
}

impl RecordCursor {
    fn encode(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }

    fn decode(token: &str) -> ApiResult<Self> {
        serde_json::from_str(token).map_err(|e| ApiError::Service {
            operation: ops::LIST_RESOURCE_RECORD_SETS.to_string(),
            message: format!("invalid pagination token: {}", e),
        })
    }
}

/// API client backed by the AWS SDK
#[derive(Debug, Clone)]
pub struct AwsApi {
    load_balancing: aws_sdk_elasticloadbalancingv2::Client,
    containers: aws_sdk_ecs::Client,
    scaling: aws_sdk_applicationautoscaling::Client,
    functions: aws_sdk_lambda::Client,
    databases: aws_sdk_rds::Client,
    dns: aws_sdk_route53::Client,
    region: Option<String>,
}

impl AwsApi {
    /// Resolve credentials and region, optionally from a named profile
    pub async fn connect(profile: Option<&str>, region: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        let config = loader.load().await;
        let api = Self::from_conf(&config);
        tracing::debug!(
            "AWS config loaded (profile: {}, region: {})",
            profile.unwrap_or("default"),
            api.region().unwrap_or("unset")
        );
        api
    }

    pub fn from_conf(config: &SdkConfig) -> Self {
        Self {
            load_balancing: aws_sdk_elasticloadbalancingv2::Client::new(config),
            containers: aws_sdk_ecs::Client::new(config),
            scaling: aws_sdk_applicationautoscaling::Client::new(config),
            functions: aws_sdk_lambda::Client::new(config),
            databases: aws_sdk_rds::Client::new(config),
            dns: aws_sdk_route53::Client::new(config),
            region: config.region().map(|r| r.to_string()),
        }
    }

    /// Region every regional call goes to
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }
}

mod convert {
    //! SDK shapes to control-plane records

    use super::*;
    use aws_sdk_ecs::types as ecs;
    use aws_sdk_elasticloadbalancingv2::types as elb;
    use aws_sdk_lambda::types as lambda;
    use aws_sdk_rds::types as rds;
    use aws_sdk_route53::types as route53;

    pub fn load_balancer(lb: &elb::LoadBalancer) -> LoadBalancer {
        LoadBalancer {
            arn: text(lb.load_balancer_arn()),
            name: text(lb.load_balancer_name()),
            dns_name: text(lb.dns_name()),
            lb_type: text(lb.r#type()),
            scheme: text(lb.scheme()),
            vpc_id: text(lb.vpc_id()),
            security_groups: lb.security_groups().to_vec(),
            availability_zones: lb
                .availability_zones()
                .iter()
                .map(|az| AvailabilityZone {
                    zone_name: text(az.zone_name()),
                    subnet_id: optional_text(az.subnet_id()),
                })
                .collect(),
        }
    }

    pub fn action(action: &elb::Action) -> Action {
        Action {
            action_type: text(action.r#type()),
            target_group_arn: optional_text(action.target_group_arn()),
            forward_target_groups: action
                .forward_config()
                .map(|forward| {
                    forward
                        .target_groups()
                        .iter()
                        .filter_map(|tuple| optional_text(tuple.target_group_arn()))
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    pub fn listener(listener: &elb::Listener) -> Listener {
        Listener {
            arn: text(listener.listener_arn()),
            load_balancer_arn: text(listener.load_balancer_arn()),
            port: port(listener.port()),
            protocol: text(listener.protocol()),
            default_actions: listener.default_actions().iter().map(action).collect(),
        }
    }

    pub fn rule(rule: &elb::Rule, listener_arn: &str) -> Rule {
        Rule {
            arn: text(rule.rule_arn()),
            listener_arn: listener_arn.to_string(),
            priority: text(rule.priority()),
            is_default: flag(rule.is_default()),
            actions: rule.actions().iter().map(action).collect(),
        }
    }

    pub fn target_group(group: &elb::TargetGroup) -> TargetGroup {
        TargetGroup {
            arn: text(group.target_group_arn()),
            name: text(group.target_group_name()),
            protocol: text(group.protocol()),
            port: port(group.port()),
            target_type: text(group.target_type()),
            vpc_id: text(group.vpc_id()),
        }
    }

    pub fn target_health(description: &elb::TargetHealthDescription) -> TargetHealth {
        let target = description.target();
        TargetHealth {
            target_id: target.map(|t| text(t.id())).unwrap_or_default(),
            port: target.and_then(|t| port(t.port())),
            state: description
                .target_health()
                .map(|h| text(h.state()))
                .unwrap_or_default(),
        }
    }

    pub fn service(svc: &ecs::Service) -> ContainerService {
        let network = svc
            .network_configuration()
            .and_then(|n| n.awsvpc_configuration())
            .map(|vpc| AwsVpcConfiguration {
                subnets: vpc.subnets().to_vec(),
                security_groups: vpc.security_groups().to_vec(),
                assign_public_ip: vpc
                    .assign_public_ip()
                    .is_some_and(|ip| *ip == ecs::AssignPublicIp::Enabled),
            });
        ContainerService {
            arn: text(svc.service_arn()),
            name: text(svc.service_name()),
            cluster_arn: text(svc.cluster_arn()),
            task_definition: text(svc.task_definition()),
            launch_type: text(svc.launch_type()),
            desired_count: count(svc.desired_count()),
            load_balancers: svc
                .load_balancers()
                .iter()
                .map(|lb| ServiceLoadBalancer {
                    target_group_arn: optional_text(lb.target_group_arn()),
                    container_name: text(lb.container_name()),
                    container_port: port(lb.container_port()),
                })
                .collect(),
            network,
        }
    }

    pub fn task_definition(td: &ecs::TaskDefinition) -> TaskDefinition {
        TaskDefinition {
            arn: text(td.task_definition_arn()),
            family: text(td.family()),
            revision: count(td.revision()),
            task_role_arn: optional_text(td.task_role_arn()),
            execution_role_arn: optional_text(td.execution_role_arn()),
            network_mode: text(td.network_mode()),
            containers: td
                .container_definitions()
                .iter()
                .map(|c| ContainerDefinition {
                    name: text(c.name()),
                    image: text(c.image()),
                    environment: c
                        .environment()
                        .iter()
                        .map(|kv| (text(kv.name()), text(kv.value())))
                        .collect(),
                })
                .collect(),
        }
    }

    pub fn function(f: &lambda::FunctionConfiguration) -> Function {
        let vpc = f
            .vpc_config()
            .filter(|vpc| !vpc.subnet_ids().is_empty() || !vpc.security_group_ids().is_empty())
            .map(|vpc| FunctionVpcConfig {
                vpc_id: text(vpc.vpc_id()),
                subnet_ids: vpc.subnet_ids().to_vec(),
                security_group_ids: vpc.security_group_ids().to_vec(),
            });
        let environment = f
            .environment()
            .and_then(|env| env.variables())
            .map(|vars| {
                vars.iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect::<BTreeMap<_, _>>()
            })
            .unwrap_or_default();
        Function {
            arn: text(f.function_arn()),
            name: text(f.function_name()),
            runtime: text(f.runtime()),
            handler: text(f.handler()),
            role: text(f.role()),
            vpc,
            dead_letter_target_arn: f
                .dead_letter_config()
                .and_then(|dlq| optional_text(dlq.target_arn())),
            environment,
        }
    }

    pub fn event_source_mapping(
        m: &lambda::EventSourceMappingConfiguration,
    ) -> EventSourceMapping {
        EventSourceMapping {
            uuid: text(m.uuid()),
            event_source_arn: text(m.event_source_arn()),
            function_arn: text(m.function_arn()),
            state: text(m.state()),
            batch_size: m.batch_size().and_then(|n| u32::try_from(n).ok()),
            on_failure_destination: m
                .destination_config()
                .and_then(|d| d.on_failure())
                .and_then(|f| optional_text(f.destination())),
        }
    }

    pub fn db_instance(db: &rds::DbInstance) -> DbInstance {
        DbInstance {
            arn: text(db.db_instance_arn()),
            identifier: text(db.db_instance_identifier()),
            engine: text(db.engine()),
            engine_version: text(db.engine_version()),
            instance_class: text(db.db_instance_class()),
            endpoint: db.endpoint().map(|e| DbEndpoint {
                address: text(e.address()),
                port: port(e.port()),
            }),
            subnet_group: db.db_subnet_group().map(|g| DbSubnetGroup {
                name: text(g.db_subnet_group_name()),
                vpc_id: text(g.vpc_id()),
                subnet_ids: g
                    .subnets()
                    .iter()
                    .filter_map(|s| optional_text(s.subnet_identifier()))
                    .collect(),
            }),
            security_groups: db
                .vpc_security_groups()
                .iter()
                .filter_map(|sg| optional_text(sg.vpc_security_group_id()))
                .collect(),
            parameter_groups: db
                .db_parameter_groups()
                .iter()
                .filter_map(|pg| optional_text(pg.db_parameter_group_name()))
                .collect(),
            cluster_identifier: optional_text(db.db_cluster_identifier()),
            multi_az: flag(db.multi_az()),
        }
    }

    pub fn db_cluster(cluster: &rds::DbCluster) -> DbCluster {
        DbCluster {
            arn: text(cluster.db_cluster_arn()),
            identifier: text(cluster.db_cluster_identifier()),
            engine: text(cluster.engine()),
            engine_version: text(cluster.engine_version()),
            endpoint: optional_text(cluster.endpoint()),
            reader_endpoint: optional_text(cluster.reader_endpoint()),
            port: port(cluster.port()),
            members: cluster
                .db_cluster_members()
                .iter()
                .map(|m| DbClusterMember {
                    instance_identifier: text(m.db_instance_identifier()),
                    is_writer: flag(m.is_cluster_writer()),
                })
                .collect(),
            subnet_group: optional_text(cluster.db_subnet_group()),
            security_groups: cluster
                .vpc_security_groups()
                .iter()
                .filter_map(|sg| optional_text(sg.vpc_security_group_id()))
                .collect(),
            parameter_group: optional_text(cluster.db_cluster_parameter_group()),
        }
    }

    pub fn hosted_zone(zone: &route53::HostedZone) -> HostedZone {
        HostedZone {
            id: bare_zone_id(&text(zone.id())).to_string(),
            name: text(zone.name()),
            private_zone: zone.config().is_some_and(|c| flag(c.private_zone())),
        }
    }

    pub fn record_set(record: &route53::ResourceRecordSet) -> RecordSet {
        RecordSet {
            name: text(record.name()),
            record_type: text(record.r#type()),
            set_identifier: optional_text(record.set_identifier()),
            alias_target: record.alias_target().map(|alias| AliasTarget {
                dns_name: text(alias.dns_name()),
                hosted_zone_id: text(alias.hosted_zone_id()),
                evaluate_target_health: flag(alias.evaluate_target_health()),
            }),
        }
    }
}

#[async_trait]
impl LoadBalancingApi for AwsApi {
    async fn list_load_balancers(
        &self,
        next_token: Option<String>,
    ) -> ApiResult<Page<LoadBalancer>> {
        let output = self
            .load_balancing
            .describe_load_balancers()
            .set_marker(next_token)
            .send()
            .await
            .map_err(|e| api_error(ops::DESCRIBE_LOAD_BALANCERS, e))?;
        Ok(Page {
            items: output.load_balancers().iter().map(convert::load_balancer).collect(),
            next_token: optional_text(output.next_marker()),
        })
    }

    async fn describe_load_balancer(&self, arn: &str) -> ApiResult<Option<LoadBalancer>> {
        let result = self
            .load_balancing
            .describe_load_balancers()
            .load_balancer_arns(arn)
            .send()
            .await;
        Ok(found(ops::DESCRIBE_LOAD_BALANCERS, result)?
            .and_then(|output| output.load_balancers().first().map(convert::load_balancer)))
    }

    async fn describe_listeners(
        &self,
        load_balancer_arn: &str,
        next_token: Option<String>,
    ) -> ApiResult<Page<Listener>> {
        let output = self
            .load_balancing
            .describe_listeners()
            .load_balancer_arn(load_balancer_arn)
            .set_marker(next_token)
            .send()
            .await
            .map_err(|e| api_error(ops::DESCRIBE_LISTENERS, e))?;
        Ok(Page {
            items: output.listeners().iter().map(convert::listener).collect(),
            next_token: optional_text(output.next_marker()),
        })
    }

    async fn describe_rules(
        &self,
        listener_arn: &str,
        next_token: Option<String>,
    ) -> ApiResult<Page<Rule>> {
        let output = self
            .load_balancing
            .describe_rules()
            .listener_arn(listener_arn)
            .set_marker(next_token)
            .send()
            .await
            .map_err(|e| api_error(ops::DESCRIBE_RULES, e))?;
        Ok(Page {
            items: output
                .rules()
                .iter()
                .map(|rule| convert::rule(rule, listener_arn))
                .collect(),
            next_token: optional_text(output.next_marker()),
        })
    }

    async fn describe_target_group(&self, arn: &str) -> ApiResult<Option<TargetGroup>> {
        let result = self
            .load_balancing
            .describe_target_groups()
            .target_group_arns(arn)
            .send()
            .await;
        Ok(found(ops::DESCRIBE_TARGET_GROUPS, result)?
            .and_then(|output| output.target_groups().first().map(convert::target_group)))
    }

    async fn describe_target_health(&self, target_group_arn: &str) -> ApiResult<Vec<TargetHealth>> {
        let output = self
            .load_balancing
            .describe_target_health()
            .target_group_arn(target_group_arn)
            .send()
            .await
            .map_err(|e| api_error(ops::DESCRIBE_TARGET_HEALTH, e))?;
        Ok(output
            .target_health_descriptions()
            .iter()
            .map(convert::target_health)
            .collect())
    }

    async fn describe_tags(&self, arn: &str) -> ApiResult<BTreeMap<String, String>> {
        let output = self
            .load_balancing
            .describe_tags()
            .resource_arns(arn)
            .send()
            .await
            .map_err(|e| api_error(ops::DESCRIBE_TAGS, e))?;
        Ok(output
            .tag_descriptions()
            .iter()
            .flat_map(|description| description.tags())
            .map(|tag| (text(tag.key()), text(tag.value())))
            .collect())
    }
}

#[async_trait]
impl ContainerApi for AwsApi {
    async fn describe_service(
        &self,
        cluster: &str,
        service: &str,
    ) -> ApiResult<Option<ContainerService>> {
        let result = self
            .containers
            .describe_services()
            .cluster(cluster)
            .services(service)
            .send()
            .await;
        Ok(found(ops::DESCRIBE_SERVICES, result)?
            .and_then(|output| output.services().first().map(convert::service)))
    }

    async fn describe_task_definition(
        &self,
        task_definition: &str,
    ) -> ApiResult<Option<TaskDefinition>> {
        let result = self
            .containers
            .describe_task_definition()
            .task_definition(task_definition)
            .send()
            .await;
        Ok(found(ops::DESCRIBE_TASK_DEFINITION, result)?
            .and_then(|output| output.task_definition().map(convert::task_definition)))
    }

    async fn list_clusters(&self, next_token: Option<String>) -> ApiResult<Page<String>> {
        let output = self
            .containers
            .list_clusters()
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| api_error(ops::LIST_CLUSTERS, e))?;
        Ok(Page {
            items: output.cluster_arns().to_vec(),
            next_token: optional_text(output.next_token()),
        })
    }

    async fn list_services(
        &self,
        cluster: &str,
        next_token: Option<String>,
    ) -> ApiResult<Page<String>> {
        let output = self
            .containers
            .list_services()
            .cluster(cluster)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| api_error(ops::LIST_SERVICES, e))?;
        Ok(Page {
            items: output.service_arns().to_vec(),
            next_token: optional_text(output.next_token()),
        })
    }
}

#[async_trait]
impl ScalingApi for AwsApi {
    /// Drains every page; the trait hands back the full list
    async fn describe_scalable_targets(&self, resource_id: &str) -> ApiResult<Vec<ScalableTarget>> {
        collect_pages(|token| async move {
            let result = self
                .scaling
                .describe_scalable_targets()
                .service_namespace(ServiceNamespace::Ecs)
                .resource_ids(resource_id)
                .set_next_token(token)
                .send()
                .await;
            result
                .map(|output| Page {
                    items: output
                        .scalable_targets()
                        .iter()
                        .map(|t| ScalableTarget {
                            resource_id: text(t.resource_id()),
                            scalable_dimension: text(t.scalable_dimension()),
                            min_capacity: count(t.min_capacity()),
                            max_capacity: count(t.max_capacity()),
                        })
                        .collect(),
                    next_token: optional_text(output.next_token()),
                })
                .map_err(|e| api_error(ops::DESCRIBE_SCALABLE_TARGETS, e))
        })
        .await
    }

    async fn describe_scaling_policies(
        &self,
        resource_id: &str,
        next_token: Option<String>,
    ) -> ApiResult<Page<ScalingPolicy>> {
        let output = self
            .scaling
            .describe_scaling_policies()
            .service_namespace(ServiceNamespace::Ecs)
            .resource_id(resource_id)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| api_error(ops::DESCRIBE_SCALING_POLICIES, e))?;
        Ok(Page {
            items: output
                .scaling_policies()
                .iter()
                .map(|p| ScalingPolicy {
                    arn: text(p.policy_arn()),
                    name: text(p.policy_name()),
                    resource_id: text(p.resource_id()),
                    policy_type: text(p.policy_type()),
                })
                .collect(),
            next_token: optional_text(output.next_token()),
        })
    }
}

#[async_trait]
impl FunctionApi for AwsApi {
    async fn get_function(&self, name_or_arn: &str) -> ApiResult<Option<Function>> {
        let result = self
            .functions
            .get_function()
            .function_name(name_or_arn)
            .send()
            .await;
        Ok(found(ops::GET_FUNCTION, result)?
            .and_then(|output| output.configuration().map(convert::function)))
    }

    async fn list_functions(&self, next_token: Option<String>) -> ApiResult<Page<Function>> {
        let output = self
            .functions
            .list_functions()
            .set_marker(next_token)
            .send()
            .await
            .map_err(|e| api_error(ops::LIST_FUNCTIONS, e))?;
        Ok(Page {
            items: output.functions().iter().map(convert::function).collect(),
            next_token: optional_text(output.next_marker()),
        })
    }

    async fn list_event_source_mappings(
        &self,
        function: &str,
        next_token: Option<String>,
    ) -> ApiResult<Page<EventSourceMapping>> {
        let output = self
            .functions
            .list_event_source_mappings()
            .function_name(function)
            .set_marker(next_token)
            .send()
            .await
            .map_err(|e| api_error(ops::LIST_EVENT_SOURCE_MAPPINGS, e))?;
        Ok(Page {
            items: output
                .event_source_mappings()
                .iter()
                .map(convert::event_source_mapping)
                .collect(),
            next_token: optional_text(output.next_marker()),
        })
    }

    async fn get_event_invoke_config(
        &self,
        function: &str,
    ) -> ApiResult<Option<EventInvokeConfig>> {
        let result = self
            .functions
            .get_function_event_invoke_config()
            .function_name(function)
            .send()
            .await;
        Ok(
            found(ops::GET_FUNCTION_EVENT_INVOKE_CONFIG, result)?.map(|output| {
                let destinations = output.destination_config();
                EventInvokeConfig {
                    function_arn: text(output.function_arn()),
                    on_success: destinations
                        .and_then(|d| d.on_success())
                        .and_then(|s| optional_text(s.destination())),
                    on_failure: destinations
                        .and_then(|d| d.on_failure())
                        .and_then(|f| optional_text(f.destination())),
                    maximum_retry_attempts: output
                        .maximum_retry_attempts()
                        .and_then(|n| u32::try_from(n).ok()),
                }
            }),
        )
    }
}

#[async_trait]
impl DatabaseApi for AwsApi {
    async fn describe_db_instance(&self, identifier: &str) -> ApiResult<Option<DbInstance>> {
        let result = self
            .databases
            .describe_db_instances()
            .db_instance_identifier(identifier)
            .send()
            .await;
        Ok(found(ops::DESCRIBE_DB_INSTANCES, result)?
            .and_then(|output| output.db_instances().first().map(convert::db_instance)))
    }

    async fn describe_db_cluster(&self, identifier: &str) -> ApiResult<Option<DbCluster>> {
        let result = self
            .databases
            .describe_db_clusters()
            .db_cluster_identifier(identifier)
            .send()
            .await;
        Ok(found(ops::DESCRIBE_DB_CLUSTERS, result)?
            .and_then(|output| output.db_clusters().first().map(convert::db_cluster)))
    }
}

#[async_trait]
impl DnsApi for AwsApi {
    async fn list_hosted_zones(&self, next_token: Option<String>) -> ApiResult<Page<HostedZone>> {
        let output = self
            .dns
            .list_hosted_zones()
            .set_marker(next_token)
            .send()
            .await
            .map_err(|e| api_error(ops::LIST_HOSTED_ZONES, e))?;
        let next_token = if flag(output.is_truncated()) {
            optional_text(output.next_marker())
        } else {
            None
        };
        Ok(Page {
            items: output.hosted_zones().iter().map(convert::hosted_zone).collect(),
            next_token,
        })
    }

    async fn list_record_sets(
        &self,
        zone_id: &str,
        next_token: Option<String>,
    ) -> ApiResult<Page<RecordSet>> {
        let cursor = next_token.as_deref().map(RecordCursor::decode).transpose()?;
        let (name, record_type, identifier) = match cursor {
            Some(c) => (Some(c.name), Some(RrType::from(c.record_type.as_str())), c.identifier),
            None => (None, None, None),
        };

        let output = self
            .dns
            .list_resource_record_sets()
            .hosted_zone_id(zone_id)
            .set_start_record_name(name)
            .set_start_record_type(record_type)
            .set_start_record_identifier(identifier)
            .send()
            .await
            .map_err(|e| api_error(ops::LIST_RESOURCE_RECORD_SETS, e))?;

        let next_name =
            optional_text(output.next_record_name()).filter(|_| flag(output.is_truncated()));
        let next_token = match next_name {
            Some(name) => RecordCursor {
                name,
                record_type: text(output.next_record_type()),
                identifier: optional_text(output.next_record_identifier()),
            }
            .encode(),
            None => None,
        };
        Ok(Page {
            items: output
                .resource_record_sets()
                .iter()
                .map(convert::record_set)
                .collect(),
            next_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_lambda::error::ErrorMetadata;
    use aws_sdk_lambda::operation::get_function::GetFunctionError;

    fn lambda_error(code: &str) -> GetFunctionError {
        GetFunctionError::generic(ErrorMetadata::builder().code(code).message("boom").build())
    }

    #[test]
    fn test_error_codes_map_to_api_errors() {
        assert!(matches!(
            api_error(ops::GET_FUNCTION, lambda_error("AccessDeniedException")),
            ApiError::AccessDenied { .. }
        ));
        assert!(matches!(
            api_error(ops::GET_FUNCTION, lambda_error("ThrottlingException")),
            ApiError::Service { .. }
        ));
        let err = api_error(ops::GET_FUNCTION, lambda_error("TooManyRequestsException"));
        assert_eq!(err.operation(), "GetFunction");
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_missing_resource_is_none() {
        let missing: Result<(), _> = Err(lambda_error("ResourceNotFoundException"));
        assert_eq!(found(ops::GET_FUNCTION, missing).unwrap(), None);

        let denied: Result<(), _> = Err(lambda_error("AccessDeniedException"));
        assert!(found(ops::GET_FUNCTION, denied).is_err());
    }

    #[test]
    fn test_record_cursor_survives_token_round_trip() {
        let cursor = RecordCursor {
            name: "api.example.com.".to_string(),
            record_type: "A".to_string(),
            identifier: Some("blue".to_string()),
        };
        let token = cursor.encode().unwrap();
        assert_eq!(RecordCursor::decode(&token).unwrap(), cursor);
        assert!(RecordCursor::decode("not-json").is_err());
    }

    #[test]
    fn test_zone_ids_lose_their_prefix() {
        assert_eq!(bare_zone_id("/hostedzone/Z0123"), "Z0123");
        assert_eq!(bare_zone_id("Z0123"), "Z0123");
    }

    #[test]
    fn test_accessor_helpers() {
        assert_eq!(text(Some("x")), "x");
        assert_eq!(text(None::<&str>), "");
        assert_eq!(optional_text(""), None);
        assert_eq!(port(Some(443)), Some(443));
        assert_eq!(port(Some(70000)), None);
        assert_eq!(count(-1), 0);
        assert!(flag(Some(true)));
    }
}
