//! Cloud control-plane access
//!
//! Discovery talks to the provider only through the traits in [`api`].
//! [`aws::AwsApi`] serves them from a live account and
//! [`snapshot::SnapshotApi`] from an account snapshot file.

pub mod api;
pub mod arn;
pub mod aws;
pub mod model;
pub mod snapshot;

pub use api::{ContainerApi, DatabaseApi, DnsApi, FunctionApi, LoadBalancingApi, ScalingApi};
pub use arn::Arn;
pub use aws::AwsApi;
pub use snapshot::{AccountSnapshot, SnapshotApi};

use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// Control-plane call failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("access denied for {operation}: {message}")]
    AccessDenied { operation: String, message: String },

    #[error("{operation} returned no results for {resource}")]
    NotFound { operation: String, resource: String },

    #[error("{operation} failed: {message}")]
    Service { operation: String, message: String },
}

impl ApiError {
    pub fn not_found(operation: &str, resource: &str) -> Self {
        ApiError::NotFound {
            operation: operation.to_string(),
            resource: resource.to_string(),
        }
    }

    /// The operation that failed
    pub fn operation(&self) -> &str {
        match self {
            ApiError::AccessDenied { operation, .. }
            | ApiError::NotFound { operation, .. }
            | ApiError::Service { operation, .. } => operation,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// One page of a paged listing
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_token: None,
        }
    }
}

/// Drain every page of a paged operation
///
/// A failing page aborts the whole listing.
pub async fn collect_pages<T, F, Fut>(mut fetch: F) -> ApiResult<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = ApiResult<Page<T>>>,
{
    let mut items = Vec::new();
    let mut token = None;
    loop {
        let page = fetch(token).await?;
        items.extend(page.items);
        match page.next_token {
            Some(next) => token = Some(next),
            None => break,
        }
    }
    Ok(items)
}

/// Operation names, used as evidence and for permission errors
pub mod ops {
    pub const DESCRIBE_LOAD_BALANCERS: &str = "DescribeLoadBalancers";
    pub const DESCRIBE_LISTENERS: &str = "DescribeListeners";
    pub const DESCRIBE_RULES: &str = "DescribeRules";
    pub const DESCRIBE_TARGET_GROUPS: &str = "DescribeTargetGroups";
    pub const DESCRIBE_TARGET_HEALTH: &str = "DescribeTargetHealth";
    pub const DESCRIBE_TAGS: &str = "DescribeTags";
    pub const DESCRIBE_SERVICES: &str = "DescribeServices";
    pub const DESCRIBE_TASK_DEFINITION: &str = "DescribeTaskDefinition";
    pub const LIST_CLUSTERS: &str = "ListClusters";
    pub const LIST_SERVICES: &str = "ListServices";
    pub const DESCRIBE_SCALABLE_TARGETS: &str = "DescribeScalableTargets";
    pub const DESCRIBE_SCALING_POLICIES: &str = "DescribeScalingPolicies";
    pub const GET_FUNCTION: &str = "GetFunction";
    pub const LIST_FUNCTIONS: &str = "ListFunctions";
    pub const LIST_EVENT_SOURCE_MAPPINGS: &str = "ListEventSourceMappings";
    pub const GET_FUNCTION_EVENT_INVOKE_CONFIG: &str = "GetFunctionEventInvokeConfig";
    pub const DESCRIBE_DB_INSTANCES: &str = "DescribeDBInstances";
    pub const DESCRIBE_DB_CLUSTERS: &str = "DescribeDBClusters";
    pub const LIST_HOSTED_ZONES: &str = "ListHostedZones";
    pub const LIST_RESOURCE_RECORD_SETS: &str = "ListResourceRecordSets";
}

/// One client per service
#[derive(Clone)]
pub struct CloudClients {
    pub load_balancing: Arc<dyn LoadBalancingApi>,
    pub containers: Arc<dyn ContainerApi>,
    pub scaling: Arc<dyn ScalingApi>,
    pub functions: Arc<dyn FunctionApi>,
    pub databases: Arc<dyn DatabaseApi>,
    pub dns: Arc<dyn DnsApi>,
}

impl CloudClients {
    /// Use one object for every service
    pub fn from_shared<T>(api: Arc<T>) -> Self
    where
        T: LoadBalancingApi
            + ContainerApi
            + ScalingApi
            + FunctionApi
            + DatabaseApi
            + DnsApi
            + 'static,
    {
        Self {
            load_balancing: api.clone(),
            containers: api.clone(),
            scaling: api.clone(),
            functions: api.clone(),
            databases: api.clone(),
            dns: api,
        }
    }
}
