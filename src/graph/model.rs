//! Graph data model
//!
//! Nodes are discovered resources, edges are directed relationships between
//! them. Every edge carries the evidence that justified it.

use serde::Serialize;
use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

/// Resource type tag
///
/// The vocabulary is open: well-known types are provided as constants and
/// expanders may introduce new ones with [`ResourceType::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ResourceType(Cow<'static, str>);

impl ResourceType {
    pub const LOAD_BALANCER: ResourceType = ResourceType::known("LoadBalancer");
    pub const LISTENER: ResourceType = ResourceType::known("Listener");
    pub const TARGET_GROUP: ResourceType = ResourceType::known("TargetGroup");
    pub const SECURITY_GROUP: ResourceType = ResourceType::known("SecurityGroup");
    pub const SUBNET: ResourceType = ResourceType::known("Subnet");
    pub const CONTAINER_SERVICE: ResourceType = ResourceType::known("ContainerService");
    pub const CONTAINER_CLUSTER: ResourceType = ResourceType::known("ContainerCluster");
    pub const TASK_DEFINITION: ResourceType = ResourceType::known("TaskDefinition");
    pub const IAM_ROLE: ResourceType = ResourceType::known("IAMRole");
    pub const FUNCTION: ResourceType = ResourceType::known("Function");
    pub const EVENT_SOURCE: ResourceType = ResourceType::known("EventSource");
    pub const QUEUE: ResourceType = ResourceType::known("Queue");
    pub const CHANGE_STREAM: ResourceType = ResourceType::known("ChangeStream");
    pub const SHARD_STREAM: ResourceType = ResourceType::known("ShardStream");
    pub const BROKER_CLUSTER: ResourceType = ResourceType::known("BrokerCluster");
    pub const EVENT_DESTINATION: ResourceType = ResourceType::known("EventDestination");
    pub const DEAD_LETTER_QUEUE: ResourceType = ResourceType::known("DeadLetterQueue");
    pub const RELATIONAL_INSTANCE: ResourceType = ResourceType::known("RelationalInstance");
    pub const RELATIONAL_CLUSTER: ResourceType = ResourceType::known("RelationalCluster");
    pub const SUBNET_GROUP: ResourceType = ResourceType::known("SubnetGroup");
    pub const PARAMETER_GROUP: ResourceType = ResourceType::known("ParameterGroup");
    pub const CLUSTER_PARAMETER_GROUP: ResourceType = ResourceType::known("ClusterParameterGroup");
    pub const DNS_RECORD: ResourceType = ResourceType::known("DNSRecord");
    pub const SCALING_POLICY: ResourceType = ResourceType::known("ScalingPolicy");
    pub const COMPUTE_INSTANCE: ResourceType = ResourceType::known("ComputeInstance");
    pub const IP_TARGET: ResourceType = ResourceType::known("IpTarget");

    /// Well-known type usable in const position
    pub const fn known(name: &'static str) -> Self {
        ResourceType(Cow::Borrowed(name))
    }

    /// Create a resource type outside the well-known vocabulary
    pub fn new(name: impl Into<String>) -> Self {
        ResourceType(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Well-known relation names used by the built-in expanders
pub mod relation {
    pub const USES_SECURITY_GROUP: &str = "uses-security-group";
    pub const USES_SUBNET: &str = "uses-subnet";
    pub const RUNS_IN_SUBNET: &str = "runs-in-subnet";
    pub const HAS_LISTENER: &str = "has-listener";
    pub const FORWARDS_TO: &str = "forwards-to";
    pub const ROUTES_TO_TARGET: &str = "routes-to-target";
    pub const ALIASES_TO: &str = "aliases-to";
    pub const RUNS_IN: &str = "runs-in";
    pub const USES_TASK_DEFINITION: &str = "uses-task-definition";
    pub const USES_TASK_ROLE: &str = "uses-task-role";
    pub const USES_EXECUTION_ROLE: &str = "uses-execution-role";
    pub const REGISTERS_WITH: &str = "registers-with";
    pub const HAS_SCALING_POLICY: &str = "has-scaling-policy";
    pub const TRIGGERS: &str = "triggers";
    pub const SENDS_FAILURES_TO: &str = "sends-failures-to";
    pub const SENDS_SUCCESS_TO: &str = "sends-success-to";
    pub const USES_SUBNET_GROUP: &str = "uses-subnet-group";
    pub const USES_PARAMETER_GROUP: &str = "uses-parameter-group";
    pub const CONTAINS: &str = "contains";
    pub const MEMBER_OF: &str = "member-of";
    pub const CONNECTS_TO: &str = "connects-to";
}

/// A discovered resource
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique key, the ARN when the resource has one
    pub id: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualified_name: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub region: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub account_id: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    /// Type-specific facts; never part of identity
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Value>,
}

impl Node {
    pub fn new(
        id: impl Into<String>,
        resource_type: ResourceType,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            resource_type,
            name: name.into(),
            qualified_name: None,
            region: String::new(),
            account_id: String::new(),
            tags: BTreeMap::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_qualified_name(mut self, arn: impl Into<String>) -> Self {
        self.qualified_name = Some(arn.into());
        self
    }

    pub fn with_location(
        mut self,
        region: impl Into<String>,
        account_id: impl Into<String>,
    ) -> Self {
        self.region = region.into();
        self.account_id = account_id.into();
        self
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    pub fn with_tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.tags = tags;
        self
    }

    /// String attribute lookup
    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    /// The ARN if known, otherwise the id
    pub fn arn_or_id(&self) -> &str {
        self.qualified_name.as_deref().unwrap_or(&self.id)
    }
}

/// Why an edge exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    /// The API operation whose response exposed the relationship
    pub api_call: String,
    /// Response fields that justify the edge
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
    heuristic: bool,
}

impl Evidence {
    /// Evidence read directly from an API response
    pub fn observed(api_call: impl Into<String>) -> Self {
        Self {
            api_call: api_call.into(),
            fields: BTreeMap::new(),
            heuristic: false,
        }
    }

    /// Best-effort inference; only the heuristic resolver creates these
    pub(crate) fn inferred(api_call: impl Into<String>) -> Self {
        Self {
            api_call: api_call.into(),
            fields: BTreeMap::new(),
            heuristic: true,
        }
    }

    pub fn with_field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn is_heuristic(&self) -> bool {
        self.heuristic
    }
}

/// A directed relationship between two nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub relation: String,
    pub evidence: Evidence,
}

impl Edge {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        relation: impl Into<String>,
        evidence: Evidence,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relation: relation.into(),
            evidence,
        }
    }

    /// Same endpoints and relation, evidence ignored
    pub fn same_link(&self, source: &str, target: &str, relation: &str) -> bool {
        self.source == source && self.target == target && self.relation == relation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_and_custom_types_compare_by_name() {
        assert_eq!(ResourceType::FUNCTION, ResourceType::new("Function"));
        assert_eq!(ResourceType::new("Bucket").as_str(), "Bucket");
    }

    #[test]
    fn test_node_serializes_type_field() {
        let node = Node::new("arn:aws:lambda:us-east-1:1:function:f", ResourceType::FUNCTION, "f")
            .with_location("us-east-1", "1");
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "Function");
        assert_eq!(json["accountId"], "1");
        assert!(json.get("tags").is_none());
    }

    #[test]
    fn test_observed_evidence_is_not_heuristic() {
        let evidence = Evidence::observed("GetFunction").with_field("Role", "arn:role");
        assert!(!evidence.is_heuristic());
        assert_eq!(evidence.fields["Role"], "arn:role");
        assert!(Evidence::inferred("ListFunctions").is_heuristic());
    }
}
