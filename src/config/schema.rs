//! Configuration schema definitions
//!
//! Defines the structure of the configuration file using serde.

use crate::discover::{DEFAULT_CONCURRENCY, DEFAULT_MAX_DEPTH, DEFAULT_MAX_NODES, DiscoveryOptions};
use crate::output::OutputFormat;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
    /// Traversal bounds and switches
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Rendering settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Account snapshot used when none is given on the command line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<PathBuf>,
}

/// Discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DiscoveryConfig {
    /// Deepest level expanded (root is 0)
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Ceiling on graph size
    #[serde(default = "default_max_nodes")]
    pub max_nodes: usize,

    /// Enabled heuristic tokens, e.g. `rds-endpoint`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub heuristics: Vec<String>,

    /// Nodes expanded at once within a level
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Whole-run timeout; unset means no limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_max_nodes() -> usize {
    DEFAULT_MAX_NODES
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_nodes: default_max_nodes(),
            heuristics: Vec::new(),
            concurrency: default_concurrency(),
            timeout_seconds: None,
        }
    }
}

impl DiscoveryConfig {
    /// Options for the discovery engine
    pub fn to_options(&self) -> DiscoveryOptions {
        DiscoveryOptions {
            max_depth: self.max_depth,
            max_nodes: self.max_nodes,
            heuristics: self
                .heuristics
                .iter()
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
                .collect(),
            concurrency: self.concurrency,
            timeout: self.timeout_seconds.map(Duration::from_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.discovery.max_depth, 2);
        assert_eq!(config.discovery.max_nodes, 250);
        assert_eq!(config.output.format, OutputFormat::Tree);
        assert!(config.snapshot.is_none());
    }

    #[test]
    fn test_config_serialization() {
        let yaml = serde_yaml::to_string(&Config::default()).unwrap();
        assert!(yaml.contains("maxDepth"));
        assert!(yaml.contains("maxNodes"));
        assert!(!yaml.contains("timeoutSeconds"));
    }

    #[test]
    fn test_config_deserialization() {
        let yaml = r#"
discovery:
  maxDepth: 4
  heuristics: [rds-endpoint]
  timeoutSeconds: 30
output:
  format: dot
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.discovery.max_depth, 4);
        assert_eq!(config.discovery.max_nodes, 250);
        assert_eq!(config.output.format, OutputFormat::Dot);

        let options = config.discovery.to_options();
        assert!(options.heuristics.contains("rds-endpoint"));
        assert_eq!(options.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let yaml = "discovery:\n  maxDepht: 3\n";
        assert!(serde_yaml::from_str::<Config>(yaml).is_err());
    }
}
