//! Configuration system
//!
//! Built-in defaults, an optional YAML file in the platform config directory,
//! and `BLAST_RADIUS_*` environment overrides.

mod defaults;
pub mod loader;
pub mod paths;
pub mod schema;

pub use defaults::CONFIG_TEMPLATE;
pub use loader::{ConfigLoader, split_list};
pub use schema::{Config, DiscoveryConfig, OutputConfig};

/// Get a configuration value by key (dot notation)
pub fn get_config_value(config: &Config, key: &str) -> anyhow::Result<String> {
    match key {
        "discovery.maxDepth" => Ok(config.discovery.max_depth.to_string()),
        "discovery.maxNodes" => Ok(config.discovery.max_nodes.to_string()),
        "discovery.heuristics" => Ok(config.discovery.heuristics.join(",")),
        "discovery.concurrency" => Ok(config.discovery.concurrency.to_string()),
        "discovery.timeoutSeconds" => Ok(config
            .discovery
            .timeout_seconds
            .map(|t| t.to_string())
            .unwrap_or_default()),
        "output.format" => Ok(config.output.format.to_string()),
        "snapshot" => Ok(config
            .snapshot
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default()),
        _ => Err(anyhow::anyhow!("Unknown configuration key: {}", key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_config_value() {
        let config = Config::default();
        assert_eq!(get_config_value(&config, "discovery.maxNodes").unwrap(), "250");
        assert_eq!(get_config_value(&config, "output.format").unwrap(), "tree");
        assert_eq!(get_config_value(&config, "snapshot").unwrap(), "");
        assert!(get_config_value(&config, "ui.skin").is_err());
    }
}
