//! Default configuration values

use super::schema::Config;

/// Commented starter file written by `config init`
pub const CONFIG_TEMPLATE: &str = r#"# blast-radius configuration
discovery:
  # Deepest level expanded; the root is level 0
  maxDepth: 2
  # Stop adding resources once the graph holds this many
  maxNodes: 250
  # Opt-in inference, e.g. [rds-endpoint]
  heuristics: []
  # Resources expanded at once within a level
  concurrency: 4
  # timeoutSeconds: 60
output:
  # tree, dot or json
  format: tree
# snapshot: /path/to/account.yaml
"#;

/// Get the default configuration
pub fn default_config() -> Config {
    Config::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_matches_defaults() {
        let parsed: Config = serde_yaml::from_str(CONFIG_TEMPLATE).unwrap();
        assert_eq!(parsed, default_config());
    }
}
