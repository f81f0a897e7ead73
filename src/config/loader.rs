//! Configuration loading and merging logic
//!
//! Precedence (highest to lowest): command-line flags (applied by the
//! binary), environment variables, the config file, built-in defaults.

use super::{defaults, paths, schema::Config};
use crate::discover::heuristics;
use crate::output::OutputFormat;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub const ENV_MAX_DEPTH: &str = "BLAST_RADIUS_MAX_DEPTH";
pub const ENV_MAX_NODES: &str = "BLAST_RADIUS_MAX_NODES";
pub const ENV_HEURISTICS: &str = "BLAST_RADIUS_HEURISTICS";
pub const ENV_CONCURRENCY: &str = "BLAST_RADIUS_CONCURRENCY";
pub const ENV_FORMAT: &str = "BLAST_RADIUS_FORMAT";
pub const ENV_SNAPSHOT: &str = "BLAST_RADIUS_SNAPSHOT";

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load the root config file (if any) with environment overrides applied
    pub fn load() -> Result<Config> {
        Self::load_from(&paths::root_config_path())
    }

    /// Load `path` (if it exists) with environment overrides applied
    pub fn load_from(path: &Path) -> Result<Config> {
        let config = if path.exists() {
            Self::load_file(path)?
        } else {
            tracing::debug!("No config file at {}, using defaults", path.display());
            Self::load_defaults()
        };
        Ok(Self::apply_env_overrides(config))
    }

    /// Load configuration from a file
    pub fn load_file(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Err(anyhow::anyhow!("Config file not found: {}", path.display()));
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Check a loaded configuration for values discovery would reject
    pub fn validate(config: &Config) -> Result<()> {
        config
            .discovery
            .to_options()
            .validate()
            .context("Invalid discovery settings")?;

        for token in &config.discovery.heuristics {
            if !heuristics::KNOWN.contains(&token.trim()) {
                return Err(anyhow::anyhow!(
                    "Unknown heuristic '{}' (known: {})",
                    token,
                    heuristics::KNOWN.join(", ")
                ));
            }
        }

        if let Some(snapshot) = &config.snapshot {
            if !snapshot.exists() {
                return Err(anyhow::anyhow!(
                    "Snapshot file not found: {}",
                    snapshot.display()
                ));
            }
        }

        Ok(())
    }

    /// Load default configuration
    pub fn load_defaults() -> Config {
        defaults::default_config()
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(config: Config) -> Config {
        Self::apply_overrides(config, |key| std::env::var(key).ok())
    }

    /// Apply overrides read through `lookup`
    ///
    /// Values that fail to parse are logged and skipped.
    pub fn apply_overrides<F>(mut config: Config, lookup: F) -> Config
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_MAX_DEPTH) {
            match value.trim().parse() {
                Ok(depth) => config.discovery.max_depth = depth,
                Err(_) => tracing::warn!("Ignoring {}={}: not a number", ENV_MAX_DEPTH, value),
            }
        }

        if let Some(value) = lookup(ENV_MAX_NODES) {
            match value.trim().parse() {
                Ok(nodes) => config.discovery.max_nodes = nodes,
                Err(_) => tracing::warn!("Ignoring {}={}: not a number", ENV_MAX_NODES, value),
            }
        }

        if let Some(value) = lookup(ENV_HEURISTICS) {
            config.discovery.heuristics = split_list(&value);
        }

        if let Some(value) = lookup(ENV_CONCURRENCY) {
            match value.trim().parse() {
                Ok(concurrency) => config.discovery.concurrency = concurrency,
                Err(_) => tracing::warn!("Ignoring {}={}: not a number", ENV_CONCURRENCY, value),
            }
        }

        if let Some(value) = lookup(ENV_FORMAT) {
            match OutputFormat::parse_optional(&value) {
                Some(format) => config.output.format = format,
                None => tracing::warn!("Ignoring {}={}: unknown format", ENV_FORMAT, value),
            }
        }

        if let Some(value) = lookup(ENV_SNAPSHOT) {
            if !value.trim().is_empty() {
                config.snapshot = Some(PathBuf::from(value.trim()));
            }
        }

        config
    }

    /// Save configuration to a file
    pub fn save(config: &Config, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            paths::ensure_dir(parent)?;
        }

        let yaml =
            serde_yaml::to_string(config).context("Failed to serialize configuration to YAML")?;

        std::fs::write(path, yaml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Write the commented starter file to `path`
    pub fn write_template(path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            return Err(anyhow::anyhow!(
                "Config file already exists: {} (use --force to overwrite)",
                path.display()
            ));
        }
        if let Some(parent) = path.parent() {
            paths::ensure_dir(parent)?;
        }
        std::fs::write(path, defaults::CONFIG_TEMPLATE)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }
}

/// Split a comma-separated list, dropping empty entries
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_load_defaults() {
        let config = ConfigLoader::load_defaults();
        assert_eq!(config.discovery.max_depth, 2);
        assert_eq!(config.output.format, OutputFormat::Tree);
    }

    #[test]
    fn test_overrides_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_MAX_DEPTH, "5"),
            (ENV_MAX_NODES, "lots"),
            (ENV_HEURISTICS, "rds-endpoint, ,"),
            (ENV_FORMAT, "JSON"),
        ]);
        let config = ConfigLoader::apply_overrides(Config::default(), |key| {
            vars.get(key).map(|v| v.to_string())
        });

        assert_eq!(config.discovery.max_depth, 5);
        assert_eq!(config.discovery.max_nodes, 250);
        assert_eq!(config.discovery.heuristics, vec!["rds-endpoint"]);
        assert_eq!(config.output.format, OutputFormat::Json);
    }

    #[test]
    fn test_env_overrides() {
        // SAFETY: set_var is unsafe in Rust 2024 due to potential data races.
        // No other unit test reads this variable.
        unsafe {
            std::env::set_var(ENV_CONCURRENCY, "9");
        }

        let config = ConfigLoader::apply_env_overrides(Config::default());
        assert_eq!(config.discovery.concurrency, 9);

        // SAFETY: same as above.
        unsafe {
            std::env::remove_var(ENV_CONCURRENCY);
        }
    }

    #[test]
    fn test_validate_rejects_unknown_heuristic() {
        let mut config = Config::default();
        config.discovery.heuristics = vec!["dns-guess".to_string()];
        assert!(ConfigLoader::validate(&config).is_err());

        config.discovery.heuristics = vec!["rds-endpoint".to_string()];
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_nodes() {
        let mut config = Config::default();
        config.discovery.max_nodes = 0;
        assert!(ConfigLoader::validate(&config).is_err());
    }
}
