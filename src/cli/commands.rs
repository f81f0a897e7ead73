//! CLI command handlers

use anyhow::{Context, Result};
use blast_radius::config::{self, ConfigLoader, paths};
use clap::Subcommand;

/// Configuration management subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigSubcommand {
    /// Show configuration file path
    Path,
    /// Show the effective configuration, or one value
    Show {
        /// Configuration key (e.g., "discovery.maxDepth", "output.format")
        key: Option<String>,
    },
    /// Validate configuration
    Validate,
    /// Write a commented starter configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Handle configuration subcommands
pub fn handle_config_command(cmd: ConfigSubcommand) -> Result<()> {
    match cmd {
        ConfigSubcommand::Path => {
            println!("{}", paths::root_config_path().display());
        }
        ConfigSubcommand::Show { key } => {
            let config = ConfigLoader::load().context("Failed to load configuration")?;
            match key {
                Some(key) => println!("{}", config::get_config_value(&config, &key)?),
                None => {
                    let yaml = serde_yaml::to_string(&config)
                        .context("Failed to serialize configuration")?;
                    print!("{}", yaml);
                }
            }
        }
        ConfigSubcommand::Validate => {
            let config = ConfigLoader::load().context("Configuration validation failed")?;
            ConfigLoader::validate(&config).context("Configuration validation failed")?;
            println!("Configuration is valid");
        }
        ConfigSubcommand::Init { force } => {
            let path = paths::root_config_path();
            ConfigLoader::write_template(&path, force)?;
            println!("Configuration written to {}", path.display());
        }
    }
    Ok(())
}
