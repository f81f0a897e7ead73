//! CLI command handling module
//!
//! Subcommands and logging setup for the binary.

mod commands;
mod logging;
mod version;

pub use commands::{ConfigSubcommand, handle_config_command};
pub use logging::init_logging;
pub use version::display_version;
