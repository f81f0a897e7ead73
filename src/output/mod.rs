//! Renderers for a finished discovery
//!
//! Renderers only read the graph through its public query methods.

mod dot;
mod json;
mod tree;

pub use dot::render_dot;
pub use json::render_json;
pub use tree::render_tree;

use crate::graph::Graph;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Level-grouped text
    #[default]
    Tree,
    /// Graphviz digraph
    Dot,
    /// Nodes and edges as JSON
    Json,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Tree => "tree",
            OutputFormat::Dot => "dot",
            OutputFormat::Json => "json",
        }
    }

    /// Parse a format name, returning None if unknown
    pub fn parse_optional(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tree" => Some(OutputFormat::Tree),
            "dot" => Some(OutputFormat::Dot),
            "json" => Some(OutputFormat::Json),
            _ => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Render `graph` in `format`
pub fn render(
    format: OutputFormat,
    out: &mut dyn Write,
    graph: &Graph,
    root_id: &str,
) -> Result<()> {
    match format {
        OutputFormat::Tree => render_tree(out, graph, root_id),
        OutputFormat::Dot => render_dot(out, graph),
        OutputFormat::Json => render_json(out, graph),
    }
}
