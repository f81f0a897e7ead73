//! blast-radius library
//!
//! Discovers the resources affected by a change to one AWS resource and
//! renders them as a dependency graph. The binary is a thin wrapper; the
//! library is what the integration tests drive.

pub mod cloud;
pub mod config;
pub mod discover;
pub mod graph;
pub mod output;

pub use discover::{Discoverer, Discovery, DiscoveryError, DiscoveryOptions, StopReason};
pub use graph::{Edge, Evidence, Graph, Node, ResourceType};
pub use output::{OutputFormat, render};
