//! Dependency graph
//!
//! Thread-safe container of discovered resources and the evidence-bearing
//! relationships between them.

pub mod levels;
pub mod model;
pub mod store;

pub use levels::{Follow, Level};
pub use model::{relation, Edge, Evidence, Node, ResourceType};
pub use store::{Graph, NodeWrite};
