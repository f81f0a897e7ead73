//! Discovery error types

use crate::cloud::ApiError;
use thiserror::Error;

/// Fatal discovery errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    #[error("invalid resource identifier: {0}")]
    InvalidIdentifier(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("invalid discovery options: {0}")]
    InvalidOptions(String),

    #[error("timed out while {0}")]
    Timeout(String),
}

/// A node could not be fully expanded
///
/// Carries the neighbors found before the failure so the traversal can keep
/// them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expanding {node_id} failed: {source}")]
pub struct ExpansionFailure {
    pub node_id: String,
    pub source: ApiError,
    pub discovered: Vec<String>,
}

impl ExpansionFailure {
    pub fn new(node_id: impl Into<String>, source: ApiError) -> Self {
        Self {
            node_id: node_id.into(),
            source,
            discovered: Vec::new(),
        }
    }

    /// The API operation that failed
    pub fn operation(&self) -> &str {
        self.source.operation()
    }
}
