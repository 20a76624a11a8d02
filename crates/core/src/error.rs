//! Consistency errors - programmer misuse detected before a pass runs.

use crate::key::ItemKey;

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, ConsistencyError>;

/// Inputs the engine refuses to roll up because the output would be wrong.
///
/// Missing data never lands here; it degrades to `None` windows instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsistencyError {
    /// Two items share a key
    #[error("duplicate item key: {0}")]
    DuplicateKey(ItemKey),

    /// Reporting type is not in the hierarchy
    #[error("type '{0}' is not part of the configured hierarchy")]
    UnknownType(String),

    /// No hierarchy types were configured
    #[error("hierarchy is empty")]
    EmptyHierarchy,
}
