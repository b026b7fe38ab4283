//! Error types for the collection subsystem.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for collection operations.
pub type CollectResult<T> = Result<T, CollectError>;

/// Failure of a single query against a single node.
///
/// Any of these degrades the node to unreachable-for-this-pass; none of
/// them aborts the pass.
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    /// The node did not answer within its deadline.
    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    /// The underlying RPC failed.
    #[error("rpc failure: {0}")]
    Rpc(String),

    /// The node answered with something that could not be decoded.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Failure of a whole collection pass.
#[derive(Debug, Error)]
pub enum CollectError {
    /// The candidate-node inventory itself could not be enumerated; without
    /// it there is nothing to collect from.
    #[error("node inventory unavailable: {0}")]
    InventoryUnavailable(#[source] QueryError),
}
