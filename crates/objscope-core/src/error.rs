//! Error types for the core evaluation subsystem.

use thiserror::Error;

use crate::types::ObjectId;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Error variants for topology normalization and evaluation.
///
/// All of these are fatal only to the affected object: an evaluation pass
/// skips the object, records the failure in its manifest and continues.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    /// Topology tree exceeds the supported nesting depth.
    #[error("Topology of object {object} deeper than {max} levels")]
    TopologyTooDeep {
        /// The object whose tree was rejected.
        object: ObjectId,
        /// The enforced depth limit.
        max: usize,
    },

    /// A grouping node carried a kind string the model does not know.
    #[error("Unknown group kind '{kind}' in object {object}")]
    UnknownGroupKind {
        /// The object whose tree was rejected.
        object: ObjectId,
        /// The unrecognized kind string as received.
        kind: String,
    },

    /// A topology node was structurally invalid (missing identity, bad field).
    #[error("Malformed topology node in object {object}: {reason}")]
    MalformedTopology {
        /// The object whose tree was rejected.
        object: ObjectId,
        /// Description of what was wrong.
        reason: String,
    },
}
