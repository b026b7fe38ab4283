//! Service seams to the storage control plane.
//!
//! The collector is protocol-agnostic: callers supply implementations of
//! these traits wrapping whatever transport reaches their nodes. Explicit
//! adapter types at this seam, never extensions of vendor objects.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use objscope_core::snapshot::{DirectoryEntry, Disk};
use objscope_core::topology::RawObject;

use crate::error::QueryError;

/// One candidate node with its reachability state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeProbe {
    /// Node identity.
    pub uuid: Uuid,
    /// Display name.
    pub name: String,
    /// Whether the inventory currently considers the node reachable.
    pub connected: bool,
}

/// Enumerates candidate nodes and their reachability.
#[async_trait]
pub trait NodeInventoryService: Send + Sync {
    /// Lists every node the cluster is expected to contain.
    async fn candidate_nodes(&self) -> Result<Vec<NodeProbe>, QueryError>;
}

/// Queries one node for its local view of the cluster.
///
/// Each call is independently fallible; the collector wraps every call in
/// its own timeout.
#[async_trait]
pub trait NodeQueryService: Send + Sync {
    /// The membership set this node currently believes in.
    async fn list_membership(&self, node: Uuid) -> Result<BTreeSet<Uuid>, QueryError>;

    /// Disks attached to this node.
    async fn list_disks(&self, node: Uuid) -> Result<Vec<Disk>, QueryError>;

    /// Raw, pre-normalization object topologies known to this node.
    async fn list_objects(&self, node: Uuid) -> Result<Vec<RawObject>, QueryError>;

    /// Live component directory entries known to this node.
    async fn list_directory(&self, node: Uuid) -> Result<Vec<DirectoryEntry>, QueryError>;
}
