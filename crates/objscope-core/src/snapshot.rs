//! Point-in-time cluster state: nodes, disks, objects and the live
//! control-plane directory, plus the collection manifest.
//!
//! A snapshot lives for one evaluation pass. This subsystem only reads,
//! classifies and reports; objects and disks are created and destroyed by
//! the storage control plane itself.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::topology::StorageObject;
use crate::types::{ComponentId, DiskId, NodeId, ObjectId};

/// Storage role of a disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiskTier {
    /// Capacity tier: holds object data.
    Capacity,
    /// Cache tier: absorbs writes and caches reads.
    Cache,
}

/// One physical disk as reported by its node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disk {
    /// Disk identity.
    pub uuid: DiskId,
    /// Node the disk is attached to.
    pub node: NodeId,
    /// Storage role.
    pub tier: DiskTier,
    /// Opaque fault-flags bitfield; zero means healthy.
    pub health_flags: u64,
    /// Raw capacity in bytes.
    pub capacity_bytes: u64,
    /// Bytes in use.
    pub used_bytes: u64,
    /// Bytes reserved for in-flight placement.
    pub reserved_bytes: u64,
}

impl Disk {
    /// True if no fault flag is raised.
    pub fn is_healthy(&self) -> bool {
        self.health_flags == 0
    }

    /// Bytes neither used nor reserved.
    pub fn free_bytes(&self) -> u64 {
        self.capacity_bytes
            .saturating_sub(self.used_bytes)
            .saturating_sub(self.reserved_bytes)
    }
}

/// One cluster node as observed at collection time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Node identity.
    pub uuid: NodeId,
    /// Display name.
    pub name: String,
    /// Whether the node answered this pass.
    pub connected: bool,
    /// Index into [`ClusterSnapshot::partitions`] for the membership group
    /// this node reported, when it answered.
    pub partition: Option<usize>,
}

/// One live row of the control plane's component directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Component identity.
    pub component: ComponentId,
    /// Disk the component is allocated on.
    pub disk: DiskId,
    /// Node hosting the disk, when the directory records it.
    pub node: Option<NodeId>,
}

/// A set of nodes that agree on cluster membership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionGroup {
    /// The membership set these nodes report.
    pub members: BTreeSet<NodeId>,
    /// Reachable nodes that reported exactly this membership set.
    pub reporters: BTreeSet<NodeId>,
}

impl PartitionGroup {
    /// Smallest member UUID; the deterministic tie-break key.
    pub fn min_member(&self) -> Option<NodeId> {
        self.members.iter().next().copied()
    }
}

/// Scope of truth a snapshot represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotView {
    /// All reachable nodes agreed on membership.
    Unified,
    /// The cluster is partitioned; object state reflects a single
    /// partition's view and may not reflect global truth.
    SinglePartition {
        /// Index of the deterministically chosen default partition.
        default_group: usize,
    },
}

/// One entry of the collection manifest: something that could not be
/// gathered, and why. Warnings reduce completeness, never abort a pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CollectWarning {
    /// Node was already marked disconnected by the inventory.
    NodeUnreachable {
        /// The disconnected node.
        node: NodeId,
        /// Its display name.
        name: String,
    },
    /// Node did not answer within its query or pass deadline.
    NodeTimedOut {
        /// The node that timed out.
        node: NodeId,
    },
    /// One query against a node failed; the node was dropped for this pass.
    QueryFailed {
        /// The node the query targeted.
        node: NodeId,
        /// What was being queried.
        what: String,
        /// The failure as reported.
        reason: String,
    },
    /// One entity in a node's response was malformed and dropped.
    MalformedEntry {
        /// The reporting node.
        node: NodeId,
        /// Identity of the dropped entity, as far as it could be read.
        entity: String,
        /// Why it was dropped.
        reason: String,
    },
    /// Reachable nodes disagreed on membership.
    PartitionDetected {
        /// Number of distinct membership groups observed.
        groups: usize,
    },
}

impl fmt::Display for CollectWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectWarning::NodeUnreachable { node, name } => {
                write!(f, "node {} ({}) unreachable", name, node)
            }
            CollectWarning::NodeTimedOut { node } => {
                write!(f, "node {} timed out", node)
            }
            CollectWarning::QueryFailed { node, what, reason } => {
                write!(f, "query '{}' against node {} failed: {}", what, node, reason)
            }
            CollectWarning::MalformedEntry {
                node,
                entity,
                reason,
            } => {
                write!(f, "dropped {} from node {}: {}", entity, node, reason)
            }
            CollectWarning::PartitionDetected { groups } => {
                write!(f, "cluster is partitioned into {} membership groups", groups)
            }
        }
    }
}

/// Point-in-time aggregate of everything one collection pass gathered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    /// Candidate nodes and what was observed about them.
    pub nodes: HashMap<NodeId, NodeInfo>,
    /// Disk inventory, merged across reachable nodes.
    pub disks: HashMap<DiskId, Disk>,
    /// Normalized storage objects.
    pub objects: HashMap<ObjectId, StorageObject>,
    /// Live component directory, merged across reachable nodes.
    pub directory: Vec<DirectoryEntry>,
    /// Distinct membership groups observed, ordered by smallest member UUID.
    pub partitions: Vec<PartitionGroup>,
    /// Whether this snapshot is a global or partition-local view.
    pub view: SnapshotView,
    /// The collection manifest.
    pub warnings: Vec<CollectWarning>,
}

impl Default for SnapshotView {
    fn default() -> Self {
        SnapshotView::Unified
    }
}

impl ClusterSnapshot {
    /// True when more than one membership group was observed.
    pub fn is_partitioned(&self) -> bool {
        self.partitions.len() > 1
    }

    /// Component ids currently present in the live directory.
    pub fn live_components(&self) -> HashSet<ComponentId> {
        self.directory.iter().map(|e| e.component).collect()
    }

    /// Disks attached to the given node.
    pub fn disks_on_node(&self, node: NodeId) -> Vec<&Disk> {
        self.disks.values().filter(|d| d.node == node).collect()
    }
}
