//! Replica lifecycle states and health classification.
//!
//! States arrive already-set from the storage control plane; this subsystem
//! never performs transitions, it only classifies what it reads.

use serde::{Deserialize, Serialize};

use crate::types::{ComponentId, DiskId};

/// Bit on [`Replica::flags`] set by the control plane when the owner has
/// marked an otherwise-active replica as holding stale data.
pub const REPLICA_FLAG_OWNER_STALE: u64 = 1 << 0;

/// Lifecycle state of one component as recorded by the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReplicaState {
    /// Sentinel: lowest state value.
    First,
    /// Component has no recorded state.
    None,
    /// Component created but not yet configured.
    NeedConfig,
    /// Initialization in progress.
    Initialize,
    /// Initialized but not serving.
    Initialized,
    /// Serving reads and writes.
    Active,
    /// Not reachable by its owner.
    Absent,
    /// Marked stale by the owner.
    Stale,
    /// Catching up from a peer.
    Resynching,
    /// Present but missing writes.
    Degraded,
    /// Part of an in-flight reconfiguration; still serving.
    Reconfiguring,
    /// Being torn down.
    Cleanup,
    /// Short-lived bookkeeping state.
    Transient,
    /// Sentinel: highest state value.
    Last,
    /// Any state name this model does not recognize; classifies as unhealthy.
    Unknown,
}

impl ReplicaState {
    /// Parses a control-plane state name, case-insensitively.
    ///
    /// Unrecognized names map to [`ReplicaState::Unknown`] rather than
    /// failing the node's whole payload.
    pub fn from_wire(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "FIRST" => ReplicaState::First,
            "NONE" => ReplicaState::None,
            "NEED_CONFIG" => ReplicaState::NeedConfig,
            "INITIALIZE" => ReplicaState::Initialize,
            "INITIALIZED" => ReplicaState::Initialized,
            "ACTIVE" => ReplicaState::Active,
            "ABSENT" => ReplicaState::Absent,
            "STALE" => ReplicaState::Stale,
            "RESYNCHING" => ReplicaState::Resynching,
            "DEGRADED" => ReplicaState::Degraded,
            "RECONFIGURING" => ReplicaState::Reconfiguring,
            "CLEANUP" => ReplicaState::Cleanup,
            "TRANSIENT" => ReplicaState::Transient,
            "LAST" => ReplicaState::Last,
            _ => ReplicaState::Unknown,
        }
    }

    /// True for states that count toward quorum and can serve I/O.
    /// Reconfiguring components still vote and serve.
    pub fn counts_as_active(&self) -> bool {
        matches!(self, ReplicaState::Active | ReplicaState::Reconfiguring)
    }
}

/// One data-bearing leaf of an object's topology tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Replica {
    /// Component identity in the control-plane directory.
    pub component: ComponentId,
    /// Disk this replica lives on.
    pub disk: DiskId,
    /// Lifecycle state as recorded by the control plane.
    pub state: ReplicaState,
    /// Weighted quorum vote, at least 1.
    pub votes: u32,
    /// Bytes still to copy before this replica is in sync.
    pub bytes_to_sync: u64,
    /// Sequence number recorded on the replica, if any.
    pub recorded_csn: Option<u64>,
    /// Opaque attribute bitmask; see [`REPLICA_FLAG_OWNER_STALE`].
    pub flags: u64,
}

impl Replica {
    /// True if this replica currently serves I/O.
    pub fn is_active(&self) -> bool {
        self.state.counts_as_active()
    }

    /// True if this replica is catching up and making progress.
    pub fn is_resyncing(&self) -> bool {
        matches!(self.state, ReplicaState::Resynching | ReplicaState::Absent)
            && self.bytes_to_sync != 0
    }

    /// True if this replica counts as healthy: active or resyncing.
    pub fn is_healthy(&self) -> bool {
        self.is_active() || self.is_resyncing()
    }

    /// True if this replica's data lags the object's current sequence
    /// number.
    ///
    /// Advisory for operators; staleness does not by itself change the
    /// health classification.
    pub fn is_stale(&self, object_csn: u64) -> bool {
        match self.state {
            ReplicaState::Absent | ReplicaState::Degraded => {
                self.recorded_csn != Some(object_csn)
            }
            ReplicaState::Active => self.flags & REPLICA_FLAG_OWNER_STALE != 0,
            _ => false,
        }
    }
}

/// A vote-only leaf: breaks quorum ties, holds no data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Witness {
    /// Component identity in the control-plane directory.
    pub component: ComponentId,
    /// Disk the witness metadata lives on.
    pub disk: DiskId,
    /// Lifecycle state as recorded by the control plane.
    pub state: ReplicaState,
    /// Weighted quorum vote, at least 1.
    pub votes: u32,
}

impl Witness {
    /// True if this witness currently contributes its vote.
    pub fn is_active(&self) -> bool {
        self.state.counts_as_active()
    }
}
