#![warn(missing_docs)]

//! Objscope core: availability, quorum and health evaluation for replicated
//! storage objects.
//!
//! Everything in this crate is pure computation over an already-collected
//! [`snapshot::ClusterSnapshot`]: the replica state machine, the object
//! topology model, the availability/quorum evaluator, the orphan detector
//! and the cluster health report aggregator. No I/O happens here; the
//! companion `objscope-collect` crate assembles snapshots from live nodes.

pub mod assess;
pub mod error;
pub mod eval;
pub mod orphan;
pub mod report;
pub mod snapshot;
pub mod state;
pub mod topology;
pub mod types;

pub use assess::{assess_cluster, ClusterAssessment, EvaluatedObject, SkippedObject};
pub use error::{CoreError, CoreResult};
pub use eval::{evaluate_object, LivenessFailure, ObjectHealth};
pub use orphan::{detect_orphans, ObjectOrphanStatus, OrphanReport, RemovalCandidate, RemovalKind};
pub use report::{
    aggregate_report, ClusterHealthReport, ClusterStatus, FailureSimulation, HistogramBucket,
    NodeRollup,
};
pub use snapshot::{
    ClusterSnapshot, CollectWarning, DirectoryEntry, Disk, DiskTier, NodeInfo, PartitionGroup,
    SnapshotView,
};
pub use state::{Replica, ReplicaState, Witness, REPLICA_FLAG_OWNER_STALE};
pub use topology::{
    normalize_object, GroupKind, RawNode, RawObject, StorageObject, TopologyNode,
    MAX_TOPOLOGY_DEPTH,
};
