//! Availability and quorum evaluation for one storage object.
//!
//! Pure recursive walk over the normalized topology tree; no I/O. The walk
//! is skipped entirely when every leaf is active, since no group rule can
//! then fail.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CoreError, CoreResult};
use crate::snapshot::Disk;
use crate::topology::{GroupKind, StorageObject, TopologyNode, MAX_TOPOLOGY_DEPTH};
use crate::types::{DiskId, ObjectId};

/// Why an object cannot currently serve I/O.
///
/// Quorum loss and data-path loss call for different operator remediation,
/// so the causes are reported separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LivenessFailure {
    /// A majority of weighted votes is missing; the data path is intact.
    QuorumLost,
    /// Quorum holds but the replication tree cannot serve reads.
    DataPathDown,
    /// Both quorum and the data path are lost.
    QuorumLostAndDataPathDown,
}

/// Per-object evaluation result. Recomputed every pass, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectHealth {
    /// The evaluated object.
    pub object: ObjectId,
    /// Data replicas in the topology.
    pub total_replicas: u32,
    /// Replicas classified healthy (active or resyncing).
    pub healthy_replicas: u32,
    /// Replicas currently serving I/O.
    pub active_replicas: u32,
    /// Replicas whose data lags the object's sequence number. Advisory.
    pub stale_replicas: u32,
    /// Replicas catching up with pending bytes.
    pub resyncing_replicas: u32,
    /// Total bytes still to sync across all replicas.
    pub bytes_to_sync: u64,
    /// Weighted votes across all leaves, witnesses included.
    pub total_votes: u64,
    /// Weighted votes held by healthy leaves.
    pub valid_votes: u64,
    /// Strict majority of weighted votes is healthy.
    pub has_quorum: bool,
    /// The replication tree can serve reads.
    pub is_available: bool,
    /// `has_quorum && is_available`: the object can serve I/O.
    pub has_liveness: bool,
    /// Disks referenced by leaves but absent from the snapshot inventory.
    /// Affected leaves were treated as unhealthy.
    pub unresolved_disks: Vec<DiskId>,
}

impl ObjectHealth {
    /// Live but running with reduced redundancy.
    pub fn is_degraded(&self) -> bool {
        self.has_liveness && self.healthy_replicas < self.total_replicas
    }

    /// The cause of liveness loss, when the object cannot serve I/O.
    pub fn liveness_failure(&self) -> Option<LivenessFailure> {
        match (self.has_quorum, self.is_available) {
            (true, true) => None,
            (false, true) => Some(LivenessFailure::QuorumLost),
            (true, false) => Some(LivenessFailure::DataPathDown),
            (false, false) => Some(LivenessFailure::QuorumLostAndDataPathDown),
        }
    }
}

/// Evaluates availability and quorum for one object against the snapshot's
/// disk inventory.
///
/// A replica whose disk does not resolve is treated as unhealthy and
/// reported, not crashed on. Errors here are fatal only to this object.
pub fn evaluate_object(
    object: &StorageObject,
    disks: &HashMap<DiskId, Disk>,
) -> CoreResult<ObjectHealth> {
    let replicas = object.replicas();
    let witnesses = object.witnesses();

    let mut unresolved = BTreeSet::new();
    for replica in &replicas {
        if !disks.contains_key(&replica.disk) {
            unresolved.insert(replica.disk);
        }
    }
    for witness in &witnesses {
        if !disks.contains_key(&witness.disk) {
            unresolved.insert(witness.disk);
        }
    }
    if !unresolved.is_empty() {
        warn!(
            object = %object.uuid,
            disks = unresolved.len(),
            "object references disks missing from the inventory; treating those leaves as unhealthy"
        );
    }

    let mut health = ObjectHealth {
        object: object.uuid,
        total_replicas: replicas.len() as u32,
        healthy_replicas: 0,
        active_replicas: 0,
        stale_replicas: 0,
        resyncing_replicas: 0,
        bytes_to_sync: 0,
        total_votes: 0,
        valid_votes: 0,
        has_quorum: false,
        is_available: false,
        has_liveness: false,
        unresolved_disks: unresolved.iter().copied().collect(),
    };

    let mut all_leaves_active = true;
    let mut leaf_count = 0usize;

    for replica in &replicas {
        leaf_count += 1;
        let resolved = disks.contains_key(&replica.disk);
        let active = replica.is_active() && resolved;
        let healthy = replica.is_healthy() && resolved;

        health.total_votes += replica.votes as u64;
        if healthy {
            health.healthy_replicas += 1;
            health.valid_votes += replica.votes as u64;
        }
        if active {
            health.active_replicas += 1;
        } else {
            all_leaves_active = false;
        }
        if replica.is_resyncing() {
            health.resyncing_replicas += 1;
        }
        if replica.is_stale(object.csn) {
            health.stale_replicas += 1;
        }
        health.bytes_to_sync += replica.bytes_to_sync;
    }

    for witness in &witnesses {
        leaf_count += 1;
        let active = witness.is_active() && disks.contains_key(&witness.disk);
        health.total_votes += witness.votes as u64;
        if active {
            health.valid_votes += witness.votes as u64;
        } else {
            all_leaves_active = false;
        }
    }

    health.has_quorum = 2 * health.valid_votes > health.total_votes;

    // Short-circuit: with every leaf active no group rule can fail.
    health.is_available = if leaf_count > 0 && all_leaves_active {
        true
    } else {
        eval_subtree(object.uuid, &object.root, disks, 0)?
    };
    health.has_liveness = health.has_quorum && health.is_available;

    Ok(health)
}

/// Recursive availability rule.
///
/// Zero-child convention: a group with no (relevant) children evaluates
/// `false` for every kind, including Stripe and Concatenation. A grouping
/// node with nothing under it cannot serve data.
fn eval_subtree(
    object: ObjectId,
    node: &TopologyNode,
    disks: &HashMap<DiskId, Disk>,
    depth: usize,
) -> CoreResult<bool> {
    if depth >= MAX_TOPOLOGY_DEPTH {
        return Err(CoreError::TopologyTooDeep {
            object,
            max: MAX_TOPOLOGY_DEPTH,
        });
    }

    match node {
        TopologyNode::Replica(r) => Ok(r.is_active() && disks.contains_key(&r.disk)),
        TopologyNode::Witness(w) => Ok(w.is_active() && disks.contains_key(&w.disk)),
        TopologyNode::Group { kind, children } => {
            // Witnesses vote; they never carry data availability.
            let relevant: Vec<&TopologyNode> = match kind {
                GroupKind::Configuration => children
                    .iter()
                    .filter(|c| !matches!(c, TopologyNode::Witness(_)))
                    .collect(),
                _ => children.iter().collect(),
            };
            if relevant.is_empty() {
                return Ok(false);
            }

            let mut failed = 0usize;
            for child in &relevant {
                if !eval_subtree(object, child, disks, depth + 1)? {
                    failed += 1;
                }
            }
            Ok(failed <= kind.tolerated_failures(relevant.len()))
        }
    }
}
