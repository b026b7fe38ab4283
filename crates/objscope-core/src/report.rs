//! Cluster health report aggregation: pure reduction over evaluated
//! objects into per-cluster and per-node summaries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::assess::EvaluatedObject;
use crate::snapshot::{ClusterSnapshot, CollectWarning, SnapshotView};
use crate::types::NodeId;

/// Utilization above this percentage flags a node rollup as a warning.
pub const CAPACITY_WARNING_PERCENT: f64 = 80.0;

/// Utilization above this percentage flags a node rollup as critical.
pub const CAPACITY_CRITICAL_PERCENT: f64 = 95.0;

/// One cell of the replica-health histogram.
///
/// Objects with any deletion evidence (orphans and orphan candidates) are
/// counted in the `orphan_candidate` column, everything else in `normal`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramBucket {
    /// Healthy replica count of the objects in this bucket.
    pub healthy: u32,
    /// Total replica count of the objects in this bucket.
    pub total: u32,
    /// Objects with no deletion evidence.
    pub normal: u64,
    /// Objects flagged orphan or orphan candidate.
    pub orphan_candidate: u64,
}

/// Per-node capacity and replica rollup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRollup {
    /// The node.
    pub node: NodeId,
    /// Display name.
    pub name: String,
    /// Whether the node answered this pass.
    pub connected: bool,
    /// Summed disk capacity in bytes.
    pub capacity_bytes: u64,
    /// Summed bytes in use.
    pub used_bytes: u64,
    /// Summed bytes reserved.
    pub reserved_bytes: u64,
    /// Summed free bytes.
    pub free_bytes: u64,
    /// Replicas hosted on this node's disks.
    pub replica_count: u32,
    /// Objects owned (served) by this node.
    pub objects_owned: u32,
}

impl NodeRollup {
    /// Used capacity as a percentage of total.
    pub fn utilization_percent(&self) -> f64 {
        if self.capacity_bytes == 0 {
            return 0.0;
        }
        (self.used_bytes as f64 / self.capacity_bytes as f64) * 100.0
    }

    /// True above the warning watermark.
    pub fn is_capacity_warning(&self) -> bool {
        self.utilization_percent() > CAPACITY_WARNING_PERCENT
    }

    /// True above the critical watermark.
    pub fn is_capacity_critical(&self) -> bool {
        self.utilization_percent() > CAPACITY_CRITICAL_PERCENT
    }
}

/// What-if projection for losing the single most-loaded node.
///
/// Assumes the removed node's data re-replicates fully and spreads evenly
/// across the survivors. An approximation, not a placement solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureSimulation {
    /// The node the simulation removes.
    pub removed_node: NodeId,
    /// Capacity the cluster loses with it.
    pub removed_capacity_bytes: u64,
    /// Bytes that would need re-replication.
    pub removed_used_bytes: u64,
    /// Capacity remaining across survivors.
    pub remaining_capacity_bytes: u64,
    /// Bytes in use after full re-replication.
    pub projected_used_bytes: u64,
    /// Projected utilization of the surviving capacity.
    pub projected_utilization_percent: f64,
    /// Survivors could not hold the re-replicated data.
    pub capacity_exhausted: bool,
}

/// Overall cluster condition, worst finding wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClusterStatus {
    /// Every object live and fully replicated, capacity inside watermarks.
    Healthy,
    /// Reduced redundancy, deletion evidence or a capacity warning.
    Degraded,
    /// At least one object cannot serve I/O, or a single-node loss would
    /// exhaust capacity.
    Critical,
}

impl ClusterStatus {
    /// Numeric severity for worst-of folds.
    pub fn severity(&self) -> u8 {
        match self {
            ClusterStatus::Healthy => 0,
            ClusterStatus::Degraded => 1,
            ClusterStatus::Critical => 2,
        }
    }
}

/// The aggregated cluster health view handed to presentation layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterHealthReport {
    /// Overall condition.
    pub status: ClusterStatus,
    /// Objects evaluated.
    pub object_count: u32,
    /// Objects whose replication tree can serve reads.
    pub available_objects: u32,
    /// Objects holding vote quorum.
    pub quorate_objects: u32,
    /// Objects able to serve I/O (quorum and availability).
    pub live_objects: u32,
    /// Live objects running with reduced redundancy.
    pub degraded_objects: u32,
    /// Objects classified orphan.
    pub orphan_objects: u32,
    /// Objects with partial deletion evidence.
    pub orphan_candidate_objects: u32,
    /// Replica-health histogram.
    pub histogram: Vec<HistogramBucket>,
    /// Per-node rollups, ordered by node UUID.
    pub nodes: Vec<NodeRollup>,
    /// Single-node-loss projection; absent with fewer than two
    /// capacity-bearing nodes.
    pub failure_simulation: Option<FailureSimulation>,
    /// Results reflect one partition's view and may not be global truth.
    pub partition_local_view: bool,
    /// The collection manifest this report was computed under.
    pub warnings: Vec<CollectWarning>,
}

/// Reduces evaluated objects and the snapshot into one report.
pub fn aggregate_report(
    snapshot: &ClusterSnapshot,
    evaluated: &[EvaluatedObject],
) -> ClusterHealthReport {
    let mut histogram: BTreeMap<(u32, u32), (u64, u64)> = BTreeMap::new();
    let mut available = 0u32;
    let mut quorate = 0u32;
    let mut live = 0u32;
    let mut degraded = 0u32;
    let mut orphans = 0u32;
    let mut candidates = 0u32;

    for entry in evaluated {
        let health = &entry.health;
        if health.is_available {
            available += 1;
        }
        if health.has_quorum {
            quorate += 1;
        }
        if health.has_liveness {
            live += 1;
        }
        if health.is_degraded() {
            degraded += 1;
        }
        if entry.orphan.is_orphan {
            orphans += 1;
        }
        if entry.orphan.is_orphan_candidate {
            candidates += 1;
        }

        let key = (health.healthy_replicas, health.total_replicas);
        let cell = histogram.entry(key).or_insert((0, 0));
        if entry.orphan.is_orphan || entry.orphan.is_orphan_candidate {
            cell.1 += 1;
        } else {
            cell.0 += 1;
        }
    }

    let histogram: Vec<HistogramBucket> = histogram
        .into_iter()
        .map(|((healthy, total), (normal, orphan_candidate))| HistogramBucket {
            healthy,
            total,
            normal,
            orphan_candidate,
        })
        .collect();

    let nodes = node_rollups(snapshot);
    let failure_simulation = simulate_node_loss(&nodes);

    let any_capacity_warning = nodes.iter().any(|n| n.is_capacity_warning());
    let simulation_exhausted = failure_simulation
        .as_ref()
        .map(|s| s.capacity_exhausted)
        .unwrap_or(false);

    let status = if live < evaluated.len() as u32 || simulation_exhausted {
        ClusterStatus::Critical
    } else if degraded > 0 || orphans > 0 || candidates > 0 || any_capacity_warning {
        ClusterStatus::Degraded
    } else {
        ClusterStatus::Healthy
    };

    ClusterHealthReport {
        status,
        object_count: evaluated.len() as u32,
        available_objects: available,
        quorate_objects: quorate,
        live_objects: live,
        degraded_objects: degraded,
        orphan_objects: orphans,
        orphan_candidate_objects: candidates,
        histogram,
        nodes,
        failure_simulation,
        partition_local_view: matches!(snapshot.view, SnapshotView::SinglePartition { .. }),
        warnings: snapshot.warnings.clone(),
    }
}

fn node_rollups(snapshot: &ClusterSnapshot) -> Vec<NodeRollup> {
    let mut rollups: BTreeMap<NodeId, NodeRollup> = snapshot
        .nodes
        .iter()
        .map(|(&uuid, info)| {
            (
                uuid,
                NodeRollup {
                    node: uuid,
                    name: info.name.clone(),
                    connected: info.connected,
                    capacity_bytes: 0,
                    used_bytes: 0,
                    reserved_bytes: 0,
                    free_bytes: 0,
                    replica_count: 0,
                    objects_owned: 0,
                },
            )
        })
        .collect();

    for disk in snapshot.disks.values() {
        if let Some(rollup) = rollups.get_mut(&disk.node) {
            rollup.capacity_bytes += disk.capacity_bytes;
            rollup.used_bytes += disk.used_bytes;
            rollup.reserved_bytes += disk.reserved_bytes;
            rollup.free_bytes += disk.free_bytes();
        }
    }

    for object in snapshot.objects.values() {
        if let Some(rollup) = rollups.get_mut(&object.owner) {
            rollup.objects_owned += 1;
        }
        for replica in object.replicas() {
            if let Some(disk) = snapshot.disks.get(&replica.disk) {
                if let Some(rollup) = rollups.get_mut(&disk.node) {
                    rollup.replica_count += 1;
                }
            }
        }
    }

    rollups.into_values().collect()
}

fn simulate_node_loss(nodes: &[NodeRollup]) -> Option<FailureSimulation> {
    let capacity_nodes: Vec<&NodeRollup> =
        nodes.iter().filter(|n| n.capacity_bytes > 0).collect();
    if capacity_nodes.len() < 2 {
        return None;
    }

    // Most-loaded by used bytes; UUID breaks ties deterministically.
    let removed = capacity_nodes
        .iter()
        .max_by(|a, b| {
            a.used_bytes
                .cmp(&b.used_bytes)
                .then(b.node.cmp(&a.node))
        })
        .copied()?;

    let total_capacity: u64 = capacity_nodes.iter().map(|n| n.capacity_bytes).sum();
    let total_used: u64 = capacity_nodes.iter().map(|n| n.used_bytes).sum();
    let remaining_capacity = total_capacity - removed.capacity_bytes;
    // Re-replication keeps the data set intact on the survivors.
    let projected_used = total_used;

    let (projected_utilization_percent, capacity_exhausted) = if remaining_capacity == 0 {
        (100.0, true)
    } else {
        (
            (projected_used as f64 / remaining_capacity as f64) * 100.0,
            projected_used > remaining_capacity,
        )
    };

    Some(FailureSimulation {
        removed_node: removed.node,
        removed_capacity_bytes: removed.capacity_bytes,
        removed_used_bytes: removed.used_bytes,
        remaining_capacity_bytes: remaining_capacity,
        projected_used_bytes: projected_used,
        projected_utilization_percent,
        capacity_exhausted,
    })
}
