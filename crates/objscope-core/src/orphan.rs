//! Orphan and leak detection: cross-references each object's leaves against
//! the disk inventory and the control plane's live directory.
//!
//! Detection only classifies and returns removal candidates with their
//! evidence. Any destructive action is a separate, explicitly-confirmed
//! operation outside this crate.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::snapshot::{ClusterSnapshot, DirectoryEntry};
use crate::state::ReplicaState;
use crate::types::{ComponentId, DiskId, ObjectId};

/// Evidence for one leaf classified as deleted.
///
/// Deleted means: the leaf is unhealthy, its disk is present and healthy,
/// and the live directory no longer lists its component id. The stored
/// topology references something the control plane has dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletedComponent {
    /// The component the topology still references.
    pub component: ComponentId,
    /// Its owning disk, present and healthy at classification time.
    pub disk: DiskId,
    /// The recorded lifecycle state.
    pub state: ReplicaState,
}

/// Orphan classification for one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectOrphanStatus {
    /// The classified object.
    pub object: ObjectId,
    /// Leaves in the object's topology, witnesses included.
    pub total_leaves: u32,
    /// Leaves classified deleted, with evidence.
    pub deleted: Vec<DeletedComponent>,
    /// A majority of leaves is provably gone; the object is garbage.
    pub is_orphan: bool,
    /// Some evidence of deletion, not enough to conclude garbage. Must be
    /// surfaced for manual judgment, never auto-deleted.
    pub is_orphan_candidate: bool,
}

/// What a removal candidate refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemovalKind {
    /// A whole object whose leaves are majority-deleted.
    OrphanObject,
    /// A live directory entry no object references.
    LeakedComponent,
}

/// One entry of the removal-candidate list handed to the remediation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovalCandidate {
    /// What kind of entity this candidate is.
    pub kind: RemovalKind,
    /// The affected object, for [`RemovalKind::OrphanObject`].
    pub object: Option<ObjectId>,
    /// The affected component, for [`RemovalKind::LeakedComponent`].
    pub component: Option<ComponentId>,
    /// Why this entity was classified, and on which evidence.
    pub evidence: String,
}

impl fmt::Display for RemovalCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            RemovalKind::OrphanObject => write!(
                f,
                "orphan object {}: {}",
                self.object.map(|o| o.to_string()).unwrap_or_default(),
                self.evidence
            ),
            RemovalKind::LeakedComponent => write!(
                f,
                "leaked component {}: {}",
                self.component.map(|c| c.to_string()).unwrap_or_default(),
                self.evidence
            ),
        }
    }
}

/// Result of one orphan-detection run over a snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OrphanReport {
    /// Per-object classification, for every object in the snapshot.
    pub objects: Vec<ObjectOrphanStatus>,
    /// Live directory entries referenced by no object topology.
    pub leaked: Vec<DirectoryEntry>,
    /// Removal candidates with justification, for the remediation layer.
    pub candidates: Vec<RemovalCandidate>,
}

/// Classifies every object and the live directory of one snapshot.
///
/// Pure and idempotent: the same snapshot always yields the same report.
pub fn detect_orphans(snapshot: &ClusterSnapshot) -> OrphanReport {
    let live = snapshot.live_components();
    let mut report = OrphanReport::default();
    let mut referenced: HashSet<ComponentId> = HashSet::new();

    // BTreeMap order keeps the report deterministic across runs.
    let objects: BTreeMap<&ObjectId, _> = snapshot.objects.iter().collect();

    for (&uuid, object) in objects {
        let mut status = ObjectOrphanStatus {
            object: uuid,
            total_leaves: object.root.leaf_count() as u32,
            deleted: Vec::new(),
            is_orphan: false,
            is_orphan_candidate: false,
        };

        let mut leaves: Vec<(ComponentId, DiskId, ReplicaState, bool)> = object
            .replicas()
            .iter()
            .map(|r| (r.component, r.disk, r.state, r.is_healthy()))
            .collect();
        leaves.extend(
            object
                .witnesses()
                .iter()
                .map(|w| (w.component, w.disk, w.state, w.is_active())),
        );

        for (component, disk, state, healthy) in leaves {
            referenced.insert(component);
            if healthy {
                continue;
            }
            let disk_ok = snapshot
                .disks
                .get(&disk)
                .map(|d| d.is_healthy())
                .unwrap_or(false);
            if disk_ok && !live.contains(&component) {
                status.deleted.push(DeletedComponent {
                    component,
                    disk,
                    state,
                });
            }
        }

        let num_deleted = status.deleted.len() as u32;
        if num_deleted > 0 {
            if 2 * num_deleted > status.total_leaves {
                status.is_orphan = true;
            } else {
                status.is_orphan_candidate = true;
            }
            debug!(
                object = %uuid,
                deleted = num_deleted,
                total = status.total_leaves,
                orphan = status.is_orphan,
                "object has deleted components"
            );
        }

        if status.is_orphan {
            report.candidates.push(RemovalCandidate {
                kind: RemovalKind::OrphanObject,
                object: Some(uuid),
                component: None,
                evidence: format!(
                    "{} of {} components unhealthy on healthy disks and absent from the live directory",
                    num_deleted, status.total_leaves
                ),
            });
        }

        report.objects.push(status);
    }

    // Structural leaks: live allocations with no owning object at all.
    let mut seen_leaked: HashSet<ComponentId> = HashSet::new();
    let mut leaked: Vec<DirectoryEntry> = snapshot
        .directory
        .iter()
        .filter(|e| !referenced.contains(&e.component) && seen_leaked.insert(e.component))
        .cloned()
        .collect();
    leaked.sort_by_key(|e| e.component);

    for entry in &leaked {
        report.candidates.push(RemovalCandidate {
            kind: RemovalKind::LeakedComponent,
            object: None,
            component: Some(entry.component),
            evidence: format!(
                "live directory entry on disk {} referenced by no known object topology",
                entry.disk
            ),
        });
    }
    report.leaked = leaked;

    report
}
