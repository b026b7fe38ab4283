//! Assessment driver: evaluates every object in a snapshot, runs orphan
//! detection and reduces everything into the cluster health report.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::eval::{evaluate_object, ObjectHealth};
use crate::orphan::{detect_orphans, ObjectOrphanStatus, RemovalCandidate};
use crate::report::{aggregate_report, ClusterHealthReport};
use crate::snapshot::{ClusterSnapshot, DirectoryEntry};
use crate::types::{NodeId, ObjectId};

/// One object with its availability and orphan classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatedObject {
    /// The object.
    pub object: ObjectId,
    /// Node that owns and services it.
    pub owner: NodeId,
    /// Availability/quorum evaluation.
    pub health: ObjectHealth,
    /// Orphan classification.
    pub orphan: ObjectOrphanStatus,
}

/// An object the pass could not evaluate, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedObject {
    /// The affected object.
    pub object: ObjectId,
    /// The evaluator error, rendered.
    pub reason: String,
}

/// Complete output of one assessment pass over a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterAssessment {
    /// Per-object results, ordered by object UUID.
    pub objects: Vec<EvaluatedObject>,
    /// Live directory entries no object references.
    pub leaked: Vec<DirectoryEntry>,
    /// Removal candidates for the remediation layer.
    pub candidates: Vec<RemovalCandidate>,
    /// The aggregated health report.
    pub report: ClusterHealthReport,
    /// Objects skipped because their evaluation failed.
    pub skipped: Vec<SkippedObject>,
}

/// Runs the full evaluation pass over one snapshot.
///
/// Evaluator failures are fatal only to the affected object: it lands in
/// `skipped` and the pass continues. The report always carries the
/// collection manifest alongside the computed health data.
pub fn assess_cluster(snapshot: &ClusterSnapshot) -> ClusterAssessment {
    let orphan_report = detect_orphans(snapshot);
    let mut orphan_by_object: BTreeMap<ObjectId, ObjectOrphanStatus> = orphan_report
        .objects
        .into_iter()
        .map(|status| (status.object, status))
        .collect();

    let ordered: BTreeMap<&ObjectId, _> = snapshot.objects.iter().collect();
    let mut objects = Vec::with_capacity(ordered.len());
    let mut skipped = Vec::new();

    for (&uuid, object) in ordered {
        match evaluate_object(object, &snapshot.disks) {
            Ok(health) => {
                let orphan =
                    orphan_by_object
                        .remove(&uuid)
                        .unwrap_or_else(|| ObjectOrphanStatus {
                            object: uuid,
                            total_leaves: object.root.leaf_count() as u32,
                            deleted: Vec::new(),
                            is_orphan: false,
                            is_orphan_candidate: false,
                        });
                objects.push(EvaluatedObject {
                    object: uuid,
                    owner: object.owner,
                    health,
                    orphan,
                });
            }
            Err(err) => {
                warn!(object = %uuid, error = %err, "skipping object: evaluation failed");
                skipped.push(SkippedObject {
                    object: uuid,
                    reason: err.to_string(),
                });
            }
        }
    }

    let report = aggregate_report(snapshot, &objects);
    info!(
        objects = objects.len(),
        skipped = skipped.len(),
        status = ?report.status,
        partitioned = snapshot.is_partitioned(),
        "assessment pass complete"
    );

    ClusterAssessment {
        objects,
        leaked: orphan_report.leaked,
        candidates: orphan_report.candidates,
        report,
        skipped,
    }
}
