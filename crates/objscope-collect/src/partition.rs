//! Network-partition detection over per-node membership reports.
//!
//! Reachable nodes are grouped by the membership set each one reports; more
//! than one distinct group means the cluster is partitioned. Group order is
//! a deterministic total order (smallest member UUID first), never
//! first-to-respond.

use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;
use uuid::Uuid;

use objscope_core::snapshot::PartitionGroup;

/// Groups reachable nodes by the membership set each reported.
///
/// The returned groups are ordered by their smallest member UUID, which is
/// the tie-break order used when a partition must be chosen arbitrarily.
pub fn group_by_membership(reports: &BTreeMap<Uuid, BTreeSet<Uuid>>) -> Vec<PartitionGroup> {
    let mut by_membership: BTreeMap<BTreeSet<Uuid>, BTreeSet<Uuid>> = BTreeMap::new();
    for (&reporter, membership) in reports {
        by_membership
            .entry(membership.clone())
            .or_default()
            .insert(reporter);
    }

    let mut groups: Vec<PartitionGroup> = by_membership
        .into_iter()
        .map(|(members, reporters)| PartitionGroup { members, reporters })
        .collect();
    groups.sort_by_key(|g| g.min_member());

    if groups.len() > 1 {
        warn!(
            groups = groups.len(),
            "reachable nodes disagree on cluster membership"
        );
    }
    groups
}

/// Index of the group the given node belongs to, if any.
///
/// A node that reported this pass is matched by reporter; an unreachable
/// node is matched by the membership sets others reported it in.
pub fn partition_of(groups: &[PartitionGroup], node: Uuid) -> Option<usize> {
    if let Some(idx) = groups.iter().position(|g| g.reporters.contains(&node)) {
        return Some(idx);
    }
    groups.iter().position(|g| g.members.contains(&node))
}
