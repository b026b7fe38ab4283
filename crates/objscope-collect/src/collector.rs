//! The concurrent cluster data collector.
//!
//! Fans out to every reachable node with bounded parallelism, applies
//! per-query and pass-level deadlines, detects membership partitions and
//! merges the per-node fragments into one `ClusterSnapshot`. Failures
//! accumulate in the snapshot manifest; a slow or broken node never aborts
//! the pass.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use objscope_core::snapshot::{
    ClusterSnapshot, CollectWarning, DirectoryEntry, Disk, NodeInfo, SnapshotView,
};
use objscope_core::topology::StorageObject;

use crate::cache::PassCache;
use crate::config::CollectorConfig;
use crate::error::{CollectError, CollectResult, QueryError};
use crate::partition::{group_by_membership, partition_of};
use crate::service::{NodeInventoryService, NodeProbe, NodeQueryService};

/// Everything one node contributed to the pass.
struct NodeContribution {
    node: Uuid,
    membership: BTreeSet<Uuid>,
    disks: Vec<Disk>,
    objects: Vec<StorageObject>,
    directory: Vec<DirectoryEntry>,
    warnings: Vec<CollectWarning>,
}

/// Collects cluster state from every reachable node into a snapshot.
pub struct ClusterCollector<I, Q> {
    inventory: Arc<I>,
    query: Arc<Q>,
    config: CollectorConfig,
    cache: PassCache,
}

impl<I, Q> ClusterCollector<I, Q>
where
    I: NodeInventoryService,
    Q: NodeQueryService,
{
    /// Creates a collector over the given services.
    pub fn new(inventory: Arc<I>, query: Arc<Q>, config: CollectorConfig) -> Self {
        Self {
            inventory,
            query,
            config,
            cache: PassCache::new(),
        }
    }

    /// The pass-scoped normalization cache.
    pub fn cache(&self) -> &PassCache {
        &self.cache
    }

    /// Runs one collection pass.
    ///
    /// `consumers` maps object UUIDs to the node their consumer is
    /// registered on; under a partition, that node's view of the object is
    /// preferred. Returns an error only when the candidate inventory itself
    /// cannot be enumerated; everything else degrades into manifest
    /// warnings on the returned snapshot.
    pub async fn collect_snapshot(
        &self,
        consumers: &HashMap<Uuid, Uuid>,
    ) -> CollectResult<ClusterSnapshot> {
        self.cache.invalidate();
        let pass_start = Instant::now();

        let probes = self
            .inventory
            .candidate_nodes()
            .await
            .map_err(CollectError::InventoryUnavailable)?;

        let mut warnings = Vec::new();
        let reachable: Vec<NodeProbe> = probes.iter().filter(|p| p.connected).cloned().collect();
        for probe in probes.iter().filter(|p| !p.connected) {
            warn!(node = %probe.uuid, name = %probe.name, "skipping unreachable node");
            warnings.push(CollectWarning::NodeUnreachable {
                node: probe.uuid,
                name: probe.name.clone(),
            });
        }
        info!(
            candidates = probes.len(),
            reachable = reachable.len(),
            "collection pass starting"
        );

        let deadline = pass_start + self.config.pass_deadline;
        let mut pending: HashSet<Uuid> = reachable.iter().map(|p| p.uuid).collect();
        let mut contributions = Vec::new();

        {
            let mut tasks = stream::iter(reachable.iter().map(|probe| self.fetch_node(probe.uuid)))
                .buffer_unordered(self.config.max_in_flight.max(1));
            loop {
                match timeout_at(deadline, tasks.next()).await {
                    Ok(Some(Ok(contribution))) => {
                        pending.remove(&contribution.node);
                        contributions.push(contribution);
                    }
                    Ok(Some(Err((node, warning)))) => {
                        pending.remove(&node);
                        warnings.push(warning);
                    }
                    Ok(None) => break,
                    Err(_) => {
                        // Pass deadline: abandon what is still in flight and
                        // return the snapshot assembled so far.
                        let mut abandoned: Vec<Uuid> = pending.iter().copied().collect();
                        abandoned.sort();
                        for node in abandoned {
                            warnings.push(CollectWarning::NodeTimedOut { node });
                        }
                        warn!(
                            abandoned = pending.len(),
                            "pass deadline reached; returning partial snapshot"
                        );
                        break;
                    }
                }
            }
        }

        let snapshot = assemble_snapshot(&probes, contributions, warnings, consumers);
        info!(
            nodes = snapshot.nodes.len(),
            disks = snapshot.disks.len(),
            objects = snapshot.objects.len(),
            warnings = snapshot.warnings.len(),
            partitioned = snapshot.is_partitioned(),
            elapsed_ms = pass_start.elapsed().as_millis() as u64,
            "collection pass complete"
        );
        Ok(snapshot)
    }

    /// Queries one node for its full local view.
    ///
    /// Any query failure degrades the whole node for this pass; partial
    /// per-node results are discarded, not merged.
    async fn fetch_node(&self, node: Uuid) -> Result<NodeContribution, (Uuid, CollectWarning)> {
        let membership = self
            .guarded(node, "membership", self.query.list_membership(node))
            .await?;
        let disks = self
            .guarded(node, "disks", self.query.list_disks(node))
            .await?;
        let raw_objects = self
            .guarded(node, "objects", self.query.list_objects(node))
            .await?;
        let directory = self
            .guarded(node, "directory", self.query.list_directory(node))
            .await?;

        let mut objects = Vec::with_capacity(raw_objects.len());
        let mut warnings = Vec::new();
        for raw in &raw_objects {
            match self.cache.get_or_normalize(raw) {
                Ok(object) => objects.push(object),
                Err(err) => {
                    warn!(node = %node, object = %raw.uuid, error = %err,
                        "dropping malformed object topology");
                    warnings.push(CollectWarning::MalformedEntry {
                        node,
                        entity: format!("object {}", raw.uuid),
                        reason: err.to_string(),
                    });
                }
            }
        }

        debug!(
            node = %node,
            disks = disks.len(),
            objects = objects.len(),
            directory = directory.len(),
            "node answered"
        );
        Ok(NodeContribution {
            node,
            membership,
            disks,
            objects,
            directory,
            warnings,
        })
    }

    async fn guarded<T>(
        &self,
        node: Uuid,
        what: &str,
        query: impl Future<Output = Result<T, QueryError>>,
    ) -> Result<T, (Uuid, CollectWarning)> {
        match timeout(self.config.node_timeout, query).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                warn!(node = %node, what = what, error = %err, "node query failed");
                Err((
                    node,
                    CollectWarning::QueryFailed {
                        node,
                        what: what.to_string(),
                        reason: err.to_string(),
                    },
                ))
            }
            Err(_) => {
                warn!(node = %node, what = what, "node query timed out");
                Err((node, CollectWarning::NodeTimedOut { node }))
            }
        }
    }
}

/// Merges per-node fragments into one snapshot.
///
/// Contributions are applied in sorted node-UUID order so the last-write-
/// wins reconciliation is reproducible regardless of response order. Disk
/// and directory fragments merge across all reachable nodes; object
/// topologies are selected per partition: the consumer's partition when
/// registered, the deterministic default group otherwise.
fn assemble_snapshot(
    probes: &[NodeProbe],
    mut contributions: Vec<NodeContribution>,
    mut warnings: Vec<CollectWarning>,
    consumers: &HashMap<Uuid, Uuid>,
) -> ClusterSnapshot {
    contributions.sort_by_key(|c| c.node);
    for contribution in &mut contributions {
        warnings.append(&mut contribution.warnings);
    }

    let reports: BTreeMap<Uuid, BTreeSet<Uuid>> = contributions
        .iter()
        .map(|c| (c.node, c.membership.clone()))
        .collect();
    let partitions = group_by_membership(&reports);
    let partitioned = partitions.len() > 1;
    if partitioned {
        warnings.push(CollectWarning::PartitionDetected {
            groups: partitions.len(),
        });
    }

    let mut nodes = HashMap::new();
    for probe in probes {
        let answered = contributions.iter().any(|c| c.node == probe.uuid);
        nodes.insert(
            probe.uuid,
            NodeInfo {
                uuid: probe.uuid,
                name: probe.name.clone(),
                connected: answered,
                partition: partition_of(&partitions, probe.uuid),
            },
        );
    }

    let mut disks = HashMap::new();
    let mut directory: BTreeMap<Uuid, DirectoryEntry> = BTreeMap::new();
    for contribution in &contributions {
        for disk in &contribution.disks {
            disks.insert(disk.uuid, disk.clone());
        }
        for entry in &contribution.directory {
            directory.insert(entry.component, entry.clone());
        }
    }

    // Object versions keyed by the partition group that reported them.
    let mut versions: BTreeMap<Uuid, BTreeMap<usize, StorageObject>> = BTreeMap::new();
    for contribution in &contributions {
        let group = partition_of(&partitions, contribution.node).unwrap_or(0);
        for object in &contribution.objects {
            versions
                .entry(object.uuid)
                .or_default()
                .insert(group, object.clone());
        }
    }

    let mut objects = HashMap::new();
    for (uuid, by_group) in versions {
        let preferred = consumers
            .get(&uuid)
            .and_then(|&node| partition_of(&partitions, node));
        let chosen = preferred
            .and_then(|group| by_group.get(&group))
            .or_else(|| by_group.get(&0))
            .or_else(|| by_group.values().next());
        if let Some(object) = chosen {
            objects.insert(uuid, object.clone());
        }
    }

    let view = if partitioned {
        SnapshotView::SinglePartition { default_group: 0 }
    } else {
        SnapshotView::Unified
    };

    ClusterSnapshot {
        nodes,
        disks,
        objects,
        directory: directory.into_values().collect(),
        partitions,
        view,
        warnings,
    }
}
