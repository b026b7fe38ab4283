//! Mock control plane shared by the collector integration tests.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use objscope_collect::{NodeInventoryService, NodeProbe, NodeQueryService, QueryError};
use objscope_core::snapshot::{DirectoryEntry, Disk, DiskTier};
use objscope_core::topology::{RawNode, RawObject};

/// How a mock node reacts to queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Answers immediately.
    Answer,
    /// Never answers; the collector's timeout must fire.
    Hang,
    /// Fails every query with an RPC error.
    FailRpc,
}

/// One simulated cluster node.
pub struct MockNode {
    pub probe: NodeProbe,
    pub membership: BTreeSet<Uuid>,
    pub disks: Vec<Disk>,
    pub objects: Vec<RawObject>,
    pub directory: Vec<DirectoryEntry>,
    pub behavior: Behavior,
}

impl MockNode {
    pub fn new(name: &str) -> Self {
        Self {
            probe: NodeProbe {
                uuid: Uuid::new_v4(),
                name: name.to_string(),
                connected: true,
            },
            membership: BTreeSet::new(),
            disks: Vec::new(),
            objects: Vec::new(),
            directory: Vec::new(),
            behavior: Behavior::Answer,
        }
    }

    pub fn id(&self) -> Uuid {
        self.probe.uuid
    }
}

/// A simulated cluster implementing both collector service seams.
#[derive(Default)]
pub struct MockCluster {
    nodes: HashMap<Uuid, MockNode>,
    pub inventory_down: bool,
}

impl MockCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, node: MockNode) -> Uuid {
        let id = node.id();
        self.nodes.insert(id, node);
        id
    }

    /// Points every node's membership at the full node set.
    pub fn agree_on_membership(&mut self) {
        let all: BTreeSet<Uuid> = self.nodes.keys().copied().collect();
        for node in self.nodes.values_mut() {
            node.membership = all.clone();
        }
    }

    pub fn node_mut(&mut self, id: Uuid) -> &mut MockNode {
        self.nodes.get_mut(&id).expect("unknown mock node")
    }

    async fn gate(&self, node: Uuid) -> Result<&MockNode, QueryError> {
        let node = self
            .nodes
            .get(&node)
            .ok_or_else(|| QueryError::Rpc(format!("no such node {}", node)))?;
        match node.behavior {
            Behavior::Answer => Ok(node),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(QueryError::Timeout(Duration::from_secs(3600)))
            }
            Behavior::FailRpc => Err(QueryError::Rpc("injected fault".to_string())),
        }
    }
}

#[async_trait]
impl NodeInventoryService for MockCluster {
    async fn candidate_nodes(&self) -> Result<Vec<NodeProbe>, QueryError> {
        if self.inventory_down {
            return Err(QueryError::Rpc("inventory service offline".to_string()));
        }
        let mut probes: Vec<NodeProbe> = self.nodes.values().map(|n| n.probe.clone()).collect();
        probes.sort_by_key(|p| p.uuid);
        Ok(probes)
    }
}

#[async_trait]
impl NodeQueryService for MockCluster {
    async fn list_membership(&self, node: Uuid) -> Result<BTreeSet<Uuid>, QueryError> {
        Ok(self.gate(node).await?.membership.clone())
    }

    async fn list_disks(&self, node: Uuid) -> Result<Vec<Disk>, QueryError> {
        Ok(self.gate(node).await?.disks.clone())
    }

    async fn list_objects(&self, node: Uuid) -> Result<Vec<RawObject>, QueryError> {
        Ok(self.gate(node).await?.objects.clone())
    }

    async fn list_directory(&self, node: Uuid) -> Result<Vec<DirectoryEntry>, QueryError> {
        Ok(self.gate(node).await?.directory.clone())
    }
}

/// A capacity disk on the given node.
pub fn capacity_disk(node: Uuid, capacity: u64, used: u64) -> Disk {
    Disk {
        uuid: Uuid::new_v4(),
        node,
        tier: DiskTier::Capacity,
        health_flags: 0,
        capacity_bytes: capacity,
        used_bytes: used,
        reserved_bytes: 0,
    }
}

/// Raw replica leaf in directory wire form.
pub fn raw_replica(disk: Uuid, state: &str, votes: u64, bytes_to_sync: u64) -> RawNode {
    let mut attributes = HashMap::new();
    attributes.insert(
        "componentUuid".to_string(),
        json!(Uuid::new_v4().to_string()),
    );
    attributes.insert("diskUuid".to_string(), json!(disk.to_string()));
    attributes.insert("componentState".to_string(), json!(state));
    attributes.insert("votes".to_string(), json!(votes));
    attributes.insert("bytesToSync".to_string(), json!(bytes_to_sync));
    RawNode {
        kind: "replica".to_string(),
        attributes,
        children: Vec::new(),
    }
}

/// Raw mirror object over the given leaves.
pub fn raw_mirror(owner: Uuid, csn: u64, leaves: Vec<RawNode>) -> RawObject {
    RawObject {
        uuid: Uuid::new_v4(),
        owner,
        csn,
        policy: BTreeMap::new(),
        root: RawNode {
            kind: "mirror".to_string(),
            attributes: HashMap::new(),
            children: leaves,
        },
    }
}

/// Directory entries matching every leaf of a raw object.
pub fn directory_for(object: &RawObject, node: Uuid) -> Vec<DirectoryEntry> {
    fn walk(raw: &RawNode, node: Uuid, out: &mut Vec<DirectoryEntry>) {
        if raw.children.is_empty() {
            let component = raw
                .attributes
                .get("componentUuid")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse().ok());
            let disk = raw
                .attributes
                .get("diskUuid")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse().ok());
            if let (Some(component), Some(disk)) = (component, disk) {
                out.push(DirectoryEntry {
                    component,
                    disk,
                    node: Some(node),
                });
            }
        }
        for child in &raw.children {
            walk(child, node, out);
        }
    }

    let mut out = Vec::new();
    walk(&object.root, node, &mut out);
    out
}

/// Installs a test subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}
