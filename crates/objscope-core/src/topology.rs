//! Object topology model: the replication/erasure tree of one storage
//! object, plus normalization from the raw directory form.
//!
//! Nodes arrive from the control plane as loosely-typed attribute maps;
//! normalization builds the closed [`TopologyNode`] union exactly once so
//! the evaluator can match exhaustively. A recursion-depth guard rejects
//! malformed or cyclic input instead of overflowing the stack.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::state::{Replica, ReplicaState, Witness};
use crate::types::{ComponentId, NodeId, ObjectId};

/// Maximum accepted nesting depth of a topology tree.
pub const MAX_TOPOLOGY_DEPTH: usize = 32;

/// Kind of a grouping node in the topology tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupKind {
    /// Replication: any single surviving branch serves reads.
    Mirror,
    /// Striping: every branch must be up.
    Stripe,
    /// Single-parity erasure group: tolerates one failed branch.
    ParityLevel1,
    /// Double-parity erasure group: tolerates two failed branches.
    ParityLevel2,
    /// Concatenation: every branch must be up.
    Concatenation,
    /// Pass-through grouping separating witnesses from data children.
    Configuration,
}

impl GroupKind {
    /// Parses a directory kind string, case-insensitively.
    pub fn from_wire(kind: &str) -> Option<Self> {
        match kind.to_ascii_lowercase().as_str() {
            "mirror" => Some(GroupKind::Mirror),
            "stripe" => Some(GroupKind::Stripe),
            "parity1" | "parity-1" => Some(GroupKind::ParityLevel1),
            "parity2" | "parity-2" => Some(GroupKind::ParityLevel2),
            "concatenation" | "concat" => Some(GroupKind::Concatenation),
            "configuration" => Some(GroupKind::Configuration),
            _ => None,
        }
    }

    /// Number of failed children this group survives, given its child count.
    pub fn tolerated_failures(&self, children: usize) -> usize {
        match self {
            GroupKind::Mirror => children.saturating_sub(1),
            GroupKind::ParityLevel1 => 1,
            GroupKind::ParityLevel2 => 2,
            GroupKind::Stripe | GroupKind::Concatenation | GroupKind::Configuration => 0,
        }
    }
}

/// One node of an object's replication/erasure tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TopologyNode {
    /// Data-bearing leaf.
    Replica(Replica),
    /// Vote-only leaf.
    Witness(Witness),
    /// Interior grouping node.
    Group {
        /// Availability semantics of this group.
        kind: GroupKind,
        /// Child subtrees.
        children: Vec<TopologyNode>,
    },
}

impl TopologyNode {
    /// All data replicas in this subtree, in tree order.
    pub fn replicas(&self) -> Vec<&Replica> {
        let mut out = Vec::new();
        self.visit(&mut |node| {
            if let TopologyNode::Replica(r) = node {
                out.push(r);
            }
        });
        out
    }

    /// All witnesses in this subtree, in tree order.
    pub fn witnesses(&self) -> Vec<&Witness> {
        let mut out = Vec::new();
        self.visit(&mut |node| {
            if let TopologyNode::Witness(w) = node {
                out.push(w);
            }
        });
        out
    }

    /// Component ids of every leaf (replicas and witnesses).
    pub fn component_ids(&self) -> Vec<ComponentId> {
        let mut out = Vec::new();
        self.visit(&mut |node| match node {
            TopologyNode::Replica(r) => out.push(r.component),
            TopologyNode::Witness(w) => out.push(w.component),
            TopologyNode::Group { .. } => {}
        });
        out
    }

    /// Number of leaves (replicas and witnesses) in this subtree.
    pub fn leaf_count(&self) -> usize {
        self.component_ids().len()
    }

    fn visit<'a>(&'a self, f: &mut dyn FnMut(&'a TopologyNode)) {
        f(self);
        if let TopologyNode::Group { children, .. } = self {
            for child in children {
                child.visit(f);
            }
        }
    }
}

/// One replicated storage object with its normalized topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageObject {
    /// Object identity.
    pub uuid: ObjectId,
    /// Node that owns the object and services its I/O.
    pub owner: NodeId,
    /// Current sequence number of the object.
    pub csn: u64,
    /// Free-form policy metadata.
    pub policy: BTreeMap<String, String>,
    /// Root of the replication/erasure tree.
    pub root: TopologyNode,
}

impl StorageObject {
    /// All data replicas of this object.
    pub fn replicas(&self) -> Vec<&Replica> {
        self.root.replicas()
    }

    /// All witnesses of this object.
    pub fn witnesses(&self) -> Vec<&Witness> {
        self.root.witnesses()
    }
}

/// Raw topology node as reported by a node's directory, pre-normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawNode {
    /// Kind string: a group kind, `replica`/`component` or `witness`.
    pub kind: String,
    /// Loosely-typed per-node attributes.
    pub attributes: HashMap<String, serde_json::Value>,
    /// Child nodes.
    pub children: Vec<RawNode>,
}

impl RawNode {
    fn attr_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_str())
    }

    fn attr_u64(&self, key: &str) -> Option<u64> {
        self.attributes.get(key).and_then(|v| v.as_u64())
    }
}

/// Raw storage object as reported by a node's directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawObject {
    /// Object identity.
    pub uuid: ObjectId,
    /// Owner node identity.
    pub owner: NodeId,
    /// Current sequence number.
    pub csn: u64,
    /// Free-form policy metadata.
    pub policy: BTreeMap<String, String>,
    /// Raw topology root.
    pub root: RawNode,
}

/// Builds the typed topology tree for one raw object.
///
/// Fails only the object at hand: unknown group kinds, missing leaf
/// identity and over-deep trees return an error the caller records and
/// skips.
pub fn normalize_object(raw: &RawObject) -> CoreResult<StorageObject> {
    let root = normalize_node(raw.uuid, &raw.root, 0)?;
    Ok(StorageObject {
        uuid: raw.uuid,
        owner: raw.owner,
        csn: raw.csn,
        policy: raw.policy.clone(),
        root,
    })
}

fn normalize_node(object: ObjectId, raw: &RawNode, depth: usize) -> CoreResult<TopologyNode> {
    if depth >= MAX_TOPOLOGY_DEPTH {
        return Err(CoreError::TopologyTooDeep {
            object,
            max: MAX_TOPOLOGY_DEPTH,
        });
    }

    match raw.kind.to_ascii_lowercase().as_str() {
        "replica" | "component" => Ok(TopologyNode::Replica(Replica {
            component: parse_uuid(object, raw, "componentUuid")?,
            disk: parse_uuid(object, raw, "diskUuid")?,
            state: parse_state(raw),
            votes: parse_votes(raw),
            bytes_to_sync: raw.attr_u64("bytesToSync").unwrap_or(0),
            recorded_csn: raw.attr_u64("csn"),
            flags: raw.attr_u64("flags").unwrap_or(0),
        })),
        "witness" => Ok(TopologyNode::Witness(Witness {
            component: parse_uuid(object, raw, "componentUuid")?,
            disk: parse_uuid(object, raw, "diskUuid")?,
            state: parse_state(raw),
            votes: parse_votes(raw),
        })),
        other => {
            let kind = GroupKind::from_wire(other).ok_or_else(|| CoreError::UnknownGroupKind {
                object,
                kind: raw.kind.clone(),
            })?;
            let children = raw
                .children
                .iter()
                .map(|child| normalize_node(object, child, depth + 1))
                .collect::<CoreResult<Vec<_>>>()?;
            Ok(TopologyNode::Group { kind, children })
        }
    }
}

fn parse_uuid(object: ObjectId, raw: &RawNode, key: &str) -> CoreResult<ComponentId> {
    let text = raw
        .attr_str(key)
        .ok_or_else(|| CoreError::MalformedTopology {
            object,
            reason: format!("leaf missing attribute '{}'", key),
        })?;
    text.parse().map_err(|_| CoreError::MalformedTopology {
        object,
        reason: format!("attribute '{}' is not a UUID: {}", key, text),
    })
}

fn parse_state(raw: &RawNode) -> ReplicaState {
    raw.attr_str("componentState")
        .map(ReplicaState::from_wire)
        .unwrap_or(ReplicaState::Unknown)
}

// Vote weight is at least 1; the directory omits it for the common case.
fn parse_votes(raw: &RawNode) -> u32 {
    raw.attr_u64("votes").map(|v| v.max(1)).unwrap_or(1) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn leaf(kind: &str, state: &str) -> RawNode {
        let mut attributes = HashMap::new();
        attributes.insert(
            "componentUuid".to_string(),
            json!(Uuid::new_v4().to_string()),
        );
        attributes.insert("diskUuid".to_string(), json!(Uuid::new_v4().to_string()));
        attributes.insert("componentState".to_string(), json!(state));
        RawNode {
            kind: kind.to_string(),
            attributes,
            children: Vec::new(),
        }
    }

    fn raw_object(root: RawNode) -> RawObject {
        RawObject {
            uuid: Uuid::new_v4(),
            owner: Uuid::new_v4(),
            csn: 7,
            policy: BTreeMap::new(),
            root,
        }
    }

    #[test]
    fn test_group_kind_from_wire() {
        assert_eq!(GroupKind::from_wire("Mirror"), Some(GroupKind::Mirror));
        assert_eq!(GroupKind::from_wire("parity-2"), Some(GroupKind::ParityLevel2));
        assert_eq!(GroupKind::from_wire("concat"), Some(GroupKind::Concatenation));
        assert_eq!(GroupKind::from_wire("raid"), None);
    }

    #[test]
    fn test_tolerated_failures() {
        assert_eq!(GroupKind::Mirror.tolerated_failures(3), 2);
        assert_eq!(GroupKind::Mirror.tolerated_failures(0), 0);
        assert_eq!(GroupKind::Stripe.tolerated_failures(4), 0);
        assert_eq!(GroupKind::ParityLevel1.tolerated_failures(6), 1);
        assert_eq!(GroupKind::ParityLevel2.tolerated_failures(6), 2);
    }

    #[test]
    fn test_normalize_mirror_of_replicas() {
        let raw = raw_object(RawNode {
            kind: "mirror".to_string(),
            attributes: HashMap::new(),
            children: vec![leaf("replica", "ACTIVE"), leaf("replica", "ABSENT")],
        });

        let object = normalize_object(&raw).unwrap();
        assert_eq!(object.csn, 7);
        assert_eq!(object.replicas().len(), 2);
        assert_eq!(object.root.leaf_count(), 2);
        match &object.root {
            TopologyNode::Group { kind, children } => {
                assert_eq!(*kind, GroupKind::Mirror);
                assert_eq!(children.len(), 2);
            }
            other => panic!("expected group, got {:?}", other),
        }
    }

    #[test]
    fn test_normalize_configuration_with_witness() {
        let raw = raw_object(RawNode {
            kind: "configuration".to_string(),
            attributes: HashMap::new(),
            children: vec![
                leaf("witness", "ACTIVE"),
                RawNode {
                    kind: "mirror".to_string(),
                    attributes: HashMap::new(),
                    children: vec![leaf("replica", "ACTIVE"), leaf("replica", "ACTIVE")],
                },
            ],
        });

        let object = normalize_object(&raw).unwrap();
        assert_eq!(object.replicas().len(), 2);
        assert_eq!(object.witnesses().len(), 1);
        assert_eq!(object.root.component_ids().len(), 3);
    }

    #[test]
    fn test_normalize_votes_default_and_floor() {
        let mut voteless = leaf("replica", "ACTIVE");
        voteless.attributes.insert("votes".to_string(), json!(0));
        let raw = raw_object(RawNode {
            kind: "mirror".to_string(),
            attributes: HashMap::new(),
            children: vec![voteless, leaf("replica", "ACTIVE")],
        });

        let object = normalize_object(&raw).unwrap();
        for replica in object.replicas() {
            assert_eq!(replica.votes, 1);
        }
    }

    #[test]
    fn test_normalize_unknown_group_kind() {
        let raw = raw_object(RawNode {
            kind: "quantum".to_string(),
            attributes: HashMap::new(),
            children: vec![leaf("replica", "ACTIVE")],
        });

        match normalize_object(&raw) {
            Err(CoreError::UnknownGroupKind { kind, .. }) => assert_eq!(kind, "quantum"),
            other => panic!("expected UnknownGroupKind, got {:?}", other),
        }
    }

    #[test]
    fn test_normalize_missing_leaf_identity() {
        let mut bad = leaf("replica", "ACTIVE");
        bad.attributes.remove("diskUuid");
        let raw = raw_object(bad);

        assert!(matches!(
            normalize_object(&raw),
            Err(CoreError::MalformedTopology { .. })
        ));
    }

    #[test]
    fn test_normalize_unknown_state_is_tolerated() {
        let raw = raw_object(leaf("replica", "HALF_BAKED"));
        let object = normalize_object(&raw).unwrap();
        assert_eq!(object.replicas()[0].state, ReplicaState::Unknown);
    }

    #[test]
    fn test_normalize_depth_guard() {
        let mut node = leaf("replica", "ACTIVE");
        for _ in 0..(MAX_TOPOLOGY_DEPTH + 1) {
            node = RawNode {
                kind: "mirror".to_string(),
                attributes: HashMap::new(),
                children: vec![node],
            };
        }
        let raw = raw_object(node);

        assert!(matches!(
            normalize_object(&raw),
            Err(CoreError::TopologyTooDeep { .. })
        ));
    }
}
