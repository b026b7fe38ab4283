//! Identity types shared across the core.

use uuid::Uuid;

/// Identifier of a cluster node.
pub type NodeId = Uuid;

/// Identifier of a physical disk.
pub type DiskId = Uuid;

/// Identifier of a storage object.
pub type ObjectId = Uuid;

/// Identifier of one component (data replica or witness) of an object.
pub type ComponentId = Uuid;
