#![warn(missing_docs)]

//! Objscope collector: gathers cluster state from every reachable node
//! concurrently and assembles it into a `ClusterSnapshot` for the core
//! evaluator.
//!
//! This is the only component of the system that performs I/O. Per-node
//! queries run with bounded parallelism and independent timeouts; a slow or
//! failed node reduces completeness, never aborts the pass. Disagreement on
//! cluster membership (a network partition) is detected and surfaced as a
//! first-class condition on the snapshot.

pub mod cache;
pub mod collector;
pub mod config;
pub mod error;
pub mod partition;
pub mod service;

pub use cache::PassCache;
pub use collector::ClusterCollector;
pub use config::CollectorConfig;
pub use error::{CollectError, CollectResult, QueryError};
pub use partition::{group_by_membership, partition_of};
pub use service::{NodeInventoryService, NodeProbe, NodeQueryService};
