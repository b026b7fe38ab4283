//! Collector configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tuning knobs for one collection pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Maximum node queries in flight at once.
    pub max_in_flight: usize,
    /// Deadline for each individual query against one node.
    pub node_timeout: Duration,
    /// Deadline for the whole pass; on expiry the snapshot assembled so far
    /// is returned and the remaining nodes are reported as timed out.
    pub pass_deadline: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 8,
            node_timeout: Duration::from_secs(10),
            pass_deadline: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let config = CollectorConfig::default();
        assert!(config.max_in_flight >= 1);
        assert!(config.node_timeout < config.pass_deadline);
    }
}
