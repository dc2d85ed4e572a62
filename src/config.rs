//! Engine-wide configuration, threaded into the store the way the teacher
//! crate threads `BackendConfig` into its backends.

use serde::{Deserialize, Serialize};

use crate::record::property::DEFAULT_PROPERTY_PAYLOAD_SIZE;

/// Default chain-length threshold past which a node is upgraded to dense
/// (spec.md §4.4).
pub const DEFAULT_DENSE_NODE_THRESHOLD: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Chain length on any one side past which a node becomes dense.
    /// Comparison is against the *pre-insert* count (spec.md §9 open
    /// question, resolved: preserve byte-compatibility with stored chains).
    pub dense_node_threshold: usize,

    /// Payload budget per property record, in encoded-value bytes.
    pub property_record_payload_size: usize,

    /// Whether rollback returns ids of created records to the store's id
    /// allocator (spec.md §4.9 `freeIdsDuringRollback`). Disabled only for
    /// stores that can't safely reuse ids mid-recovery.
    pub free_ids_during_rollback: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dense_node_threshold: DEFAULT_DENSE_NODE_THRESHOLD,
            property_record_payload_size: DEFAULT_PROPERTY_PAYLOAD_SIZE,
            free_ids_during_rollback: true,
        }
    }
}
