//! The whole-store sentinel record — a singleton owning the graph-level
//! property chain (properties not attached to any node or relationship).

use serde::{Deserialize, Serialize};

use super::common::RecordRef;

pub const NEO_STORE_ID: u64 = 0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeoStoreRecord {
    pub id: u64,
    pub in_use: bool,
    pub created: bool,
    pub next_prop: RecordRef,
}

impl Default for NeoStoreRecord {
    fn default() -> Self {
        Self {
            id: NEO_STORE_ID,
            in_use: true,
            created: false,
            next_prop: RecordRef::NONE,
        }
    }
}

// NeoStoreRecord does not implement `AbstractRecord` via the shared macro:
// spec.md §4.1 excludes it from before-state tracking the same way it
// excludes relationship and relationship-group records. It is still kept
// in an ordinary `RecordChanges<NeoStoreRecord, _>` buffer, just one that
// only ever holds the single id `NEO_STORE_ID`.
impl crate::record::common::AbstractRecord for NeoStoreRecord {
    fn id(&self) -> u64 {
        self.id
    }
    fn in_use(&self) -> bool {
        self.in_use
    }
    fn set_in_use(&mut self, in_use: bool) {
        self.in_use = in_use;
    }
    fn created(&self) -> bool {
        self.created
    }
    fn set_created(&mut self, created: bool) {
        self.created = created;
    }
}

impl crate::record::common::NewUnused for NeoStoreRecord {
    fn new_unused(id: u64) -> Self {
        Self {
            id,
            in_use: true,
            created: false,
            next_prop: RecordRef::NONE,
        }
    }
}

impl crate::record::common::HasPropertyChain for NeoStoreRecord {
    fn property_chain_head(&self) -> RecordRef {
        self.next_prop
    }
    fn set_property_chain_head(&mut self, head: RecordRef) {
        self.next_prop = head;
    }
}
