//! Property records: a doubly-linked list per primitive, each record
//! packing 1..N key-value blocks into a fixed payload budget.

use serde::{Deserialize, Serialize};

use super::common::RecordRef;
use crate::impl_abstract_record;
use crate::value::PropertyValue;

/// Default payload budget per property record, in encoded-value bytes.
/// Neo4j's on-disk `PropertyRecord` holds 4 blocks of 8 bytes; this crate
/// exposes the same default but makes it configurable (`EngineConfig`).
pub const DEFAULT_PROPERTY_PAYLOAD_SIZE: usize = 32;

/// Who owns a property chain. Node and relationship primitives own exactly
/// one chain each; the graph singleton owns at most one as well (spec.md
/// §3's "NeoStoreRecord").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyOwner {
    Node(u64),
    Relationship(u64),
    Graph,
}

/// Where a block's value actually lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BlockPayload {
    /// Small enough to live directly in the block.
    Inline(PropertyValue),
    /// Too large to inline: the value's type name (for re-decoding) plus
    /// the head of its dynamic-record chain.
    Dynamic {
        type_name: String,
        first_dynamic_record: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyBlock {
    pub key: u32,
    pub payload: BlockPayload,
}

impl PropertyBlock {
    pub fn inline(key: u32, value: PropertyValue) -> Self {
        Self {
            key,
            payload: BlockPayload::Inline(value),
        }
    }

    /// Size this block occupies in a record's payload budget.
    pub fn size(&self) -> usize {
        match &self.payload {
            BlockPayload::Inline(v) => v.encoded_size().max(1),
            // A dynamic block stores only a pointer + type tag inline.
            BlockPayload::Dynamic { .. } => 8,
        }
    }

    /// Dynamic record ids referenced by this block, if any — used by
    /// rollback/remove to mark the dynamic chain not-in-use.
    pub fn dynamic_record_head(&self) -> Option<u64> {
        match &self.payload {
            BlockPayload::Dynamic {
                first_dynamic_record,
                ..
            } => Some(*first_dynamic_record),
            BlockPayload::Inline(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub id: u64,
    pub in_use: bool,
    pub created: bool,
    pub owner: PropertyOwner,
    pub prev_prop: RecordRef,
    pub next_prop: RecordRef,
    pub blocks: Vec<PropertyBlock>,
}

impl_abstract_record!(PropertyRecord);

impl crate::record::common::NewUnused for PropertyRecord {
    fn new_unused(id: u64) -> Self {
        PropertyRecord::new(id, PropertyOwner::Node(0))
    }
}

impl PropertyRecord {
    pub fn new(id: u64, owner: PropertyOwner) -> Self {
        Self {
            id,
            in_use: false,
            created: false,
            owner,
            prev_prop: RecordRef::NONE,
            next_prop: RecordRef::NONE,
            blocks: Vec::new(),
        }
    }

    pub fn used_size(&self) -> usize {
        self.blocks.iter().map(PropertyBlock::size).sum()
    }

    pub fn find_block(&self, key: u32) -> Option<usize> {
        self.blocks.iter().position(|b| b.key == key)
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
