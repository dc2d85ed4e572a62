//! Node records.
//!
//! A node's `label_field` is either a small set of label-token ids packed
//! into the 64-bit word (the common case) or, once too many labels to fit,
//! a pointer to a chain of `DynamicRecord`s holding the overflow — mirrored
//! here as an enum instead of Neo4j's bit-twiddled single field, since Rust
//! gives us a sum type for free.
use serde::{Deserialize, Serialize};

use super::common::RecordRef;
use crate::impl_abstract_record;

/// How a node's labels are physically stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelField {
    /// Inlined label-token ids (the fast path; Neo4j packs up to a handful
    /// of 24-bit label ids into one 36-bit-aligned word).
    Inline(Vec<u32>),
    /// Overflowed into a dynamic record chain, keyed by the chain head id.
    Dynamic(u64),
}

impl Default for LabelField {
    fn default() -> Self {
        LabelField::Inline(Vec::new())
    }
}

impl LabelField {
    pub fn is_inline(&self) -> bool {
        matches!(self, LabelField::Inline(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: u64,
    pub in_use: bool,
    pub created: bool,
    /// Non-dense: id of the first relationship in this node's chain.
    /// Dense: id of this node's relationship-group chain head.
    pub next_rel: RecordRef,
    pub next_prop: RecordRef,
    pub label_field: LabelField,
    pub dense: bool,
}

impl_abstract_record!(NodeRecord);

impl crate::record::common::NewUnused for NodeRecord {
    fn new_unused(id: u64) -> Self {
        NodeRecord::new(id)
    }
}

impl NodeRecord {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            in_use: false,
            created: false,
            next_rel: RecordRef::NONE,
            next_prop: RecordRef::NONE,
            label_field: LabelField::default(),
            dense: false,
        }
    }

    pub fn labels(&self) -> &[u32] {
        match &self.label_field {
            LabelField::Inline(ids) => ids,
            LabelField::Dynamic(_) => &[],
        }
    }

    pub fn has_label(&self, label: u32) -> bool {
        self.labels().contains(&label)
    }
}

impl crate::record::common::HasPropertyChain for NodeRecord {
    fn property_chain_head(&self) -> RecordRef {
        self.next_prop
    }
    fn set_property_chain_head(&mut self, head: RecordRef) {
        self.next_prop = head;
    }
}
