//! Dynamic records: the tail storage for values too large to inline —
//! oversized strings/arrays, label overflow, schema rule bytes, and token
//! names. Each record holds a fixed-size chunk plus a pointer to the next.

use serde::{Deserialize, Serialize};

use super::common::RecordRef;
use crate::impl_abstract_record;

/// Bytes of payload per dynamic record block, before spilling to the next
/// record in the chain.
pub const DYNAMIC_RECORD_DATA_SIZE: usize = 120;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicRecord {
    pub id: u64,
    pub in_use: bool,
    pub created: bool,
    pub next: RecordRef,
    pub data: Vec<u8>,
}

impl_abstract_record!(DynamicRecord);

impl crate::record::common::NewUnused for DynamicRecord {
    fn new_unused(id: u64) -> Self {
        DynamicRecord::new(id)
    }
}

impl DynamicRecord {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            in_use: false,
            created: false,
            next: RecordRef::NONE,
            data: Vec::new(),
        }
    }
}

/// Split `bytes` into a chain of dynamic records, allocating ids via `alloc`.
/// Used by both property-value overflow and schema-rule/token-name storage.
pub fn chain_from_bytes(bytes: &[u8], mut alloc: impl FnMut() -> u64) -> Vec<DynamicRecord> {
    if bytes.is_empty() {
        let id = alloc();
        let mut r = DynamicRecord::new(id);
        r.in_use = true;
        r.created = true;
        return vec![r];
    }

    let mut records = Vec::new();
    for chunk in bytes.chunks(DYNAMIC_RECORD_DATA_SIZE) {
        let id = alloc();
        let mut r = DynamicRecord::new(id);
        r.in_use = true;
        r.created = true;
        r.data = chunk.to_vec();
        records.push(r);
    }
    for i in 0..records.len().saturating_sub(1) {
        records[i].next = RecordRef::of(records[i + 1].id);
    }
    records
}

/// Reassemble a dynamic record chain back into its original bytes.
pub fn bytes_from_chain(records: &[DynamicRecord]) -> Vec<u8> {
    let mut out = Vec::new();
    for r in records {
        out.extend_from_slice(&r.data);
    }
    out
}
