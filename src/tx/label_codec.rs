//! Encoding/decoding a node's label set to and from `LabelField` (spec.md
//! §3's "inlined bits or dynamic-record list"). Shared by the mutation API
//! (label add/remove) and by commit's label-update resolver, so both sides
//! agree on how an overflowed label chain is laid out.

use crate::record::{LabelField, NO_ID};
use crate::store::DynamicRecordAllocator;
use crate::validation::MAX_INLINE_LABELS;
use crate::{Error, Result};

fn read_chain(allocator: &dyn DynamicRecordAllocator, head: u64) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    let mut cursor = head;
    loop {
        let record = allocator.get_dynamic_record(cursor)?;
        bytes.extend_from_slice(&record.data);
        match record.next.get() {
            Some(next) => cursor = next,
            None => break,
        }
    }
    Ok(bytes)
}

/// Decode a node's labels, spilling to a dynamic-chain walk when necessary.
pub fn decode_labels(allocator: &dyn DynamicRecordAllocator, field: &LabelField) -> Result<Vec<u32>> {
    match field {
        LabelField::Inline(ids) => Ok(ids.clone()),
        LabelField::Dynamic(head) => {
            let bytes = read_chain(allocator, *head)?;
            serde_json::from_slice(&bytes)
                .map_err(|e| Error::InvalidRecord(format!("decoding label chain at {head}: {e}")))
        }
    }
}

/// Infallible variant for the commit-time label-update resolver (spec.md
/// §4.7: "skip if either side's labels cannot be resolved").
pub fn try_decode_label_chain(allocator: &dyn DynamicRecordAllocator, head: u64) -> Option<Vec<u32>> {
    if head == NO_ID {
        return None;
    }
    decode_labels(allocator, &LabelField::Dynamic(head)).ok()
}

/// Encode a label set, choosing the inline representation when it fits the
/// budget and overflowing to a dynamic chain otherwise. Every dynamic id
/// allocated is appended to `created_dynamic_ids` for rollback bookkeeping.
pub fn encode_labels(
    allocator: &dyn DynamicRecordAllocator,
    mut labels: Vec<u32>,
    created_dynamic_ids: &mut Vec<u64>,
) -> Result<LabelField> {
    labels.sort_unstable();
    labels.dedup();
    if labels.len() <= MAX_INLINE_LABELS {
        return Ok(LabelField::Inline(labels));
    }
    let bytes = serde_json::to_vec(&labels)
        .map_err(|e| Error::InvalidRecord(format!("encoding label overflow: {e}")))?;
    let chain = allocator.allocate_from(&bytes)?;
    let head = chain
        .first()
        .map(|r| r.id)
        .ok_or_else(|| Error::InvalidRecord("dynamic allocation returned no records".into()))?;
    created_dynamic_ids.extend(chain.iter().map(|r| r.id));
    Ok(LabelField::Dynamic(head))
}

/// Walk an overflowed label chain and push every record id onto
/// `obsolete_dynamic_ids`, the same bookkeeping `chain::property` does for
/// replaced property values (spec.md §4.9).
pub fn mark_label_chain_obsolete(
    allocator: &dyn DynamicRecordAllocator,
    field: &LabelField,
    obsolete_dynamic_ids: &mut Vec<u64>,
) -> Result<()> {
    let LabelField::Dynamic(head) = field else {
        return Ok(());
    };
    let mut cursor = *head;
    loop {
        let record = allocator.get_dynamic_record(cursor)?;
        obsolete_dynamic_ids.push(cursor);
        match record.next.get() {
            Some(next) => cursor = next,
            None => break,
        }
    }
    Ok(())
}
