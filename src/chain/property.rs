//! Property-chain maintenance (spec.md §4.3): add/change/remove a single
//! key on a node, relationship, or the graph singleton, keeping each
//! record's block payload within budget and splicing in/out dynamic
//! overflow records as values grow or shrink past it.

use crate::buffer::{Loader, RecordChanges};
use crate::record::common::HasPropertyChain;
use crate::record::{BlockPayload, PropertyBlock, PropertyOwner, PropertyRecord, RecordRef};
use crate::store::DynamicRecordAllocator;
use crate::value::PropertyValue;
use crate::{Error, Result};

/// Turn a value into a block, spilling into a dynamic-record chain through
/// `allocator` when the value is too large to inline (spec.md §4.3 "may
/// allocate dynamic value records if oversized"). Every id allocated this
/// way is appended to `created_dynamic_ids` so the owning transaction can
/// free them on rollback (spec.md §4.9).
fn encode_block(
    allocator: &dyn DynamicRecordAllocator,
    key: u32,
    value: PropertyValue,
    created_dynamic_ids: &mut Vec<u64>,
) -> Result<PropertyBlock> {
    if value.is_inlineable() {
        return Ok(PropertyBlock::inline(key, value));
    }
    let type_name = value.type_name().to_string();
    let bytes = serde_json::to_vec(&value)
        .map_err(|e| Error::InvalidRecord(format!("encoding property value: {e}")))?;
    let chain = allocator.allocate_from(&bytes)?;
    let head = chain
        .first()
        .map(|r| r.id)
        .ok_or_else(|| Error::InvalidRecord("dynamic allocation returned no records".into()))?;
    created_dynamic_ids.extend(chain.iter().map(|r| r.id));
    Ok(PropertyBlock {
        key,
        payload: BlockPayload::Dynamic {
            type_name,
            first_dynamic_record: head,
        },
    })
}

/// Walk a block's dynamic chain (if it has one) and record every id in it
/// as obsolete, so the caller can free them once the replacing/removing
/// change has safely committed (spec.md §4.3 Change step 2: "mark the old
/// block's dynamic value records as not-in-use").
fn mark_block_obsolete(
    allocator: &dyn DynamicRecordAllocator,
    block: &PropertyBlock,
    obsolete_dynamic_ids: &mut Vec<u64>,
) -> Result<()> {
    let Some(head) = block.dynamic_record_head() else {
        return Ok(());
    };
    let mut cursor = RecordRef::of(head);
    while let Some(id) = cursor.get() {
        let record = allocator.get_dynamic_record(id)?;
        obsolete_dynamic_ids.push(id);
        cursor = record.next;
    }
    Ok(())
}

/// Add `key = value` to the chain headed by `owner`. Only the head record
/// is considered for reuse (spec.md §4.3 Add step 2: "scan the head record
/// only"); if it has no room, a new record is allocated and becomes the
/// new chain head. Interior records are never revisited.
#[allow(clippy::too_many_arguments)]
pub fn add_property<O, LP>(
    owner: &mut O,
    properties: &mut RecordChanges<PropertyRecord, LP>,
    allocator: &dyn DynamicRecordAllocator,
    owner_ref: PropertyOwner,
    key: u32,
    value: PropertyValue,
    payload_size: usize,
    alloc_property_id: &mut dyn FnMut() -> u64,
    created_dynamic_ids: &mut Vec<u64>,
) -> Result<u64>
where
    O: HasPropertyChain,
    LP: Loader<PropertyRecord>,
{
    let block = encode_block(allocator, key, value, created_dynamic_ids)?;
    if let Some(head_id) = owner.property_chain_head().get() {
        let used = properties.get_or_load(head_id)?.read().used_size();
        if used + block.size() <= payload_size {
            properties.for_changing(head_id)?.blocks.push(block);
            return Ok(head_id);
        }
    }

    let new_id = alloc_property_id();
    let old_head = owner.property_chain_head();
    {
        let record = properties.create(new_id);
        record.in_use = true;
        record.owner = owner_ref;
        record.next_prop = old_head;
        record.blocks.push(block);
    }
    if let Some(old_head_id) = old_head.get() {
        properties.for_changing(old_head_id)?.prev_prop = RecordRef::of(new_id);
    }
    owner.set_property_chain_head(RecordRef::of(new_id));
    Ok(new_id)
}

/// Replace the value stored under `key`, relocating the block to a new
/// record if the new value no longer fits where it was (spec.md §8 S5:
/// growing a value into dynamic overflow triggers this path).
#[allow(clippy::too_many_arguments)]
pub fn change_property<O, LP>(
    owner: &mut O,
    properties: &mut RecordChanges<PropertyRecord, LP>,
    allocator: &dyn DynamicRecordAllocator,
    owner_ref: PropertyOwner,
    key: u32,
    value: PropertyValue,
    payload_size: usize,
    alloc_property_id: &mut dyn FnMut() -> u64,
    created_dynamic_ids: &mut Vec<u64>,
    obsolete_dynamic_ids: &mut Vec<u64>,
) -> Result<()>
where
    O: HasPropertyChain,
    LP: Loader<PropertyRecord>,
{
    let Some(found_id) = find_block_record(properties, owner.property_chain_head(), key)? else {
        return Err(Error::IllegalState(format!("property key {key} not found")));
    };

    let new_block = encode_block(allocator, key, value, created_dynamic_ids)?;
    let old_block = {
        let record = properties.get_or_load(found_id)?.read();
        let idx = record.find_block(key).expect("located by find_block_record");
        record.blocks[idx].clone()
    };
    let fits = {
        let record = properties.get_or_load(found_id)?.read();
        record.used_size() - old_block.size() + new_block.size() <= payload_size
    };

    mark_block_obsolete(allocator, &old_block, obsolete_dynamic_ids)?;

    if fits {
        let record = properties.for_changing(found_id)?;
        let idx = record.find_block(key).expect("located by find_block_record");
        record.blocks[idx] = new_block;
        return Ok(());
    }

    {
        let record = properties.for_changing(found_id)?;
        let idx = record.find_block(key).expect("located by find_block_record");
        record.blocks.remove(idx);
    }
    if properties.get_or_load(found_id)?.read().is_empty() {
        unlink_empty_record(owner, properties, found_id)?;
    }
    let value = match new_block.payload {
        BlockPayload::Inline(v) => v,
        BlockPayload::Dynamic { .. } => {
            // Re-decode so `add_property` can re-encode at the new location;
            // the dynamic chain it just allocated is reused as-is below.
            return add_relocated_dynamic_block(
                owner,
                properties,
                owner_ref,
                new_block,
                payload_size,
                alloc_property_id,
            );
        }
    };
    add_property(
        owner,
        properties,
        allocator,
        owner_ref,
        key,
        value,
        payload_size,
        alloc_property_id,
        created_dynamic_ids,
    )?;
    Ok(())
}

/// Splice an already-encoded dynamic block at the chain head — used when
/// `change_property` relocates a block that was already spilled to a
/// dynamic chain, so it must not be re-encoded (that would leak the chain
/// just allocated for it).
fn add_relocated_dynamic_block<O, LP>(
    owner: &mut O,
    properties: &mut RecordChanges<PropertyRecord, LP>,
    owner_ref: PropertyOwner,
    block: PropertyBlock,
    payload_size: usize,
    alloc_property_id: &mut dyn FnMut() -> u64,
) -> Result<()>
where
    O: HasPropertyChain,
    LP: Loader<PropertyRecord>,
{
    if let Some(head_id) = owner.property_chain_head().get() {
        let used = properties.get_or_load(head_id)?.read().used_size();
        if used + block.size() <= payload_size {
            properties.for_changing(head_id)?.blocks.push(block);
            return Ok(());
        }
    }

    let new_id = alloc_property_id();
    let old_head = owner.property_chain_head();
    {
        let record = properties.create(new_id);
        record.in_use = true;
        record.owner = owner_ref;
        record.next_prop = old_head;
        record.blocks.push(block);
    }
    if let Some(old_head_id) = old_head.get() {
        properties.for_changing(old_head_id)?.prev_prop = RecordRef::of(new_id);
    }
    owner.set_property_chain_head(RecordRef::of(new_id));
    Ok(())
}

fn unlink_empty_record<O, LP>(
    owner: &mut O,
    properties: &mut RecordChanges<PropertyRecord, LP>,
    found_id: u64,
) -> Result<()>
where
    O: HasPropertyChain,
    LP: Loader<PropertyRecord>,
{
    let (prev, next) = {
        let record = properties.get_or_load(found_id)?.read();
        (record.prev_prop, record.next_prop)
    };
    if let Some(prev_id) = prev.get() {
        properties.for_changing(prev_id)?.next_prop = next;
    } else {
        owner.set_property_chain_head(next);
    }
    if let Some(next_id) = next.get() {
        properties.for_changing(next_id)?.prev_prop = prev;
    }
    properties.mark_deleted(found_id)?;
    Ok(())
}

/// Remove `key` from the chain. If removing it empties a record, that
/// record is unlinked from the chain and marked deleted.
pub fn remove_property<O, LP>(
    owner: &mut O,
    properties: &mut RecordChanges<PropertyRecord, LP>,
    allocator: &dyn DynamicRecordAllocator,
    key: u32,
    obsolete_dynamic_ids: &mut Vec<u64>,
) -> Result<Option<PropertyValue>>
where
    O: HasPropertyChain,
    LP: Loader<PropertyRecord>,
{
    let Some(found_id) = find_block_record(properties, owner.property_chain_head(), key)? else {
        return Ok(None);
    };

    let removed_block = {
        let record = properties.for_changing(found_id)?;
        let idx = record.find_block(key).expect("located by find_block_record");
        record.blocks.remove(idx)
    };
    mark_block_obsolete(allocator, &removed_block, obsolete_dynamic_ids)?;
    let removed_value = match &removed_block.payload {
        BlockPayload::Inline(v) => Some(v.clone()),
        BlockPayload::Dynamic { .. } => None,
    };

    if properties.get_or_load(found_id)?.read().is_empty() {
        unlink_empty_record(owner, properties, found_id)?;
    }

    Ok(removed_value)
}

fn find_block_record<LP: Loader<PropertyRecord>>(
    properties: &mut RecordChanges<PropertyRecord, LP>,
    head: RecordRef,
    key: u32,
) -> Result<Option<u64>> {
    let mut cursor = head;
    while let Some(id) = cursor.get() {
        let record = properties.get_or_load(id)?.read();
        if record.find_block(key).is_some() {
            return Ok(Some(id));
        }
        cursor = record.next_prop;
    }
    Ok(None)
}

/// Debug-only invariant walk: every record's `prev_prop` must point back
/// to the record that points at it, and the chain must terminate.
/// Intended to run under `debug_assert!` at chain-operator call sites, not
/// as a steady-state check (spec.md §4.3 "assert_property_chain").
pub fn assert_property_chain<LP: Loader<PropertyRecord>>(
    properties: &mut RecordChanges<PropertyRecord, LP>,
    head: RecordRef,
) -> Result<()> {
    let mut cursor = head;
    let mut prev = RecordRef::NONE;
    let mut seen = std::collections::HashSet::new();
    while let Some(id) = cursor.get() {
        if !seen.insert(id) {
            return Err(Error::InvalidRecord(format!("property chain cycle at record {id}")));
        }
        let record = properties.get_or_load(id)?.read();
        if record.prev_prop != prev {
            return Err(Error::InvalidRecord(format!(
                "property record {id} prev_prop {:?} does not match walk predecessor {:?}",
                record.prev_prop, prev
            )));
        }
        prev = RecordRef::of(id);
        cursor = record.next_prop;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BeforeStateTracking;
    use crate::record::{DynamicRecord, NodeRecord};
    use crate::store::{InMemoryRecordStore, StoreLoader};
    use std::sync::Arc;

    fn properties() -> RecordChanges<PropertyRecord, StoreLoader<PropertyRecord, InMemoryRecordStore<PropertyRecord>>> {
        let store = Arc::new(InMemoryRecordStore::<PropertyRecord>::new());
        RecordChanges::new(StoreLoader::new(store), BeforeStateTracking::Tracked)
    }

    fn alloc(next: &mut u64) -> impl FnMut() -> u64 + '_ {
        move || {
            let id = *next;
            *next += 1;
            id
        }
    }

    #[test]
    fn add_then_remove_round_trips_through_chain() {
        let mut props = properties();
        let dyn_store = InMemoryRecordStore::<DynamicRecord>::new();
        let mut node = NodeRecord::new(1);
        let mut next = 0u64;
        let mut created = Vec::new();
        let mut obsolete = Vec::new();
        add_property(
            &mut node,
            &mut props,
            &dyn_store,
            PropertyOwner::Node(1),
            1,
            PropertyValue::Int(42),
            32,
            &mut alloc(&mut next),
            &mut created,
        )
        .unwrap();
        assert!(node.next_prop.is_some());

        let removed = remove_property(&mut node, &mut props, &dyn_store, 1, &mut obsolete).unwrap();
        assert_eq!(removed, Some(PropertyValue::Int(42)));
        assert!(node.next_prop.is_none());
        assert!(created.is_empty());
        assert!(obsolete.is_empty());
    }

    #[test]
    fn overflow_allocates_a_second_record() {
        let mut props = properties();
        let dyn_store = InMemoryRecordStore::<DynamicRecord>::new();
        let mut node = NodeRecord::new(1);
        let mut next = 0u64;
        let mut alloc_fn = alloc(&mut next);
        let mut created = Vec::new();
        // payload_size of 9 fits exactly one Int(i64) block (size 8) at a time.
        add_property(
            &mut node,
            &mut props,
            &dyn_store,
            PropertyOwner::Node(1),
            1,
            PropertyValue::Int(1),
            9,
            &mut alloc_fn,
            &mut created,
        )
        .unwrap();
        add_property(
            &mut node,
            &mut props,
            &dyn_store,
            PropertyOwner::Node(1),
            2,
            PropertyValue::Int(2),
            9,
            &mut alloc_fn,
            &mut created,
        )
        .unwrap();

        let head_id = node.next_prop.get().unwrap();
        let head = props.get_or_load(head_id).unwrap().read();
        assert!(head.next_prop.is_some());
        assert_property_chain(&mut props, node.next_prop).unwrap();
    }

    #[test]
    fn change_to_a_larger_value_relocates_the_block() {
        let mut props = properties();
        let dyn_store = InMemoryRecordStore::<DynamicRecord>::new();
        let mut node = NodeRecord::new(1);
        let mut next = 0u64;
        let mut alloc_fn = alloc(&mut next);
        let mut created = Vec::new();
        let mut obsolete = Vec::new();
        add_property(
            &mut node,
            &mut props,
            &dyn_store,
            PropertyOwner::Node(1),
            1,
            PropertyValue::Bool(true),
            9,
            &mut alloc_fn,
            &mut created,
        )
        .unwrap();
        change_property(
            &mut node,
            &mut props,
            &dyn_store,
            PropertyOwner::Node(1),
            1,
            PropertyValue::String("a".repeat(64)),
            9,
            &mut alloc_fn,
            &mut created,
            &mut obsolete,
        )
        .unwrap();

        let found = find_block_record(&mut props, node.next_prop, 1).unwrap();
        assert!(found.is_some());
        // the oversized string spilled into a dynamic chain this transaction owns.
        assert!(!created.is_empty());
    }

    #[test]
    fn change_replacing_a_dynamic_value_marks_old_chain_obsolete() {
        let mut props = properties();
        let dyn_store = InMemoryRecordStore::<DynamicRecord>::new();
        let mut node = NodeRecord::new(1);
        let mut next = 0u64;
        let mut alloc_fn = alloc(&mut next);
        let mut created = Vec::new();
        let mut obsolete = Vec::new();
        add_property(
            &mut node,
            &mut props,
            &dyn_store,
            PropertyOwner::Node(1),
            1,
            PropertyValue::String("x".repeat(64)),
            32,
            &mut alloc_fn,
            &mut created,
        )
        .unwrap();
        let first_chain_len = created.len();
        assert!(first_chain_len > 0);

        change_property(
            &mut node,
            &mut props,
            &dyn_store,
            PropertyOwner::Node(1),
            1,
            PropertyValue::String("y".repeat(64)),
            32,
            &mut alloc_fn,
            &mut created,
            &mut obsolete,
        )
        .unwrap();
        assert_eq!(obsolete.len(), first_chain_len);
    }
}
