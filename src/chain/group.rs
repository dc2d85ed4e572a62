//! Relationship-group (dense node) chain maintenance (spec.md §4.4).
//!
//! A dense node's `next_rel` field points at the head of its group chain
//! instead of a relationship. The group chain is kept sorted ascending by
//! relationship type (spec.md §9 open question, resolved: type-sorted, not
//! insertion-ordered — makes `find_or_create_group` a short linear probe
//! with an early exit instead of an unbounded scan).

use crate::buffer::{Loader, RecordChanges};
use crate::record::{GroupDirection, NodeRecord, RecordRef, RelationshipGroupRecord};
use crate::Result;

enum Locate {
    Found(u64),
    /// Not found; insert a new group record after this one (or as the new
    /// chain head, if `None`).
    InsertAfter(Option<u64>),
}

fn locate<LG: Loader<RelationshipGroupRecord>>(
    groups: &mut RecordChanges<RelationshipGroupRecord, LG>,
    head: RecordRef,
    rel_type: u32,
) -> Result<Locate> {
    let mut cursor = head;
    let mut prev = None;
    loop {
        let Some(id) = cursor.get() else {
            return Ok(Locate::InsertAfter(prev));
        };
        let (g_type, g_next) = {
            let change = groups.get_or_load(id)?;
            let g = change.read();
            (g.rel_type, g.next)
        };
        if g_type == rel_type {
            return Ok(Locate::Found(id));
        }
        if g_type > rel_type {
            return Ok(Locate::InsertAfter(prev));
        }
        prev = Some(id);
        cursor = g_next;
    }
}

/// Find the group record for `(node_id, rel_type)`, creating and splicing
/// one into the sorted chain if it doesn't exist yet.
pub fn ensure_group<LN, LG>(
    nodes: &mut RecordChanges<NodeRecord, LN>,
    groups: &mut RecordChanges<RelationshipGroupRecord, LG>,
    node_id: u64,
    rel_type: u32,
    alloc_group_id: &mut dyn FnMut() -> u64,
) -> Result<u64>
where
    LN: Loader<NodeRecord>,
    LG: Loader<RelationshipGroupRecord>,
{
    let head = { nodes.get_or_load(node_id)?.read().next_rel };
    match locate(groups, head, rel_type)? {
        Locate::Found(id) => Ok(id),
        Locate::InsertAfter(prev) => {
            let new_id = alloc_group_id();
            let next_after_new = match prev {
                Some(p) => groups.get_or_load(p)?.read().next,
                None => head,
            };
            {
                let g = groups.create(new_id);
                g.in_use = true;
                g.owning_node = node_id;
                g.rel_type = rel_type;
                g.next = next_after_new;
            }
            match prev {
                Some(p) => groups.for_changing(p)?.next = RecordRef::of(new_id),
                None => nodes.for_changing(node_id)?.next_rel = RecordRef::of(new_id),
            }
            Ok(new_id)
        }
    }
}

/// Remove an empty group record from the chain and mark it deleted
/// (spec.md invariant 5: "a group with no relationships left in any
/// bucket is removed from the chain").
pub fn remove_empty_group<LN, LG>(
    nodes: &mut RecordChanges<NodeRecord, LN>,
    groups: &mut RecordChanges<RelationshipGroupRecord, LG>,
    node_id: u64,
    group_id: u64,
) -> Result<()>
where
    LN: Loader<NodeRecord>,
    LG: Loader<RelationshipGroupRecord>,
{
    let head = { nodes.get_or_load(node_id)?.read().next_rel };
    let mut cursor = head;
    let mut prev: Option<u64> = None;
    loop {
        let Some(id) = cursor.get() else {
            // group_id was not found in the chain; nothing to splice.
            return Ok(());
        };
        if id == group_id {
            let next = groups.get_or_load(id)?.read().next;
            match prev {
                Some(p) => groups.for_changing(p)?.next = next,
                None => nodes.for_changing(node_id)?.next_rel = next,
            }
            groups.mark_deleted(id)?;
            return Ok(());
        }
        let g_next = groups.get_or_load(id)?.read().next;
        prev = Some(id);
        cursor = g_next;
    }
}

/// Bucket direction helper re-exported for callers that only have the
/// endpoints and owning node at hand.
pub fn direction_of(first_node: u64, second_node: u64, owning_node: u64) -> GroupDirection {
    GroupDirection::of(first_node, second_node, owning_node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BeforeStateTracking;
    use crate::record::NodeRecord as NR;
    use crate::record::RelationshipGroupRecord as RGR;
    use crate::store::{InMemoryRecordStore, StoreLoader};
    use std::sync::Arc;

    fn harness() -> (
        RecordChanges<NR, StoreLoader<NR, InMemoryRecordStore<NR>>>,
        RecordChanges<RGR, StoreLoader<RGR, InMemoryRecordStore<RGR>>>,
    ) {
        let node_store = Arc::new(InMemoryRecordStore::<NR>::new());
        let group_store = Arc::new(InMemoryRecordStore::<RGR>::new());
        let nodes = RecordChanges::new(StoreLoader::new(node_store), BeforeStateTracking::Tracked);
        let groups = RecordChanges::new(StoreLoader::new(group_store), BeforeStateTracking::Untracked);
        (nodes, groups)
    }

    #[test]
    fn creates_groups_in_type_sorted_order() {
        let (mut nodes, mut groups) = harness();
        nodes.create(1).in_use = true;
        let mut next_id = 10u64;
        let mut alloc = || {
            let id = next_id;
            next_id += 1;
            id
        };
        ensure_group(&mut nodes, &mut groups, 1, 5, &mut alloc).unwrap();
        ensure_group(&mut nodes, &mut groups, 1, 1, &mut alloc).unwrap();
        ensure_group(&mut nodes, &mut groups, 1, 3, &mut alloc).unwrap();

        let mut types = Vec::new();
        let mut cursor = nodes.get_or_load(1).unwrap().read().next_rel;
        while let Some(id) = cursor.get() {
            let g = groups.get_or_load(id).unwrap().read();
            types.push(g.rel_type);
            cursor = g.next;
        }
        assert_eq!(types, vec![1, 3, 5]);
    }

    #[test]
    fn reuses_existing_group_for_same_type() {
        let (mut nodes, mut groups) = harness();
        nodes.create(1).in_use = true;
        let mut next_id = 10u64;
        let mut alloc = || {
            let id = next_id;
            next_id += 1;
            id
        };
        let a = ensure_group(&mut nodes, &mut groups, 1, 2, &mut alloc).unwrap();
        let b = ensure_group(&mut nodes, &mut groups, 1, 2, &mut alloc).unwrap();
        assert_eq!(a, b);
    }
}
