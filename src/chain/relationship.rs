//! Relationship-chain splicing (spec.md §4.2) and the dense-node upgrade
//! (spec.md §4.4). Each node endpoint of a relationship sits in its own
//! chain; a dense node's chains live inside relationship-group buckets
//! instead of hanging directly off the node record.

use crate::buffer::{Loader, RecordChanges};
use crate::chain::group::{self, direction_of};
use crate::record::{GroupDirection, NodeRecord, RecordRef, RelationshipGroupRecord, RelationshipRecord, Side};
use crate::Result;

/// Splice `rel_id` in as the new chain head at `old_head`, on `node_id`'s
/// side of the relationship. The new head inherits the old head's chain
/// length plus one (spec.md §3 invariant 2, §4.2 step 4); the previous
/// head's back-pointer, if there was one, is rewritten to a real link to
/// the new head. Does not touch whatever owns `old_head` (a node's
/// `next_rel` or a group's bucket) — the caller repoints that separately.
fn splice_in_as_head<LR: Loader<RelationshipRecord>>(
    rels: &mut RecordChanges<RelationshipRecord, LR>,
    node_id: u64,
    rel_id: u64,
    old_head: RecordRef,
) -> Result<()> {
    let side = rels.get_or_load(rel_id)?.read().side_of(node_id);
    let old_count = match old_head.get() {
        Some(head_id) => {
            let head_side = rels.get_or_load(head_id)?.read().side_of(node_id);
            rels.get_or_load(head_id)?.read().chain_length(head_side)
        }
        None => 0,
    };
    {
        let rel = rels.for_changing(rel_id)?;
        rel.set_next_rel(side, old_head);
        rel.set_chain_length(side, old_count + 1);
        rel.set_chain_head(side, true);
    }
    if let Some(head_id) = old_head.get() {
        let head_side = rels.get_or_load(head_id)?.read().side_of(node_id);
        let head_rec = rels.for_changing(head_id)?;
        head_rec.set_prev_rel(head_side, RecordRef::of(rel_id));
        head_rec.set_chain_head(head_side, false);
    }
    Ok(())
}

/// Count the relationships on `node_id`'s side of its chain, stopping
/// early once `cap` is reached. Used for the pre-insert dense-node
/// threshold check (spec.md §9: compare against the count *before* the
/// new relationship is added, to stay byte-compatible with stores that
/// made the same choice).
fn count_chain<LR: Loader<RelationshipRecord>>(
    rels: &mut RecordChanges<RelationshipRecord, LR>,
    node_id: u64,
    head: RecordRef,
    cap: usize,
) -> Result<usize> {
    let mut cursor = head;
    let mut count = 0;
    while let Some(id) = cursor.get() {
        if count >= cap {
            break;
        }
        let rel = rels.get_or_load(id)?.read();
        let side = rel.side_of(node_id);
        cursor = rel.next_rel(side);
        count += 1;
    }
    Ok(count)
}

/// Move every relationship currently in `node_id`'s sparse chain into
/// per-type relationship groups, then mark the node dense (spec.md §4.4).
fn upgrade_to_dense<LN, LR, LG>(
    nodes: &mut RecordChanges<NodeRecord, LN>,
    rels: &mut RecordChanges<RelationshipRecord, LR>,
    groups: &mut RecordChanges<RelationshipGroupRecord, LG>,
    node_id: u64,
    alloc_group_id: &mut dyn FnMut() -> u64,
) -> Result<()>
where
    LN: Loader<NodeRecord>,
    LR: Loader<RelationshipRecord>,
    LG: Loader<RelationshipGroupRecord>,
{
    let old_head = nodes.get_or_load(node_id)?.read().next_rel;
    tracing::debug!(node_id, "upgrading node to dense representation");
    {
        let node = nodes.for_changing(node_id)?;
        node.dense = true;
        node.next_rel = RecordRef::NONE;
    }

    let mut cursor = old_head;
    while let Some(rel_id) = cursor.get() {
        let (side, next_in_old_chain, rel_type, dir) = {
            let rel = rels.get_or_load(rel_id)?.read();
            let side = rel.side_of(node_id);
            let dir = GroupDirection::of(rel.first_node, rel.second_node, node_id);
            (side, rel.next_rel(side), rel.rel_type, dir)
        };
        let group_id = group::ensure_group(nodes, groups, node_id, rel_type, alloc_group_id)?;
        let old_bucket_head = groups.get_or_load(group_id)?.read().bucket(dir);
        splice_in_as_head(rels, node_id, rel_id, old_bucket_head)?;
        groups.for_changing(group_id)?.set_bucket(dir, RecordRef::of(rel_id));
        cursor = next_in_old_chain;
    }
    Ok(())
}

/// Attach `rel_id` (already created, with `first_node`/`second_node`/
/// `rel_type` set) into `node_id`'s chain, upgrading the node to dense
/// first if the pre-insert chain length has reached `threshold`.
pub fn attach_relationship<LN, LR, LG>(
    nodes: &mut RecordChanges<NodeRecord, LN>,
    rels: &mut RecordChanges<RelationshipRecord, LR>,
    groups: &mut RecordChanges<RelationshipGroupRecord, LG>,
    threshold: usize,
    node_id: u64,
    rel_id: u64,
    alloc_group_id: &mut dyn FnMut() -> u64,
) -> Result<()>
where
    LN: Loader<NodeRecord>,
    LR: Loader<RelationshipRecord>,
    LG: Loader<RelationshipGroupRecord>,
{
    let (is_dense, head) = {
        let node = nodes.get_or_load(node_id)?.read();
        (node.dense, node.next_rel)
    };

    if is_dense {
        let (rel_type, first_node, second_node) = {
            let rel = rels.get_or_load(rel_id)?.read();
            (rel.rel_type, rel.first_node, rel.second_node)
        };
        let dir = direction_of(first_node, second_node, node_id);
        let group_id = group::ensure_group(nodes, groups, node_id, rel_type, alloc_group_id)?;
        let old_bucket_head = groups.get_or_load(group_id)?.read().bucket(dir);
        splice_in_as_head(rels, node_id, rel_id, old_bucket_head)?;
        groups.for_changing(group_id)?.set_bucket(dir, RecordRef::of(rel_id));
        return Ok(());
    }

    let count = count_chain(rels, node_id, head, threshold)?;
    if count >= threshold {
        upgrade_to_dense(nodes, rels, groups, node_id, alloc_group_id)?;
        return attach_relationship(nodes, rels, groups, threshold, node_id, rel_id, alloc_group_id);
    }

    splice_in_as_head(rels, node_id, rel_id, head)?;
    nodes.for_changing(node_id)?.next_rel = RecordRef::of(rel_id);
    Ok(())
}

/// What `detach_relationship` leaves behind on one side, handed back so
/// the mutation API can patch the cache without a full node reload
/// (spec.md §8 S3).
pub struct DetachResult {
    pub next_after_removal: RecordRef,
}

/// Remove `rel_id` from `node_id`'s side of the chain (dense or sparse).
/// Does not mark `rel_id` itself deleted — the mutation API owns that.
pub fn detach_relationship<LN, LR, LG>(
    nodes: &mut RecordChanges<NodeRecord, LN>,
    rels: &mut RecordChanges<RelationshipRecord, LR>,
    groups: &mut RecordChanges<RelationshipGroupRecord, LG>,
    node_id: u64,
    rel_id: u64,
) -> Result<DetachResult>
where
    LN: Loader<NodeRecord>,
    LR: Loader<RelationshipRecord>,
    LG: Loader<RelationshipGroupRecord>,
{
    let is_dense = nodes.get_or_load(node_id)?.read().dense;
    let (side, prev, next, was_head, rel_type, first_node, second_node) = {
        let rel = rels.get_or_load(rel_id)?.read();
        let side = rel.side_of(node_id);
        (
            side,
            rel.prev_rel(side),
            rel.next_rel(side),
            rel.is_chain_head(side),
            rel.rel_type,
            rel.first_node,
            rel.second_node,
        )
    };
    let _ = side;
    let dir = direction_of(first_node, second_node, node_id);
    let group_id = if is_dense {
        let group_head = nodes.get_or_load(node_id)?.read().next_rel;
        locate_group_for_removal(groups, group_head, rel_type)?
    } else {
        None
    };

    if was_head {
        // `prev` on a head record holds the chain's length, not a real
        // link (spec.md §3 invariant 2) — the new head inherits `count - 1`.
        let old_count = prev.0;
        if let Some(next_id) = next.get() {
            let next_side = rels.get_or_load(next_id)?.read().side_of(node_id);
            let next_rec = rels.for_changing(next_id)?;
            next_rec.set_chain_length(next_side, old_count - 1);
            next_rec.set_chain_head(next_side, true);
        }
    } else {
        if let Some(prev_id) = prev.get() {
            let prev_side = rels.get_or_load(prev_id)?.read().side_of(node_id);
            rels.for_changing(prev_id)?.set_next_rel(prev_side, next);
        }
        if let Some(next_id) = next.get() {
            let next_side = rels.get_or_load(next_id)?.read().side_of(node_id);
            rels.for_changing(next_id)?.set_prev_rel(next_side, prev);
        }
        // The chain's head is untouched by the splice above but loses one
        // from its stored count (spec.md §4.2 delete).
        let head = match group_id {
            Some(g) => groups.get_or_load(g)?.read().bucket(dir),
            None => nodes.get_or_load(node_id)?.read().next_rel,
        };
        if let Some(head_id) = head.get() {
            let head_side = rels.get_or_load(head_id)?.read().side_of(node_id);
            let count = rels.get_or_load(head_id)?.read().chain_length(head_side);
            rels.for_changing(head_id)?.set_chain_length(head_side, count - 1);
        }
    }

    if was_head {
        if is_dense {
            if let Some(group_id) = group_id {
                groups.for_changing(group_id)?.set_bucket(dir, next);
                if groups.get_or_load(group_id)?.read().is_empty() {
                    group::remove_empty_group(nodes, groups, node_id, group_id)?;
                }
            }
        } else {
            nodes.for_changing(node_id)?.next_rel = next;
        }
    }

    Ok(DetachResult {
        next_after_removal: next,
    })
}

fn locate_group_for_removal<LG: Loader<RelationshipGroupRecord>>(
    groups: &mut RecordChanges<RelationshipGroupRecord, LG>,
    head: RecordRef,
    rel_type: u32,
) -> Result<Option<u64>> {
    let mut cursor = head;
    while let Some(id) = cursor.get() {
        let g = groups.get_or_load(id)?.read();
        if g.rel_type == rel_type {
            return Ok(Some(id));
        }
        cursor = g.next;
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BeforeStateTracking;
    use crate::record::{NodeRecord as NR, RelationshipGroupRecord as RGR, RelationshipRecord as RR};
    use crate::store::{InMemoryRecordStore, StoreLoader};
    use std::sync::Arc;

    struct Harness {
        nodes: RecordChanges<NR, StoreLoader<NR, InMemoryRecordStore<NR>>>,
        rels: RecordChanges<RR, StoreLoader<RR, InMemoryRecordStore<RR>>>,
        groups: RecordChanges<RGR, StoreLoader<RGR, InMemoryRecordStore<RGR>>>,
        next_rel_id: u64,
        next_group_id: u64,
    }

    fn harness() -> Harness {
        Harness {
            nodes: RecordChanges::new(
                StoreLoader::new(Arc::new(InMemoryRecordStore::new())),
                BeforeStateTracking::Tracked,
            ),
            rels: RecordChanges::new(
                StoreLoader::new(Arc::new(InMemoryRecordStore::new())),
                BeforeStateTracking::Untracked,
            ),
            groups: RecordChanges::new(
                StoreLoader::new(Arc::new(InMemoryRecordStore::new())),
                BeforeStateTracking::Untracked,
            ),
            next_rel_id: 0,
            next_group_id: 1000,
        }
    }

    impl Harness {
        fn new_node(&mut self, id: u64) {
            let n = self.nodes.create(id);
            n.in_use = true;
        }

        fn new_rel(&mut self, first: u64, second: u64, rel_type: u32) -> u64 {
            let id = self.next_rel_id;
            self.next_rel_id += 1;
            let r = self.rels.create(id);
            r.in_use = true;
            r.first_node = first;
            r.second_node = second;
            r.rel_type = rel_type;
            id
        }

        fn attach(&mut self, threshold: usize, node_id: u64, rel_id: u64) {
            let mut next_group_id = self.next_group_id;
            {
                let mut alloc = || {
                    let id = next_group_id;
                    next_group_id += 1;
                    id
                };
                attach_relationship(
                    &mut self.nodes,
                    &mut self.rels,
                    &mut self.groups,
                    threshold,
                    node_id,
                    rel_id,
                    &mut alloc,
                )
                .unwrap();
            }
            self.next_group_id = next_group_id;
        }
    }

    #[test]
    fn first_relationship_becomes_sole_chain_head() {
        let mut h = harness();
        h.new_node(1);
        h.new_node(2);
        let rel = h.new_rel(1, 2, 7);
        h.attach(50, 1, rel);
        h.attach(50, 2, rel);

        let n1 = h.nodes.get_or_load(1).unwrap().read().clone();
        assert_eq!(n1.next_rel, RecordRef::of(rel));
        let r = h.rels.get_or_load(rel).unwrap().read().clone();
        assert!(r.is_chain_head(Side::First));
        assert!(r.is_chain_head(Side::Second));
        assert_eq!(r.chain_length(Side::First), 1);
        assert_eq!(r.chain_length(Side::Second), 1);
    }

    #[test]
    fn second_relationship_splices_in_front() {
        let mut h = harness();
        h.new_node(1);
        h.new_node(2);
        h.new_node(3);
        let first = h.new_rel(1, 2, 7);
        h.attach(50, 1, first);
        h.attach(50, 2, first);
        let second = h.new_rel(1, 3, 7);
        h.attach(50, 1, second);
        h.attach(50, 3, second);

        let n1 = h.nodes.get_or_load(1).unwrap().read().clone();
        assert_eq!(n1.next_rel, RecordRef::of(second));
        let second_rec = h.rels.get_or_load(second).unwrap().read().clone();
        assert_eq!(second_rec.next_rel(Side::First), RecordRef::of(first));
        assert_eq!(second_rec.chain_length(Side::First), 2);
        let first_rec = h.rels.get_or_load(first).unwrap().read().clone();
        assert!(!first_rec.is_chain_head(Side::First));
        assert_eq!(first_rec.prev_rel(Side::First), RecordRef::of(second));
    }

    #[test]
    fn reaching_threshold_upgrades_node_to_dense() {
        let mut h = harness();
        h.new_node(1);
        for i in 0..3u64 {
            h.new_node(100 + i);
        }
        let threshold = 2;
        let mut rels = Vec::new();
        for i in 0..3u64 {
            let r = h.new_rel(1, 100 + i, 9);
            rels.push(r);
            h.attach(threshold, 1, r);
            h.attach(threshold, 100 + i, r);
        }
        let n1 = h.nodes.get_or_load(1).unwrap().read().clone();
        assert!(n1.dense);
        // head now points at a relationship-group record, not a relationship.
        let group_id = n1.next_rel.get().unwrap();
        let group = h.groups.get_or_load(group_id).unwrap().read().clone();
        assert_eq!(group.rel_type, 9);
        assert!(group.first_out.is_some());
    }

    #[test]
    fn detach_relinks_neighbors_and_reports_new_next() {
        let mut h = harness();
        h.new_node(1);
        h.new_node(2);
        h.new_node(3);
        let first = h.new_rel(1, 2, 7);
        h.attach(50, 1, first);
        h.attach(50, 2, first);
        let second = h.new_rel(1, 3, 7);
        h.attach(50, 1, second);
        h.attach(50, 3, second);

        let result = detach_relationship(&mut h.nodes, &mut h.rels, &mut h.groups, 1, second).unwrap();
        assert_eq!(result.next_after_removal, RecordRef::of(first));
        let n1 = h.nodes.get_or_load(1).unwrap().read().clone();
        assert_eq!(n1.next_rel, RecordRef::of(first));
        let first_rec = h.rels.get_or_load(first).unwrap().read().clone();
        assert!(first_rec.is_chain_head(Side::First));
        assert_eq!(first_rec.chain_length(Side::First), 1);
    }
}
