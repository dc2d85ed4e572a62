//! Relationship-group records: one per (dense node, relationship type),
//! holding the three direction-bucket chain heads.

use serde::{Deserialize, Serialize};

use super::common::RecordRef;
use crate::impl_abstract_record;

/// Which bucket of a relationship group a given (node, relationship) pair
/// belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupDirection {
    Outgoing,
    Incoming,
    Loop,
}

impl GroupDirection {
    /// Direction of `rel` as seen from `node`'s side. A loop (both endpoints
    /// equal) is always `Loop` regardless of which side triggered the call.
    pub fn of(rel_first_node: u64, rel_second_node: u64, node: u64) -> Self {
        if rel_first_node == rel_second_node {
            GroupDirection::Loop
        } else if rel_first_node == node {
            GroupDirection::Outgoing
        } else {
            GroupDirection::Incoming
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipGroupRecord {
    pub id: u64,
    pub in_use: bool,
    pub created: bool,
    pub rel_type: u32,
    pub owning_node: u64,
    /// Next group record in this node's group chain (ordered by type).
    pub next: RecordRef,
    /// Transient: previous group in the chain, used only while splicing —
    /// never read back from a freshly loaded record, per spec.md §3.
    pub prev: RecordRef,
    pub first_out: RecordRef,
    pub first_in: RecordRef,
    pub first_loop: RecordRef,
}

impl_abstract_record!(RelationshipGroupRecord);

impl crate::record::common::NewUnused for RelationshipGroupRecord {
    fn new_unused(id: u64) -> Self {
        RelationshipGroupRecord::new(id, 0, 0)
    }
}

impl RelationshipGroupRecord {
    pub fn new(id: u64, owning_node: u64, rel_type: u32) -> Self {
        Self {
            id,
            in_use: false,
            created: false,
            rel_type,
            owning_node,
            next: RecordRef::NONE,
            prev: RecordRef::NONE,
            first_out: RecordRef::NONE,
            first_in: RecordRef::NONE,
            first_loop: RecordRef::NONE,
        }
    }

    pub fn bucket(&self, dir: GroupDirection) -> RecordRef {
        match dir {
            GroupDirection::Outgoing => self.first_out,
            GroupDirection::Incoming => self.first_in,
            GroupDirection::Loop => self.first_loop,
        }
    }

    pub fn set_bucket(&mut self, dir: GroupDirection, v: RecordRef) {
        match dir {
            GroupDirection::Outgoing => self.first_out = v,
            GroupDirection::Incoming => self.first_in = v,
            GroupDirection::Loop => self.first_loop = v,
        }
    }

    /// A group with no relationships left in any of its three buckets is
    /// removed from the chain (spec.md invariant 5).
    pub fn is_empty(&self) -> bool {
        self.first_out.is_none() && self.first_in.is_none() && self.first_loop.is_none()
    }
}
