//! Relationship records: a node in two doubly-linked chains at once, one
//! per endpoint.

use serde::{Deserialize, Serialize};

use super::common::RecordRef;
use crate::impl_abstract_record;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipRecord {
    pub id: u64,
    pub in_use: bool,
    pub created: bool,
    pub first_node: u64,
    pub second_node: u64,
    pub rel_type: u32,

    pub first_prev_rel: RecordRef,
    pub first_next_rel: RecordRef,
    pub second_prev_rel: RecordRef,
    pub second_next_rel: RecordRef,

    /// True iff this record is the head of `first_node`'s chain on this type.
    /// A head's `prev_rel` slot does not hold a real link — it holds the
    /// chain's length (spec.md §3 invariant 2), Neo4j's trick of repurposing
    /// a head's otherwise-unused prev pointer. Read/write it through
    /// `chain_length`/`set_chain_length`, never through `prev_rel` directly,
    /// once `is_chain_head` is true for that side.
    pub first_in_first_chain: bool,
    pub second_in_second_chain: bool,

    pub next_prop: RecordRef,
}

impl_abstract_record!(RelationshipRecord);

impl crate::record::common::NewUnused for RelationshipRecord {
    fn new_unused(id: u64) -> Self {
        RelationshipRecord::new(id, 0, 0, 0)
    }
}

impl RelationshipRecord {
    pub fn new(id: u64, first_node: u64, second_node: u64, rel_type: u32) -> Self {
        Self {
            id,
            in_use: false,
            created: false,
            first_node,
            second_node,
            rel_type,
            first_prev_rel: RecordRef::NONE,
            first_next_rel: RecordRef::NONE,
            second_prev_rel: RecordRef::NONE,
            second_next_rel: RecordRef::NONE,
            first_in_first_chain: false,
            second_in_second_chain: false,
            next_prop: RecordRef::NONE,
        }
    }

    pub fn is_loop(&self) -> bool {
        self.first_node == self.second_node
    }

    /// Whether `node` is this relationship's "first" or "second" endpoint.
    /// Panics if `node` is neither — callers only ask this about relationships
    /// they already know reference `node`.
    pub fn side_of(&self, node: u64) -> Side {
        if node == self.first_node {
            Side::First
        } else if node == self.second_node {
            Side::Second
        } else {
            panic!("node {node} is not an endpoint of relationship {}", self.id);
        }
    }

    pub fn prev_rel(&self, side: Side) -> RecordRef {
        match side {
            Side::First => self.first_prev_rel,
            Side::Second => self.second_prev_rel,
        }
    }

    pub fn next_rel(&self, side: Side) -> RecordRef {
        match side {
            Side::First => self.first_next_rel,
            Side::Second => self.second_next_rel,
        }
    }

    pub fn set_prev_rel(&mut self, side: Side, v: RecordRef) {
        match side {
            Side::First => self.first_prev_rel = v,
            Side::Second => self.second_prev_rel = v,
        }
    }

    pub fn set_next_rel(&mut self, side: Side, v: RecordRef) {
        match side {
            Side::First => self.first_next_rel = v,
            Side::Second => self.second_next_rel = v,
        }
    }

    pub fn is_chain_head(&self, side: Side) -> bool {
        match side {
            Side::First => self.first_in_first_chain,
            Side::Second => self.second_in_second_chain,
        }
    }

    pub fn set_chain_head(&mut self, side: Side, v: bool) {
        match side {
            Side::First => self.first_in_first_chain = v,
            Side::Second => self.second_in_second_chain = v,
        }
    }

    /// The chain length stored in a head's repurposed `prev_rel` slot
    /// (spec.md §3 invariant 2). Only meaningful when `is_chain_head(side)`.
    pub fn chain_length(&self, side: Side) -> u64 {
        self.prev_rel(side).0
    }

    /// Set the chain length stored in a head's repurposed `prev_rel` slot.
    pub fn set_chain_length(&mut self, side: Side, count: u64) {
        self.set_prev_rel(side, RecordRef::of(count));
    }

    /// The other endpoint, relative to the side given.
    pub fn node_of(&self, side: Side) -> u64 {
        match side {
            Side::First => self.first_node,
            Side::Second => self.second_node,
        }
    }
}

impl crate::record::common::HasPropertyChain for RelationshipRecord {
    fn property_chain_head(&self) -> RecordRef {
        self.next_prop
    }
    fn set_property_chain_head(&mut self, head: RecordRef) {
        self.next_prop = head;
    }
}

/// Which of a relationship's two chain endpoints we're talking about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    First,
    Second,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::First => Side::Second,
            Side::Second => Side::First,
        }
    }
}
