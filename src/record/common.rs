//! Shared record machinery: the `NO_ID` sentinel and the `AbstractRecord`
//! trait every record kind implements.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel meaning "no such id" — Neo4j's `Record.NO_NEXT_RELATIONSHIP` /
/// `NO_NEXT_PROPERTY` convention, collapsed into one constant since both use
/// the same bit pattern in practice.
pub const NO_ID: u64 = u64::MAX;

/// A possibly-absent 64-bit record id, newtype'd so `NO_ID` can't silently
/// leak into arithmetic the way a raw `u64::MAX` would.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordRef(pub u64);

impl RecordRef {
    pub const NONE: RecordRef = RecordRef(NO_ID);

    pub fn of(id: u64) -> Self {
        RecordRef(id)
    }

    pub fn is_none(self) -> bool {
        self.0 == NO_ID
    }

    pub fn is_some(self) -> bool {
        !self.is_none()
    }

    pub fn get(self) -> Option<u64> {
        if self.is_none() { None } else { Some(self.0) }
    }
}

impl Default for RecordRef {
    fn default() -> Self {
        RecordRef::NONE
    }
}

impl From<u64> for RecordRef {
    fn from(id: u64) -> Self {
        RecordRef(id)
    }
}

impl From<Option<u64>> for RecordRef {
    fn from(id: Option<u64>) -> Self {
        match id {
            Some(id) => RecordRef(id),
            None => RecordRef::NONE,
        }
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "NONE")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Fields every record kind carries, regardless of payload shape.
///
/// `created` is transient — it is never persisted, it only exists to tell
/// prepare/rollback "this record's id was allocated by this transaction."
pub trait AbstractRecord {
    fn id(&self) -> u64;
    fn in_use(&self) -> bool;
    fn set_in_use(&mut self, in_use: bool);
    fn created(&self) -> bool;
    fn set_created(&mut self, created: bool);
}

/// Build a fresh, not-in-use placeholder for an id nothing has been
/// written to yet. Every store's `get_record` returns one of these for an
/// id it has no data for, instead of erroring — mirroring Neo4j's record
/// stores, where reading an unallocated id yields a zeroed-out record.
pub trait NewUnused {
    fn new_unused(id: u64) -> Self;
}

/// Implemented by the three record kinds that own a property chain head
/// (node, relationship, neostore) so `chain::property` can operate on any
/// of them without three near-identical copies of the splice logic.
pub trait HasPropertyChain {
    fn property_chain_head(&self) -> RecordRef;
    fn set_property_chain_head(&mut self, head: RecordRef);
}

/// Boilerplate for the `id`/`in_use`/`created` triad, implemented once per
/// record struct via the `impl_abstract_record!` macro below.
#[macro_export]
macro_rules! impl_abstract_record {
    ($ty:ty) => {
        impl $crate::record::common::AbstractRecord for $ty {
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
    };
}
