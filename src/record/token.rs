//! Token records: label, relationship-type, and property-key tokens all
//! share this shape — a small id mapped to a name stored in a dynamic
//! record chain. The three kinds are kept in separate id spaces via the
//! zero-sized marker types below, the same way the change buffer keeps
//! three independent `RecordChanges` sets for them (spec.md §4.5 step 2).

use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

/// Marker for the label token namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelTokenKind;
/// Marker for the relationship-type token namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelTypeTokenKind;
/// Marker for the property-key token namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyKeyTokenKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord<K> {
    pub id: u32,
    pub in_use: bool,
    pub created: bool,
    pub name: String,
    /// Dynamic records backing `name` once it overflows the inline budget.
    /// Empty for short names (the common case).
    pub name_dynamic_records: Vec<u64>,
    #[serde(skip)]
    _kind: PhantomData<K>,
}

impl<K> crate::record::common::NewUnused for TokenRecord<K> {
    fn new_unused(id: u64) -> Self {
        TokenRecord::new(id as u32, String::new())
    }
}

impl<K> TokenRecord<K> {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            in_use: false,
            created: false,
            name: name.into(),
            name_dynamic_records: Vec::new(),
            _kind: PhantomData,
        }
    }
}

// `impl_abstract_record!` assumes a `u64` id field; tokens use `u32`, so the
// trait impl is written out by hand instead of reusing the macro.
impl<K> crate::record::common::AbstractRecord for TokenRecord<K> {
    fn id(&self) -> u64 {
        self.id as u64
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

pub type LabelToken = TokenRecord<LabelTokenKind>;
pub type RelTypeToken = TokenRecord<RelTypeTokenKind>;
pub type PropertyKeyToken = TokenRecord<PropertyKeyTokenKind>;
