//! Schema rules (constraints, index descriptors) — serialized as a sequence
//! of dynamic records, same as an oversized property value.

use serde::{Deserialize, Serialize};

use crate::impl_abstract_record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaRuleKind {
    UniquenessConstraint,
    ExistenceConstraint,
    Index,
}

/// The logical content of a schema rule, independent of how it's
/// serialized into dynamic records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRule {
    pub kind: SchemaRuleKind,
    pub label: u32,
    pub property_key: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaRuleRecord {
    pub id: u64,
    pub in_use: bool,
    pub created: bool,
    pub rule: SchemaRule,
    /// Dynamic records this rule is serialized into.
    pub dynamic_records: Vec<u64>,
}

impl_abstract_record!(SchemaRuleRecord);

impl crate::record::common::NewUnused for SchemaRuleRecord {
    fn new_unused(id: u64) -> Self {
        SchemaRuleRecord::new(
            id,
            SchemaRule {
                kind: SchemaRuleKind::Index,
                label: 0,
                property_key: 0,
            },
        )
    }
}

impl SchemaRuleRecord {
    pub fn new(id: u64, rule: SchemaRule) -> Self {
        Self {
            id,
            in_use: false,
            created: false,
            rule,
            dynamic_records: Vec::new(),
        }
    }
}
