//! Fixed-shape record types: the on-disk unit of every store this crate's
//! transaction core writes through. Every kind carries `id`, `in_use`, and
//! `created` (transient) — see `common::AbstractRecord`.

pub mod common;
pub mod dynamic;
pub mod neostore;
pub mod node;
pub mod property;
pub mod relationship;
pub mod relationship_group;
pub mod schema_rule;
pub mod token;

pub use common::{AbstractRecord, HasPropertyChain, NewUnused, RecordRef, NO_ID};
pub use dynamic::DynamicRecord;
pub use neostore::NeoStoreRecord;
pub use node::{LabelField, NodeRecord};
pub use property::{BlockPayload, PropertyBlock, PropertyOwner, PropertyRecord};
pub use relationship::{RelationshipRecord, Side};
pub use relationship_group::{GroupDirection, RelationshipGroupRecord};
pub use schema_rule::{SchemaRule, SchemaRuleKind, SchemaRuleRecord};
pub use token::{
    LabelToken, LabelTokenKind, PropertyKeyToken, PropertyKeyTokenKind, RelTypeToken,
    RelTypeTokenKind, TokenRecord,
};
