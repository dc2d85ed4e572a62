//! The public mutation API (spec.md §4, §6): stage node/relationship/
//! property/label/schema-rule/token changes against a per-transaction
//! change buffer, then hand the result to `prepare` for materialization.
//!
//! A `WriteTransaction` never touches a store directly except to allocate
//! fresh ids — every read goes through its own `RecordChanges` buffers, so
//! a transaction only ever sees its own uncommitted writes layered over
//! whatever was already on disk.

pub mod label_codec;
mod prepare;
mod rollback;

use crate::buffer::{BeforeStateTracking, RecordChanges};
use crate::chain;
use crate::command::Command;
use crate::config::EngineConfig;
use crate::engine::Stores;
use crate::record::neostore::NEO_STORE_ID;
use crate::record::{
    LabelTokenKind, NeoStoreRecord, NodeRecord, PropertyKeyTokenKind, PropertyOwner, PropertyRecord,
    RelTypeTokenKind, RelationshipGroupRecord, RelationshipRecord, SchemaRule, SchemaRuleRecord, TokenRecord,
};
use crate::store::{DynamicRecordAllocator, RecordStore, StoreLoader};
use crate::value::PropertyValue;
use crate::{Error, Result};

/// Which token namespace `create_token` allocates into (spec.md §4.5 step
/// 2: the three token kinds are independent id spaces).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Label,
    RelationshipType,
    PropertyKey,
}

/// Token names up to this length are inlined directly in the token record;
/// longer ones spill into a dynamic record chain, same as an oversized
/// property value.
const INLINE_TOKEN_NAME_MAX: usize = 32;

type NodeChanges = RecordChanges<NodeRecord, StoreLoader<NodeRecord, crate::store::InMemoryRecordStore<NodeRecord>>>;
type RelChanges =
    RecordChanges<RelationshipRecord, StoreLoader<RelationshipRecord, crate::store::InMemoryRecordStore<RelationshipRecord>>>;
type GroupChanges = RecordChanges<
    RelationshipGroupRecord,
    StoreLoader<RelationshipGroupRecord, crate::store::InMemoryRecordStore<RelationshipGroupRecord>>,
>;
type PropChanges =
    RecordChanges<PropertyRecord, StoreLoader<PropertyRecord, crate::store::InMemoryRecordStore<PropertyRecord>>>;
type LabelTokenChanges = RecordChanges<
    TokenRecord<LabelTokenKind>,
    StoreLoader<TokenRecord<LabelTokenKind>, crate::store::InMemoryRecordStore<TokenRecord<LabelTokenKind>>>,
>;
type RelTypeTokenChanges = RecordChanges<
    TokenRecord<RelTypeTokenKind>,
    StoreLoader<TokenRecord<RelTypeTokenKind>, crate::store::InMemoryRecordStore<TokenRecord<RelTypeTokenKind>>>,
>;
type PropKeyTokenChanges = RecordChanges<
    TokenRecord<PropertyKeyTokenKind>,
    StoreLoader<TokenRecord<PropertyKeyTokenKind>, crate::store::InMemoryRecordStore<TokenRecord<PropertyKeyTokenKind>>>,
>;
type SchemaChanges =
    RecordChanges<SchemaRuleRecord, StoreLoader<SchemaRuleRecord, crate::store::InMemoryRecordStore<SchemaRuleRecord>>>;
type NeoChanges =
    RecordChanges<NeoStoreRecord, StoreLoader<NeoStoreRecord, crate::store::InMemoryRecordStore<NeoStoreRecord>>>;

/// One write transaction's change buffer (spec.md §4.1) plus its
/// prepare/commit bookkeeping. Fields are named per record kind rather than
/// reused across kinds so chain operators can borrow several of them
/// disjointly in the same method body.
pub struct WriteTransaction {
    pub(crate) node_changes: NodeChanges,
    pub(crate) rel_changes: RelChanges,
    pub(crate) group_changes: GroupChanges,
    pub(crate) prop_changes: PropChanges,
    pub(crate) label_token_changes: LabelTokenChanges,
    pub(crate) rel_type_token_changes: RelTypeTokenChanges,
    pub(crate) prop_key_token_changes: PropKeyTokenChanges,
    pub(crate) schema_changes: SchemaChanges,
    pub(crate) neo_changes: NeoChanges,
    pub(crate) stores: Stores,
    pub(crate) config: EngineConfig,
    /// Dynamic record ids allocated by this transaction (property overflow,
    /// label overflow, token names, schema rule bytes). Freed on rollback.
    pub(crate) created_dynamic_ids: Vec<u64>,
    /// Dynamic record ids a change/remove made obsolete. Freed once the
    /// replacing change has committed.
    pub(crate) obsolete_dynamic_ids: Vec<u64>,
    /// Every (label, property key, value) this transaction wrote to a node,
    /// captured at write time for `validate_transaction_start_knowledge`.
    pub(crate) touched_properties: Vec<(u32, u32, PropertyValue)>,
    pub(crate) tx_start_last_committed: u64,
    pub(crate) prepared: bool,
    pub(crate) commands: Vec<Command>,
}

impl WriteTransaction {
    pub(crate) fn new(stores: Stores, config: EngineConfig, tx_start_last_committed: u64) -> Self {
        Self {
            node_changes: RecordChanges::new(StoreLoader::new(stores.nodes.clone()), BeforeStateTracking::Tracked),
            rel_changes: RecordChanges::new(StoreLoader::new(stores.relationships.clone()), BeforeStateTracking::Untracked),
            group_changes: RecordChanges::new(StoreLoader::new(stores.groups.clone()), BeforeStateTracking::Untracked),
            prop_changes: RecordChanges::new(StoreLoader::new(stores.properties.clone()), BeforeStateTracking::Tracked),
            label_token_changes: RecordChanges::new(StoreLoader::new(stores.label_tokens.clone()), BeforeStateTracking::Tracked),
            rel_type_token_changes: RecordChanges::new(
                StoreLoader::new(stores.rel_type_tokens.clone()),
                BeforeStateTracking::Tracked,
            ),
            prop_key_token_changes: RecordChanges::new(
                StoreLoader::new(stores.property_key_tokens.clone()),
                BeforeStateTracking::Tracked,
            ),
            schema_changes: RecordChanges::new(StoreLoader::new(stores.schema_rules.clone()), BeforeStateTracking::Tracked),
            neo_changes: RecordChanges::new(StoreLoader::new(stores.neo_store.clone()), BeforeStateTracking::Untracked),
            stores,
            config,
            created_dynamic_ids: Vec::new(),
            obsolete_dynamic_ids: Vec::new(),
            touched_properties: Vec::new(),
            tx_start_last_committed,
            prepared: false,
            commands: Vec::new(),
        }
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    // ---------------------------------------------------------------
    // Nodes
    // ---------------------------------------------------------------

    pub fn create_node(&mut self, labels: &[u32]) -> Result<u64> {
        let id = self.stores.nodes.next_id();
        let field = label_codec::encode_labels(self.stores.dynamic.as_ref(), labels.to_vec(), &mut self.created_dynamic_ids)?;
        let node = self.node_changes.create(id);
        node.in_use = true;
        node.label_field = field;
        Ok(id)
    }

    pub fn delete_node(&mut self, id: u64) -> Result<()> {
        let (in_use, next_rel, next_prop) = {
            let n = self.node_changes.get_or_load(id)?.read();
            (n.in_use, n.next_rel, n.next_prop)
        };
        if !in_use {
            return Err(Error::IllegalState(format!("node {id} is already deleted")));
        }
        if next_rel.is_some() || next_prop.is_some() {
            return Err(Error::IllegalState(format!(
                "node {id} still has relationships or properties attached"
            )));
        }
        self.node_changes.for_changing(id)?.in_use = false;
        self.node_changes.mark_deleted(id)?;
        Ok(())
    }

    pub fn add_label(&mut self, node_id: u64, label: u32) -> Result<()> {
        let (in_use, field) = {
            let n = self.node_changes.get_or_load(node_id)?.read();
            (n.in_use, n.label_field.clone())
        };
        if !in_use {
            return Err(Error::IllegalState(format!("node {node_id} is deleted")));
        }
        let mut labels = label_codec::decode_labels(self.stores.dynamic.as_ref(), &field)?;
        if labels.contains(&label) {
            return Ok(());
        }
        labels.push(label);
        label_codec::mark_label_chain_obsolete(self.stores.dynamic.as_ref(), &field, &mut self.obsolete_dynamic_ids)?;
        let new_field = label_codec::encode_labels(self.stores.dynamic.as_ref(), labels, &mut self.created_dynamic_ids)?;
        self.node_changes.for_changing(node_id)?.label_field = new_field;
        Ok(())
    }

    pub fn remove_label(&mut self, node_id: u64, label: u32) -> Result<()> {
        let (in_use, field) = {
            let n = self.node_changes.get_or_load(node_id)?.read();
            (n.in_use, n.label_field.clone())
        };
        if !in_use {
            return Err(Error::IllegalState(format!("node {node_id} is deleted")));
        }
        let mut labels = label_codec::decode_labels(self.stores.dynamic.as_ref(), &field)?;
        let before_len = labels.len();
        labels.retain(|&l| l != label);
        if labels.len() == before_len {
            return Ok(());
        }
        label_codec::mark_label_chain_obsolete(self.stores.dynamic.as_ref(), &field, &mut self.obsolete_dynamic_ids)?;
        let new_field = label_codec::encode_labels(self.stores.dynamic.as_ref(), labels, &mut self.created_dynamic_ids)?;
        self.node_changes.for_changing(node_id)?.label_field = new_field;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Relationships
    // ---------------------------------------------------------------

    pub fn create_relationship(&mut self, first_node: u64, second_node: u64, rel_type: u32) -> Result<u64> {
        let first_in_use = self.node_changes.get_or_load(first_node)?.read().in_use;
        if !first_in_use {
            return Err(Error::IllegalState(format!("node {first_node} is deleted")));
        }
        if second_node != first_node {
            let second_in_use = self.node_changes.get_or_load(second_node)?.read().in_use;
            if !second_in_use {
                return Err(Error::IllegalState(format!("node {second_node} is deleted")));
            }
        }

        let rel_id = self.stores.relationships.next_id();
        {
            let rel = self.rel_changes.create(rel_id);
            rel.in_use = true;
            rel.first_node = first_node;
            rel.second_node = second_node;
            rel.rel_type = rel_type;
        }

        let threshold = self.config.dense_node_threshold;
        let group_store = self.stores.groups.clone();
        let mut alloc_group_id = move || group_store.next_id();

        chain::relationship::attach_relationship(
            &mut self.node_changes,
            &mut self.rel_changes,
            &mut self.group_changes,
            threshold,
            first_node,
            rel_id,
            &mut alloc_group_id,
        )?;

        if second_node == first_node {
            // Loop edge: the splice above already placed the relationship in
            // the one shared chain. Mirror the count/pointer onto the second
            // side rather than splicing a second time into the same chain.
            let rel = self.rel_changes.for_changing(rel_id)?;
            rel.second_prev_rel = rel.first_prev_rel;
            rel.second_next_rel = rel.first_next_rel;
        } else {
            chain::relationship::attach_relationship(
                &mut self.node_changes,
                &mut self.rel_changes,
                &mut self.group_changes,
                threshold,
                second_node,
                rel_id,
                &mut alloc_group_id,
            )?;
        }

        Ok(rel_id)
    }

    pub fn delete_relationship(&mut self, rel_id: u64) -> Result<()> {
        let (first_node, second_node, in_use) = {
            let r = self.rel_changes.get_or_load(rel_id)?.read();
            (r.first_node, r.second_node, r.in_use)
        };
        if !in_use {
            return Err(Error::IllegalState(format!("relationship {rel_id} is already deleted")));
        }

        chain::relationship::detach_relationship(
            &mut self.node_changes,
            &mut self.rel_changes,
            &mut self.group_changes,
            first_node,
            rel_id,
        )?;
        if second_node != first_node {
            chain::relationship::detach_relationship(
                &mut self.node_changes,
                &mut self.rel_changes,
                &mut self.group_changes,
                second_node,
                rel_id,
            )?;
        }

        self.rel_changes.for_changing(rel_id)?.in_use = false;
        self.rel_changes.mark_deleted(rel_id)?;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Properties
    // ---------------------------------------------------------------

    pub fn add_property(&mut self, owner: PropertyOwner, key: u32, value: PropertyValue) -> Result<()> {
        match owner {
            PropertyOwner::Node(id) => {
                let (in_use, field) = {
                    let n = self.node_changes.get_or_load(id)?.read();
                    (n.in_use, n.label_field.clone())
                };
                if !in_use {
                    return Err(Error::IllegalState(format!("node {id} is deleted")));
                }
                let labels = label_codec::decode_labels(self.stores.dynamic.as_ref(), &field)?;
                for label in &labels {
                    self.touched_properties.push((*label, key, value.clone()));
                }
                let prop_store = self.stores.properties.clone();
                let mut alloc_property_id = move || prop_store.next_id();
                let node = self.node_changes.for_changing(id)?;
                chain::property::add_property(
                    node,
                    &mut self.prop_changes,
                    self.stores.dynamic.as_ref(),
                    owner,
                    key,
                    value,
                    self.config.property_record_payload_size,
                    &mut alloc_property_id,
                    &mut self.created_dynamic_ids,
                )?;
            }
            PropertyOwner::Relationship(id) => {
                let in_use = self.rel_changes.get_or_load(id)?.read().in_use;
                if !in_use {
                    return Err(Error::IllegalState(format!("relationship {id} is deleted")));
                }
                let prop_store = self.stores.properties.clone();
                let mut alloc_property_id = move || prop_store.next_id();
                let rel = self.rel_changes.for_changing(id)?;
                chain::property::add_property(
                    rel,
                    &mut self.prop_changes,
                    self.stores.dynamic.as_ref(),
                    owner,
                    key,
                    value,
                    self.config.property_record_payload_size,
                    &mut alloc_property_id,
                    &mut self.created_dynamic_ids,
                )?;
            }
            PropertyOwner::Graph => {
                let prop_store = self.stores.properties.clone();
                let mut alloc_property_id = move || prop_store.next_id();
                let neo = self.neo_changes.for_changing(NEO_STORE_ID)?;
                chain::property::add_property(
                    neo,
                    &mut self.prop_changes,
                    self.stores.dynamic.as_ref(),
                    owner,
                    key,
                    value,
                    self.config.property_record_payload_size,
                    &mut alloc_property_id,
                    &mut self.created_dynamic_ids,
                )?;
            }
        }
        Ok(())
    }

    pub fn change_property(&mut self, owner: PropertyOwner, key: u32, value: PropertyValue) -> Result<()> {
        match owner {
            PropertyOwner::Node(id) => {
                let (in_use, field) = {
                    let n = self.node_changes.get_or_load(id)?.read();
                    (n.in_use, n.label_field.clone())
                };
                if !in_use {
                    return Err(Error::IllegalState(format!("node {id} is deleted")));
                }
                let labels = label_codec::decode_labels(self.stores.dynamic.as_ref(), &field)?;
                for label in &labels {
                    self.touched_properties.push((*label, key, value.clone()));
                }
                let prop_store = self.stores.properties.clone();
                let mut alloc_property_id = move || prop_store.next_id();
                let node = self.node_changes.for_changing(id)?;
                chain::property::change_property(
                    node,
                    &mut self.prop_changes,
                    self.stores.dynamic.as_ref(),
                    owner,
                    key,
                    value,
                    self.config.property_record_payload_size,
                    &mut alloc_property_id,
                    &mut self.created_dynamic_ids,
                    &mut self.obsolete_dynamic_ids,
                )?;
            }
            PropertyOwner::Relationship(id) => {
                let in_use = self.rel_changes.get_or_load(id)?.read().in_use;
                if !in_use {
                    return Err(Error::IllegalState(format!("relationship {id} is deleted")));
                }
                let prop_store = self.stores.properties.clone();
                let mut alloc_property_id = move || prop_store.next_id();
                let rel = self.rel_changes.for_changing(id)?;
                chain::property::change_property(
                    rel,
                    &mut self.prop_changes,
                    self.stores.dynamic.as_ref(),
                    owner,
                    key,
                    value,
                    self.config.property_record_payload_size,
                    &mut alloc_property_id,
                    &mut self.created_dynamic_ids,
                    &mut self.obsolete_dynamic_ids,
                )?;
            }
            PropertyOwner::Graph => {
                let prop_store = self.stores.properties.clone();
                let mut alloc_property_id = move || prop_store.next_id();
                let neo = self.neo_changes.for_changing(NEO_STORE_ID)?;
                chain::property::change_property(
                    neo,
                    &mut self.prop_changes,
                    self.stores.dynamic.as_ref(),
                    owner,
                    key,
                    value,
                    self.config.property_record_payload_size,
                    &mut alloc_property_id,
                    &mut self.created_dynamic_ids,
                    &mut self.obsolete_dynamic_ids,
                )?;
            }
        }
        Ok(())
    }

    pub fn remove_property(&mut self, owner: PropertyOwner, key: u32) -> Result<Option<PropertyValue>> {
        match owner {
            PropertyOwner::Node(id) => {
                let in_use = self.node_changes.get_or_load(id)?.read().in_use;
                if !in_use {
                    return Err(Error::IllegalState(format!("node {id} is deleted")));
                }
                let node = self.node_changes.for_changing(id)?;
                chain::property::remove_property(
                    node,
                    &mut self.prop_changes,
                    self.stores.dynamic.as_ref(),
                    key,
                    &mut self.obsolete_dynamic_ids,
                )
            }
            PropertyOwner::Relationship(id) => {
                let in_use = self.rel_changes.get_or_load(id)?.read().in_use;
                if !in_use {
                    return Err(Error::IllegalState(format!("relationship {id} is deleted")));
                }
                let rel = self.rel_changes.for_changing(id)?;
                chain::property::remove_property(
                    rel,
                    &mut self.prop_changes,
                    self.stores.dynamic.as_ref(),
                    key,
                    &mut self.obsolete_dynamic_ids,
                )
            }
            PropertyOwner::Graph => {
                let neo = self.neo_changes.for_changing(NEO_STORE_ID)?;
                chain::property::remove_property(
                    neo,
                    &mut self.prop_changes,
                    self.stores.dynamic.as_ref(),
                    key,
                    &mut self.obsolete_dynamic_ids,
                )
            }
        }
    }

    // ---------------------------------------------------------------
    // Schema rules
    // ---------------------------------------------------------------

    pub fn create_schema_rule(&mut self, rule: SchemaRule) -> Result<u64> {
        let id = self.stores.schema_rules.next_id();
        let bytes =
            serde_json::to_vec(&rule).map_err(|e| Error::InvalidRecord(format!("encoding schema rule: {e}")))?;
        let chain = self.stores.dynamic.allocate_from(&bytes)?;
        let dynamic_ids: Vec<u64> = chain.iter().map(|r| r.id).collect();
        self.created_dynamic_ids.extend(dynamic_ids.iter().copied());
        let record = self.schema_changes.create(id);
        record.in_use = true;
        record.rule = rule;
        record.dynamic_records = dynamic_ids;
        Ok(id)
    }

    pub fn drop_schema_rule(&mut self, id: u64) -> Result<()> {
        let (in_use, dynamic_records) = {
            let r = self.schema_changes.get_or_load(id)?.read();
            (r.in_use, r.dynamic_records.clone())
        };
        if !in_use {
            return Err(Error::IllegalState(format!("schema rule {id} is already dropped")));
        }
        self.obsolete_dynamic_ids.extend(dynamic_records);
        self.schema_changes.for_changing(id)?.in_use = false;
        self.schema_changes.mark_deleted(id)?;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Tokens
    // ---------------------------------------------------------------

    pub fn create_token(&mut self, kind: TokenKind, name: &str) -> Result<u32> {
        match kind {
            TokenKind::RelationshipType => {
                let id = self.stores.rel_type_tokens.next_id() as u32;
                let (inline_name, dynamic_ids) =
                    encode_token_name(self.stores.dynamic.as_ref(), name, &mut self.created_dynamic_ids)?;
                let record = self.rel_type_token_changes.create(id as u64);
                record.in_use = true;
                record.name = inline_name;
                record.name_dynamic_records = dynamic_ids;
                Ok(id)
            }
            TokenKind::Label => {
                let id = self.stores.label_tokens.next_id() as u32;
                let (inline_name, dynamic_ids) =
                    encode_token_name(self.stores.dynamic.as_ref(), name, &mut self.created_dynamic_ids)?;
                let record = self.label_token_changes.create(id as u64);
                record.in_use = true;
                record.name = inline_name;
                record.name_dynamic_records = dynamic_ids;
                Ok(id)
            }
            TokenKind::PropertyKey => {
                let id = self.stores.property_key_tokens.next_id() as u32;
                let (inline_name, dynamic_ids) =
                    encode_token_name(self.stores.dynamic.as_ref(), name, &mut self.created_dynamic_ids)?;
                let record = self.prop_key_token_changes.create(id as u64);
                record.in_use = true;
                record.name = inline_name;
                record.name_dynamic_records = dynamic_ids;
                Ok(id)
            }
        }
    }

    // ---------------------------------------------------------------
    // Prepare / rollback
    // ---------------------------------------------------------------

    /// Materialize the change buffer into an ordered command list and run
    /// integrity validation (spec.md §4.5). `GraphStore::commit` requires a
    /// prepared transaction; this is idempotent-unsafe by design — preparing
    /// twice is a protocol violation (spec.md §8 S6).
    pub fn prepare(&mut self) -> Result<()> {
        prepare::prepare(self)
    }

    pub(crate) fn do_rollback(&self, cache: &dyn crate::cache::CacheInvalidation) {
        rollback::rollback(self, cache, &self.config);
    }

    /// The command list prepare built (spec.md §6: `addCommand` handed
    /// these to the log framework one by one as prepare walked the change
    /// buffer). Exposed so a caller fronting a real logical log can persist
    /// them independently of whatever happens to this transaction
    /// afterwards, and so recovery tests can feed a prepared-but-not-yet-
    /// committed command list straight into `GraphStore::recover`.
    pub fn prepared_commands(&self) -> &[Command] {
        &self.commands
    }
}

fn encode_token_name(
    allocator: &dyn DynamicRecordAllocator,
    name: &str,
    created_dynamic_ids: &mut Vec<u64>,
) -> Result<(String, Vec<u64>)> {
    if name.len() <= INLINE_TOKEN_NAME_MAX {
        return Ok((name.to_string(), Vec::new()));
    }
    let chain = allocator.allocate_from(name.as_bytes())?;
    let ids: Vec<u64> = chain.iter().map(|r| r.id).collect();
    created_dynamic_ids.extend(ids.iter().copied());
    Ok((String::new(), ids))
}
