//! `rollback()` (spec.md §4.9): discard the buffer and return every created
//! record's id to its store, including dynamic records allocated as a side
//! effect of the same transaction (property overflow, label overflow,
//! token names, schema rule bytes all share one bucket — see `tx::mod`).

use crate::cache::CacheInvalidation;
use crate::config::EngineConfig;
use crate::store::{DynamicRecordAllocator, RecordStore};

use super::WriteTransaction;

/// Always invalidate cache entries for touched keys, regardless of whether
/// the change was a create/update/delete (spec.md §4.9) — unlike commit,
/// which only invalidates on delete. The caller must never observe a value
/// this aborted transaction staged.
pub(super) fn rollback(tx: &WriteTransaction, cache: &dyn CacheInvalidation, config: &EngineConfig) {
    for (id, change) in tx.node_changes.changes() {
        if change.is_created() && config.free_ids_during_rollback {
            tx.stores.nodes.free_id(id);
        }
        cache.remove_node_from_cache(id);
    }
    for (id, change) in tx.rel_changes.changes() {
        if change.is_created() && config.free_ids_during_rollback {
            tx.stores.relationships.free_id(id);
        }
        cache.remove_relationship_from_cache(id);
    }
    for (id, change) in tx.group_changes.changes() {
        if change.is_created() && config.free_ids_during_rollback {
            tx.stores.groups.free_id(id);
        }
    }
    for (id, change) in tx.prop_changes.changes() {
        if change.is_created() && config.free_ids_during_rollback {
            tx.stores.properties.free_id(id);
        }
    }
    for (id, change) in tx.label_token_changes.changes() {
        if change.is_created() && config.free_ids_during_rollback {
            tx.stores.label_tokens.free_id(id);
        }
    }
    for (id, change) in tx.rel_type_token_changes.changes() {
        if change.is_created() && config.free_ids_during_rollback {
            tx.stores.rel_type_tokens.free_id(id);
        }
    }
    for (id, change) in tx.prop_key_token_changes.changes() {
        if change.is_created() && config.free_ids_during_rollback {
            tx.stores.property_key_tokens.free_id(id);
        }
    }
    for (id, change) in tx.schema_changes.changes() {
        if change.is_created() && config.free_ids_during_rollback {
            tx.stores.schema_rules.free_id(id);
        }
        cache.remove_schema_rule_from_cache(id);
    }

    if config.free_ids_during_rollback {
        for &id in &tx.created_dynamic_ids {
            tx.stores.dynamic.free_dynamic_id(id);
        }
    }
}
