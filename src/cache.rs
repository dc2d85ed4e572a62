//! Cache back-door contract (spec.md §6). The object cache itself is an
//! external collaborator (spec.md §1 non-goals); this crate only calls
//! these invalidation hooks, always after the corresponding store mutation
//! has already happened (spec.md §4.6 step 3 and on).

use crate::record::SchemaRuleRecord;

/// Label update as delivered to the cache / label-scan writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeLabelUpdate {
    pub node_id: u64,
    pub labels_before: Vec<u32>,
    pub labels_after: Vec<u32>,
}

pub trait CacheInvalidation: Send + Sync {
    fn remove_node_from_cache(&self, id: u64);
    fn remove_relationship_from_cache(&self, id: u64);

    /// Patch the two endpoints of a just-deleted relationship so any
    /// cached adjacency list stops referencing it, without forcing a full
    /// reload of either node (spec.md §8 S3).
    fn patch_deleted_relationship_nodes(
        &self,
        rel_id: u64,
        first_node: u64,
        first_next_rel: Option<u64>,
        second_node: u64,
        second_next_rel: Option<u64>,
    );

    fn remove_relationship_type_from_cache(&self, id: u32);
    fn add_relationship_type_token(&self, id: u32, name: &str);
    fn add_label_token(&self, id: u32, name: &str);
    fn add_property_key_token(&self, id: u32, name: &str);

    fn apply_label_updates(&self, updates: &[NodeLabelUpdate]);

    fn remove_schema_rule_from_cache(&self, id: u64);
    fn add_schema_rule(&self, rule: &SchemaRuleRecord);

    fn remove_graph_properties_from_cache(&self);
}

/// A no-op cache — the right choice for an engine with no object cache in
/// front of it at all.
pub struct NullCache;

impl CacheInvalidation for NullCache {
    fn remove_node_from_cache(&self, _id: u64) {}
    fn remove_relationship_from_cache(&self, _id: u64) {}
    fn patch_deleted_relationship_nodes(
        &self,
        _rel_id: u64,
        _first_node: u64,
        _first_next_rel: Option<u64>,
        _second_node: u64,
        _second_next_rel: Option<u64>,
    ) {
    }
    fn remove_relationship_type_from_cache(&self, _id: u32) {}
    fn add_relationship_type_token(&self, _id: u32, _name: &str) {}
    fn add_label_token(&self, _id: u32, _name: &str) {}
    fn add_property_key_token(&self, _id: u32, _name: &str) {}
    fn apply_label_updates(&self, _updates: &[NodeLabelUpdate]) {}
    fn remove_schema_rule_from_cache(&self, _id: u64) {}
    fn add_schema_rule(&self, _rule: &SchemaRuleRecord) {}
    fn remove_graph_properties_from_cache(&self) {}
}

/// Test double that records every call it receives, so integration tests
/// can assert commit/rollback invalidated exactly the keys it should have.
#[derive(Default)]
pub struct RecordingCache {
    pub calls: parking_lot::Mutex<Vec<String>>,
}

impl RecordingCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }
}

impl CacheInvalidation for RecordingCache {
    fn remove_node_from_cache(&self, id: u64) {
        self.record(format!("remove_node({id})"));
    }
    fn remove_relationship_from_cache(&self, id: u64) {
        self.record(format!("remove_relationship({id})"));
    }
    fn patch_deleted_relationship_nodes(
        &self,
        rel_id: u64,
        first_node: u64,
        first_next_rel: Option<u64>,
        second_node: u64,
        second_next_rel: Option<u64>,
    ) {
        self.record(format!(
            "patch_deleted_relationship_nodes({rel_id},{first_node},{first_next_rel:?},{second_node},{second_next_rel:?})"
        ));
    }
    fn remove_relationship_type_from_cache(&self, id: u32) {
        self.record(format!("remove_relationship_type({id})"));
    }
    fn add_relationship_type_token(&self, id: u32, name: &str) {
        self.record(format!("add_relationship_type_token({id},{name})"));
    }
    fn add_label_token(&self, id: u32, name: &str) {
        self.record(format!("add_label_token({id},{name})"));
    }
    fn add_property_key_token(&self, id: u32, name: &str) {
        self.record(format!("add_property_key_token({id},{name})"));
    }
    fn apply_label_updates(&self, updates: &[NodeLabelUpdate]) {
        self.record(format!("apply_label_updates({})", updates.len()));
    }
    fn remove_schema_rule_from_cache(&self, id: u64) {
        self.record(format!("remove_schema_rule({id})"));
    }
    fn add_schema_rule(&self, rule: &SchemaRuleRecord) {
        self.record(format!("add_schema_rule({})", rule.id));
    }
    fn remove_graph_properties_from_cache(&self) {
        self.record("remove_graph_properties".to_string());
    }
}
