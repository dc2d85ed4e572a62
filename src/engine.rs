//! `GraphStore`: the façade that owns every per-kind record store plus the
//! collaborator services (locks, cache, indexing, label scan), and drives
//! commit's fixed phase order (spec.md §4.6).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::buffer::ChangeMode;
use crate::cache::{CacheInvalidation, NullCache};
use crate::command::{Command, CommandLog, NodeCommand, TokenCommand};
use crate::config::EngineConfig;
use crate::index_service::{IndexUpdateBatch, IndexingService, InMemoryIndexingService, InMemoryLabelScanIndex, LabelScanIndex};
use crate::label_update;
use crate::lock::{InMemoryLockService, LockMode, LockService, ScopedLockGroup};
use crate::record::{
    DynamicRecord, LabelTokenKind, NeoStoreRecord, NodeRecord, PropertyKeyTokenKind, PropertyOwner, PropertyRecord,
    RelTypeTokenKind, RelationshipGroupRecord, RelationshipRecord, SchemaRuleRecord, TokenRecord,
};
use crate::store::{DynamicRecordAllocator, InMemoryRecordStore, RecordStore};
use crate::tx::label_codec;
use crate::tx::WriteTransaction;
use crate::{Error, Result};

/// Every per-kind record store, bundled so `GraphStore` and every
/// `WriteTransaction` it hands out can share the same backing storage
/// through cheap `Arc` clones.
#[derive(Clone)]
pub struct Stores {
    pub nodes: Arc<InMemoryRecordStore<NodeRecord>>,
    pub relationships: Arc<InMemoryRecordStore<RelationshipRecord>>,
    pub groups: Arc<InMemoryRecordStore<RelationshipGroupRecord>>,
    pub properties: Arc<InMemoryRecordStore<PropertyRecord>>,
    pub dynamic: Arc<InMemoryRecordStore<DynamicRecord>>,
    pub label_tokens: Arc<InMemoryRecordStore<TokenRecord<LabelTokenKind>>>,
    pub rel_type_tokens: Arc<InMemoryRecordStore<TokenRecord<RelTypeTokenKind>>>,
    pub property_key_tokens: Arc<InMemoryRecordStore<TokenRecord<PropertyKeyTokenKind>>>,
    pub schema_rules: Arc<InMemoryRecordStore<SchemaRuleRecord>>,
    pub neo_store: Arc<InMemoryRecordStore<NeoStoreRecord>>,
}

impl Stores {
    fn new() -> Self {
        Self {
            nodes: Arc::new(InMemoryRecordStore::new()),
            relationships: Arc::new(InMemoryRecordStore::new()),
            groups: Arc::new(InMemoryRecordStore::new()),
            properties: Arc::new(InMemoryRecordStore::new()),
            dynamic: Arc::new(InMemoryRecordStore::new()),
            label_tokens: Arc::new(InMemoryRecordStore::new()),
            rel_type_tokens: Arc::new(InMemoryRecordStore::new()),
            property_key_tokens: Arc::new(InMemoryRecordStore::new()),
            schema_rules: Arc::new(InMemoryRecordStore::new()),
            neo_store: Arc::new(InMemoryRecordStore::new()),
        }
    }
}

/// The write-transaction core's façade: one graph's worth of record stores
/// plus the collaborators commit drives (spec.md §6).
pub struct GraphStore {
    stores: Stores,
    lock_service: Arc<dyn LockService>,
    cache: Arc<dyn CacheInvalidation>,
    indexing: Arc<dyn IndexingService>,
    label_scan: Arc<dyn LabelScanIndex>,
    config: EngineConfig,
    last_committed_tx: AtomicU64,
}

impl GraphStore {
    /// A store with no cache, a reference lock service, and reference
    /// indexing/label-scan collaborators — everything this crate needs to
    /// run standalone.
    pub fn new_in_memory(config: EngineConfig) -> Self {
        Self::new_with_collaborators(
            config,
            Arc::new(InMemoryLockService::new()),
            Arc::new(NullCache),
            Arc::new(InMemoryIndexingService::new()),
            Arc::new(InMemoryLabelScanIndex::new()),
        )
    }

    /// Escape hatch for tests that need to observe collaborator calls (e.g.
    /// `RecordingCache`) without a real cache/indexing layer in front.
    pub fn new_with_collaborators(
        config: EngineConfig,
        lock_service: Arc<dyn LockService>,
        cache: Arc<dyn CacheInvalidation>,
        indexing: Arc<dyn IndexingService>,
        label_scan: Arc<dyn LabelScanIndex>,
    ) -> Self {
        Self {
            stores: Stores::new(),
            lock_service,
            cache,
            indexing,
            label_scan,
            config,
            last_committed_tx: AtomicU64::new(0),
        }
    }

    pub fn last_committed_tx(&self) -> u64 {
        self.last_committed_tx.load(Ordering::SeqCst)
    }

    /// Start a new transaction with its own private change buffer, layered
    /// over this store's current state.
    pub fn begin(&self) -> WriteTransaction {
        let tx_start = self.last_committed_tx.load(Ordering::SeqCst);
        WriteTransaction::new(self.stores.clone(), self.config.clone(), tx_start)
    }

    // -------------------------------------------------------------------
    // Committed-state readers. No query layer lives here (spec.md §1
    // non-goal) — these are plain by-id lookups against the underlying
    // stores, the same shape the teacher's `Graph` exposes over its
    // `StorageBackend`.
    // -------------------------------------------------------------------

    pub fn node(&self, id: u64) -> Result<NodeRecord> {
        self.stores.nodes.get_record(id)
    }

    pub fn relationship(&self, id: u64) -> Result<RelationshipRecord> {
        self.stores.relationships.get_record(id)
    }

    pub fn relationship_group(&self, id: u64) -> Result<RelationshipGroupRecord> {
        self.stores.groups.get_record(id)
    }

    pub fn property_record(&self, id: u64) -> Result<PropertyRecord> {
        self.stores.properties.get_record(id)
    }

    pub fn schema_rule(&self, id: u64) -> Result<SchemaRuleRecord> {
        self.stores.schema_rules.get_record(id)
    }

    pub fn label_scan_index(&self) -> &dyn LabelScanIndex {
        self.label_scan.as_ref()
    }

    /// Commit a prepared transaction, auto-assigning the next tx id.
    pub fn commit(&self, tx: WriteTransaction) -> Result<u64> {
        let commit_tx_id = self.last_committed_tx.load(Ordering::SeqCst) + 1;
        self.commit_with_tx_id(tx, commit_tx_id)
    }

    /// Commit a prepared transaction under a caller-supplied tx id, failing
    /// if it does not immediately follow the last committed one (spec.md §8
    /// S6). Exists mainly so recovery and XA-protocol tests can exercise the
    /// id-sequencing check directly.
    pub fn commit_with_tx_id(&self, tx: WriteTransaction, commit_tx_id: u64) -> Result<u64> {
        if !tx.prepared {
            return Err(Error::Xa("commit called on an unprepared transaction".into()));
        }
        let expected = self.last_committed_tx.load(Ordering::SeqCst) + 1;
        if commit_tx_id != expected {
            tracing::warn!(commit_tx_id, expected, "commit tx id does not follow last committed tx");
            return Err(Error::Xa(format!(
                "commit tx id {commit_tx_id} does not follow the last committed tx (expected {expected})"
            )));
        }

        let obsolete_dynamic_ids = tx.obsolete_dynamic_ids.clone();
        let command_count = tx.commands.len();
        let log = CommandLog::from_commands(tx.commands);
        self.execute(&log, commit_tx_id, false)?;

        self.last_committed_tx.store(commit_tx_id, Ordering::SeqCst);
        for id in obsolete_dynamic_ids {
            self.stores.dynamic.free_dynamic_id(id);
        }
        tracing::debug!(commit_tx_id, command_count, "committed transaction");
        Ok(commit_tx_id)
    }

    /// Discard a transaction's buffered changes (spec.md §4.9). Always
    /// invalidates cache entries for every key the transaction touched, so
    /// no caller can observe state from the aborted attempt.
    pub fn rollback(&self, tx: WriteTransaction) {
        tracing::debug!(prepared = tx.prepared, "rolling back transaction");
        tx.do_rollback(self.cache.as_ref());
    }

    /// Replay an already-prepared command list against this store (spec.md
    /// §4.6 "recovery replay"): no locking needed (recovery runs before the
    /// store is opened to writers), and no fresh ids are allocated — every
    /// record in the log already carries the id it originally committed
    /// with, so id generators are advanced past the log's high ids instead.
    pub fn recover(&self, commands: Vec<Command>, commit_tx_id: u64) -> Result<()> {
        tracing::info!(commit_tx_id, command_count = commands.len(), "replaying commands during recovery");
        let log = CommandLog::from_commands(commands);
        self.execute(&log, commit_tx_id, true)?;
        if commit_tx_id > self.last_committed_tx.load(Ordering::SeqCst) {
            self.last_committed_tx.store(commit_tx_id, Ordering::SeqCst);
        }
        Ok(())
    }

    /// The phase-ordered command execution both `commit` and `recover` run
    /// (spec.md §4.6 steps 1-8).
    fn execute(&self, log: &CommandLog, commit_tx_id: u64, in_recovery: bool) -> Result<()> {
        let mut lock_group = ScopedLockGroup::new(self.lock_service.as_ref());

        // Step 1: token commands, reltype/label/property-key, id order.
        // Tokens are create-only in this crate, so every command here adds
        // one to the cache rather than ever removing one.
        let mut reltype_cmds: Vec<&TokenCommand<RelTypeTokenKind>> = log.relationship_type_tokens.iter().collect();
        reltype_cmds.sort_by_key(|c| c.after.id);
        for cmd in reltype_cmds {
            self.stores.rel_type_tokens.update_record(&cmd.after)?;
            if in_recovery {
                self.stores.rel_type_tokens.advance_next_id_past(cmd.after.id as u64);
            }
            let name = resolve_token_name(self.stores.dynamic.as_ref(), &cmd.after);
            self.cache.add_relationship_type_token(cmd.after.id, &name);
        }

        let mut label_cmds: Vec<&TokenCommand<LabelTokenKind>> = log.label_tokens.iter().collect();
        label_cmds.sort_by_key(|c| c.after.id);
        for cmd in label_cmds {
            self.stores.label_tokens.update_record(&cmd.after)?;
            if in_recovery {
                self.stores.label_tokens.advance_next_id_past(cmd.after.id as u64);
            }
            let name = resolve_token_name(self.stores.dynamic.as_ref(), &cmd.after);
            self.cache.add_label_token(cmd.after.id, &name);
        }

        let mut propkey_cmds: Vec<&TokenCommand<PropertyKeyTokenKind>> = log.property_key_tokens.iter().collect();
        propkey_cmds.sort_by_key(|c| c.after.id);
        for cmd in propkey_cmds {
            self.stores.property_key_tokens.update_record(&cmd.after)?;
            if in_recovery {
                self.stores.property_key_tokens.advance_next_id_past(cmd.after.id as u64);
            }
            let name = resolve_token_name(self.stores.dynamic.as_ref(), &cmd.after);
            self.cache.add_property_key_token(cmd.after.id, &name);
        }

        // Step 2: three sub-phases, {properties, relationships, nodes,
        // relationship-groups} in that fixed order within each. Cache
        // invalidation only happens on Delete here — Create/Update leave
        // nothing stale behind for a cache that only ever reads through.
        for phase in [ChangeMode::Create, ChangeMode::Update, ChangeMode::Delete] {
            for cmd in log.properties.iter().filter(|c| c.mode == phase) {
                if let PropertyOwner::Node(node_id) = cmd.after.owner {
                    lock_group.lock_node(node_id, LockMode::Write);
                }
                self.stores.properties.update_record(&cmd.after)?;
                if in_recovery {
                    self.stores.properties.advance_next_id_past(cmd.after.id);
                }
            }

            for cmd in log.relationships.iter().filter(|c| c.mode == phase) {
                self.stores.relationships.update_record(&cmd.after)?;
                if in_recovery {
                    self.stores.relationships.advance_next_id_past(cmd.after.id);
                }
                if phase == ChangeMode::Delete {
                    self.cache.remove_relationship_from_cache(cmd.after.id);
                    self.cache.patch_deleted_relationship_nodes(
                        cmd.after.id,
                        cmd.after.first_node,
                        cmd.after.first_next_rel.get(),
                        cmd.after.second_node,
                        cmd.after.second_next_rel.get(),
                    );
                }
            }

            let mut node_cmds: Vec<&NodeCommand> = log.nodes.iter().filter(|c| c.mode == phase).collect();
            node_cmds.sort_by_key(|c| c.after.id);
            for cmd in node_cmds {
                lock_group.lock_node(cmd.after.id, LockMode::Write);
                self.stores.nodes.update_record(&cmd.after)?;
                if in_recovery {
                    self.stores.nodes.advance_next_id_past(cmd.after.id);
                }
                if phase == ChangeMode::Delete {
                    self.cache.remove_node_from_cache(cmd.after.id);
                }
            }

            for cmd in log.relationship_groups.iter().filter(|c| c.mode == phase) {
                self.stores.groups.update_record(&cmd.after)?;
                if in_recovery {
                    self.stores.groups.advance_next_id_past(cmd.after.id);
                }
            }
        }

        // Step 3: label-scan updates, extracted from every node command in
        // this commit, sorted for append-friendly writer I/O.
        let mut label_updates = Vec::new();
        for cmd in &log.nodes {
            let mut resolver = |head: u64| label_codec::try_decode_label_chain(self.stores.dynamic.as_ref(), head);
            if let Some(update) = label_update::extract_label_updates(cmd.after.id, cmd.before.as_ref(), &cmd.after, &mut resolver) {
                label_updates.push(update);
            }
        }
        label_update::sort_by_node_id(&mut label_updates);
        {
            let mut writer = self.label_scan.new_writer();
            for update in &label_updates {
                writer.write(update)?;
            }
        }
        self.cache.apply_label_updates(&label_updates);

        // Step 4: property-index update, submitted *before* schema rules
        // (spec.md §4.8) so a brand-new index's population job sees this
        // commit's properties only through its own initial scan.
        if !log.nodes.is_empty() || !log.properties.is_empty() {
            let property_records: Vec<PropertyRecord> = log.properties.iter().map(|c| c.after.clone()).collect();
            let touched_node_ids: Vec<u64> = log.nodes.iter().map(|c| c.after.id).collect();
            self.indexing.update_indexes(IndexUpdateBatch {
                property_commands: &property_records,
                touched_node_ids: &touched_node_ids,
            })?;
        }

        // Step 5: schema-rule commands.
        for cmd in &log.schema_rules {
            self.stores.schema_rules.update_record(&cmd.after)?;
            if in_recovery {
                self.stores.schema_rules.advance_next_id_past(cmd.after.id);
            }
            match cmd.mode {
                ChangeMode::Delete => self.cache.remove_schema_rule_from_cache(cmd.after.id),
                ChangeMode::Create | ChangeMode::Update => self.cache.add_schema_rule(&cmd.after),
            }
        }

        // Step 6: the graph-singleton property chain head, if touched.
        if let Some(cmd) = &log.neo_store {
            self.stores.neo_store.update_record(&cmd.after)?;
            if in_recovery {
                self.cache.remove_graph_properties_from_cache();
            }
        }

        // Step 7: no in-process object cache sits in front of this engine
        // (spec.md §1 non-goal), so there is nothing further to propagate
        // once the invalidation hooks above have run.

        // Step 8 (tx-id advancement) happens in the caller, once `execute`
        // has returned successfully for every category above.
        let _ = commit_tx_id;
        Ok(())
    }
}

fn resolve_token_name<K>(dynamic: &InMemoryRecordStore<DynamicRecord>, record: &TokenRecord<K>) -> String {
    if record.name_dynamic_records.is_empty() {
        return record.name.clone();
    }
    let mut bytes = Vec::new();
    let mut cursor = record.name_dynamic_records.first().copied();
    while let Some(id) = cursor {
        let Ok(chunk) = RecordStore::get_record(dynamic, id) else {
            break;
        };
        bytes.extend_from_slice(&chunk.data);
        cursor = chunk.next.get();
    }
    String::from_utf8(bytes).unwrap_or_default()
}
