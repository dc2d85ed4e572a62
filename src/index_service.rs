//! The property-index and label-scan contracts (spec.md §6). Both are
//! external services in the real system; this crate only needs the thin
//! slices it calls at commit time, plus a reference in-memory impl of
//! each so the engine is runnable standalone.

use crate::cache::NodeLabelUpdate;
use crate::record::PropertyRecord;
use crate::Result;

/// A lazy view over the property and node commands of one commit, handed
/// to the indexing service so it can resolve only what it actually needs
/// (spec.md §6: "a lazy view over `{propertyCommands, nodeCommandsById}`").
pub struct IndexUpdateBatch<'a> {
    pub property_commands: &'a [PropertyRecord],
    pub touched_node_ids: &'a [u64],
}

pub trait IndexingService: Send + Sync {
    /// Accept a batch of property-index-relevant changes from one commit.
    /// Applied *before* schema-rule commands are executed (spec.md §4.8):
    /// a newly created index's population job must see this transaction's
    /// properties only through its own initial scan, not twice via this
    /// channel too — which is only guaranteed if this call happens first.
    fn update_indexes(&self, batch: IndexUpdateBatch<'_>) -> Result<()>;
}

/// Reference indexing service: records which node ids it was asked to
/// index, for use in tests.
#[derive(Default)]
pub struct InMemoryIndexingService {
    pub indexed_node_ids: parking_lot::Mutex<Vec<u64>>,
}

impl InMemoryIndexingService {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IndexingService for InMemoryIndexingService {
    fn update_indexes(&self, batch: IndexUpdateBatch<'_>) -> Result<()> {
        self.indexed_node_ids
            .lock()
            .extend_from_slice(batch.touched_node_ids);
        Ok(())
    }
}

/// A scoped label-scan write: commits the batch when dropped after a
/// successful `write` sequence, mirroring spec.md §6's "scoped write that
/// commits on close."
pub trait LabelScanWriter {
    fn write(&mut self, update: &NodeLabelUpdate) -> Result<()>;
}

pub trait LabelScanIndex: Send + Sync {
    fn new_writer(&self) -> Box<dyn LabelScanWriter + '_>;
}

/// Reference label-scan index: a label id -> sorted node id set, kept
/// consistent with `apply_label_updates`.
#[derive(Default)]
pub struct InMemoryLabelScanIndex {
    by_label: parking_lot::Mutex<hashbrown::HashMap<u32, Vec<u64>>>,
}

impl InMemoryLabelScanIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes_with_label(&self, label: u32) -> Vec<u64> {
        self.by_label.lock().get(&label).cloned().unwrap_or_default()
    }
}

struct InMemoryWriter<'a> {
    index: &'a InMemoryLabelScanIndex,
    pending: Vec<NodeLabelUpdate>,
}

impl LabelScanWriter for InMemoryWriter<'_> {
    fn write(&mut self, update: &NodeLabelUpdate) -> Result<()> {
        self.pending.push(update.clone());
        Ok(())
    }
}

impl Drop for InMemoryWriter<'_> {
    fn drop(&mut self) {
        let mut by_label = self.index.by_label.lock();
        for update in self.pending.drain(..) {
            for label in &update.labels_before {
                if !update.labels_after.contains(label) {
                    if let Some(ids) = by_label.get_mut(label) {
                        ids.retain(|&id| id != update.node_id);
                    }
                }
            }
            for label in &update.labels_after {
                if !update.labels_before.contains(label) {
                    by_label.entry(*label).or_default().push(update.node_id);
                }
            }
        }
    }
}

impl LabelScanIndex for InMemoryLabelScanIndex {
    fn new_writer(&self) -> Box<dyn LabelScanWriter + '_> {
        Box::new(InMemoryWriter {
            index: self,
            pending: Vec::new(),
        })
    }
}
