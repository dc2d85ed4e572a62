//! In-memory reference implementation of `RecordStore`/`DynamicRecordAllocator`.
//!
//! Mirrors the teacher crate's `MemoryBackend`: simple, lock-protected,
//! good enough to validate every invariant in this crate's test suite
//! without a real durable store behind it.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::record::common::{AbstractRecord, NewUnused};
use crate::record::DynamicRecord;
use crate::Result;

use super::{DynamicRecordAllocator, RecordStore};

/// A growable slot array keyed by id, plus a monotonic id generator and a
/// free list for reclaimed ids (spec.md §4.9 rollback / §8 S5 reuse).
pub struct InMemoryRecordStore<R> {
    records: RwLock<Vec<Option<R>>>,
    next_id: AtomicU64,
    free_ids: RwLock<Vec<u64>>,
}

impl<R: Clone + NewUnused + AbstractRecord> InMemoryRecordStore<R> {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
            free_ids: RwLock::new(Vec::new()),
        }
    }

    fn ensure_capacity(&self, id: u64) {
        let mut records = self.records.write();
        if records.len() as u64 <= id {
            records.resize_with(id as usize + 1, || None);
        }
    }

    /// Raise the id generator so the next `next_id()` call never hands back
    /// an id `<= max_seen` again. Recovery replay writes records that
    /// already carry their original ids without ever calling `next_id()`
    /// itself, so the generator has to be caught up after the fact
    /// (spec.md §4.9 "restart id generators from the store's high-water
    /// mark").
    pub fn advance_next_id_past(&self, max_seen: u64) {
        self.next_id.fetch_max(max_seen + 1, Ordering::Relaxed);
    }
}

impl<R: Clone + NewUnused + AbstractRecord> Default for InMemoryRecordStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Clone + NewUnused + AbstractRecord> RecordStore<R> for InMemoryRecordStore<R> {
    fn get_record(&self, id: u64) -> Result<R> {
        let records = self.records.read();
        match records.get(id as usize) {
            Some(Some(r)) => Ok(r.clone()),
            _ => Ok(R::new_unused(id)),
        }
    }

    fn update_record(&self, record: &R) -> Result<()> {
        self.ensure_capacity(record.id());
        self.records.write()[record.id() as usize] = Some(record.clone());
        Ok(())
    }

    fn next_id(&self) -> u64 {
        if let Some(id) = self.free_ids.write().pop() {
            return id;
        }
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn free_id(&self, id: u64) {
        self.free_ids.write().push(id);
    }
}

impl DynamicRecordAllocator for InMemoryRecordStore<DynamicRecord> {
    fn allocate_from(&self, bytes: &[u8]) -> Result<Vec<DynamicRecord>> {
        let chain = crate::record::dynamic::chain_from_bytes(bytes, || self.next_dynamic_id());
        for r in &chain {
            self.update_dynamic_record(r)?;
        }
        Ok(chain)
    }

    fn get_dynamic_record(&self, id: u64) -> Result<DynamicRecord> {
        RecordStore::get_record(self, id)
    }

    fn update_dynamic_record(&self, record: &DynamicRecord) -> Result<()> {
        RecordStore::update_record(self, record)
    }

    fn next_dynamic_id(&self) -> u64 {
        RecordStore::next_id(self)
    }

    fn free_dynamic_id(&self, id: u64) {
        RecordStore::free_id(self, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::NodeRecord;

    #[test]
    fn fresh_id_reads_back_unused() {
        let store: InMemoryRecordStore<NodeRecord> = InMemoryRecordStore::new();
        let id = store.next_id();
        let r = store.get_record(id).unwrap();
        assert!(!r.in_use);
        assert_eq!(r.id, id);
    }

    #[test]
    fn update_then_get_round_trips() {
        let store: InMemoryRecordStore<NodeRecord> = InMemoryRecordStore::new();
        let id = store.next_id();
        let mut r = NodeRecord::new(id);
        r.in_use = true;
        r.next_rel = crate::record::RecordRef::of(42);
        store.update_record(&r).unwrap();

        let back = store.get_record(id).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn freed_id_is_reused() {
        let store: InMemoryRecordStore<NodeRecord> = InMemoryRecordStore::new();
        let id = store.next_id();
        store.free_id(id);
        assert_eq!(store.next_id(), id);
    }
}
