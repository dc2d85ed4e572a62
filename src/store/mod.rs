//! The store contract (spec.md §6): `get_record`/`update_record`/`next_id`/
//! `free_id`/`ensure_heavy`/`allocate_from`. Blocking, not async — this
//! component is single-threaded-by-contract (spec.md §5), and the teacher
//! crate's `async_trait` convention exists to front network/async backends
//! that have no analogue here.
//!
//! `memory` supplies the reference in-memory implementation every test in
//! this crate runs against, the same role the teacher's `MemoryBackend`
//! plays for `StorageBackend`.

pub mod memory;

use std::marker::PhantomData;
use std::sync::Arc;

use crate::buffer::Loader;
use crate::record::DynamicRecord;
use crate::Result;

pub use memory::InMemoryRecordStore;

/// Per-record-kind storage contract. `R` is the record type; stores never
/// interpret the record's fields, they only persist and hand it back.
pub trait RecordStore<R> {
    /// Fetch a record by id. Stores return an "unused" record (not an
    /// error) for an id that has never been written — mirroring Neo4j's
    /// record stores, where a fresh id reads back as `in_use = false`.
    fn get_record(&self, id: u64) -> Result<R>;

    /// Persist a record, keyed by its own `id()`.
    fn update_record(&self, record: &R) -> Result<()>;

    /// Allocate the next id from this store's id generator.
    fn next_id(&self) -> u64;

    /// Return an id to the free list (spec.md §4.9 rollback).
    fn free_id(&self, id: u64);

    /// Materialize any lazily-loaded subfields before mutation (spec.md
    /// §4.1 `ensureHeavy`). The in-memory store never defers loading
    /// anything, so this is a no-op reference implementation — a real
    /// durable store would use this hook to pull in property dynamic
    /// tails, for instance.
    fn ensure_heavy(&self, _record: &mut R) -> Result<()> {
        Ok(())
    }
}

/// Storage for dynamic-record chains — oversized property values, schema
/// rule bytes, token names, and node label overflow all go through this.
pub trait DynamicRecordAllocator {
    /// Split `bytes` into a chain of dynamic records and persist them,
    /// returning the chain in head-to-tail order.
    fn allocate_from(&self, bytes: &[u8]) -> Result<Vec<DynamicRecord>>;

    fn get_dynamic_record(&self, id: u64) -> Result<DynamicRecord>;
    fn update_dynamic_record(&self, record: &DynamicRecord) -> Result<()>;
    fn next_dynamic_id(&self) -> u64;
    fn free_dynamic_id(&self, id: u64);
}

/// Adapts any `RecordStore<R>` into a `buffer::Loader<R>`, so the change
/// buffer never has to know about the store's own shape.
pub struct StoreLoader<R, S> {
    store: Arc<S>,
    _marker: PhantomData<fn() -> R>,
}

impl<R, S> StoreLoader<R, S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            _marker: PhantomData,
        }
    }
}

impl<R, S: RecordStore<R>> Loader<R> for StoreLoader<R, S> {
    fn load(&self, id: u64) -> Result<R> {
        self.store.get_record(id)
    }

    fn ensure_heavy(&self, record: &mut R) -> Result<()> {
        self.store.ensure_heavy(record)
    }
}
