//! Lock service contract (spec.md §6) and a scoped-release lock group
//! (spec.md §9 "scoped resource for locks").
//!
//! Relationship-chain surgery also needs a per-relationship mutex on each
//! neighbor it touches (spec.md §4.2, §5); that's modeled here as the same
//! kind of lockable handle, keyed by relationship id instead of node id.

use std::sync::Arc;

use parking_lot::{ArcMutexGuard, ArcRwLockReadGuard, ArcRwLockWriteGuard, Mutex, RawMutex, RawRwLock, RwLock};

/// Read or write intent for a node lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Read,
    Write,
}

/// A held lock, opaque to the caller. Dropping it releases the lock —
/// `ScopedLockGroup` is the only thing that should hold one of these.
pub enum LockGuard {
    NodeRead(ArcRwLockReadGuard<RawRwLock, ()>),
    NodeWrite(ArcRwLockWriteGuard<RawRwLock, ()>),
    RelMutex(ArcMutexGuard<RawMutex, ()>),
}

/// The lock service contract every commit goes through. Blocking — spec.md
/// §5 is explicit that lock acquisition is the only suspension point in
/// this component, and synchronous blocking is fine because commit is
/// already a synchronous critical section.
pub trait LockService: Send + Sync {
    fn acquire_node_lock(&self, node_id: u64, mode: LockMode) -> LockGuard;
    fn acquire_relationship_mutex(&self, rel_id: u64) -> LockGuard;
}

/// Reference lock service: one `RwLock` per node id, one `Mutex` per
/// relationship id, both created lazily and kept in a map guarded by an
/// outer lock. Matches the teacher's `parking_lot` usage in
/// `storage/memory.rs`.
#[derive(Default)]
pub struct InMemoryLockService {
    node_locks: RwLock<hashbrown::HashMap<u64, Arc<RwLock<()>>>>,
    rel_mutexes: RwLock<hashbrown::HashMap<u64, Arc<Mutex<()>>>>,
}

impl InMemoryLockService {
    pub fn new() -> Self {
        Self::default()
    }

    fn node_lock(&self, node_id: u64) -> Arc<RwLock<()>> {
        if let Some(l) = self.node_locks.read().get(&node_id) {
            return l.clone();
        }
        self.node_locks
            .write()
            .entry(node_id)
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    fn rel_mutex(&self, rel_id: u64) -> Arc<Mutex<()>> {
        if let Some(l) = self.rel_mutexes.read().get(&rel_id) {
            return l.clone();
        }
        self.rel_mutexes
            .write()
            .entry(rel_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

impl LockService for InMemoryLockService {
    fn acquire_node_lock(&self, node_id: u64, mode: LockMode) -> LockGuard {
        let lock = self.node_lock(node_id);
        match mode {
            LockMode::Read => LockGuard::NodeRead(lock.read_arc()),
            LockMode::Write => LockGuard::NodeWrite(lock.write_arc()),
        }
    }

    fn acquire_relationship_mutex(&self, rel_id: u64) -> LockGuard {
        LockGuard::RelMutex(self.rel_mutex(rel_id).lock_arc())
    }
}

/// A RAII group of locks acquired during one commit. Every lock taken
/// through this group is released when the group is dropped — on success,
/// panic, or early return alike (spec.md §4.6: "guaranteed release on all
/// exit paths").
pub struct ScopedLockGroup<'a> {
    service: &'a dyn LockService,
    held: Vec<LockGuard>,
}

impl<'a> ScopedLockGroup<'a> {
    pub fn new(service: &'a dyn LockService) -> Self {
        Self {
            service,
            held: Vec::new(),
        }
    }

    pub fn lock_node(&mut self, node_id: u64, mode: LockMode) {
        self.held.push(self.service.acquire_node_lock(node_id, mode));
    }

    pub fn lock_relationship(&mut self, rel_id: u64) {
        self.held.push(self.service.acquire_relationship_mutex(rel_id));
    }
}

// Release in reverse acquisition order for deterministic test assertions.
impl Drop for ScopedLockGroup<'_> {
    fn drop(&mut self) {
        while self.held.pop().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_group_releases_on_drop() {
        let service = InMemoryLockService::new();
        {
            let mut group = ScopedLockGroup::new(&service);
            group.lock_node(1, LockMode::Write);
            group.lock_relationship(7);
            assert!(service.node_lock(1).try_write().is_none());
        }
        assert!(service.node_lock(1).try_write().is_some());
    }
}
