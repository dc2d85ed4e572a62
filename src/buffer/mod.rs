//! The per-transaction change buffer (spec.md §4.1).
//!
//! Stages mutations to one record kind, with load-on-demand from the
//! backing store, before/after tracking for the kinds that need it, and
//! iteration in insertion order (prepare depends on this order being
//! stable — spec.md §9 "the iteration order matters for prepare").

use hashbrown::HashMap;

use crate::record::common::{AbstractRecord, NewUnused};
use crate::{Error, Result};

/// What kind of change a record underwent, mirroring the command mode it
/// will eventually produce (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeMode {
    Create,
    Update,
    Delete,
}

/// One staged mutation. `before` is populated lazily, on the first
/// promoting access, only for kinds that track before-state at all.
pub struct Change<R> {
    before: Option<R>,
    after: R,
    mode: ChangeMode,
}

impl<R: Clone> Change<R> {
    pub fn before(&self) -> Option<&R> {
        self.before.as_ref()
    }

    pub fn after(&self) -> &R {
        &self.after
    }

    pub fn mode(&self) -> ChangeMode {
        self.mode
    }

    pub fn is_created(&self) -> bool {
        matches!(self.mode, ChangeMode::Create)
    }

    /// Read access that does not promote the change or take a BEFORE
    /// snapshot. Spec.md's `forReadingLinkage`/`forReadingData` both land
    /// here — the distinction in the original only matters for deciding
    /// *whether* to dirty-flag, and a plain shared reference can never
    /// dirty anything.
    pub fn read(&self) -> &R {
        &self.after
    }

    /// Write access. Promotes `Update` if the change was freshly loaded
    /// (not already `Create`/`Delete`), matching spec.md's
    /// `forChangingLinkage`/`forChangingData`.
    pub fn write(&mut self) -> &mut R {
        &mut self.after
    }

    pub fn mark_deleted(&mut self) {
        self.mode = ChangeMode::Delete;
    }
}

/// Per-kind loader: how to build a never-written record, how to fetch one
/// from the store, how to materialize lazy subfields before mutation, and
/// how to snapshot one for before-state tracking.
pub trait Loader<R> {
    fn load(&self, id: u64) -> Result<R>;
    fn ensure_heavy(&self, record: &mut R) -> Result<()>;
}

/// Whether a record kind keeps a BEFORE snapshot at all. Spec.md §4.1:
/// node, property, token, and schema-rule kinds track before-state;
/// relationship, relationship-group, and neostore do not, and attempting
/// to clone one of those is a programming error (`UnsupportedOperation`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeforeStateTracking {
    Tracked,
    Untracked,
}

/// The staging area for one record kind.
pub struct RecordChanges<R, L> {
    loader: L,
    changes: HashMap<u64, Change<R>>,
    order: Vec<u64>,
    tracking: BeforeStateTracking,
}

impl<R, L> RecordChanges<R, L>
where
    R: Clone + AbstractRecord + NewUnused,
    L: Loader<R>,
{
    pub fn new(loader: L, tracking: BeforeStateTracking) -> Self {
        Self {
            loader,
            changes: HashMap::new(),
            order: Vec::new(),
            tracking,
        }
    }

    /// Stage the creation of a new record at `id`. Callers still have to
    /// flip `in_use` on the returned record themselves — this only
    /// allocates the staging slot.
    pub fn create(&mut self, id: u64) -> &mut R {
        let mut after = R::new_unused(id);
        after.set_created(true);
        self.insert_order(id);
        self.changes.insert(
            id,
            Change {
                before: None,
                after,
                mode: ChangeMode::Create,
            },
        );
        self.changes.get_mut(&id).unwrap().write()
    }

    /// Fetch a change for `id`, loading from the store on first access.
    pub fn get_or_load(&mut self, id: u64) -> Result<&mut Change<R>> {
        if !self.changes.contains_key(&id) {
            let loaded = self.loader.load(id)?;
            self.insert_order(id);
            self.changes.insert(
                id,
                Change {
                    before: None,
                    after: loaded,
                    mode: ChangeMode::Update,
                },
            );
        }
        Ok(self.changes.get_mut(&id).unwrap())
    }

    /// Promote an already-loaded (or just-loaded) change to "about to be
    /// mutated", taking a BEFORE snapshot on first promotion for kinds
    /// that track one (spec.md §4.1).
    pub fn for_changing(&mut self, id: u64) -> Result<&mut R> {
        let change = self.get_or_load(id)?;
        if change.before.is_none()
            && !matches!(change.mode, ChangeMode::Create)
            && self.tracking == BeforeStateTracking::Tracked
        {
            change.before = Some(change.after.clone());
        }
        if matches!(change.mode, ChangeMode::Update) {
            // already Update; Create/Delete stay as-is
        }
        Ok(change.write())
    }

    /// Like `for_changing` but the caller has already ensured the record
    /// is loaded heavy; used by chain operators that only need to flip a
    /// flag without re-deriving a BEFORE snapshot policy.
    pub fn get_if_loaded(&self, id: u64) -> Option<&Change<R>> {
        self.changes.get(&id)
    }

    pub fn mark_deleted(&mut self, id: u64) -> Result<()> {
        let change = self.get_or_load(id)?;
        if change.before.is_none() && self.tracking == BeforeStateTracking::Tracked {
            change.before = Some(change.after.clone());
        }
        change.mark_deleted();
        Ok(())
    }

    pub fn ensure_heavy(&mut self, id: u64) -> Result<()> {
        let change = self.get_or_load(id)?;
        self.loader.ensure_heavy(&mut change.after)
    }

    /// All staged changes, in insertion order (the order prepare depends
    /// on — spec.md §4.5).
    pub fn changes(&self) -> impl Iterator<Item = (u64, &Change<R>)> {
        self.order.iter().map(move |id| (*id, &self.changes[id]))
    }

    pub fn change_size(&self) -> usize {
        self.order.len()
    }

    pub fn clear(&mut self) {
        self.changes.clear();
        self.order.clear();
    }

    fn insert_order(&mut self, id: u64) {
        if !self.changes.contains_key(&id) {
            self.order.push(id);
        }
    }
}

/// Attempting to snapshot an untracked kind (relationship,
/// relationship-group, neostore) is a caller bug, not a recoverable
/// condition — surfaced as `UnsupportedOperation` per spec.md §7.
pub fn unsupported_clone(kind: &str) -> Error {
    Error::UnsupportedOperation(format!(
        "record kind '{kind}' does not track before-state; clone is not supported"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{NodeRecord, RecordRef};
    use crate::store::{InMemoryRecordStore, StoreLoader};
    use std::sync::Arc;

    fn changes() -> RecordChanges<NodeRecord, StoreLoader<NodeRecord, InMemoryRecordStore<NodeRecord>>> {
        let store = Arc::new(InMemoryRecordStore::<NodeRecord>::new());
        RecordChanges::new(StoreLoader::new(store), BeforeStateTracking::Tracked)
    }

    #[test]
    fn create_stages_without_touching_the_store() {
        let mut changes = changes();
        let node = changes.create(1);
        node.in_use = true;
        assert_eq!(changes.change_size(), 1);
        let (_, change) = changes.changes().next().unwrap();
        assert!(change.is_created());
        assert!(change.before().is_none());
    }

    #[test]
    fn first_promotion_snapshots_before_state() {
        let mut changes = changes();
        // Pretend id 5 was already on the store as in-use with a next_rel.
        changes.get_or_load(5).unwrap();
        {
            let record = changes.for_changing(5).unwrap();
            record.next_rel = RecordRef::of(9);
        }
        let (_, change) = changes.get_if_loaded(5).map(|c| (5u64, c)).unwrap();
        assert!(change.before().is_some());
        assert_eq!(change.after().next_rel, RecordRef::of(9));
        assert_eq!(change.mode(), ChangeMode::Update);
    }

    #[test]
    fn insertion_order_is_preserved_across_kinds() {
        let mut changes = changes();
        changes.create(3);
        changes.create(1);
        changes.create(2);
        let ids: Vec<u64> = changes.changes().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }
}
