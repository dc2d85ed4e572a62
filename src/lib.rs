//! # graphkernel — Write-Transaction Core of a Native Graph Storage Engine
//!
//! The component that stages in-memory mutations against a record-based
//! on-disk store, validates them, serializes them into an ordered command
//! log, and applies them atomically to the store, the label-scan index,
//! and the dependent property indexes.
//!
//! ## What lives here
//!
//! 1. **Records** (`record`): fixed-shape node/relationship/group/property/
//!    dynamic/token/schema-rule/neostore record types.
//! 2. **Stores** (`store`): the `RecordStore`/`DynamicRecordAllocator`
//!    contract, plus an in-memory reference implementation.
//! 3. **Change buffer** (`buffer`): per-transaction staging with
//!    load-on-demand and before/after tracking.
//! 4. **Chain operators** (`chain`): pure record-manipulation functions
//!    maintaining relationship-chain, property-chain, and dense-node
//!    group-chain invariants.
//! 5. **Transaction** (`tx`): the public mutation API, prepare, commit,
//!    rollback, and recovery replay.
//! 6. **Collaborator contracts** (`lock`, `cache`, `index_service`):
//!    narrow traits this crate consumes, each with a runnable in-memory
//!    reference implementation.
//!
//! ## What does not live here
//!
//! No query language, no secondary/full-text/vector index storage, no
//! distributed replication, no durable persistence format. Those are the
//! surrounding kernel's job.
//!
//! ## Quick start
//!
//! ```
//! use graphkernel::engine::GraphStore;
//! use graphkernel::value::PropertyValue;
//!
//! let store = GraphStore::new_in_memory(Default::default());
//! let mut tx = store.begin();
//!
//! let label = tx.create_token(graphkernel::tx::TokenKind::Label, "Person").unwrap();
//! let a = tx.create_node(&[label]).unwrap();
//! let b = tx.create_node(&[label]).unwrap();
//! let rel_type = tx.create_token(graphkernel::tx::TokenKind::RelationshipType, "KNOWS").unwrap();
//! let key = tx.create_token(graphkernel::tx::TokenKind::PropertyKey, "since").unwrap();
//! let rel = tx.create_relationship(a, b, rel_type).unwrap();
//! tx.add_property(graphkernel::record::PropertyOwner::Relationship(rel), key, PropertyValue::Int(2024)).unwrap();
//!
//! store.commit(tx).unwrap();
//! ```

pub mod buffer;
pub mod cache;
pub mod chain;
pub mod command;
pub mod config;
pub mod engine;
pub mod index_service;
pub mod label_update;
pub mod lock;
pub mod record;
pub mod store;
pub mod tx;
pub mod validation;
pub mod value;

// ============================================================================
// Error taxonomy (spec.md §7)
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Record linkage does not match invariants — e.g. a relationship's
    /// chain neighbor doesn't actually reference it back. Raised from
    /// chain operators; fatal for the transaction.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// Caller violated the mutation API contract (mutate-after-delete,
    /// double-delete, property key not found). The transaction is still
    /// alive and the caller must roll it back.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// Prepare/commit/rollback sequencing violation (prepare-after-commit,
    /// commit-without-prepare, commit id mismatch). Fatal.
    #[error("transaction protocol violation: {0}")]
    Xa(String),

    /// I/O failure from the label-scan writer or a record store. Fatal for
    /// the transaction; the engine must recover via log replay.
    #[error("underlying storage error: {0}")]
    UnderlyingStorage(String),

    /// Attempted to clone a record kind that doesn't track before-state
    /// (relationship, relationship-group, neostore).
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
