//! End-to-end scenarios straight out of spec.md §8 "Testable Properties" —
//! literal node/relationship ids in the spec are illustrative (this crate's
//! id allocator starts at 0 rather than matching the spec's example
//! numbering), so these tests assert the same *relational* shape instead of
//! hard-coding the spec's exact ids.

use graphkernel::cache::RecordingCache;
use graphkernel::config::EngineConfig;
use graphkernel::engine::GraphStore;
use graphkernel::index_service::{InMemoryIndexingService, InMemoryLabelScanIndex};
use graphkernel::lock::InMemoryLockService;
use graphkernel::record::{PropertyOwner, RecordRef, Side};
use graphkernel::tx::TokenKind;
use graphkernel::value::PropertyValue;
use std::sync::Arc;

fn store_with_recording_cache(config: EngineConfig) -> (GraphStore, Arc<RecordingCache>) {
    let cache = Arc::new(RecordingCache::new());
    let store = GraphStore::new_with_collaborators(
        config,
        Arc::new(InMemoryLockService::new()),
        cache.clone(),
        Arc::new(InMemoryIndexingService::new()),
        Arc::new(InMemoryLabelScanIndex::new()),
    );
    (store, cache)
}

/// S1: first relationship between two fresh nodes becomes the sole head of
/// both endpoints' chains, with the head flag set and a zero prev-count on
/// both sides.
#[test]
fn s1_first_relationship_is_sole_chain_head() {
    let store = GraphStore::new_in_memory(EngineConfig::default());
    let mut tx = store.begin();
    let a = tx.create_node(&[]).unwrap();
    let b = tx.create_node(&[]).unwrap();
    let rel_type = tx.create_token(TokenKind::RelationshipType, "KNOWS").unwrap();
    let rel = tx.create_relationship(a, b, rel_type).unwrap();
    tx.prepare().unwrap();
    store.commit(tx).unwrap();

    let node_a = store.node(a).unwrap();
    let node_b = store.node(b).unwrap();
    assert_eq!(node_a.next_rel, RecordRef::of(rel));
    assert_eq!(node_b.next_rel, RecordRef::of(rel));

    let r = store.relationship(rel).unwrap();
    assert!(r.is_chain_head(Side::First));
    assert!(r.is_chain_head(Side::Second));
    assert_eq!(r.first_prev_rel, RecordRef::of(1));
    assert_eq!(r.second_prev_rel, RecordRef::of(1));
}

/// S2: a second relationship on the same pair of nodes splices in at the
/// head, pushing the first relationship one step back in both chains.
#[test]
fn s2_second_relationship_splices_in_front() {
    let store = GraphStore::new_in_memory(EngineConfig::default());
    let mut tx = store.begin();
    let a = tx.create_node(&[]).unwrap();
    let b = tx.create_node(&[]).unwrap();
    let rel_type = tx.create_token(TokenKind::RelationshipType, "KNOWS").unwrap();
    let first = tx.create_relationship(a, b, rel_type).unwrap();
    let second = tx.create_relationship(a, b, rel_type).unwrap();
    tx.prepare().unwrap();
    store.commit(tx).unwrap();

    let node_a = store.node(a).unwrap();
    let node_b = store.node(b).unwrap();
    assert_eq!(node_a.next_rel, RecordRef::of(second));
    assert_eq!(node_b.next_rel, RecordRef::of(second));

    let second_rec = store.relationship(second).unwrap();
    assert_eq!(second_rec.next_rel(Side::First), RecordRef::of(first));
    assert!(second_rec.is_chain_head(Side::First));
    assert_eq!(second_rec.prev_rel(Side::First), RecordRef::of(2));

    let first_rec = store.relationship(first).unwrap();
    assert!(!first_rec.is_chain_head(Side::First));
    assert_eq!(first_rec.prev_rel(Side::First), RecordRef::of(second));
}

/// S3: deleting the (now non-head) older relationship re-links the chain
/// around it and notifies the cache of the deletion plus the endpoint
/// patch, without touching the node the deleted relationship wasn't
/// adjacent to anymore.
#[test]
fn s3_delete_relinks_chain_and_notifies_cache() {
    let (store, cache) = store_with_recording_cache(EngineConfig::default());
    let mut tx = store.begin();
    let a = tx.create_node(&[]).unwrap();
    let b = tx.create_node(&[]).unwrap();
    let rel_type = tx.create_token(TokenKind::RelationshipType, "KNOWS").unwrap();
    let first = tx.create_relationship(a, b, rel_type).unwrap();
    let second = tx.create_relationship(a, b, rel_type).unwrap();
    tx.prepare().unwrap();
    store.commit(tx).unwrap();

    let mut tx2 = store.begin();
    tx2.delete_relationship(first).unwrap();
    tx2.prepare().unwrap();
    store.commit(tx2).unwrap();

    let node_a = store.node(a).unwrap();
    assert_eq!(node_a.next_rel, RecordRef::of(second));
    let second_rec = store.relationship(second).unwrap();
    assert!(second_rec.next_rel(Side::First).is_none());
    assert_eq!(second_rec.prev_rel(Side::First), RecordRef::of(1));

    let calls = cache.calls.lock();
    assert!(calls.iter().any(|c| c == &format!("remove_relationship({first})")));
    assert!(calls
        .iter()
        .any(|c| c.starts_with(&format!("patch_deleted_relationship_nodes({first},"))));
}

/// S4: a node whose chain length reaches the configured threshold upgrades
/// to dense representation, and every prior edge ends up reachable through
/// a single relationship-group record for that type.
#[test]
fn s4_reaching_threshold_upgrades_to_dense_with_one_group() {
    let store = GraphStore::new_in_memory(EngineConfig {
        dense_node_threshold: 3,
        ..Default::default()
    });
    let mut tx = store.begin();
    let hub = tx.create_node(&[]).unwrap();
    let rel_type = tx.create_token(TokenKind::RelationshipType, "LIKES").unwrap();

    let mut rel_ids = Vec::new();
    for _ in 0..4 {
        let leaf = tx.create_node(&[]).unwrap();
        rel_ids.push(tx.create_relationship(hub, leaf, rel_type).unwrap());
    }
    tx.prepare().unwrap();
    store.commit(tx).unwrap();

    let hub_rec = store.node(hub).unwrap();
    assert!(hub_rec.dense, "hub should have upgraded to dense after 4 edges at threshold 3");

    let group_id = hub_rec.next_rel.get().expect("dense node's next_rel points at a group");
    let group = store.relationship_group(group_id).unwrap();
    assert_eq!(group.rel_type, rel_type);
    assert!(group.first_out.is_some());

    // every edge should still be reachable by walking the OUTGOING bucket.
    let mut seen = Vec::new();
    let mut cursor = group.first_out;
    while let Some(id) = cursor.get() {
        seen.push(id);
        let r = store.relationship(id).unwrap();
        cursor = r.next_rel(Side::First);
    }
    seen.sort_unstable();
    let mut expected = rel_ids.clone();
    expected.sort_unstable();
    assert_eq!(seen, expected);
}

/// Boundary: with threshold 3, the third edge must NOT upgrade the node
/// (pre-insert count 2 < 3); the fourth must. Each edge commits in its own
/// transaction so the dense flag can be observed from committed state
/// between edges.
#[test]
fn dense_upgrade_boundary_fires_one_insert_late() {
    let store = GraphStore::new_in_memory(EngineConfig {
        dense_node_threshold: 3,
        ..Default::default()
    });
    let mut tx0 = store.begin();
    let hub = tx0.create_node(&[]).unwrap();
    let rel_type = tx0.create_token(TokenKind::RelationshipType, "LIKES").unwrap();
    tx0.prepare().unwrap();
    store.commit(tx0).unwrap();

    for i in 0..4 {
        let mut tx = store.begin();
        let leaf = tx.create_node(&[]).unwrap();
        tx.create_relationship(hub, leaf, rel_type).unwrap();
        tx.prepare().unwrap();
        store.commit(tx).unwrap();

        let dense_now = store.node(hub).unwrap().dense;
        if i < 3 {
            assert!(!dense_now, "hub should not be dense after only {} edge(s)", i + 1);
        } else {
            assert!(dense_now, "hub should be dense after the 4th edge crosses the threshold");
        }
    }
}

/// S5: add, then change to an oversized value forcing dynamic overflow,
/// then remove — leaves the node with no property chain at all.
#[test]
fn s5_add_change_remove_property_lifecycle() {
    let store = GraphStore::new_in_memory(EngineConfig::default());

    let mut tx0 = store.begin();
    let node = tx0.create_node(&[]).unwrap();
    let key = tx0.create_token(TokenKind::PropertyKey, "bio").unwrap();
    tx0.prepare().unwrap();
    store.commit(tx0).unwrap();

    let mut tx1 = store.begin();
    tx1.add_property(PropertyOwner::Node(node), key, PropertyValue::String("hi".into()))
        .unwrap();
    tx1.prepare().unwrap();
    store.commit(tx1).unwrap();

    let after_add = store.node(node).unwrap();
    assert!(after_add.next_prop.is_some());

    let mut tx2 = store.begin();
    let big = "a".repeat(1000);
    tx2.change_property(PropertyOwner::Node(node), key, PropertyValue::String(big.clone()))
        .unwrap();
    tx2.prepare().unwrap();
    store.commit(tx2).unwrap();

    let prop_id = store.node(node).unwrap().next_prop.get().unwrap();
    let prop = store.property_record(prop_id).unwrap();
    assert_eq!(prop.blocks.len(), 1);

    let mut tx3 = store.begin();
    let removed = tx3.remove_property(PropertyOwner::Node(node), key).unwrap();
    tx3.prepare().unwrap();
    store.commit(tx3).unwrap();
    assert!(removed.is_some());

    let after_remove = store.node(node).unwrap();
    assert!(after_remove.next_prop.is_none());
}

/// S6: XA protocol violations surface as `Error::Xa`, not panics, and
/// leave the offending transaction's already-prepared state untouched.
#[test]
fn s6_xa_protocol_violations() {
    let store = GraphStore::new_in_memory(EngineConfig::default());

    let mut tx = store.begin();
    let _ = tx.create_node(&[]).unwrap();
    tx.prepare().unwrap();
    let err = tx.prepare().unwrap_err();
    assert!(matches!(err, graphkernel::Error::Xa(_)));

    let unprepared = store.begin();
    let err = store.commit(unprepared).unwrap_err();
    assert!(matches!(err, graphkernel::Error::Xa(_)));

    let mut tx2 = store.begin();
    let _ = tx2.create_node(&[]).unwrap();
    tx2.prepare().unwrap();
    let err = store.commit_with_tx_id(tx2, 999).unwrap_err();
    assert!(matches!(err, graphkernel::Error::Xa(_)));
}

/// Loop edges (both endpoints the same node) splice the chain exactly once
/// and mirror prev/next onto the second side instead of double-linking.
#[test]
fn loop_edge_splices_once() {
    let store = GraphStore::new_in_memory(EngineConfig::default());
    let mut tx = store.begin();
    let n = tx.create_node(&[]).unwrap();
    let rel_type = tx.create_token(TokenKind::RelationshipType, "SELF").unwrap();
    let rel = tx.create_relationship(n, n, rel_type).unwrap();
    tx.prepare().unwrap();
    store.commit(tx).unwrap();

    let node = store.node(n).unwrap();
    assert_eq!(node.next_rel, RecordRef::of(rel));
    let r = store.relationship(rel).unwrap();
    assert!(r.is_chain_head(Side::First));
    assert_eq!(r.first_prev_rel, r.second_prev_rel);
    assert_eq!(r.first_next_rel, r.second_next_rel);
}

/// Recovery replay of a committed transaction's command log against a
/// fresh store reproduces the same committed node/relationship state.
#[test]
fn recovery_replay_reproduces_committed_state() {
    let store = GraphStore::new_in_memory(EngineConfig::default());
    let mut tx = store.begin();
    let a = tx.create_node(&[]).unwrap();
    let b = tx.create_node(&[]).unwrap();
    let rel_type = tx.create_token(TokenKind::RelationshipType, "KNOWS").unwrap();
    let rel = tx.create_relationship(a, b, rel_type).unwrap();
    tx.prepare().unwrap();
    let commands = tx.prepared_commands().to_vec();
    let commit_tx_id = store.commit_with_tx_id(tx, 1).unwrap();

    let replay_target = GraphStore::new_in_memory(EngineConfig::default());
    replay_target.recover(commands, commit_tx_id).unwrap();

    assert_eq!(replay_target.node(a).unwrap(), store.node(a).unwrap());
    assert_eq!(replay_target.node(b).unwrap(), store.node(b).unwrap());
    assert_eq!(replay_target.relationship(rel).unwrap(), store.relationship(rel).unwrap());
    assert_eq!(replay_target.last_committed_tx(), store.last_committed_tx());
}

/// Rolling back a transaction that created a node returns the node's id to
/// the allocator, so the next `create_node` in a fresh transaction reuses
/// it, and invalidates the cache for every key it touched.
#[test]
fn rollback_frees_created_ids_and_invalidates_cache() {
    let (store, cache) = store_with_recording_cache(EngineConfig::default());

    let mut tx = store.begin();
    let id = tx.create_node(&[]).unwrap();
    store.rollback(tx);

    assert!(cache.calls.lock().iter().any(|c| c == &format!("remove_node({id})")));

    let mut tx2 = store.begin();
    let reused = tx2.create_node(&[]).unwrap();
    assert_eq!(reused, id, "rollback should have freed the id for reuse");
}
