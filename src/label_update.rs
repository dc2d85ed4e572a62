//! Label-update extraction (spec.md §4.7): for every node command, work
//! out whether its label set actually changed, and if so produce the
//! `{nodeId, labelsBefore, labelsAfter}` tuple the label-scan writer wants.

use crate::cache::NodeLabelUpdate;
use crate::record::{LabelField, NodeRecord};

/// Resolve one node's label set for extraction purposes. `None` means "a
/// dynamic label chain this caller can't resolve right now" — spec.md
/// §4.7: "skip if either side's labels cannot be resolved (lazy-loaded and
/// absent)."
fn resolve_labels(record: &NodeRecord, resolve_dynamic: &mut dyn FnMut(u64) -> Option<Vec<u32>>) -> Option<Vec<u32>> {
    match &record.label_field {
        LabelField::Inline(ids) => Some(ids.clone()),
        LabelField::Dynamic(head) => resolve_dynamic(*head),
    }
}

/// `extractLabelUpdates` (spec.md §4.7). `resolve_dynamic` resolves an
/// overflowed label chain's head id back into label ids; pass a closure
/// backed by the dynamic-record store at commit time.
pub fn extract_label_updates(
    node_id: u64,
    before: Option<&NodeRecord>,
    after: &NodeRecord,
    resolve_dynamic: &mut dyn FnMut(u64) -> Option<Vec<u32>>,
) -> Option<NodeLabelUpdate> {
    let both_inline_and_identical = match before {
        Some(b) => b.label_field.is_inline() && after.label_field.is_inline() && b.label_field == after.label_field,
        None => after.label_field == LabelField::Inline(Vec::new()),
    };
    if both_inline_and_identical {
        return None;
    }

    let labels_before = match before {
        Some(b) => resolve_labels(b, resolve_dynamic)?,
        None => Vec::new(),
    };
    let labels_after = resolve_labels(after, resolve_dynamic)?;

    if labels_before == labels_after {
        return None;
    }

    Some(NodeLabelUpdate {
        node_id,
        labels_before,
        labels_after,
    })
}

/// Sort extracted updates by node id ascending, "to enable append-friendly
/// I/O" (spec.md §4.7), before handing them to the label-scan writer.
pub fn sort_by_node_id(updates: &mut [NodeLabelUpdate]) {
    updates.sort_by_key(|u| u.node_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_inline_labels_produce_no_update() {
        let mut before = NodeRecord::new(1);
        before.label_field = LabelField::Inline(vec![1, 2]);
        let after = before.clone();
        let update = extract_label_updates(1, Some(&before), &after, &mut |_| None);
        assert!(update.is_none());
    }

    #[test]
    fn added_label_produces_an_update() {
        let mut before = NodeRecord::new(1);
        before.label_field = LabelField::Inline(vec![1]);
        let mut after = before.clone();
        after.label_field = LabelField::Inline(vec![1, 2]);
        let update = extract_label_updates(1, Some(&before), &after, &mut |_| None).unwrap();
        assert_eq!(update.labels_before, vec![1]);
        assert_eq!(update.labels_after, vec![1, 2]);
    }

    #[test]
    fn created_node_has_no_before_labels() {
        let mut after = NodeRecord::new(1);
        after.label_field = LabelField::Inline(vec![3]);
        let update = extract_label_updates(1, None, &after, &mut |_| None).unwrap();
        assert!(update.labels_before.is_empty());
        assert_eq!(update.labels_after, vec![3]);
    }

    #[test]
    fn unresolvable_dynamic_labels_are_skipped() {
        let before = NodeRecord::new(1);
        let mut after = NodeRecord::new(1);
        after.label_field = LabelField::Dynamic(99);
        let update = extract_label_updates(1, Some(&before), &after, &mut |_| None);
        assert!(update.is_none());
    }

    #[test]
    fn sorts_updates_by_node_id() {
        let mut updates = vec![
            NodeLabelUpdate { node_id: 3, labels_before: vec![], labels_after: vec![] },
            NodeLabelUpdate { node_id: 1, labels_before: vec![], labels_after: vec![] },
        ];
        sort_by_node_id(&mut updates);
        assert_eq!(updates[0].node_id, 1);
    }
}
