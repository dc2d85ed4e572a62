//! `prepare()` (spec.md §4.5): walk the change buffer in its fixed
//! dependency order, run integrity validation against each record, and
//! materialize the result into the ordered `Command` list commit and
//! recovery replay both consume.

use crate::command::{
    Command, NeoStoreCommand, NodeCommand, PropertyCommand, RelationshipCommand, RelationshipGroupCommand,
    SchemaRuleCommand, TokenCommand,
};
use crate::record::SchemaRuleRecord;
use crate::validation::{self, TouchedProperty};
use crate::{Error, Result};

use super::WriteTransaction;

pub(super) fn prepare(tx: &mut WriteTransaction) -> Result<()> {
    if tx.prepared {
        return Err(Error::Xa("prepare called on an already-prepared transaction".into()));
    }

    let mut commands = Vec::new();

    // Step 2 (spec.md §4.5): tokens first, reltype then label. Property-key
    // tokens are deferred past nodes/relationships below, matching the
    // original crate's ordering since nothing in this transaction can
    // reference a not-yet-created property key except a property command,
    // which is itself ordered after it.
    for (_, change) in tx.rel_type_token_changes.changes() {
        commands.push(Command::RelationshipType(TokenCommand {
            after: change.after().clone(),
            mode: change.mode(),
        }));
    }
    for (_, change) in tx.label_token_changes.changes() {
        commands.push(Command::Label(TokenCommand {
            after: change.after().clone(),
            mode: change.mode(),
        }));
    }

    for (_, change) in tx.node_changes.changes() {
        validation::validate_node_record(change.after())?;
        commands.push(Command::Node(NodeCommand {
            before: change.before().cloned(),
            after: change.after().clone(),
            mode: change.mode(),
        }));
    }

    for (_, change) in tx.rel_changes.changes() {
        commands.push(Command::Relationship(RelationshipCommand {
            after: change.after().clone(),
            mode: change.mode(),
        }));
    }

    if let Some((_, change)) = tx.neo_changes.changes().next() {
        commands.push(Command::NeoStore(NeoStoreCommand {
            after: change.after().clone(),
            mode: change.mode(),
        }));
    }

    for (_, change) in tx.prop_key_token_changes.changes() {
        commands.push(Command::PropertyKey(TokenCommand {
            after: change.after().clone(),
            mode: change.mode(),
        }));
    }

    for (_, change) in tx.prop_changes.changes() {
        commands.push(Command::Property(PropertyCommand {
            before: change.before().cloned(),
            after: change.after().clone(),
            mode: change.mode(),
        }));
    }

    let mut rules_created_since_start: Vec<SchemaRuleRecord> = Vec::new();
    for (_, change) in tx.schema_changes.changes() {
        validation::validate_schema_rule(change.after())?;
        if change.is_created() {
            rules_created_since_start.push(change.after().clone());
        }
        commands.push(Command::SchemaRule(SchemaRuleCommand {
            before: change.before().cloned(),
            after: change.after().clone(),
            rule: change.after().rule.clone(),
            mode: change.mode(),
            tx_id: 0,
        }));
    }

    for (_, change) in tx.group_changes.changes() {
        commands.push(Command::RelationshipGroup(RelationshipGroupCommand {
            after: change.after().clone(),
            mode: change.mode(),
        }));
    }

    let rule_refs: Vec<&SchemaRuleRecord> = rules_created_since_start.iter().collect();
    let touched: Vec<TouchedProperty<'_>> = tx
        .touched_properties
        .iter()
        .map(|(label, key, value)| TouchedProperty {
            label: *label,
            property_key: *key,
            value,
        })
        .collect();
    validation::validate_transaction_start_knowledge(&rule_refs, &touched)?;

    tracing::debug!(command_count = commands.len(), "transaction prepared");
    tx.commands = commands;
    tx.prepared = true;
    Ok(())
}
