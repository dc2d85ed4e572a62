//! The command taxonomy (spec.md §6, §9 "sum types over command class
//! hierarchy"): the serialized unit of change produced at prepare and
//! re-executed at commit or recovery replay.
//!
//! `Command` is a tagged union over the seven record kinds a transaction
//! can touch. `injectCommand` from spec.md becomes `CommandSink::inject`: a
//! dispatch on the tag routing into the right ordered container, used
//! identically whether the commands just came out of `prepare` or were
//! read back from the log during recovery.

use crate::buffer::ChangeMode;
use crate::record::{
    LabelTokenKind, NeoStoreRecord, NodeRecord, PropertyKeyTokenKind, PropertyRecord,
    RelTypeTokenKind, RelationshipGroupRecord, RelationshipRecord, SchemaRule, SchemaRuleRecord,
    TokenRecord,
};

#[derive(Debug, Clone)]
pub struct NodeCommand {
    pub before: Option<NodeRecord>,
    pub after: NodeRecord,
    pub mode: ChangeMode,
}

#[derive(Debug, Clone)]
pub struct RelationshipCommand {
    pub after: RelationshipRecord,
    pub mode: ChangeMode,
}

#[derive(Debug, Clone)]
pub struct RelationshipGroupCommand {
    pub after: RelationshipGroupRecord,
    pub mode: ChangeMode,
}

#[derive(Debug, Clone)]
pub struct PropertyCommand {
    pub before: Option<PropertyRecord>,
    pub after: PropertyRecord,
    pub mode: ChangeMode,
}

#[derive(Debug, Clone)]
pub struct TokenCommand<K> {
    pub after: TokenRecord<K>,
    pub mode: ChangeMode,
}

#[derive(Debug, Clone)]
pub struct SchemaRuleCommand {
    pub before: Option<SchemaRuleRecord>,
    pub after: SchemaRuleRecord,
    pub rule: SchemaRule,
    pub mode: ChangeMode,
    /// Set by commit just before execution (spec.md §4.6 step 5): "set each
    /// command's txId". Zero until then.
    pub tx_id: u64,
}

#[derive(Debug, Clone)]
pub struct NeoStoreCommand {
    pub after: NeoStoreRecord,
    pub mode: ChangeMode,
}

/// One entry in the ordered command list a transaction hands to the log
/// framework at prepare, and the shape recovery replay reads back.
#[derive(Debug, Clone)]
pub enum Command {
    RelationshipType(TokenCommand<RelTypeTokenKind>),
    Label(TokenCommand<LabelTokenKind>),
    PropertyKey(TokenCommand<PropertyKeyTokenKind>),
    Node(NodeCommand),
    Relationship(RelationshipCommand),
    Property(PropertyCommand),
    SchemaRule(SchemaRuleCommand),
    RelationshipGroup(RelationshipGroupCommand),
    NeoStore(NeoStoreCommand),
}

/// Where `Command`s land — `addCommand` at prepare, `injectCommand` during
/// replay (spec.md §6).
pub trait CommandSink {
    fn inject(&mut self, command: Command);
}

/// The command list grouped back into per-kind ordered containers, the
/// shape commit actually executes against (spec.md §4.6's phase order is
/// not the same as prepare's dependency order, so commit re-sorts by
/// injecting the flat log into this).
#[derive(Debug, Default, Clone)]
pub struct CommandLog {
    pub relationship_type_tokens: Vec<TokenCommand<RelTypeTokenKind>>,
    pub label_tokens: Vec<TokenCommand<LabelTokenKind>>,
    pub property_key_tokens: Vec<TokenCommand<PropertyKeyTokenKind>>,
    pub nodes: Vec<NodeCommand>,
    pub relationships: Vec<RelationshipCommand>,
    pub properties: Vec<PropertyCommand>,
    pub schema_rules: Vec<SchemaRuleCommand>,
    pub relationship_groups: Vec<RelationshipGroupCommand>,
    pub neo_store: Option<NeoStoreCommand>,
}

impl CommandSink for CommandLog {
    fn inject(&mut self, command: Command) {
        match command {
            Command::RelationshipType(c) => self.relationship_type_tokens.push(c),
            Command::Label(c) => self.label_tokens.push(c),
            Command::PropertyKey(c) => self.property_key_tokens.push(c),
            Command::Node(c) => self.nodes.push(c),
            Command::Relationship(c) => self.relationships.push(c),
            Command::Property(c) => self.properties.push(c),
            Command::SchemaRule(c) => self.schema_rules.push(c),
            Command::RelationshipGroup(c) => self.relationship_groups.push(c),
            Command::NeoStore(c) => self.neo_store = Some(c),
        }
    }
}

impl CommandLog {
    /// Build a `CommandLog` by injecting a flat, prepare-ordered command
    /// list, same code path recovery uses for a log read back from disk.
    pub fn from_commands(commands: impl IntoIterator<Item = Command>) -> Self {
        let mut log = CommandLog::default();
        for command in commands {
            log.inject(command);
        }
        log
    }
}
