//! The value type stored inside property blocks.
//!
//! Scoped to what a record store actually needs to persist — no graph types
//! (Node/Relationship/Path), no temporal/spatial types. Those live one layer
//! up, in a query engine this crate does not implement.

use serde::{Deserialize, Serialize};

/// A property value. Large variants (`String`, `Bytes`, the array forms)
/// are candidates for dynamic-record overflow; see `PropertyBlock::Dynamic`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    IntArray(Vec<i64>),
    FloatArray(Vec<f64>),
}

impl PropertyValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::Bool(_) => "BOOLEAN",
            PropertyValue::Int(_) => "INTEGER",
            PropertyValue::Float(_) => "FLOAT",
            PropertyValue::String(_) => "STRING",
            PropertyValue::Bytes(_) => "BYTES",
            PropertyValue::IntArray(_) => "INTEGER_ARRAY",
            PropertyValue::FloatArray(_) => "FLOAT_ARRAY",
        }
    }

    /// Encoded size in bytes, used to decide whether a value fits inline in
    /// a property block or needs to spill into dynamic records. Matches the
    /// shapes `PropertyBlock::encode` actually produces.
    pub fn encoded_size(&self) -> usize {
        match self {
            PropertyValue::Bool(_) => 1,
            PropertyValue::Int(_) => 8,
            PropertyValue::Float(_) => 8,
            PropertyValue::String(s) => s.len(),
            PropertyValue::Bytes(b) => b.len(),
            PropertyValue::IntArray(a) => a.len() * 8,
            PropertyValue::FloatArray(a) => a.len() * 8,
        }
    }

    /// Whether this value is small enough to inline in a property block
    /// rather than spill into a dynamic record chain.
    pub fn is_inlineable(&self) -> bool {
        match self {
            PropertyValue::Bool(_) | PropertyValue::Int(_) | PropertyValue::Float(_) => true,
            PropertyValue::String(s) => s.len() <= INLINE_STRING_MAX,
            PropertyValue::Bytes(b) => b.len() <= INLINE_STRING_MAX,
            PropertyValue::IntArray(_) | PropertyValue::FloatArray(_) => false,
        }
    }
}

/// Strings/byte arrays up to this many bytes are inlined in the property
/// block payload; longer values spill into a `DynamicRecord` chain.
pub const INLINE_STRING_MAX: usize = 16;

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}
impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Int(v)
    }
}
impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Float(v)
    }
}
impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::String(v)
    }
}
impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::String(v.to_owned())
    }
}
