//! Application-level values exchanged with the driver.
//!
//! `Value` is what the ORM hands to the driver before persisting and what the driver
//! hands back after hydration. `MarshaledParameter` pairs a value with an explicit wire type.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// A value as seen by the application or by the database client.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// NULL value
    #[default]
    Null,
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    DateTimeOffset(DateTime<FixedOffset>),
    Json(JsonValue),
    Array(Vec<Value>),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this value for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Uuid(_) => "uuid",
            Self::Date(_) => "date",
            Self::Time(_) => "time",
            Self::DateTime(_) => "datetime",
            Self::DateTimeOffset(_) => "datetimeoffset",
            Self::Json(_) => "json",
            Self::Array(_) => "array",
        }
    }

    /// Loose truthiness used for `bit` columns.
    ///
    /// Zero, empty strings, empty byte buffers and null are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(v) => *v,
            Self::Int(v) => *v != 0,
            Self::Float(v) => *v != 0.0 && !v.is_nan(),
            Self::String(v) => !v.is_empty(),
            Self::Bytes(v) => !v.is_empty(),
            Self::Json(JsonValue::Null) => false,
            Self::Json(JsonValue::Bool(v)) => *v,
            _ => true,
        }
    }

    /// Convert into a JSON value, used by the simple-json encoding.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(v) => JsonValue::Bool(*v),
            Self::Int(v) => JsonValue::Number((*v).into()),
            Self::Float(v) => serde_json::Number::from_f64(*v)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Self::Bytes(v) => JsonValue::Array(v.iter().map(|b| JsonValue::from(*b)).collect()),
            Self::Json(v) => v.clone(),
            Self::Array(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
            other => JsonValue::String(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::String(v) => write!(f, "{}", v),
            Self::Bytes(v) => write!(f, "{}", String::from_utf8_lossy(v)),
            Self::Uuid(v) => write!(f, "{}", v),
            Self::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            Self::Time(v) => write!(f, "{}", v.format("%H:%M:%S%.f")),
            Self::DateTime(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S%.f")),
            Self::DateTimeOffset(v) => write!(f, "{}", v.to_rfc3339()),
            Self::Json(v) => write!(f, "{}", v),
            Self::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(val: bool) -> Self {
        Value::Bool(val)
    }
}

impl From<i32> for Value {
    fn from(val: i32) -> Self {
        Value::Int(val.into())
    }
}

impl From<i64> for Value {
    fn from(val: i64) -> Self {
        Value::Int(val)
    }
}

impl From<f64> for Value {
    fn from(val: f64) -> Self {
        Value::Float(val)
    }
}

impl From<String> for Value {
    fn from(val: String) -> Self {
        Value::String(val)
    }
}

impl From<&str> for Value {
    fn from(val: &str) -> Self {
        Value::String(val.to_string())
    }
}

impl From<Uuid> for Value {
    fn from(val: Uuid) -> Self {
        Value::Uuid(val)
    }
}

impl From<NaiveDate> for Value {
    fn from(val: NaiveDate) -> Self {
        Value::Date(val)
    }
}

impl From<NaiveTime> for Value {
    fn from(val: NaiveTime) -> Self {
        Value::Time(val)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(val: NaiveDateTime) -> Self {
        Value::DateTime(val)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(val: DateTime<FixedOffset>) -> Self {
        Value::DateTimeOffset(val)
    }
}

impl From<JsonValue> for Value {
    fn from(val: JsonValue) -> Self {
        Value::Json(val)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(val: Option<T>) -> Self {
        match val {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

impl<T> From<Vec<T>> for Value
where
    T: Into<Value>,
{
    fn from(val: Vec<T>) -> Self {
        Value::Array(val.into_iter().map(Into::into).collect())
    }
}

/// Node of a [`ValueMap`]: either a leaf value or a nested map.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueMapNode {
    Leaf(Value),
    Nested(ValueMap),
}

/// Nested map keyed by property path segments (`profile.name` -> `{profile: {name: ..}}`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValueMap(BTreeMap<String, ValueMapNode>);

impl ValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value under a dotted property path, creating intermediate maps.
    ///
    /// A leaf sitting where a nested map is needed is replaced by the map.
    pub fn insert_path(&mut self, path: &str, value: Value) {
        let mut segments = path.split('.').peekable();
        let mut current = self;
        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                current.0.insert(segment.to_string(), ValueMapNode::Leaf(value));
                return;
            }
            let node = current
                .0
                .entry(segment.to_string())
                .or_insert_with(|| ValueMapNode::Nested(ValueMap::new()));
            if let ValueMapNode::Leaf(_) = node {
                *node = ValueMapNode::Nested(ValueMap::new());
            }
            current = match node {
                ValueMapNode::Nested(map) => map,
                ValueMapNode::Leaf(_) => unreachable!("leaf replaced by nested map above"),
            };
        }
    }

    /// Look up a leaf value by dotted property path.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut current = self;
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            match (current.0.get(segment)?, segments.peek()) {
                (ValueMapNode::Leaf(value), None) => return Some(value),
                (ValueMapNode::Nested(map), Some(_)) => current = map,
                _ => return None,
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ValueMapNode)> {
        self.0.iter()
    }
}

/// A value paired with its target wire type, for protocols that tag every parameter.
///
/// Created per query execution and consumed immediately.
#[derive(Debug, Clone, PartialEq)]
pub struct MarshaledParameter {
    pub value: Value,
    /// Dialect type name, e.g. `nvarchar`
    pub wire_type: String,
    /// Textual length (`255`, `MAX`)
    pub length: Option<String>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
}

impl MarshaledParameter {
    /// Create a parameter without size information.
    pub fn new(value: Value, wire_type: impl Into<String>) -> Self {
        Self {
            value,
            wire_type: wire_type.into(),
            length: None,
            precision: None,
            scale: None,
        }
    }

    /// Set the length.
    pub fn with_length(mut self, length: impl Into<String>) -> Self {
        self.length = Some(length.into());
        self
    }

    /// Set the precision.
    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = Some(precision);
        self
    }

    /// Set the scale.
    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = Some(scale);
        self
    }
}
