//! Named parameter rewriting.
//!
//! SQL Server only understands positional `@0, @1, ...` parameters. This module
//! rewrites `:name` and `:...name` placeholders into positional markers and
//! collects the bound values in marker order.

use crate::models::{SqlFunction, Value};
use std::collections::HashMap;
use tracing::debug;

/// Value bound to a named placeholder.
#[derive(Debug, Clone)]
pub enum Parameter {
    /// Single value, one marker
    Value(Value),
    /// Sequence expanded by a `:...name` placeholder
    List(Vec<Value>),
    /// Inlined raw, never bound
    Function(SqlFunction),
}

impl Parameter {
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    pub fn list(values: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }

    /// Inline the expression returned by `f`.
    pub fn function(f: impl Fn() -> String + Send + Sync + 'static) -> Self {
        Self::Function(SqlFunction::new(f))
    }
}

impl From<Value> for Parameter {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<SqlFunction> for Parameter {
    fn from(f: SqlFunction) -> Self {
        Self::Function(f)
    }
}

/// A rewritten statement and its positional values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RewrittenQuery {
    pub sql: String,
    pub parameters: Vec<Value>,
}

/// Positional marker for the parameter at `index`.
pub fn create_parameter(_name: &str, index: usize) -> String {
    format!("@{}", index)
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'.'
}

struct Collector {
    parameters: Vec<Value>,
    scalar_indexes: HashMap<String, usize>,
}

impl Collector {
    fn push(&mut self, name: &str, value: Value) -> String {
        self.parameters.push(value);
        create_parameter(name, self.parameters.len() - 1)
    }

    /// Repeated scalar placeholders share the first occurrence's marker.
    fn push_scalar(&mut self, name: &str, value: Value) -> String {
        if let Some(&index) = self.scalar_indexes.get(name) {
            return create_parameter(name, index);
        }
        let marker = self.push(name, value);
        self.scalar_indexes
            .insert(name.to_string(), self.parameters.len() - 1);
        marker
    }

    fn push_spread(&mut self, name: &str, values: &[Value]) -> String {
        values
            .iter()
            .map(|value| self.push(name, value.clone()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Rewrite named placeholders into positional markers.
///
/// `native_parameters` are already positional and come first. Placeholders whose name is
/// not in `parameters` are left untouched; `::` is never treated as a placeholder.
pub fn escape_query_with_parameters(
    sql: &str,
    parameters: &HashMap<String, Parameter>,
    native_parameters: impl IntoIterator<Item = Value>,
) -> RewrittenQuery {
    let mut collector = Collector {
        parameters: native_parameters.into_iter().collect(),
        scalar_indexes: HashMap::new(),
    };

    if parameters.is_empty() {
        return RewrittenQuery {
            sql: sql.to_string(),
            parameters: collector.parameters,
        };
    }

    let bytes = sql.as_bytes();
    let mut rewritten = String::with_capacity(sql.len());
    let mut copied = 0;
    let mut i = 0;
    let mut replaced = 0usize;

    while i < bytes.len() {
        if bytes[i] != b':' {
            i += 1;
            continue;
        }
        if bytes.get(i + 1) == Some(&b':') {
            i += 2;
            continue;
        }

        let spread = sql[i + 1..].starts_with("...");
        let name_start = i + 1 + if spread { 3 } else { 0 };
        let name_len = bytes[name_start..]
            .iter()
            .take_while(|b| is_name_byte(**b))
            .count();
        if name_len == 0 {
            i = name_start;
            continue;
        }

        let name_end = name_start + name_len;
        let name = &sql[name_start..name_end];
        let Some(parameter) = parameters.get(name) else {
            i = name_end;
            continue;
        };

        rewritten.push_str(&sql[copied..i]);
        let replacement = match (parameter, spread) {
            (Parameter::Function(f), _) => f.call(),
            (Parameter::List(values), true) => collector.push_spread(name, values),
            (Parameter::Value(value), true) => {
                collector.push_spread(name, std::slice::from_ref(value))
            }
            (Parameter::Value(value), false) => collector.push_scalar(name, value.clone()),
            (Parameter::List(values), false) => {
                collector.push_scalar(name, Value::Array(values.clone()))
            }
        };
        rewritten.push_str(&replacement);

        replaced += 1;
        i = name_end;
        copied = name_end;
    }
    rewritten.push_str(&sql[copied..]);

    debug!(
        placeholders = replaced,
        parameters = collector.parameters.len(),
        "Rewrote named parameters"
    );

    RewrittenQuery {
        sql: rewritten,
        parameters: collector.parameters,
    }
}
