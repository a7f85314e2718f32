//! Schema-related data models.
//!
//! This module defines the snapshot types produced by table introspection
//! and the qualified table path used when composing table names.

use crate::models::Length;
use serde::{Deserialize, Serialize};

/// Column as reported by the database.
///
/// A snapshot only: it is compared against the declared columns and discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntrospectedColumn {
    pub name: String,
    /// Dialect type name, e.g. `nvarchar`
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<Length>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    /// Default as the database persists it, e.g. `(getdate())` already unwrapped to `getdate()`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    pub is_nullable: bool,
    pub is_primary: bool,
    pub is_unique: bool,
    pub is_generated: bool,
}

impl IntrospectedColumn {
    /// Create a new introspected column.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            length: None,
            precision: None,
            scale: None,
            default: None,
            is_nullable: false,
            is_primary: false,
            is_unique: false,
            is_generated: false,
        }
    }

    pub fn with_length(mut self, length: impl Into<Length>) -> Self {
        self.length = Some(length.into());
        self
    }

    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = Some(scale);
        self
    }

    /// Set the default literal.
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.is_nullable = nullable;
        self
    }

    pub fn primary(mut self, primary: bool) -> Self {
        self.is_primary = primary;
        self
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.is_unique = unique;
        self
    }

    pub fn generated(mut self, generated: bool) -> Self {
        self.is_generated = generated;
        self
    }
}

/// Fully qualified table location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablePath {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub table_name: String,
}

impl TablePath {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            database: None,
            schema: None,
            table_name: table_name.into(),
        }
    }

    /// Set the schema name.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Set the database name.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_introspected_column_builder() {
        let column = IntrospectedColumn::new("name", "nvarchar")
            .with_length(Length::Max)
            .nullable(true)
            .with_default("'n/a'");

        assert_eq!(column.length, Some(Length::Max));
        assert!(column.is_nullable);
        assert!(!column.is_primary);
        assert_eq!(column.default.as_deref(), Some("'n/a'"));
    }

    #[test]
    fn test_introspected_column_serializes_type_key() {
        let column = IntrospectedColumn::new("id", "int").primary(true);
        let json = serde_json::to_value(&column).unwrap();
        assert_eq!(json["type"], "int");
        assert!(json.get("length").is_none());
    }

    #[test]
    fn test_table_path_builder() {
        let path = TablePath::new("users").with_schema("dbo").with_database("app");
        assert_eq!(path.database.as_deref(), Some("app"));
        assert_eq!(path.schema.as_deref(), Some("dbo"));
        assert_eq!(path.table_name, "users");
    }
}
