//! Declared column and entity metadata.
//!
//! This module defines the database-agnostic description of a column as the ORM
//! declares it, before the driver maps it to SQL Server types.

use crate::db::catalog::TypeCatalog;
use crate::db::types::normalize_type;
use crate::error::{DriverError, DriverResult};
use crate::models::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Logical column type.
///
/// Every abstract tag the ORM knows maps to one variant; dialect type names
/// that have no logical counterpart are carried verbatim in `Native`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ColumnType {
    Integer,
    /// Variable length text
    Text,
    Boolean,
    /// Date and time without offset
    Timestamp,
    Date,
    Time,
    /// Raw byte buffer
    Binary,
    Uuid,
    /// `dec` alias
    Decimal,
    /// `double precision` alias
    Double,
    RowVersion,
    /// Comma separated list stored as text
    SimpleArray,
    /// JSON document stored as text; hydrates as `Value::Json` whatever the persisted form
    SimpleJson,
    /// Enum stored by its textual value
    SimpleEnum,
    Native(String),
}

impl ColumnType {
    /// Create a dialect-native type.
    pub fn native(name: impl Into<String>) -> Self {
        Self::Native(name.into())
    }

    /// The textual tag of this type as it appears in entity declarations.
    ///
    /// Parsing the tag yields a type that renders the same dialect type. SQL Server's
    /// `timestamp` is a synonym of `rowversion`, so a native `timestamp` is tagged as such.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Integer => "integer",
            Self::Text => "string",
            Self::Boolean => "boolean",
            Self::Timestamp => "timestamp",
            Self::Date => "date",
            Self::Time => "time",
            Self::Binary => "binary",
            Self::Uuid => "uuid",
            Self::Decimal => "dec",
            Self::Double => "double precision",
            Self::RowVersion => "rowversion",
            Self::SimpleArray => "simple-array",
            Self::SimpleJson => "simple-json",
            Self::SimpleEnum => "simple-enum",
            Self::Native(name) if name.eq_ignore_ascii_case("timestamp") => "rowversion",
            Self::Native(name) => name,
        }
    }
}

impl From<&str> for ColumnType {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "integer" => Self::Integer,
            "string" => Self::Text,
            "boolean" => Self::Boolean,
            "timestamp" => Self::Timestamp,
            "date" => Self::Date,
            "time" => Self::Time,
            "binary" => Self::Binary,
            "uuid" => Self::Uuid,
            "dec" => Self::Decimal,
            "double precision" => Self::Double,
            "rowversion" => Self::RowVersion,
            "simple-array" => Self::SimpleArray,
            "simple-json" => Self::SimpleJson,
            "simple-enum" => Self::SimpleEnum,
            _ => Self::Native(s.to_string()),
        }
    }
}

impl From<String> for ColumnType {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<ColumnType> for String {
    fn from(t: ColumnType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column length: a character/byte count or `MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Length {
    Fixed(u32),
    Max,
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(n) => write!(f, "{}", n),
            Self::Max => f.write_str("MAX"),
        }
    }
}

impl FromStr for Length {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("max") || trimmed == "-1" {
            return Ok(Self::Max);
        }
        trimmed
            .parse::<u32>()
            .map(Self::Fixed)
            .map_err(|e| format!("Invalid column length '{}': {}", s, e))
    }
}

impl From<u32> for Length {
    fn from(n: u32) -> Self {
        Self::Fixed(n)
    }
}

/// Produces a raw SQL expression, e.g. `getdate()`.
///
/// The output is inlined verbatim, never parametrized, so it must only ever come from
/// trusted code.
#[derive(Clone)]
pub struct SqlFunction(Arc<dyn Fn() -> String + Send + Sync>);

impl SqlFunction {
    pub fn new(f: impl Fn() -> String + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Shortcut for a function returning a fixed expression.
    pub fn raw(expression: impl Into<String>) -> Self {
        let expression = expression.into();
        Self::new(move || expression.clone())
    }

    pub fn call(&self) -> String {
        (self.0)()
    }
}

impl fmt::Debug for SqlFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SqlFunction").field(&self.call()).finish()
    }
}

/// Declared default value of a column.
#[derive(Debug, Clone)]
pub enum DefaultValue {
    /// String literal, emitted quoted
    Literal(String),
    Numeric(f64),
    Boolean(bool),
    /// Raw SQL expression producer, emitted unquoted
    Computed(SqlFunction),
}

impl DefaultValue {
    pub fn computed(expression: impl Into<String>) -> Self {
        Self::Computed(SqlFunction::raw(expression))
    }
}

/// Bidirectional value transformer configured on a column.
pub trait ValueTransformer: Send + Sync {
    /// Application value -> value handed to the driver.
    fn to_database(&self, value: Value) -> Value;

    /// Value produced by the driver -> application value.
    fn from_database(&self, value: Value) -> Value;
}

/// Declarative specification of an entity column.
#[derive(Clone, Default)]
pub struct ColumnDescriptor {
    pub property_name: String,
    /// Dotted path inside the entity, differs from `property_name` for embedded columns.
    pub property_path: String,
    pub database_name: String,
    pub column_type: Option<ColumnType>,
    pub length: Option<Length>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub default: Option<DefaultValue>,
    pub is_nullable: bool,
    pub is_primary: bool,
    pub is_generated: bool,
    pub is_array: bool,
    /// Allowed values of a simple-enum column.
    pub enum_values: Vec<Value>,
    /// Applied in order when persisting, in reverse when hydrating.
    pub transformers: Vec<Arc<dyn ValueTransformer>>,
}

impl ColumnDescriptor {
    /// Create a column whose property, path and database names are all `name`.
    pub fn new(name: impl Into<String>, column_type: impl Into<ColumnType>) -> Self {
        let name = name.into();
        Self {
            property_name: name.clone(),
            property_path: name.clone(),
            database_name: name,
            column_type: Some(column_type.into()),
            ..Default::default()
        }
    }

    /// Set the database column name.
    pub fn with_database_name(mut self, name: impl Into<String>) -> Self {
        self.database_name = name.into();
        self
    }

    /// Set the property path (embedded entities use dotted paths).
    pub fn with_property_path(mut self, path: impl Into<String>) -> Self {
        self.property_path = path.into();
        self
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

    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
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

    pub fn generated(mut self, generated: bool) -> Self {
        self.is_generated = generated;
        self
    }

    pub fn array(mut self, array: bool) -> Self {
        self.is_array = array;
        self
    }

    pub fn with_enum_values(mut self, values: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        self.enum_values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_transformer(mut self, transformer: Arc<dyn ValueTransformer>) -> Self {
        self.transformers.push(transformer);
        self
    }

    /// Check that length and precision/scale agree with what the column type supports.
    pub fn validate(&self) -> DriverResult<()> {
        let type_name = normalize_type(self);
        let catalog = TypeCatalog::get();

        if self.length.is_some() {
            if !catalog.supports_length(&type_name) {
                return Err(DriverError::invalid_input(format!(
                    "Column '{}' of type '{}' does not support length",
                    self.database_name, type_name
                )));
            }
            if self.precision.is_some() || self.scale.is_some() {
                return Err(DriverError::invalid_input(format!(
                    "Column '{}' declares both a length and precision/scale",
                    self.database_name
                )));
            }
        }

        if self.precision.is_some() && !catalog.supports_precision(&type_name) {
            return Err(DriverError::invalid_input(format!(
                "Column '{}' of type '{}' does not support precision",
                self.database_name, type_name
            )));
        }

        if self.scale.is_some() && !catalog.supports_scale(&type_name) {
            return Err(DriverError::invalid_input(format!(
                "Column '{}' of type '{}' does not support scale",
                self.database_name, type_name
            )));
        }

        Ok(())
    }

    pub fn has_transformer(&self) -> bool {
        !self.transformers.is_empty()
    }

    /// Run the transformers in the persisting direction.
    pub fn transform_to_database(&self, value: Value) -> Value {
        self.transformers
            .iter()
            .fold(value, |value, transformer| transformer.to_database(value))
    }

    /// Run the transformers in the hydrating direction.
    pub fn transform_from_database(&self, value: Value) -> Value {
        self.transformers
            .iter()
            .rev()
            .fold(value, |value, transformer| transformer.from_database(value))
    }
}

impl fmt::Debug for ColumnDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnDescriptor")
            .field("property_path", &self.property_path)
            .field("database_name", &self.database_name)
            .field("column_type", &self.column_type)
            .field("length", &self.length)
            .field("precision", &self.precision)
            .field("scale", &self.scale)
            .field("default", &self.default)
            .field("is_nullable", &self.is_nullable)
            .field("is_primary", &self.is_primary)
            .field("is_generated", &self.is_generated)
            .field("is_array", &self.is_array)
            .field("transformers", &self.transformers.len())
            .finish()
    }
}

/// Unique constraint declared on an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueConstraint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Database names of the member columns.
    pub columns: Vec<String>,
}

impl UniqueConstraint {
    pub fn new(columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: None,
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Set the constraint name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Entity metadata: owns its columns and unique constraints.
///
/// Columns do not point back to their entity; operations needing the owner take both.
#[derive(Debug, Clone, Default)]
pub struct EntityMetadata {
    pub name: String,
    pub table_name: String,
    pub columns: Vec<ColumnDescriptor>,
    pub uniques: Vec<UniqueConstraint>,
}

impl EntityMetadata {
    pub fn new(name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table_name: table_name.into(),
            columns: Vec::new(),
            uniques: Vec::new(),
        }
    }

    /// Add a column.
    pub fn with_column(mut self, column: ColumnDescriptor) -> Self {
        self.columns.push(column);
        self
    }

    /// Add a unique constraint.
    pub fn with_unique(mut self, unique: UniqueConstraint) -> Self {
        self.uniques.push(unique);
        self
    }

    pub fn find_column_with_database_name(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.database_name == name)
    }
}
