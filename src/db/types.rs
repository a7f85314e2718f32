//! Logical to dialect type normalization.
//!
//! This module maps declared column metadata onto SQL Server type names and
//! renders the full type and default-value literals used when synchronizing
//! schema.

use crate::db::catalog::TypeCatalog;
use crate::models::{ColumnDescriptor, ColumnType, DefaultValue, EntityMetadata, Length};

/// Length assumed for variable-length text columns declared without one.
pub const DEFAULT_TEXT_LENGTH: u32 = 255;

/// Map a declared column onto its SQL Server type name.
///
/// Dialect-native names are returned unchanged; a column without a type yields an empty string.
pub fn normalize_type(column: &ColumnDescriptor) -> String {
    match &column.column_type {
        Some(column_type) => dialect_type_name(column_type).to_string(),
        None => String::new(),
    }
}

/// SQL Server type name for a logical type.
pub fn dialect_type_name(column_type: &ColumnType) -> &str {
    match column_type {
        ColumnType::Integer => "int",
        ColumnType::Text => "nvarchar",
        ColumnType::Boolean => "bit",
        ColumnType::Timestamp => "datetime",
        ColumnType::Date => "date",
        ColumnType::Time => "time",
        ColumnType::Binary => "binary",
        ColumnType::Uuid => "uniqueidentifier",
        ColumnType::Decimal => "decimal",
        ColumnType::Double => "float",
        ColumnType::RowVersion => "timestamp",
        ColumnType::SimpleArray | ColumnType::SimpleJson => "ntext",
        ColumnType::SimpleEnum => "nvarchar",
        ColumnType::Native(name) => name,
    }
}

/// Resolve the length of a column: the explicit one, or 255 for variable-length text.
///
/// SQL Server would otherwise default `varchar`/`nvarchar` to a length of 1.
pub fn column_length(column: &ColumnDescriptor) -> Option<Length> {
    if let Some(length) = column.length {
        return Some(length);
    }

    let is_variable_text = matches!(column.column_type, Some(ColumnType::Text))
        || matches!(
            normalize_type(column).to_lowercase().as_str(),
            "varchar" | "nvarchar"
        );

    is_variable_text.then_some(Length::Fixed(DEFAULT_TEXT_LENGTH))
}

/// Render the type with its size attributes, e.g. `nvarchar(255)` or `decimal(10,2)`.
///
/// Length wins over precision/scale.
pub fn compute_full_type(column: &ColumnDescriptor) -> String {
    let mut full_type = normalize_type(column);
    let catalog = TypeCatalog::get();

    let length = column_length(column).filter(|_| catalog.supports_length(&full_type));

    if let Some(length) = length {
        full_type.push_str(&format!("({})", length));
    } else if let (Some(precision), Some(scale)) = (column.precision, column.scale) {
        full_type.push_str(&format!("({},{})", precision, scale));
    } else if let Some(precision) = column.precision {
        full_type.push_str(&format!("({})", precision));
    }

    if column.is_array {
        full_type.push_str(" array");
    }

    full_type
}

/// Render the declared default as a SQL literal.
///
/// Computed defaults are inlined raw; string literals are quoted.
pub fn normalize_default(column: &ColumnDescriptor) -> Option<String> {
    let default = column.default.as_ref()?;

    let literal = match default {
        DefaultValue::Numeric(n) => n.to_string(),
        DefaultValue::Boolean(b) => String::from(if *b { "1" } else { "0" }),
        DefaultValue::Computed(f) => {
            let expression = f.call();
            if expression.trim().eq_ignore_ascii_case("CURRENT_TIMESTAMP") {
                "getdate()".to_string()
            } else {
                expression
            }
        }
        DefaultValue::Literal(s) => quote_literal(s),
    };

    Some(literal)
}

/// Wrap a string in single quotes, doubling embedded quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// True if the entity declares a unique constraint on exactly this column.
pub fn normalize_is_unique(entity: &EntityMetadata, column: &ColumnDescriptor) -> bool {
    entity
        .uniques
        .iter()
        .any(|unique| unique.columns.len() == 1 && unique.columns[0] == column.database_name)
}

/// Lowercase everything outside string literals.
///
/// SQL Server stores built-in function defaults in lowercase, so `GETDATE()` and `getdate()`
/// must compare equal while `'ABC'` and `'abc'` must not. A quote inside a literal is written
/// as `''` and does not end it.
pub fn lower_default_value_if_necessary(value: Option<&str>) -> Option<String> {
    let value = value?;
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    let mut in_literal = false;

    while let Some(c) = chars.next() {
        if c == '\'' {
            result.push(c);
            if in_literal && chars.peek() == Some(&'\'') {
                // escaped quote, still inside
                if let Some(next) = chars.next() {
                    result.push(next);
                }
            } else {
                in_literal = !in_literal;
            }
        } else if in_literal {
            result.push(c);
        } else {
            result.extend(c.to_lowercase());
        }
    }

    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UniqueConstraint;

    #[test]
    fn test_normalize_logical_types() {
        assert_eq!(normalize_type(&ColumnDescriptor::new("a", "integer")), "int");
        assert_eq!(normalize_type(&ColumnDescriptor::new("a", "rowversion")), "timestamp");
        assert_eq!(normalize_type(&ColumnDescriptor::new("a", "simple-json")), "ntext");
        assert_eq!(normalize_type(&ColumnDescriptor::new("a", "double precision")), "float");
        assert_eq!(normalize_type(&ColumnDescriptor::new("a", "datetime2")), "datetime2");
        assert_eq!(normalize_type(&ColumnDescriptor::default()), "");
    }

    #[test]
    fn test_column_length() {
        assert_eq!(
            column_length(&ColumnDescriptor::new("a", "varchar")),
            Some(Length::Fixed(255))
        );
        assert_eq!(
            column_length(&ColumnDescriptor::new("a", "string")),
            Some(Length::Fixed(255))
        );
        assert_eq!(
            column_length(&ColumnDescriptor::new("a", "char").with_length(3)),
            Some(Length::Fixed(3))
        );
        assert_eq!(column_length(&ColumnDescriptor::new("a", "char")), None);
        assert_eq!(column_length(&ColumnDescriptor::new("a", "int")), None);
    }

    #[test]
    fn test_compute_full_type() {
        assert_eq!(compute_full_type(&ColumnDescriptor::new("a", "varchar")), "varchar(255)");
        assert_eq!(
            compute_full_type(&ColumnDescriptor::new("a", "nvarchar").with_length(Length::Max)),
            "nvarchar(MAX)"
        );
        assert_eq!(
            compute_full_type(&ColumnDescriptor::new("a", "decimal").with_precision(10).with_scale(2)),
            "decimal(10,2)"
        );
        assert_eq!(
            compute_full_type(&ColumnDescriptor::new("a", "datetime2").with_precision(3)),
            "datetime2(3)"
        );
        assert_eq!(compute_full_type(&ColumnDescriptor::new("a", "int")), "int");
        assert_eq!(
            compute_full_type(&ColumnDescriptor::new("a", "int").array(true)),
            "int array"
        );
    }

    #[test]
    fn test_normalize_default() {
        let col = |d| ColumnDescriptor::new("a", "nvarchar").with_default(d);
        assert_eq!(normalize_default(&col(DefaultValue::Numeric(5.0))).as_deref(), Some("5"));
        assert_eq!(normalize_default(&col(DefaultValue::Numeric(1.5))).as_deref(), Some("1.5"));
        assert_eq!(normalize_default(&col(DefaultValue::Boolean(true))).as_deref(), Some("1"));
        assert_eq!(normalize_default(&col(DefaultValue::Boolean(false))).as_deref(), Some("0"));
        assert_eq!(
            normalize_default(&col(DefaultValue::Literal("it's".into()))).as_deref(),
            Some("'it''s'")
        );
        assert_eq!(
            normalize_default(&col(DefaultValue::computed("NEWID()"))).as_deref(),
            Some("NEWID()")
        );
        assert_eq!(
            normalize_default(&col(DefaultValue::computed("current_timestamp"))).as_deref(),
            Some("getdate()")
        );
        assert_eq!(normalize_default(&ColumnDescriptor::new("a", "int")), None);
    }

    #[test]
    fn test_normalize_is_unique_requires_single_column_constraint() {
        let entity = EntityMetadata::new("User", "users")
            .with_column(ColumnDescriptor::new("email", "nvarchar"))
            .with_column(ColumnDescriptor::new("first", "nvarchar"))
            .with_unique(UniqueConstraint::new(["email"]))
            .with_unique(UniqueConstraint::new(["first", "email"]));

        assert!(normalize_is_unique(&entity, &entity.columns[0]));
        assert!(!normalize_is_unique(&entity, &entity.columns[1]));
    }

    #[test]
    fn test_lower_default_value_keeps_literals() {
        assert_eq!(lower_default_value_if_necessary(Some("GETDATE()")).as_deref(), Some("getdate()"));
        assert_eq!(lower_default_value_if_necessary(Some("'ABC'")).as_deref(), Some("'ABC'"));
        assert_eq!(
            lower_default_value_if_necessary(Some("CONCAT('A''B', UPPER('C'))")).as_deref(),
            Some("concat('A''B', upper('C'))")
        );
        assert_eq!(lower_default_value_if_necessary(None), None);
    }
}
