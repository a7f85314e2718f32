//! Integration tests for type normalization and default rendering.

use mssql_orm_driver::db::TypeCatalog;
use mssql_orm_driver::db::types::{compute_full_type, normalize_default, normalize_type};
use mssql_orm_driver::models::{ColumnDescriptor, DefaultValue, Length, SqlFunction};

#[test]
fn test_documented_normalizations() {
    assert_eq!(normalize_type(&ColumnDescriptor::new("id", "integer")), "int");
    assert_eq!(normalize_type(&ColumnDescriptor::new("v", "rowversion")), "timestamp");
    assert_eq!(
        compute_full_type(&ColumnDescriptor::new("name", "varchar")),
        "varchar(255)"
    );
}

#[test]
fn test_every_logical_type_maps_to_a_supported_type() {
    let catalog = TypeCatalog::get();
    for logical in [
        "integer",
        "string",
        "boolean",
        "timestamp",
        "date",
        "time",
        "binary",
        "uuid",
        "rowversion",
        "dec",
        "double precision",
        "simple-array",
        "simple-json",
        "simple-enum",
    ] {
        let dialect = normalize_type(&ColumnDescriptor::new("c", logical));
        assert!(
            catalog.is_supported(&dialect),
            "{} normalized to unsupported {}",
            logical,
            dialect
        );
    }
}

#[test]
fn test_native_names_pass_through() {
    for native in ["datetime2", "money", "NVARCHAR", "geography", "text"] {
        assert_eq!(normalize_type(&ColumnDescriptor::new("c", native)), native);
    }
}

#[test]
fn test_full_type_rendering() {
    let cases = vec![
        (ColumnDescriptor::new("a", "string"), "nvarchar(255)"),
        (ColumnDescriptor::new("a", "nvarchar").with_length(Length::Max), "nvarchar(MAX)"),
        (ColumnDescriptor::new("a", "char").with_length(2), "char(2)"),
        (
            ColumnDescriptor::new("a", "decimal").with_precision(12).with_scale(4),
            "decimal(12,4)",
        ),
        (ColumnDescriptor::new("a", "datetime2").with_precision(0), "datetime2(0)"),
        (ColumnDescriptor::new("a", "int").with_length(4), "int"),
        (ColumnDescriptor::new("a", "uuid"), "uniqueidentifier"),
        (ColumnDescriptor::new("a", "int").array(true), "int array"),
    ];

    for (column, expected) in cases {
        assert_eq!(compute_full_type(&column), expected);
    }
}

#[test]
fn test_default_rendering() {
    let render = |default: DefaultValue| {
        normalize_default(&ColumnDescriptor::new("c", "nvarchar").with_default(default))
    };

    assert_eq!(render(DefaultValue::Numeric(42.0)).as_deref(), Some("42"));
    assert_eq!(render(DefaultValue::Numeric(1.5)).as_deref(), Some("1.5"));
    assert_eq!(render(DefaultValue::Boolean(true)).as_deref(), Some("1"));
    assert_eq!(render(DefaultValue::Boolean(false)).as_deref(), Some("0"));
    assert_eq!(
        render(DefaultValue::Literal("it's".to_string())).as_deref(),
        Some("'it''s'")
    );
    assert_eq!(
        render(DefaultValue::computed("NEWSEQUENTIALID()")).as_deref(),
        Some("NEWSEQUENTIALID()")
    );
    assert_eq!(
        render(DefaultValue::Computed(SqlFunction::new(|| "current_timestamp".to_string())))
            .as_deref(),
        Some("getdate()")
    );
    assert_eq!(normalize_default(&ColumnDescriptor::new("c", "int")), None);
}

#[test]
fn test_managed_column_types_are_supported() {
    let catalog = TypeCatalog::get();
    let mapped = catalog.mapped;
    for dialect in [
        mapped.create_date,
        mapped.update_date,
        mapped.delete_date,
        mapped.version,
        mapped.migration_name,
        mapped.migration_timestamp,
        mapped.cache_identifier,
    ] {
        assert!(catalog.is_supported(dialect), "{} is not supported", dialect);
    }
    assert!(mapped.delete_date_nullable);
}
