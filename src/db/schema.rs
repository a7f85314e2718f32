//! Schema drift detection.
//!
//! Compares the columns an entity declares with the columns introspected from
//! the live table.

use crate::db::types::{
    column_length, lower_default_value_if_necessary, normalize_default, normalize_is_unique,
    normalize_type,
};
use crate::models::{ColumnDescriptor, EntityMetadata, IntrospectedColumn};
use tracing::debug;

/// Names of the attributes that differ between a declared column and its live counterpart.
pub fn column_differences(
    entity: &EntityMetadata,
    column: &ColumnDescriptor,
    live: &IntrospectedColumn,
) -> Vec<&'static str> {
    let mut differences = Vec::new();

    if live.name != column.database_name {
        differences.push("name");
    }
    if !live.data_type.eq_ignore_ascii_case(&normalize_type(column)) {
        differences.push("type");
    }
    if live.length != column_length(column) {
        differences.push("length");
    }
    if live.precision != column.precision {
        differences.push("precision");
    }
    if live.scale != column.scale {
        differences.push("scale");
    }
    // generated columns may carry a default the database also reports
    if !column.is_generated
        && lower_default_value_if_necessary(normalize_default(column).as_deref())
            != lower_default_value_if_necessary(live.default.as_deref())
    {
        differences.push("default");
    }
    if live.is_primary != column.is_primary {
        differences.push("primary");
    }
    if live.is_nullable != column.is_nullable {
        differences.push("nullable");
    }
    if live.is_unique != normalize_is_unique(entity, column) {
        differences.push("unique");
    }
    if live.is_generated != column.is_generated {
        differences.push("generated");
    }

    differences
}

/// Declared columns that differ from their introspected counterpart.
///
/// Declared columns missing from the table are additions, not changes, and are skipped.
pub fn find_changed_columns<'a>(
    introspected: &[IntrospectedColumn],
    entity: &'a EntityMetadata,
) -> Vec<&'a ColumnDescriptor> {
    entity
        .columns
        .iter()
        .filter(|column| {
            let Some(live) = introspected
                .iter()
                .find(|live| live.name == column.database_name)
            else {
                return false;
            };

            let differences = column_differences(entity, column, live);
            if differences.is_empty() {
                return false;
            }

            debug!(
                table = %entity.table_name,
                column = %column.database_name,
                differences = ?differences,
                "Column differs from database"
            );
            true
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DefaultValue, Length, UniqueConstraint};

    fn entity(column: ColumnDescriptor) -> EntityMetadata {
        EntityMetadata::new("Item", "items").with_column(column)
    }

    #[test]
    fn test_identical_column_not_reported() {
        let entity = entity(ColumnDescriptor::new("name", "varchar").nullable(true));
        let live = vec![
            IntrospectedColumn::new("name", "varchar")
                .with_length(255)
                .nullable(true),
        ];
        assert!(find_changed_columns(&live, &entity).is_empty());
    }

    #[test]
    fn test_type_comparison_ignores_case() {
        let entity = entity(ColumnDescriptor::new("id", "integer"));
        let live = vec![IntrospectedColumn::new("id", "INT")];
        assert!(find_changed_columns(&live, &entity).is_empty());
    }

    #[test]
    fn test_max_length_matches() {
        let entity = entity(ColumnDescriptor::new("body", "nvarchar").with_length(Length::Max));
        let live = vec![IntrospectedColumn::new("body", "nvarchar").with_length(Length::Max)];
        assert!(find_changed_columns(&live, &entity).is_empty());
    }

    #[test]
    fn test_missing_column_skipped() {
        let entity = entity(ColumnDescriptor::new("added", "int"));
        assert!(find_changed_columns(&[], &entity).is_empty());
    }

    #[test]
    fn test_reports_each_difference() {
        let column = ColumnDescriptor::new("price", "decimal")
            .with_precision(10)
            .with_scale(2)
            .with_default(DefaultValue::Numeric(0.0));
        let entity = entity(column).with_unique(UniqueConstraint::new(["price"]));
        let live = IntrospectedColumn::new("price", "decimal")
            .with_precision(12)
            .with_scale(2)
            .with_default("0")
            .nullable(true);

        let differences = column_differences(&entity, &entity.columns[0], &live);
        assert_eq!(differences, vec!["precision", "nullable", "unique"]);
    }
}
