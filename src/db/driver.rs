//! SQL Server driver facade.
//!
//! This is the surface the query runner talks to. It owns the pool router and
//! delegates type, value and parameter handling to the stateless modules of
//! this crate.

use crate::config::SqlServerOptions;
use crate::db::catalog::TypeCatalog;
use crate::db::marshal;
use crate::db::params::{self, Parameter, RewrittenQuery};
use crate::db::pool::{PoolFactory, ReplicaPoolRouter, RouterState};
use crate::db::schema;
use crate::db::types;
use crate::error::{DriverError, DriverResult};
use crate::models::{
    ColumnDescriptor, EntityMetadata, IntrospectedColumn, Length, MarshaledParameter, TablePath,
    Value, ValueMap,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Builder for [`SqlServerDriver`].
pub struct SqlServerDriverBuilder<F: PoolFactory> {
    factory: Option<F>,
    options: SqlServerOptions,
}

impl<F: PoolFactory> SqlServerDriverBuilder<F> {
    /// Register the client library used to open pools.
    pub fn factory(mut self, factory: F) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn options(mut self, options: SqlServerOptions) -> Self {
        self.options = options;
        self
    }

    /// Fails with `DependencyMissing` when no factory was registered.
    pub fn build(self) -> DriverResult<SqlServerDriver<F>> {
        let factory = self
            .factory
            .ok_or_else(|| DriverError::dependency_missing("SQL Server pool factory"))?;
        self.options.pool.validate()?;

        Ok(SqlServerDriver {
            router: ReplicaPoolRouter::new(factory, self.options),
        })
    }
}

/// SQL Server driver.
pub struct SqlServerDriver<F: PoolFactory> {
    router: ReplicaPoolRouter<F>,
}

impl<F: PoolFactory> SqlServerDriver<F> {
    pub fn builder() -> SqlServerDriverBuilder<F> {
        SqlServerDriverBuilder {
            factory: None,
            options: SqlServerOptions::default(),
        }
    }

    pub fn options(&self) -> &SqlServerOptions {
        self.router.options()
    }

    pub fn router(&self) -> &ReplicaPoolRouter<F> {
        &self.router
    }

    pub fn state(&self) -> RouterState {
        self.router.state()
    }

    /// Database of the primary: recorded on connect, else the configured one.
    pub fn database(&self) -> Option<&str> {
        self.router
            .database()
            .or(self.options().primary_credentials().database.as_deref())
    }

    /// Default schema.
    pub fn schema(&self) -> Option<&str> {
        self.options().schema.as_deref()
    }

    // =========================================================================
    // Connection lifecycle
    // =========================================================================

    pub async fn connect(&mut self) -> DriverResult<()> {
        self.router.connect().await
    }

    pub async fn disconnect(&mut self) -> DriverResult<()> {
        self.router.disconnect().await
    }

    pub async fn obtain_master_connection(&self) -> DriverResult<Arc<F::Pool>> {
        self.router.obtain_master_connection().await
    }

    pub async fn obtain_slave_connection(&self) -> DriverResult<Arc<F::Pool>> {
        self.router.obtain_slave_connection().await
    }

    // =========================================================================
    // Capabilities
    // =========================================================================

    /// `OUTPUT INSERTED.*` is available.
    pub fn is_returning_sql_supported(&self) -> bool {
        true
    }

    /// `NEWSEQUENTIALID()` / `NEWID()` are available.
    pub fn is_uuid_generation_supported(&self) -> bool {
        true
    }

    pub fn is_full_text_column_type_supported(&self) -> bool {
        false
    }

    pub fn catalog(&self) -> &'static TypeCatalog {
        TypeCatalog::get()
    }

    // =========================================================================
    // Query text
    // =========================================================================

    pub fn escape_query_with_parameters(
        &self,
        sql: &str,
        parameters: &HashMap<String, Parameter>,
        native_parameters: impl IntoIterator<Item = Value>,
    ) -> RewrittenQuery {
        params::escape_query_with_parameters(sql, parameters, native_parameters)
    }

    /// Quote an identifier: `name` becomes `"name"`.
    pub fn escape(&self, identifier: &str) -> String {
        format!("\"{}\"", identifier.replace('"', "\"\""))
    }

    /// Compose `schema.table`, `database..table` or `database.schema.table`.
    pub fn build_table_name(
        &self,
        table_name: &str,
        schema: Option<&str>,
        database: Option<&str>,
    ) -> String {
        let mut path = Vec::with_capacity(3);
        if let Some(database) = database.filter(|d| !d.is_empty()) {
            path.push(database);
            path.push(schema.unwrap_or(""));
        } else if let Some(schema) = schema.filter(|s| !s.is_empty()) {
            path.push(schema);
        }
        path.push(table_name);
        path.join(".")
    }

    /// Split a possibly qualified table name, filling gaps from the driver defaults.
    pub fn parse_table_name(&self, target: &str) -> TablePath {
        let parts: Vec<&str> = target.split('.').collect();
        let non_empty = |s: &str| Some(s).filter(|s| !s.is_empty()).map(String::from);

        let (database, schema, table_name) = match parts.as_slice() {
            [database, schema, table] => (
                non_empty(*database).or(self.database().map(String::from)),
                non_empty(*schema).or(self.schema().map(String::from)),
                table.to_string(),
            ),
            [schema, table] => (
                self.database().map(String::from),
                non_empty(*schema),
                table.to_string(),
            ),
            _ => (
                self.database().map(String::from),
                self.schema().map(String::from),
                target.to_string(),
            ),
        };

        TablePath {
            database,
            schema,
            table_name,
        }
    }

    /// Positional marker for the parameter at `index`.
    pub fn create_parameter(&self, name: &str, index: usize) -> String {
        params::create_parameter(name, index)
    }

    /// `DECLARE @id TABLE ("a" int, "b" nvarchar(255))`
    pub fn build_table_variable_declaration(
        &self,
        identifier: &str,
        columns: &[ColumnDescriptor],
    ) -> String {
        let definitions = columns
            .iter()
            .map(|column| {
                format!(
                    "{} {}",
                    self.escape(&column.database_name),
                    types::compute_full_type(column)
                )
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("DECLARE {} TABLE ({})", identifier, definitions)
    }

    // =========================================================================
    // Types and values
    // =========================================================================

    pub fn normalize_type(&self, column: &ColumnDescriptor) -> String {
        types::normalize_type(column)
    }

    pub fn normalize_default(&self, column: &ColumnDescriptor) -> Option<String> {
        types::normalize_default(column)
    }

    pub fn normalize_is_unique(&self, entity: &EntityMetadata, column: &ColumnDescriptor) -> bool {
        types::normalize_is_unique(entity, column)
    }

    pub fn column_length(&self, column: &ColumnDescriptor) -> Option<Length> {
        types::column_length(column)
    }

    pub fn compute_full_type(&self, column: &ColumnDescriptor) -> String {
        types::compute_full_type(column)
    }

    pub fn prepare_persistent_value(&self, value: Value, column: &ColumnDescriptor) -> Value {
        marshal::prepare_persistent_value(value, column)
    }

    pub fn prepare_hydrated_value(
        &self,
        value: Value,
        column: &ColumnDescriptor,
    ) -> DriverResult<Value> {
        marshal::prepare_hydrated_value(value, column)
    }

    pub fn parametrize_value(&self, column: &ColumnDescriptor, value: Value) -> MarshaledParameter {
        marshal::parametrize_value(column, value)
    }

    /// Generated values of an insert, keyed by property path.
    ///
    /// Returned columns the entity does not know are ignored; `None` when nothing matched.
    pub fn create_generated_map(
        &self,
        entity: &EntityMetadata,
        insert_result: Option<&[(String, Value)]>,
    ) -> DriverResult<Option<ValueMap>> {
        let Some(row) = insert_result else {
            return Ok(None);
        };

        let mut map = ValueMap::new();
        for (name, value) in row {
            let Some(column) = entity.find_column_with_database_name(name) else {
                debug!(column = %name, entity = %entity.name, "Ignoring unknown returned column");
                continue;
            };
            let hydrated = self.prepare_hydrated_value(value.clone(), column)?;
            map.insert_path(&column.property_path, hydrated);
        }
        Ok((!map.is_empty()).then_some(map))
    }

    // =========================================================================
    // Schema
    // =========================================================================

    pub fn find_changed_columns<'a>(
        &self,
        introspected: &[IntrospectedColumn],
        entity: &'a EntityMetadata,
    ) -> Vec<&'a ColumnDescriptor> {
        schema::find_changed_columns(introspected, entity)
    }
}

impl<F: PoolFactory> std::fmt::Debug for SqlServerDriver<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlServerDriver")
            .field("router", &self.router)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConnectionCredentials, PoolConnectOptions};
    use crate::db::pool::{ConnectionPool, PoolErrorHandler};

    struct Pool;

    impl ConnectionPool for Pool {
        async fn close(&self) -> DriverResult<()> {
            Ok(())
        }
    }

    struct Factory;

    impl PoolFactory for Factory {
        type Pool = Pool;

        async fn create_pool(
            &self,
            _options: PoolConnectOptions,
            _on_error: PoolErrorHandler,
        ) -> DriverResult<Pool> {
            Ok(Pool)
        }
    }

    fn driver() -> SqlServerDriver<Factory> {
        let mut options =
            SqlServerOptions::new(ConnectionCredentials::new("localhost").with_database("app"));
        options.schema = Some("dbo".to_string());
        SqlServerDriver::builder()
            .factory(Factory)
            .options(options)
            .build()
            .unwrap()
    }

    #[test]
    fn test_build_without_factory_fails() {
        let err = SqlServerDriver::<Factory>::builder().build().unwrap_err();
        assert!(matches!(err, DriverError::DependencyMissing { .. }));
        assert!(err.to_string().contains("pool factory"));
    }

    #[test]
    fn test_escape() {
        let driver = driver();
        assert_eq!(driver.escape("name"), "\"name\"");
        assert_eq!(driver.escape("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_build_table_name() {
        let driver = driver();
        assert_eq!(driver.build_table_name("users", None, None), "users");
        assert_eq!(driver.build_table_name("users", Some("dbo"), None), "dbo.users");
        assert_eq!(driver.build_table_name("users", None, Some("app")), "app..users");
        assert_eq!(
            driver.build_table_name("users", Some("dbo"), Some("app")),
            "app.dbo.users"
        );
    }

    #[test]
    fn test_parse_table_name() {
        let driver = driver();
        assert_eq!(
            driver.parse_table_name("users"),
            TablePath::new("users").with_schema("dbo").with_database("app")
        );
        assert_eq!(
            driver.parse_table_name("sales.orders"),
            TablePath::new("orders").with_schema("sales").with_database("app")
        );
        assert_eq!(
            driver.parse_table_name("other..orders"),
            TablePath::new("orders").with_schema("dbo").with_database("other")
        );
        assert_eq!(
            driver.parse_table_name("other.sales.orders"),
            TablePath::new("orders").with_schema("sales").with_database("other")
        );
    }

    #[test]
    fn test_capabilities() {
        let driver = driver();
        assert!(driver.is_returning_sql_supported());
        assert!(driver.is_uuid_generation_supported());
        assert!(!driver.is_full_text_column_type_supported());
        assert_eq!(driver.create_parameter("id", 2), "@2");
    }

    #[test]
    fn test_table_variable_declaration() {
        let driver = driver();
        let columns = vec![
            ColumnDescriptor::new("id", "integer"),
            ColumnDescriptor::new("name", "varchar"),
        ];
        assert_eq!(
            driver.build_table_variable_declaration("@OutputTable", &columns),
            "DECLARE @OutputTable TABLE (\"id\" int, \"name\" varchar(255))"
        );
    }
}
