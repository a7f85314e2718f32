//! Static SQL Server type tables.
//!
//! Pure data: supported column types, which of them carry a length, a precision
//! or a scale, spatial types, per-type defaults and the types used for columns
//! the ORM manages itself.

/// Default size attributes of a dialect type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TypeDefaults {
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
}

impl TypeDefaults {
    const fn length(length: u32) -> Self {
        Self {
            length: Some(length),
            precision: None,
            scale: None,
        }
    }

    const fn precision(precision: u32) -> Self {
        Self {
            length: None,
            precision: Some(precision),
            scale: None,
        }
    }

    const fn precision_scale(precision: u32, scale: u32) -> Self {
        Self {
            length: None,
            precision: Some(precision),
            scale: Some(scale),
        }
    }
}

/// Dialect types of the columns the ORM creates on its own behalf.
#[derive(Debug, Clone, Copy)]
pub struct MappedColumnTypes {
    pub create_date: &'static str,
    pub create_date_default: &'static str,
    pub update_date: &'static str,
    pub update_date_default: &'static str,
    pub delete_date: &'static str,
    pub delete_date_nullable: bool,
    pub version: &'static str,
    pub tree_level: &'static str,
    pub migration_id: &'static str,
    pub migration_name: &'static str,
    pub migration_timestamp: &'static str,
    pub cache_id: &'static str,
    pub cache_identifier: &'static str,
    pub cache_time: &'static str,
    pub cache_duration: &'static str,
    pub cache_query: &'static str,
    pub cache_result: &'static str,
    pub metadata_type: &'static str,
    pub metadata_database: &'static str,
    pub metadata_schema: &'static str,
    pub metadata_table: &'static str,
    pub metadata_name: &'static str,
    pub metadata_value: &'static str,
}

/// Type capabilities of SQL Server.
#[derive(Debug)]
pub struct TypeCatalog {
    pub supported: &'static [&'static str],
    pub spatial: &'static [&'static str],
    pub with_length: &'static [&'static str],
    pub with_precision: &'static [&'static str],
    pub with_scale: &'static [&'static str],
    pub mapped: MappedColumnTypes,
    /// Maximum length of a generated alias
    pub max_alias_length: usize,
}

static CATALOG: TypeCatalog = TypeCatalog {
    supported: &[
        "int",
        "bigint",
        "bit",
        "decimal",
        "money",
        "numeric",
        "smallint",
        "smallmoney",
        "tinyint",
        "float",
        "real",
        "date",
        "datetime2",
        "datetime",
        "datetimeoffset",
        "smalldatetime",
        "time",
        "char",
        "varchar",
        "text",
        "nchar",
        "nvarchar",
        "ntext",
        "binary",
        "image",
        "varbinary",
        "hierarchyid",
        "sql_variant",
        "timestamp",
        "uniqueidentifier",
        "xml",
        "geometry",
        "geography",
        "rowversion",
    ],
    spatial: &["geometry", "geography"],
    with_length: &["char", "varchar", "nchar", "nvarchar", "binary", "varbinary"],
    with_precision: &["decimal", "numeric", "time", "datetime2", "datetimeoffset"],
    with_scale: &["decimal", "numeric"],
    mapped: MappedColumnTypes {
        create_date: "datetime2",
        create_date_default: "getdate()",
        update_date: "datetime2",
        update_date_default: "getdate()",
        delete_date: "datetime2",
        delete_date_nullable: true,
        version: "int",
        tree_level: "int",
        migration_id: "int",
        migration_name: "varchar",
        migration_timestamp: "bigint",
        cache_id: "int",
        cache_identifier: "nvarchar",
        cache_time: "bigint",
        cache_duration: "int",
        cache_query: "nvarchar(4000)",
        cache_result: "nvarchar(MAX)",
        metadata_type: "varchar",
        metadata_database: "varchar",
        metadata_schema: "varchar",
        metadata_table: "varchar",
        metadata_name: "varchar",
        metadata_value: "nvarchar(MAX)",
    },
    max_alias_length: 128,
};

fn contains(list: &[&str], type_name: &str) -> bool {
    list.iter().any(|t| t.eq_ignore_ascii_case(type_name))
}

impl TypeCatalog {
    /// The SQL Server catalog.
    pub fn get() -> &'static TypeCatalog {
        &CATALOG
    }

    pub fn is_supported(&self, type_name: &str) -> bool {
        contains(self.supported, type_name)
    }

    pub fn is_spatial(&self, type_name: &str) -> bool {
        contains(self.spatial, type_name)
    }

    pub fn supports_length(&self, type_name: &str) -> bool {
        contains(self.with_length, type_name)
    }

    pub fn supports_precision(&self, type_name: &str) -> bool {
        contains(self.with_precision, type_name)
    }

    pub fn supports_scale(&self, type_name: &str) -> bool {
        contains(self.with_scale, type_name)
    }

    /// Default length/precision/scale of a type, if it has any.
    pub fn defaults_for(&self, type_name: &str) -> Option<TypeDefaults> {
        let defaults = match type_name.to_lowercase().as_str() {
            "char" | "nchar" | "binary" | "varbinary" => TypeDefaults::length(1),
            "varchar" | "nvarchar" => TypeDefaults::length(255),
            "decimal" | "numeric" => TypeDefaults::precision_scale(18, 0),
            "time" | "datetime2" | "datetimeoffset" => TypeDefaults::precision(7),
            _ => return None,
        };
        Some(defaults)
    }
}
