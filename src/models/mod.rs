//! Data models for the SQL Server driver layer.
//!
//! This module re-exports all model types used throughout the crate.

pub mod column;
pub mod schema;
pub mod value;

// Re-export commonly used types
pub use column::{
    ColumnDescriptor, ColumnType, DefaultValue, EntityMetadata, Length, SqlFunction,
    UniqueConstraint, ValueTransformer,
};
pub use schema::{IntrospectedColumn, TablePath};
pub use value::{MarshaledParameter, Value, ValueMap, ValueMapNode};
