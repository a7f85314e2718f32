//! SQL Server driver layer.
//!
//! This module provides the driver functionality:
//! - Static type catalog
//! - Type normalization and default-value rendering
//! - Value marshaling in both directions
//! - Named parameter rewriting
//! - Schema drift detection
//! - Primary/replica pool routing
//! - The driver facade tying them together

pub mod catalog;
pub mod driver;
pub mod marshal;
pub mod params;
pub mod pool;
pub mod schema;
pub mod types;

pub use catalog::TypeCatalog;
pub use driver::{SqlServerDriver, SqlServerDriverBuilder};
pub use params::{Parameter, RewrittenQuery};
pub use pool::{
    ConnectionPool, PoolErrorHandler, PoolFactory, ReplicaPoolRouter, RouterState,
    default_pool_error_handler,
};
