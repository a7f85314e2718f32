//! SQL Server driver layer for an object-relational mapper.
//!
//! This library maps declared column metadata onto SQL Server types, converts
//! values on their way to and from the database, rewrites named query
//! parameters into positional ones and routes connections between a primary
//! and its read replicas.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;

pub use config::SqlServerOptions;
pub use db::{Parameter, SqlServerDriver};
pub use error::{DriverError, DriverResult};
