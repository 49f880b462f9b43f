//! Data models for the ClickHouse MCP Server.
//!
//! This module re-exports all model types used throughout the application.

pub mod query;
pub mod schema;

// Re-export commonly used types
pub use query::{
    CatalogQuery, ColumnMetadata, DEFAULT_QUERY_POOL_SIZE, DEFAULT_QUERY_TIMEOUT_SECS,
    QueryResult,
};
pub use schema::{Column, Table, TableDependency};
