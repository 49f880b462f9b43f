//! MCP tool implementations.
//!
//! This module contains the ClickHouse tool handlers:
//! - `list_databases`: List databases, optionally filtered by name patterns
//! - `list_tables`: Paginated table listing with optional column detail
//! - `run_select_query`: Execute a query under readonly enforcement

pub mod query;
pub mod schema;

pub use query::{QueryToolHandler, RunSelectQueryInput, RunSelectQueryOutput};
pub use schema::{
    ListDatabasesInput, ListDatabasesOutput, ListTablesInput, ListTablesOutput, PatternInput,
    SchemaToolHandler,
};
