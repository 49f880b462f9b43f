//! Query-related data models.
//!
//! This module defines the shape of catalog requests and results as they
//! travel between the tool layer and the ClickHouse client.

use crate::db::params::QueryParams;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Default query timeout in seconds.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

/// Default number of concurrently executing `run_select_query` calls.
pub const DEFAULT_QUERY_POOL_SIZE: usize = 10;

/// A single statement sent to the catalog.
#[derive(Debug, Clone, Default)]
pub struct CatalogQuery {
    pub sql: String,
    pub params: QueryParams,
    /// Per-query engine settings, sent in order
    pub settings: Vec<(String, String)>,
    pub query_id: Option<String>,
}

impl CatalogQuery {
    /// Create a query with no bound parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            ..Default::default()
        }
    }

    /// Create a query together with its bound parameters.
    pub fn with_params(sql: impl Into<String>, params: QueryParams) -> Self {
        Self {
            sql: sql.into(),
            params,
            ..Default::default()
        }
    }

    /// Attach an engine setting.
    pub fn setting(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.push((name.into(), value.into()));
        self
    }

    /// Tag the query so it can be found in `system.processes`.
    pub fn query_id(mut self, query_id: impl Into<String>) -> Self {
        self.query_id = Some(query_id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    /// ClickHouse type (e.g., "UInt64", "Nullable(String)")
    pub type_name: String,
    pub nullable: bool,
}

impl ColumnMetadata {
    /// Create column metadata from a ClickHouse type name.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        let nullable = type_name.starts_with("Nullable(");
        Self {
            name: name.into(),
            type_name,
            nullable,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<ColumnMetadata>,
    /// Positional rows, one value per column
    pub rows: Vec<Vec<JsonValue>>,
}

impl QueryResult {
    /// Get the number of rows in the result.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Check if the result is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names in result order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Rows keyed by column name, ready for typed deserialization.
    pub fn records(&self) -> Vec<serde_json::Map<String, JsonValue>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row.iter())
                    .map(|(col, value)| (col.name.clone(), value.clone()))
                    .collect()
            })
            .collect()
    }

    /// First column of every row as a string. Non-string values are skipped.
    pub fn first_column_strings(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|row| row.first())
            .filter_map(|v| v.as_str().map(String::from))
            .collect()
    }
}
