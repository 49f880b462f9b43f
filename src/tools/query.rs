//! Query execution tool.
//!
//! This module implements the `run_select_query` MCP tool. Every outcome,
//! including engine errors and timeouts, is returned as a structured result
//! rather than a protocol error.

use crate::db::executor::{Cancellation, QueryExecutor, QueryOutcome};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::info;

/// Input for the run_select_query tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RunSelectQueryInput {
    /// SQL query to run. Executed with readonly enforcement.
    pub query: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
pub struct CancellationOutput {
    /// The server stopped waiting for the query
    pub requested: bool,
    /// The query never reached the database. When false it may still be running there.
    pub confirmed: bool,
}

impl From<Cancellation> for CancellationOutput {
    fn from(cancellation: Cancellation) -> Self {
        Self {
            requested: cancellation.requested,
            confirmed: cancellation.confirmed,
        }
    }
}

/// Output from the run_select_query tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct RunSelectQueryOutput {
    pub status: QueryStatus,
    /// Column names in result order
    pub columns: Vec<String>,
    /// Result rows, one value per column
    pub rows: Vec<Vec<JsonValue>>,
    pub row_count: usize,
    pub execution_time_ms: u64,
    /// Error description when status is "error"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// "timeout", "execution" or "internal"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    /// Present when the query was abandoned on timeout
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation: Option<CancellationOutput>,
}

impl From<QueryOutcome> for RunSelectQueryOutput {
    fn from(outcome: QueryOutcome) -> Self {
        match outcome {
            QueryOutcome::Success {
                result,
                execution_time_ms,
            } => Self {
                status: QueryStatus::Success,
                columns: result.column_names(),
                row_count: result.row_count(),
                rows: result.rows,
                execution_time_ms,
                message: None,
                error_kind: None,
                cancellation: None,
            },
            QueryOutcome::Failed(failure) => Self {
                status: QueryStatus::Error,
                columns: Vec::new(),
                rows: Vec::new(),
                row_count: 0,
                execution_time_ms: 0,
                message: Some(failure.message),
                error_kind: Some(failure.kind.as_str().to_string()),
                cancellation: failure.cancellation.map(Into::into),
            },
        }
    }
}

pub struct QueryToolHandler {
    executor: Arc<QueryExecutor>,
}

impl QueryToolHandler {
    pub fn new(executor: Arc<QueryExecutor>) -> Self {
        Self { executor }
    }

    pub async fn run_select_query(&self, input: RunSelectQueryInput) -> RunSelectQueryOutput {
        info!(query = %input.query, "Running select query");
        self.executor.run(&input.query).await.into()
    }
}
