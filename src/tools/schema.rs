//! Schema introspection tools.
//!
//! This module implements the `list_databases` and `list_tables` MCP tools.

use crate::db::client::CatalogClient;
use crate::db::cursor_cache::CursorCache;
use crate::db::filter::NameFilter;
use crate::db::pagination::{DEFAULT_PAGE_SIZE, PageRequest, TablePaginator};
use crate::db::schema::SchemaInspector;
use crate::error::{DbError, DbResult};
use crate::models::Table;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// One pattern or a list of patterns.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum PatternInput {
    One(String),
    Many(Vec<String>),
}

impl PatternInput {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(pattern) => vec![pattern],
            Self::Many(patterns) => patterns,
        }
    }
}

fn to_filter(like: Option<PatternInput>, not_like: Option<PatternInput>) -> NameFilter {
    NameFilter::new(
        like.map(PatternInput::into_vec).unwrap_or_default(),
        not_like.map(PatternInput::into_vec).unwrap_or_default(),
    )
}

fn default_true() -> bool {
    true
}

/// Input for the list_databases tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ListDatabasesInput {
    /// LIKE pattern(s) database names must match (any of them)
    #[serde(default)]
    pub like: Option<PatternInput>,
    /// NOT LIKE pattern(s) database names must not match (none of them)
    #[serde(default)]
    pub not_like: Option<PatternInput>,
}

/// Output for the list_databases tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListDatabasesOutput {
    pub databases: Vec<String>,
    pub count: usize,
}

/// Input for the list_tables tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListTablesInput {
    /// Database to list tables from
    pub database: String,
    /// LIKE pattern(s) table names must match (any of them)
    #[serde(default)]
    pub like: Option<PatternInput>,
    /// NOT LIKE pattern(s) table names must not match (none of them)
    #[serde(default)]
    pub not_like: Option<PatternInput>,
    /// Token from a previous call's next_page_token. Tokens are single-use.
    #[serde(default)]
    pub page_token: Option<String>,
    /// Tables per page. Default: 50, max: 1000
    #[serde(default)]
    pub page_size: Option<u32>,
    /// Include column records for each table. Default: true
    #[serde(default = "default_true")]
    pub include_detailed_columns: bool,
}

impl ListTablesInput {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            like: None,
            not_like: None,
            page_token: None,
            page_size: None,
            include_detailed_columns: true,
        }
    }
}

/// Output from the list_tables tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListTablesOutput {
    pub tables: Vec<Table>,
    /// Pass to the next call to continue; null on the last page
    pub next_page_token: Option<String>,
    /// Number of tables in the whole enumeration
    pub total_tables: usize,
}

pub struct SchemaToolHandler {
    catalog: Arc<dyn CatalogClient>,
    cursors: Arc<CursorCache>,
    default_page_size: usize,
}

impl SchemaToolHandler {
    pub fn new(catalog: Arc<dyn CatalogClient>, cursors: Arc<CursorCache>) -> Self {
        Self::with_page_size(catalog, cursors, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(
        catalog: Arc<dyn CatalogClient>,
        cursors: Arc<CursorCache>,
        default_page_size: usize,
    ) -> Self {
        Self {
            catalog,
            cursors,
            default_page_size,
        }
    }

    pub async fn list_databases(&self, input: ListDatabasesInput) -> DbResult<ListDatabasesOutput> {
        let filter = to_filter(input.like, input.not_like);
        let databases = SchemaInspector::list_databases(self.catalog.as_ref(), &filter).await?;
        let count = databases.len();

        info!(count = count, "Listed databases");

        Ok(ListDatabasesOutput { databases, count })
    }

    pub async fn list_tables(&self, input: ListTablesInput) -> DbResult<ListTablesOutput> {
        if input.database.trim().is_empty() {
            return Err(DbError::invalid_input(
                "database is required. Call list_databases first to discover available databases.",
            ));
        }

        let page_size = input
            .page_size
            .map(|size| size as usize)
            .unwrap_or(self.default_page_size);

        let mut request = PageRequest::new(input.database)
            .with_filter(to_filter(input.like, input.not_like))
            .with_page_size(page_size)
            .with_detailed_columns(input.include_detailed_columns);
        if let Some(token) = input.page_token.filter(|t| !t.is_empty()) {
            request = request.with_page_token(token);
        }

        let paginator = TablePaginator::new(self.catalog.as_ref(), self.cursors.as_ref());
        let page = paginator.list_page(&request).await?;

        Ok(ListTablesOutput {
            tables: page.tables,
            next_page_token: page.next_page_token,
            total_tables: page.total_tables,
        })
    }
}
