//! MCP service implementation using rmcp.
//!
//! This module defines the ClickHouseService struct with the ClickHouse tools
//! exposed via the MCP protocol using the rmcp framework's macros.

use crate::db::client::CatalogClient;
use crate::db::cursor_cache::CursorCache;
use crate::db::executor::QueryExecutor;
use crate::db::pagination::DEFAULT_PAGE_SIZE;
use crate::tools::query::{QueryToolHandler, RunSelectQueryInput, RunSelectQueryOutput};
use crate::tools::schema::{
    ListDatabasesInput, ListDatabasesOutput, ListTablesInput, ListTablesOutput, SchemaToolHandler,
};
use rmcp::Json;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct ClickHouseService {
    /// Catalog client shared by all tools
    catalog: Arc<dyn CatalogClient>,
    /// Cursor store for list_tables pagination
    cursors: Arc<CursorCache>,
    /// Bounded executor for run_select_query
    executor: Arc<QueryExecutor>,
    /// Page size used when list_tables omits one
    default_page_size: usize,
    /// Tool router for MCP tool dispatch (auto-generated)
    tool_router: ToolRouter<Self>,
}

impl ClickHouseService {
    pub fn new(
        catalog: Arc<dyn CatalogClient>,
        cursors: Arc<CursorCache>,
        executor: Arc<QueryExecutor>,
    ) -> Self {
        Self::with_page_size(catalog, cursors, executor, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(
        catalog: Arc<dyn CatalogClient>,
        cursors: Arc<CursorCache>,
        executor: Arc<QueryExecutor>,
        default_page_size: usize,
    ) -> Self {
        Self {
            catalog,
            cursors,
            executor,
            default_page_size,
            tool_router: Self::tool_router(),
        }
    }

    pub fn catalog(&self) -> &Arc<dyn CatalogClient> {
        &self.catalog
    }

    fn schema_handler(&self) -> SchemaToolHandler {
        SchemaToolHandler::with_page_size(
            self.catalog.clone(),
            self.cursors.clone(),
            self.default_page_size,
        )
    }
}

#[tool_router]
impl ClickHouseService {
    #[tool(
        description = "List databases on the ClickHouse server.\nOptionally filter names with `like` and exclude with `not_like` (SQL LIKE patterns, a string or a list)."
    )]
    async fn list_databases(
        &self,
        Parameters(input): Parameters<ListDatabasesInput>,
    ) -> Result<Json<ListDatabasesOutput>, McpError> {
        self.schema_handler()
            .list_databases(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "List tables in a database with engine, keys, sizes, comments and columns.\nResults are paginated: pass `next_page_token` back as `page_token` to get the next page. Tokens are single-use and expire.\nSet `include_detailed_columns` to false to skip column records."
    )]
    async fn list_tables(
        &self,
        Parameters(input): Parameters<ListTablesInput>,
    ) -> Result<Json<ListTablesOutput>, McpError> {
        self.schema_handler()
            .list_tables(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Run a SQL query in readonly mode and return column names and rows.\nFailures and timeouts are reported with status \"error\". A timed-out query may keep running on the server unless `cancellation.confirmed` is true."
    )]
    async fn run_select_query(
        &self,
        Parameters(input): Parameters<RunSelectQueryInput>,
    ) -> Json<RunSelectQueryOutput> {
        let handler = QueryToolHandler::new(self.executor.clone());
        Json(handler.run_select_query(input).await)
    }
}

#[tool_handler]
impl ServerHandler for ClickHouseService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "clickhouse-mcp-server".to_owned(),
                title: Some("ClickHouse MCP Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Tools for exploring and querying a ClickHouse server.\n\
                \n\
                ## Workflow\n\
                1. Call `list_databases` to discover databases\n\
                2. Call `list_tables` with a `database` to inspect tables and columns\n\
                3. Call `run_select_query` to read data\n\
                \n\
                ## Pagination\n\
                `list_tables` returns at most `page_size` tables. When `next_page_token` is not null,\n\
                call again with the same `database`, filters and `include_detailed_columns` plus\n\
                `page_token`. A token works once; a stale or reused token restarts from the first page.\n\
                \n\
                ## Queries\n\
                Queries always run with readonly enforcement and a timeout. Write statements are\n\
                rejected by the server."
                    .to_string(),
            ),
        }
    }
}
