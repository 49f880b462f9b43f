//! Paginated table listing.
//!
//! The first page of an enumeration takes a snapshot of the matching table
//! names. Later pages walk that snapshot through single-use tokens stored in
//! the [`CursorCache`], so paging visits every name exactly once in snapshot
//! order even if tables are created or dropped in between.

use crate::db::client::CatalogClient;
use crate::db::cursor_cache::{CursorCache, CursorState, ScopeKey};
use crate::db::filter::NameFilter;
use crate::db::schema::SchemaInspector;
use crate::error::DbResult;
use crate::models::Table;
use tracing::info;

/// Default number of tables per page.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Maximum number of tables per page.
pub const MAX_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
pub struct PageRequest {
    pub database: String,
    pub filter: NameFilter,
    pub page_token: Option<String>,
    pub page_size: usize,
    pub include_detailed_columns: bool,
}

impl PageRequest {
    /// Create a first-page request with default options.
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            filter: NameFilter::all(),
            page_token: None,
            page_size: DEFAULT_PAGE_SIZE,
            include_detailed_columns: true,
        }
    }

    pub fn with_filter(mut self, filter: NameFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_page_token(mut self, token: impl Into<String>) -> Self {
        self.page_token = Some(token.into());
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_detailed_columns(mut self, include: bool) -> Self {
        self.include_detailed_columns = include;
        self
    }

    /// Page size clamped to `[1, MAX_PAGE_SIZE]`.
    pub fn effective_page_size(&self) -> usize {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    pub fn scope(&self) -> ScopeKey {
        ScopeKey {
            database: self.database.clone(),
            filter: self.filter.clone(),
            include_detailed_columns: self.include_detailed_columns,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TablePage {
    pub tables: Vec<Table>,
    pub next_page_token: Option<String>,
    /// Size of the whole enumeration snapshot, not of this page
    pub total_tables: usize,
}

pub struct TablePaginator<'a> {
    catalog: &'a dyn CatalogClient,
    cursors: &'a CursorCache,
}

impl<'a> TablePaginator<'a> {
    pub fn new(catalog: &'a dyn CatalogClient, cursors: &'a CursorCache) -> Self {
        Self { catalog, cursors }
    }

    /// Return one page of tables, continuing from `request.page_token` when it
    /// is valid for this request and starting a fresh enumeration otherwise.
    pub async fn list_page(&self, request: &PageRequest) -> DbResult<TablePage> {
        let scope = request.scope();
        let page_size = request.effective_page_size();

        let resumed = match &request.page_token {
            Some(token) => self
                .cursors
                .take(token, &scope)
                .await
                .map(|cursor| (token.as_str(), cursor)),
            None => None,
        };

        if let Some((token, cursor)) = resumed {
            let result = self
                .fetch_page(request, &cursor.state.names, cursor.state.next_index, page_size)
                .await;
            if result.is_err() {
                // Give the token back so the client can retry this page.
                self.cursors.reinstate(token, cursor).await;
            }
            return result;
        }

        let names =
            SchemaInspector::list_table_names(self.catalog, &request.database, &request.filter)
                .await?;
        self.fetch_page(request, &names, 0, page_size).await
    }

    async fn fetch_page(
        &self,
        request: &PageRequest,
        names: &[String],
        start: usize,
        page_size: usize,
    ) -> DbResult<TablePage> {
        let start = start.min(names.len());
        let end = start.saturating_add(page_size).min(names.len());

        let tables = SchemaInspector::fetch_tables(
            self.catalog,
            &request.database,
            &names[start..end],
            request.include_detailed_columns,
        )
        .await?;

        let next_page_token = if end < names.len() {
            let state = CursorState::new(request.scope(), names.to_vec(), end);
            Some(self.cursors.insert(state).await)
        } else {
            None
        };

        info!(
            database = %request.database,
            returned = tables.len(),
            total = names.len(),
            has_more = next_page_token.is_some(),
            "Listed tables page"
        );

        Ok(TablePage {
            tables,
            next_page_token,
            total_tables: names.len(),
        })
    }
}
