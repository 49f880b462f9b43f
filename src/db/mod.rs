//! Database abstraction layer.
//!
//! This module provides ClickHouse access functionality:
//! - HTTP catalog client
//! - Name filters and bound query parameters
//! - Schema enumeration and detail hydration
//! - Cursor cache and paginated table listing
//! - Read-only reconciliation and the bounded query executor

pub mod client;
pub mod cursor_cache;
pub mod executor;
pub mod filter;
pub mod pagination;
pub mod params;
pub mod readonly;
pub mod schema;

pub use client::{CatalogClient, ClickHouseClient, ClickHouseSettings, server_version};
pub use cursor_cache::{Clock, CursorCache, CursorState, ScopeKey, SystemClock, TakenCursor};
pub use executor::{Cancellation, FailureKind, QueryExecutor, QueryFailure, QueryOutcome};
pub use filter::NameFilter;
pub use pagination::{PageRequest, TablePage, TablePaginator};
pub use params::QueryParams;
pub use readonly::{ReadOnlyLevel, reconcile_readonly};
pub use schema::SchemaInspector;
