//! Schema introspection module.
//!
//! Name enumeration and detail hydration over ClickHouse's `system` tables.
//! Every user-supplied value is bound as a query parameter.
//!
//! Detail hydration fetches core table fields for a whole page in one round
//! trip, then, when detailed columns are requested, issues one
//! `system.columns` query per table. That fan-out is bounded by the page size,
//! not by the number of tables in the database.

use crate::db::client::CatalogClient;
use crate::db::filter::NameFilter;
use crate::db::params::QueryParams;
use crate::error::{DbError, DbResult};
use crate::models::{CatalogQuery, Column, Table};
use std::collections::HashMap;
use tracing::debug;

// =============================================================================
// SQL Query Templates
// =============================================================================

mod queries {
    pub const TABLE_FIELDS: &str = "database, name, engine, create_table_query, \
        dependencies_database, dependencies_table, engine_full, sorting_key, primary_key, \
        total_rows, total_bytes, total_bytes_uncompressed, parts, active_parts, total_marks, comment";

    pub const COLUMN_FIELDS: &str = "database, table, name, type AS column_type, \
        default_kind, default_expression, comment";
}

/// Schema inspector for catalog introspection.
pub struct SchemaInspector;

impl SchemaInspector {
    /// List database names matching `filter`, in catalog order.
    pub async fn list_databases(
        catalog: &dyn CatalogClient,
        filter: &NameFilter,
    ) -> DbResult<Vec<String>> {
        let mut params = QueryParams::new();
        let predicate = filter.predicate("name", &mut params);
        let sql = format!("SELECT name FROM system.databases WHERE {}", predicate);

        let result = catalog.query(CatalogQuery::with_params(sql, params)).await?;
        Ok(result.first_column_strings())
    }

    /// List table names in `database` matching `filter`, in catalog order.
    pub async fn list_table_names(
        catalog: &dyn CatalogClient,
        database: &str,
        filter: &NameFilter,
    ) -> DbResult<Vec<String>> {
        let mut params = QueryParams::new();
        let database = params.bind_string(database);
        let predicate = filter.predicate("name", &mut params);
        let sql = format!(
            "SELECT name FROM system.tables WHERE database = {} AND {}",
            database, predicate
        );

        let result = catalog.query(CatalogQuery::with_params(sql, params)).await?;
        Ok(result.first_column_strings())
    }

    /// Hydrate `names` into full table records, returned in the order of `names`.
    ///
    /// Tables that vanished since enumeration are skipped.
    pub async fn fetch_tables(
        catalog: &dyn CatalogClient,
        database: &str,
        names: &[String],
        include_detailed_columns: bool,
    ) -> DbResult<Vec<Table>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let mut params = QueryParams::new();
        let database_param = params.bind_string(database);
        let name_params: Vec<String> = names
            .iter()
            .map(|name| params.bind_string(name.as_str()))
            .collect();
        let sql = format!(
            "SELECT {} FROM system.tables WHERE database = {} AND name IN ({})",
            queries::TABLE_FIELDS,
            database_param,
            name_params.join(", ")
        );

        let result = catalog.query(CatalogQuery::with_params(sql, params)).await?;
        let mut by_name: HashMap<String, Table> = HashMap::with_capacity(result.row_count());
        for record in result.records() {
            let table = Table::from_record(record).map_err(|e| {
                DbError::internal(format!("Unexpected system.tables row shape: {}", e))
            })?;
            by_name.insert(table.name.clone(), table);
        }

        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            match by_name.remove(name) {
                Some(table) => tables.push(table),
                None => debug!(database = %database, table = %name, "Table vanished before hydration"),
            }
        }

        if include_detailed_columns {
            for table in &mut tables {
                table.columns = Self::fetch_columns(catalog, database, &table.name).await?;
            }
        }

        Ok(tables)
    }

    /// Fetch the column records of one table, in declaration order.
    pub async fn fetch_columns(
        catalog: &dyn CatalogClient,
        database: &str,
        table: &str,
    ) -> DbResult<Vec<Column>> {
        let mut params = QueryParams::new();
        let database = params.bind_string(database);
        let table = params.bind_string(table);
        let sql = format!(
            "SELECT {} FROM system.columns WHERE database = {} AND table = {} ORDER BY position",
            queries::COLUMN_FIELDS,
            database,
            table
        );

        let result = catalog.query(CatalogQuery::with_params(sql, params)).await?;
        result
            .records()
            .into_iter()
            .map(|record| {
                Column::from_record(record).map_err(|e| {
                    DbError::internal(format!("Unexpected system.columns row shape: {}", e))
                })
            })
            .collect()
    }
}
