//! In-memory catalog used by the integration tests.
//!
//! `FakeCatalog` answers the statements the server generates against the
//! `system` tables, evaluating LIKE / NOT LIKE on the bound parameters the
//! way ClickHouse would. Any statement that carries a `query_id` is treated
//! as an ad-hoc query: it is recorded with its settings, can be slowed down
//! or made to fail, and counts toward the observed concurrency.

#![allow(dead_code)]

use clickhouse_mcp_server::db::CatalogClient;
use clickhouse_mcp_server::error::{DbError, DbResult};
use clickhouse_mcp_server::models::{CatalogQuery, ColumnMetadata, QueryResult};
use futures_util::future::BoxFuture;
use serde_json::{Value as JsonValue, json};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FakeColumn {
    pub name: String,
    pub column_type: String,
    pub comment: String,
}

impl FakeColumn {
    pub fn new(name: &str, column_type: &str, comment: &str) -> Self {
        Self {
            name: name.to_string(),
            column_type: column_type.to_string(),
            comment: comment.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FakeTable {
    pub name: String,
    pub comment: String,
    pub columns: Vec<FakeColumn>,
}

impl FakeTable {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            comment: String::new(),
            columns: vec![FakeColumn::new("id", "UInt64", "")],
        }
    }

    pub fn with_columns(mut self, columns: Vec<FakeColumn>) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = comment.to_string();
        self
    }
}

/// Decrements the active counter when an ad-hoc query ends or is dropped.
struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct FakeCatalog {
    databases: Mutex<Vec<(String, Vec<FakeTable>)>>,
    readonly: Mutex<Option<String>>,
    slow_query_delay: Mutex<Duration>,
    fail_hydration: AtomicBool,
    log: Mutex<Vec<CatalogQuery>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl Default for FakeCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self {
            databases: Mutex::new(vec![
                ("default".to_string(), Vec::new()),
                ("system".to_string(), Vec::new()),
            ]),
            readonly: Mutex::new(Some("0".to_string())),
            slow_query_delay: Mutex::new(Duration::from_secs(5)),
            fail_hydration: AtomicBool::new(false),
            log: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    pub fn with_database(self, name: &str, tables: Vec<FakeTable>) -> Self {
        {
            let mut databases = self.databases.lock().unwrap();
            databases.retain(|(db, _)| db != name);
            databases.push((name.to_string(), tables));
        }
        self
    }

    /// Add a database whose tables are named `{prefix}{i:03}` for `0..count`.
    pub fn with_numbered_tables(self, database: &str, prefix: &str, count: usize) -> Self {
        let tables = (0..count)
            .map(|i| FakeTable::new(&format!("{}{:03}", prefix, i)))
            .collect();
        self.with_database(database, tables)
    }

    pub fn with_readonly(self, value: Option<&str>) -> Self {
        *self.readonly.lock().unwrap() = value.map(str::to_string);
        self
    }

    pub fn with_slow_query_delay(self, delay: Duration) -> Self {
        *self.slow_query_delay.lock().unwrap() = delay;
        self
    }

    pub fn add_table(&self, database: &str, table: FakeTable) {
        let mut databases = self.databases.lock().unwrap();
        if let Some((_, tables)) = databases.iter_mut().find(|(db, _)| db == database) {
            tables.push(table);
        }
    }

    pub fn drop_table(&self, database: &str, table: &str) {
        let mut databases = self.databases.lock().unwrap();
        if let Some((_, tables)) = databases.iter_mut().find(|(db, _)| db == database) {
            tables.retain(|t| t.name != table);
        }
    }

    pub fn set_fail_hydration(&self, fail: bool) {
        self.fail_hydration.store(fail, Ordering::SeqCst);
    }

    /// Every statement received, in arrival order.
    pub fn queries(&self) -> Vec<CatalogQuery> {
        self.log.lock().unwrap().clone()
    }

    /// Statements that carried a query id (ad-hoc queries).
    pub fn adhoc_queries(&self) -> Vec<CatalogQuery> {
        self.queries()
            .into_iter()
            .filter(|q| q.query_id.is_some())
            .collect()
    }

    /// Query ids named in `KILL QUERY` statements.
    pub fn killed_query_ids(&self) -> Vec<String> {
        self.queries()
            .into_iter()
            .filter(|q| q.sql.starts_with("KILL QUERY"))
            .filter_map(|q| q.params.get("p0").map(str::to_string))
            .collect()
    }

    pub fn count_queries_containing(&self, fragment: &str) -> usize {
        self.queries()
            .iter()
            .filter(|q| q.sql.contains(fragment))
            .count()
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    fn tables_of(&self, database: &str) -> Vec<FakeTable> {
        self.databases
            .lock()
            .unwrap()
            .iter()
            .find(|(db, _)| db == database)
            .map(|(_, tables)| tables.clone())
            .unwrap_or_default()
    }

    fn answer(&self, query: &CatalogQuery) -> DbResult<QueryResult> {
        let sql = query.sql.as_str();

        if sql == "SELECT version()" {
            return Ok(single_column("version()", vec![json!("24.8.1.1")]));
        }

        if sql.starts_with("KILL QUERY") {
            return Ok(QueryResult::default());
        }

        if sql.contains("FROM system.settings") {
            let value = self.readonly.lock().unwrap().clone();
            return Ok(single_column(
                "value",
                value.into_iter().map(JsonValue::String).collect(),
            ));
        }

        if sql.starts_with("SELECT name FROM system.databases") {
            let names = self
                .databases
                .lock()
                .unwrap()
                .iter()
                .map(|(db, _)| db.clone())
                .filter(|db| passes_filter(sql, query, db))
                .map(JsonValue::String)
                .collect();
            return Ok(single_column("name", names));
        }

        if sql.starts_with("SELECT name FROM system.tables") {
            let database = param(query, "p0");
            let names = self
                .tables_of(&database)
                .into_iter()
                .map(|t| t.name)
                .filter(|name| passes_filter(sql, query, name))
                .map(JsonValue::String)
                .collect();
            return Ok(single_column("name", names));
        }

        if sql.contains("FROM system.tables") && sql.contains("name IN (") {
            if self.fail_hydration.load(Ordering::SeqCst) {
                return Err(DbError::connection(
                    "Connection reset by peer",
                    "Check that ClickHouse is reachable",
                ));
            }
            return Ok(self.hydrate_tables(query));
        }

        if sql.contains("FROM system.columns") {
            return Ok(self.hydrate_columns(query));
        }

        if sql.contains("no_such_table") {
            return Err(DbError::database(
                "Code: 60. DB::Exception: Table default.no_such_table does not exist. (UNKNOWN_TABLE)",
                Some(60),
                "Check the SQL syntax and referenced objects",
            ));
        }

        Ok(single_column("1", vec![json!(1)]))
    }

    fn hydrate_tables(&self, query: &CatalogQuery) -> QueryResult {
        let database = param(query, "p0");
        let wanted: Vec<String> = query
            .params
            .iter()
            .skip(1)
            .map(|(_, v)| v.to_string())
            .collect();

        let columns = [
            "database",
            "name",
            "engine",
            "create_table_query",
            "dependencies_database",
            "dependencies_table",
            "engine_full",
            "sorting_key",
            "primary_key",
            "total_rows",
            "total_bytes",
            "total_bytes_uncompressed",
            "parts",
            "active_parts",
            "total_marks",
            "comment",
        ]
        .iter()
        .map(|name| ColumnMetadata::new(*name, "String"))
        .collect();

        // Reverse catalog order so callers cannot rely on it.
        let rows = self
            .tables_of(&database)
            .into_iter()
            .rev()
            .filter(|t| wanted.contains(&t.name))
            .map(|t| {
                vec![
                    json!(database),
                    json!(t.name),
                    json!("MergeTree"),
                    json!(format!(
                        "CREATE TABLE {}.{} (id UInt64) ENGINE = MergeTree ORDER BY id",
                        database, t.name
                    )),
                    json!([]),
                    json!([]),
                    json!("MergeTree ORDER BY id SETTINGS index_granularity = 8192"),
                    json!("id"),
                    json!("id"),
                    json!("100"),
                    json!("2048"),
                    json!("4096"),
                    json!(1),
                    json!(1),
                    json!("2"),
                    json!(t.comment),
                ]
            })
            .collect();

        QueryResult { columns, rows }
    }

    fn hydrate_columns(&self, query: &CatalogQuery) -> QueryResult {
        let database = param(query, "p0");
        let table = param(query, "p1");

        let columns = [
            "database",
            "table",
            "name",
            "column_type",
            "default_kind",
            "default_expression",
            "comment",
        ]
        .iter()
        .map(|name| ColumnMetadata::new(*name, "String"))
        .collect();

        let rows = self
            .tables_of(&database)
            .into_iter()
            .find(|t| t.name == table)
            .map(|t| {
                t.columns
                    .iter()
                    .map(|c| {
                        vec![
                            json!(database),
                            json!(table),
                            json!(c.name),
                            json!(c.column_type),
                            json!(""),
                            json!(""),
                            json!(c.comment),
                        ]
                    })
                    .collect()
            })
            .unwrap_or_default();

        QueryResult { columns, rows }
    }
}

impl CatalogClient for FakeCatalog {
    fn query(&self, query: CatalogQuery) -> BoxFuture<'_, DbResult<QueryResult>> {
        Box::pin(async move {
            self.log.lock().unwrap().push(query.clone());

            if query.query_id.is_none() {
                return self.answer(&query);
            }

            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            let _guard = ActiveGuard(&self.active);

            if query.sql.contains("sleep") {
                let delay = *self.slow_query_delay.lock().unwrap();
                tokio::time::sleep(delay).await;
            }

            self.answer(&query)
        })
    }
}

fn single_column(name: &str, values: Vec<JsonValue>) -> QueryResult {
    QueryResult {
        columns: vec![ColumnMetadata::new(name, "String")],
        rows: values.into_iter().map(|v| vec![v]).collect(),
    }
}

fn param(query: &CatalogQuery, name: &str) -> String {
    query.params.get(name).unwrap_or_default().to_string()
}

/// Evaluate the `name LIKE` / `name NOT LIKE` groups of a generated predicate.
fn passes_filter(sql: &str, query: &CatalogQuery, value: &str) -> bool {
    let like = placeholders_after(sql, "name LIKE {");
    let not_like = placeholders_after(sql, "name NOT LIKE {");

    let included = like.is_empty()
        || like
            .iter()
            .any(|p| like_match(&param(query, p), value));
    let excluded = not_like
        .iter()
        .any(|p| like_match(&param(query, p), value));

    included && !excluded
}

fn placeholders_after(sql: &str, marker: &str) -> Vec<String> {
    sql.match_indices(marker)
        .filter_map(|(at, _)| {
            let rest = &sql[at + marker.len()..];
            rest.split(':').next().map(str::to_string)
        })
        .collect()
}

/// SQL LIKE: `%` matches any run, `_` one character, `\` escapes.
pub fn like_match(pattern: &str, value: &str) -> bool {
    fn go(p: &[char], v: &[char]) -> bool {
        match p.first() {
            None => v.is_empty(),
            Some('%') => (0..=v.len()).any(|skip| go(&p[1..], &v[skip..])),
            Some('_') => !v.is_empty() && go(&p[1..], &v[1..]),
            Some('\\') if p.len() > 1 => v.first() == Some(&p[1]) && go(&p[2..], &v[1..]),
            Some(c) => v.first() == Some(c) && go(&p[1..], &v[1..]),
        }
    }

    let p: Vec<char> = pattern.chars().collect();
    let v: Vec<char> = value.chars().collect();
    go(&p, &v)
}
