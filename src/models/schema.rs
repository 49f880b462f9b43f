//! Schema-related data models.
//!
//! `Table` and `Column` mirror the rows of `system.tables` and `system.columns`.
//! They are decoded from catalog records through the private `*Row` types,
//! which absorb ClickHouse's wire quirks (quoted 64-bit integers, empty strings
//! standing in for NULL, parallel dependency arrays).

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TableDependency {
    pub database: String,
    pub table: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Column {
    pub database: String,
    pub table: String,
    pub name: String,
    /// ClickHouse type, e.g. `LowCardinality(String)`
    pub column_type: String,
    /// DEFAULT, MATERIALIZED, ALIAS or EPHEMERAL
    pub default_kind: Option<String>,
    pub default_expression: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Table {
    pub database: String,
    pub name: String,
    pub engine: String,
    pub create_table_query: String,
    /// Objects that depend on this table (e.g. materialized views)
    pub dependencies: Vec<TableDependency>,
    pub engine_full: String,
    pub sorting_key: String,
    pub primary_key: String,
    /// NULL for engines that do not track row counts
    pub total_rows: Option<u64>,
    pub total_bytes: Option<u64>,
    pub total_bytes_uncompressed: Option<u64>,
    pub parts: Option<u64>,
    pub active_parts: Option<u64>,
    pub total_marks: Option<u64>,
    pub comment: Option<String>,
    /// Empty unless detailed columns were requested
    pub columns: Vec<Column>,
}

#[derive(Debug, Deserialize)]
struct TableRow {
    database: String,
    name: String,
    engine: String,
    create_table_query: String,
    #[serde(default)]
    dependencies_database: Vec<String>,
    #[serde(default)]
    dependencies_table: Vec<String>,
    engine_full: String,
    sorting_key: String,
    primary_key: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    total_rows: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    total_bytes: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    total_bytes_uncompressed: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    parts: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    active_parts: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    total_marks: Option<u64>,
    #[serde(default)]
    comment: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ColumnRow {
    database: String,
    table: String,
    name: String,
    column_type: String,
    #[serde(default)]
    default_kind: Option<String>,
    #[serde(default)]
    default_expression: Option<String>,
    #[serde(default)]
    comment: Option<String>,
}

impl Table {
    /// Decode a `system.tables` record. `columns` starts empty.
    pub fn from_record(record: serde_json::Map<String, JsonValue>) -> serde_json::Result<Self> {
        let row: TableRow = serde_json::from_value(JsonValue::Object(record))?;
        let dependencies = row
            .dependencies_database
            .into_iter()
            .zip(row.dependencies_table)
            .map(|(database, table)| TableDependency { database, table })
            .collect();

        Ok(Self {
            database: row.database,
            name: row.name,
            engine: row.engine,
            create_table_query: row.create_table_query,
            dependencies,
            engine_full: row.engine_full,
            sorting_key: row.sorting_key,
            primary_key: row.primary_key,
            total_rows: row.total_rows,
            total_bytes: row.total_bytes,
            total_bytes_uncompressed: row.total_bytes_uncompressed,
            parts: row.parts,
            active_parts: row.active_parts,
            total_marks: row.total_marks,
            comment: non_empty(row.comment),
            columns: Vec::new(),
        })
    }
}

impl Column {
    /// Decode a `system.columns` record.
    pub fn from_record(record: serde_json::Map<String, JsonValue>) -> serde_json::Result<Self> {
        let row: ColumnRow = serde_json::from_value(JsonValue::Object(record))?;
        Ok(Self {
            database: row.database,
            table: row.table,
            name: row.name,
            column_type: row.column_type,
            default_kind: non_empty(row.default_kind),
            default_expression: non_empty(row.default_expression),
            comment: non_empty(row.comment),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// ClickHouse quotes 64-bit integers in JSON output by default.
fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<JsonValue>::deserialize(deserializer)? {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("not an unsigned integer: {}", n))),
        Some(JsonValue::String(s)) => s
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("not an unsigned integer: {}", s))),
        Some(other) => Err(serde::de::Error::custom(format!(
            "unexpected value for integer column: {}",
            other
        ))),
    }
}
