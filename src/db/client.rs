//! Catalog client abstraction and the ClickHouse HTTP implementation.
//!
//! Everything above this module talks to the database through the
//! [`CatalogClient`] trait, so the tool layer can be exercised against an
//! in-memory catalog in tests. [`ClickHouseClient`] is the production
//! implementation over the ClickHouse HTTP interface.

use crate::error::{DbError, DbResult};
use crate::models::{CatalogQuery, ColumnMetadata, QueryResult};
use futures_util::future::BoxFuture;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Output format requested for every statement.
const RESPONSE_FORMAT: &str = "JSONCompact";

/// A connection to the catalog. Implementations must be cheap to share.
pub trait CatalogClient: Send + Sync {
    /// Execute one statement and collect its full result.
    fn query(&self, query: CatalogQuery) -> BoxFuture<'_, DbResult<QueryResult>>;
}

/// Connection settings for [`ClickHouseClient`].
#[derive(Debug, Clone)]
pub struct ClickHouseSettings {
    pub url: Url,
    pub user: String,
    /// Sensitive - never logged.
    pub password: Option<String>,
    pub database: Option<String>,
    pub verify: bool,
    pub connect_timeout: Duration,
    pub send_receive_timeout: Duration,
}

/// ClickHouse HTTP interface client.
pub struct ClickHouseClient {
    client: Client,
    settings: ClickHouseSettings,
}

#[derive(Debug, Deserialize)]
struct JsonCompactResponse {
    #[serde(default)]
    meta: Vec<JsonCompactColumn>,
    #[serde(default)]
    data: Vec<Vec<JsonValue>>,
}

#[derive(Debug, Deserialize)]
struct JsonCompactColumn {
    name: String,
    #[serde(rename = "type")]
    type_name: String,
}

impl ClickHouseClient {
    /// Build a client. No request is sent until the first query.
    pub fn new(settings: ClickHouseSettings) -> DbResult<Self> {
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.send_receive_timeout)
            .danger_accept_invalid_certs(!settings.verify)
            .build()
            .map_err(|e| {
                DbError::connection(
                    format!("Failed to build HTTP client: {}", e),
                    "Check TLS configuration",
                )
            })?;

        Ok(Self { client, settings })
    }

    async fn execute(&self, query: CatalogQuery) -> DbResult<QueryResult> {
        let sql = with_output_format(&query.sql)?;

        let mut url = self.settings.url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(database) = &self.settings.database {
                pairs.append_pair("database", database);
            }
            if let Some(query_id) = &query.query_id {
                pairs.append_pair("query_id", query_id);
            }
            for (name, value) in &query.settings {
                pairs.append_pair(name, value);
            }
            for (name, value) in query.params.to_url_pairs() {
                pairs.append_pair(&name, &value);
            }
        }

        debug!(
            sql = %query.sql,
            params = query.params.len(),
            query_id = ?query.query_id,
            "Sending ClickHouse request"
        );

        let mut request = self
            .client
            .post(url)
            .header("X-ClickHouse-User", &self.settings.user)
            .body(sql);
        if let Some(password) = &self.settings.password {
            request = request.header("X-ClickHouse-Key", password);
        }

        let response = request.send().await.map_err(|e| self.request_error(e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| self.request_error(e))?;

        if !status.is_success() {
            return Err(engine_error(status, &body));
        }

        parse_json_compact(&body)
    }

    /// Attach the limit that fired to timeout errors.
    fn request_error(&self, err: reqwest::Error) -> DbError {
        if !err.is_timeout() {
            return err.into();
        }
        if err.is_connect() {
            DbError::timeout("ClickHouse connect", self.settings.connect_timeout.as_secs())
        } else {
            DbError::timeout(
                "ClickHouse request",
                self.settings.send_receive_timeout.as_secs(),
            )
        }
    }
}

impl CatalogClient for ClickHouseClient {
    fn query(&self, query: CatalogQuery) -> BoxFuture<'_, DbResult<QueryResult>> {
        Box::pin(self.execute(query))
    }
}

impl std::fmt::Debug for ClickHouseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClickHouseClient")
            .field("url", &self.settings.url.as_str())
            .field("user", &self.settings.user)
            .field("password", &"[REDACTED]")
            .field("database", &self.settings.database)
            .finish()
    }
}

/// Ask any catalog for its version string.
pub async fn server_version(catalog: &dyn CatalogClient) -> DbResult<String> {
    let result = catalog.query(CatalogQuery::new("SELECT version()")).await?;
    result
        .first_column_strings()
        .into_iter()
        .next()
        .ok_or_else(|| DbError::internal("version() returned no rows"))
}

/// Append the response format on its own line, so a trailing line comment in
/// the statement cannot swallow it. A statement that already carries a FORMAT
/// clause ends up with two and is rejected by the engine.
fn with_output_format(sql: &str) -> DbResult<String> {
    let trimmed = sql.trim().trim_end_matches(';').trim_end();
    if trimmed.is_empty() {
        return Err(DbError::invalid_input("Query is empty"));
    }

    Ok(format!("{}\nFORMAT {}", trimmed, RESPONSE_FORMAT))
}

fn parse_json_compact(body: &str) -> DbResult<QueryResult> {
    if body.trim().is_empty() {
        return Ok(QueryResult::default());
    }

    let parsed: JsonCompactResponse = serde_json::from_str(body)
        .map_err(|e| DbError::internal(format!("Malformed ClickHouse response: {}", e)))?;

    Ok(QueryResult {
        columns: parsed
            .meta
            .into_iter()
            .map(|c| ColumnMetadata::new(c.name, c.type_name))
            .collect(),
        rows: parsed.data,
    })
}

/// Map a non-2xx response to a typed error, keeping the engine's message.
fn engine_error(status: StatusCode, body: &str) -> DbError {
    let message = body.trim().to_string();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DbError::connection(
            message,
            "Check CLICKHOUSE_USER and CLICKHOUSE_PASSWORD",
        ),
        _ => DbError::database(
            message.clone(),
            parse_exception_code(&message),
            "Check the SQL syntax and referenced objects",
        ),
    }
}

/// Extract `N` from a `Code: N. DB::Exception: ...` message.
fn parse_exception_code(message: &str) -> Option<i32> {
    let rest = message.split("Code: ").nth(1)?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}
