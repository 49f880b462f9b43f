//! Read-only enforcement for ad-hoc queries.
//!
//! ClickHouse `readonly` levels:
//! - `0`: no restrictions
//! - `1`: read queries only, settings cannot be changed
//! - `2`: read queries only, settings other than `readonly` can be changed
//!
//! Every ad-hoc query is sent with an explicit level. A server at `0` is forced
//! to `1`. A server already at `2` keeps `2`: asking for `1` there is rejected
//! by the engine ("Setting readonly is unknown or readonly").

use crate::db::client::CatalogClient;
use crate::db::params::QueryParams;
use crate::error::DbResult;
use crate::models::CatalogQuery;
use std::fmt;
use tracing::warn;

/// Name of the engine setting.
pub const READONLY_SETTING: &str = "readonly";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOnlyLevel {
    /// `readonly=1`
    ReadOnly,
    /// `readonly=2`
    ReadOnlyAllowSettings,
}

impl ReadOnlyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadOnly => "1",
            Self::ReadOnlyAllowSettings => "2",
        }
    }
}

impl fmt::Display for ReadOnlyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decide the level to force on a query given the server's reported value.
pub fn reconcile_readonly(server_value: Option<&str>) -> ReadOnlyLevel {
    match server_value.map(str::trim) {
        None | Some("") | Some("0") | Some("1") => ReadOnlyLevel::ReadOnly,
        Some("2") => ReadOnlyLevel::ReadOnlyAllowSettings,
        Some(other) => {
            warn!(
                server_value = %other,
                "Unrecognized readonly level reported by server, forcing readonly=1"
            );
            ReadOnlyLevel::ReadOnly
        }
    }
}

/// Read the session's current `readonly` value from `system.settings`.
pub async fn fetch_server_readonly(catalog: &dyn CatalogClient) -> DbResult<Option<String>> {
    let mut params = QueryParams::new();
    let name = params.bind_string(READONLY_SETTING);
    let sql = format!("SELECT value FROM system.settings WHERE name = {}", name);

    let result = catalog.query(CatalogQuery::with_params(sql, params)).await?;
    Ok(result.first_column_strings().into_iter().next())
}

/// Look up the server value and reconcile it in one step.
pub async fn effective_readonly(catalog: &dyn CatalogClient) -> DbResult<ReadOnlyLevel> {
    let server_value = fetch_server_readonly(catalog).await?;
    Ok(reconcile_readonly(server_value.as_deref()))
}
