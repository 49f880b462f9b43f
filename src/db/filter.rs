//! Name filters for catalog enumeration.
//!
//! A filter is a set of include (`LIKE`) and exclude (`NOT LIKE`) patterns in
//! ClickHouse wildcard syntax. Include patterns are OR-combined, exclude
//! patterns are AND-combined, and the two groups are joined with AND. An
//! empty group places no restriction.

use crate::db::params::QueryParams;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct NameFilter {
    pub like: Vec<String>,
    pub not_like: Vec<String>,
}

impl NameFilter {
    pub fn new(like: Vec<String>, not_like: Vec<String>) -> Self {
        Self { like, not_like }
    }

    /// Filter that matches every name.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.like.is_empty() && self.not_like.is_empty()
    }

    /// Render the filter as a boolean SQL fragment over `column`, binding every
    /// pattern into `params`.
    pub fn predicate(&self, column: &str, params: &mut QueryParams) -> String {
        let mut groups = Vec::with_capacity(2);

        if !self.like.is_empty() {
            let conditions: Vec<String> = self
                .like
                .iter()
                .map(|p| format!("{} LIKE {}", column, params.bind_string(p.as_str())))
                .collect();
            groups.push(format!("({})", conditions.join(" OR ")));
        }

        if !self.not_like.is_empty() {
            let conditions: Vec<String> = self
                .not_like
                .iter()
                .map(|p| format!("{} NOT LIKE {}", column, params.bind_string(p.as_str())))
                .collect();
            groups.push(format!("({})", conditions.join(" AND ")));
        }

        if groups.is_empty() {
            "true".to_string()
        } else {
            groups.join(" AND ")
        }
    }
}
