//! Parameter binding utilities for catalog queries.
//!
//! ClickHouse's HTTP interface supports server-side query parameters: the SQL
//! carries typed placeholders such as `{p0:String}` and the values travel as
//! `param_p0=...` URL parameters. Values are parsed by the server in the
//! *escaped* text format, so backslashes and control characters must be escaped.

/// Ordered set of bound string parameters with generated placeholder names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    values: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a string value and return the placeholder to embed in SQL.
    pub fn bind_string(&mut self, value: impl Into<String>) -> String {
        let name = format!("p{}", self.values.len());
        let placeholder = format!("{{{}:String}}", name);
        self.values.push((name, value.into()));
        placeholder
    }

    /// Look up a bound value by placeholder name (without braces or type).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// URL query pairs in the form the HTTP interface expects.
    pub(crate) fn to_url_pairs(&self) -> Vec<(String, String)> {
        self.values
            .iter()
            .map(|(n, v)| (format!("param_{}", n), escape_param_value(v)))
            .collect()
    }
}

/// Escape a value for the ClickHouse escaped text format.
pub fn escape_param_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '\t' => escaped.push_str("\\t"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\0' => escaped.push_str("\\0"),
            other => escaped.push(other),
        }
    }
    escaped
}
