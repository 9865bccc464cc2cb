//! Query primitives for list endpoints.
//!
//! Each query serializes to the backend's JSON query syntax and is sent as a
//! repeated `queries[]` parameter:
//!
//! ```text
//! {"method":"equal","attribute":"userId","values":["u1"]}
//! {"method":"orderDesc","attribute":"$createdAt"}
//! {"method":"limit","values":[12]}
//! ```

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "method")]
pub enum Query {
    #[serde(rename = "equal")]
    Equal { attribute: String, values: Vec<Value> },
    #[serde(rename = "search")]
    Search { attribute: String, values: Vec<Value> },
    #[serde(rename = "orderAsc")]
    OrderAsc { attribute: String },
    #[serde(rename = "orderDesc")]
    OrderDesc { attribute: String },
    #[serde(rename = "limit")]
    Limit { values: [u64; 1] },
    #[serde(rename = "offset")]
    Offset { values: [u64; 1] },
}

impl Query {
    #[must_use]
    pub fn equal(attribute: &str, value: impl Into<Value>) -> Self {
        Self::Equal { attribute: attribute.to_owned(), values: vec![value.into()] }
    }

    #[must_use]
    pub fn search(attribute: &str, text: &str) -> Self {
        Self::Search { attribute: attribute.to_owned(), values: vec![Value::String(text.to_owned())] }
    }

    #[must_use]
    pub fn order_asc(attribute: &str) -> Self {
        Self::OrderAsc { attribute: attribute.to_owned() }
    }

    #[must_use]
    pub fn order_desc(attribute: &str) -> Self {
        Self::OrderDesc { attribute: attribute.to_owned() }
    }

    #[must_use]
    pub fn limit(n: u64) -> Self {
        Self::Limit { values: [n] }
    }

    #[must_use]
    pub fn offset(n: u64) -> Self {
        Self::Offset { values: [n] }
    }

    /// Wire form sent as one `queries[]` value.
    #[must_use]
    pub fn to_param(&self) -> String {
        // Serializing a plain enum of strings and numbers cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// One page of a list request, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u64,
    pub limit: u64,
}

impl Page {
    pub const MAX_LIMIT: u64 = 100;

    /// Clamp caller input: page is at least 1, limit is within `1..=MAX_LIMIT`.
    #[must_use]
    pub fn new(page: Option<u64>, limit: Option<u64>, default_limit: u64) -> Self {
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(default_limit).clamp(1, Self::MAX_LIMIT);
        Self { page, limit }
    }

    #[must_use]
    pub fn offset(self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// `limit` + `offset` queries for this page.
    #[must_use]
    pub fn queries(self) -> [Query; 2] {
        [Query::limit(self.limit), Query::offset(self.offset())]
    }
}

#[cfg(test)]
#[path = "query_test.rs"]
mod tests;
