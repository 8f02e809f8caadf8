//! Query filter DSL for repository reads.
//!
//! Filters are keyed by column name, optionally suffixed with an operator
//! (`"quantity:gte"`, `"name:ilike"`). A bare key is an equality filter.
//! `like`/`ilike` wrap the value in `%...%`; `ilike` matches
//! case-insensitively. Unknown operators are logged and skipped rather
//! than failing the query.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite};
use tracing::warn;

use crate::entities::Id;
use crate::error::Result;
use crate::repositories::validation::ensure_identifier;

/// Filter set applied to a `get_all`/`count` query
pub type FilterMap = BTreeMap<String, FilterValue>;

/// A filter operand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<FilterValue>),
}

impl FilterValue {
    /// Bind this value as a single scalar parameter
    fn bind_scalar(&self, query: &mut QueryBuilder<'_, Sqlite>) {
        match self {
            Self::Bool(value) => {
                query.push_bind(*value);
            }
            Self::Int(value) => {
                query.push_bind(*value);
            }
            Self::Float(value) => {
                query.push_bind(*value);
            }
            Self::Text(value) => {
                query.push_bind(value.clone());
            }
            // A list in scalar position degrades to its JSON rendering
            Self::List(values) => {
                query.push_bind(
                    serde_json::to_string(values).unwrap_or_default(),
                );
            }
        }
    }

    /// `%...%` pattern for like/ilike matching
    fn like_pattern(&self) -> String {
        match self {
            Self::Bool(value) => format!("%{value}%"),
            Self::Int(value) => format!("%{value}%"),
            Self::Float(value) => format!("%{value}%"),
            Self::Text(value) => format!("%{value}%"),
            Self::List(_) => "%%".to_owned(),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&Id> for FilterValue {
    fn from(value: &Id) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<V: Into<FilterValue>> From<Vec<V>> for FilterValue {
    fn from(values: Vec<V>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

/// Comparison operator recognized in compound filter keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    Ilike,
    In,
}

impl FilterOp {
    /// Parse the operator token of a compound filter key
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "eq" => Some(Self::Eq),
            "neq" => Some(Self::Neq),
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            "like" => Some(Self::Like),
            "ilike" => Some(Self::Ilike),
            "in" => Some(Self::In),
            _ => None,
        }
    }

    /// SQL form of the comparison operators
    fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => " = ",
            Self::Neq => " != ",
            Self::Gt => " > ",
            Self::Gte => " >= ",
            Self::Lt => " < ",
            Self::Lte => " <= ",
            Self::Like | Self::Ilike => " LIKE ",
            Self::In => " IN ",
        }
    }
}

/// Options for list queries: filters, ordering, and pagination.
/// `page` is 1-based and converted to an offset against `limit`.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub filters: FilterMap,
    pub order_by: Option<String>,
    pub ascending: bool,
    pub limit: Option<i64>,
    pub page: Option<i64>,
}

/// Append WHERE clauses for the given filter set
pub(crate) fn apply_filters(
    query: &mut QueryBuilder<'_, Sqlite>,
    filters: &FilterMap,
) -> Result<()> {
    let mut has_where = false;

    for (key, value) in filters {
        let (field, op) = match key.split_once(':') {
            Some((field, token)) => match FilterOp::parse(token) {
                Some(op) => (field, op),
                None => {
                    warn!(field, operator = token, "unknown filter operator, skipping");
                    continue;
                }
            },
            None => (key.as_str(), FilterOp::Eq),
        };
        ensure_identifier(field)?;

        // IN requires a list operand; anything else is skipped like an
        // unknown operator
        if op == FilterOp::In && !matches!(value, FilterValue::List(_)) {
            warn!(field, "in filter requires a list value, skipping");
            continue;
        }

        query.push(if has_where { " AND " } else { " WHERE " });
        has_where = true;

        match op {
            FilterOp::In => {
                query.push(field);
                query.push(" IN (");
                if let FilterValue::List(values) = value {
                    if values.is_empty() {
                        query.push("NULL");
                    } else {
                        for (index, item) in values.iter().enumerate() {
                            if index > 0 {
                                query.push(", ");
                            }
                            item.bind_scalar(query);
                        }
                    }
                }
                query.push(")");
            }
            FilterOp::Like => {
                query.push(field);
                query.push(op.as_sql());
                query.push_bind(value.like_pattern());
            }
            FilterOp::Ilike => {
                query.push("LOWER(");
                query.push(field);
                query.push(") LIKE LOWER(");
                query.push_bind(value.like_pattern());
                query.push(")");
            }
            _ => {
                query.push(field);
                query.push(op.as_sql());
                value.bind_scalar(query);
            }
        }
    }

    Ok(())
}
