//! Query-string driven filtering, sorting, field selection and pagination
//!
//! [`QueryFeatures`] wraps the raw query-string pairs of a list request and
//! builds a backend-neutral [`ListQuery`] through four chainable steps:
//!
//! ```rust,ignore
//! let query = QueryFeatures::<Tour>::new(params)
//!     .filter()
//!     .sort()
//!     .limit_fields()
//!     .paginate()
//!     .into_query();
//!
//! // GET /tours?difficulty=easy&price[gte]=500&sort=-price,name&fields=name,price&page=2&limit=5
//! ```
//!
//! Malformed input never fails the request: unusable clauses are dropped and
//! pagination falls back to its defaults.

use crate::core::timestamp;
use regex::Regex;
use serde_json::{Value, json};
use std::marker::PhantomData;
use std::sync::LazyLock;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 100;
pub const DEFAULT_SORT: &str = "-createdAt";
pub const VERSION_FIELD: &str = "__v";

/// Keys consumed by sort/fields/pagination and never treated as filters
const RESERVED_PARAMS: [&str; 4] = ["page", "sort", "limit", "fields"];

static FILTER_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)(?:\[([a-z]+)\])?$")
        .expect("filter key pattern is valid")
});

static FIELD_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*$")
        .expect("field name pattern is valid")
});

/// Projections select whole top-level fields only
static PROJECTED_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("projected field pattern is valid")
});

/// How a field's query-string values are coerced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Number,
    Integer,
    Boolean,
    Date,
    String,
}

/// Field metadata a resource exposes to the query builder
pub trait Queryable {
    /// Kind of a known field, `None` for fields the model does not declare
    fn field_kind(field: &str) -> Option<FieldKind>;

    /// Fields left out of reads unless explicitly selected
    fn hidden_fields() -> &'static [&'static str] {
        &[]
    }

    /// Fields that can never be read, filtered or sorted on
    fn protected_fields() -> &'static [&'static str] {
        &[]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gte,
    Gt,
    Lte,
    Lt,
}

impl FilterOp {
    fn parse(raw: Option<&str>) -> Option<Self> {
        match raw {
            None => Some(FilterOp::Eq),
            Some("gte") => Some(FilterOp::Gte),
            Some("gt") => Some(FilterOp::Gt),
            Some("lte") => Some(FilterOp::Lte),
            Some("lt") => Some(FilterOp::Lt),
            Some(_) => None,
        }
    }

    /// MongoDB comparison operator, `None` for plain equality
    pub fn mongo_operator(self) -> Option<&'static str> {
        match self {
            FilterOp::Eq => None,
            FilterOp::Gte => Some("$gte"),
            FilterOp::Gt => Some("$gt"),
            FilterOp::Lte => Some("$lte"),
            FilterOp::Lt => Some("$lt"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl FieldFilter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: Value) -> Self {
        Self {
            field: field.into(),
            op,
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// Keep only these fields (plus `id`)
    Include(Vec<String>),
    /// Drop these fields
    Exclude(Vec<String>),
}

impl Default for Projection {
    fn default() -> Self {
        Projection::Exclude(Vec::new())
    }
}

/// A backend-neutral list query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub filters: Vec<FieldFilter>,
    pub sort: Vec<SortKey>,
    pub projection: Projection,
    pub skip: u64,
    pub limit: Option<u64>,
}

/// Chainable builder turning query-string pairs into a [`ListQuery`]
pub struct QueryFeatures<T> {
    params: Vec<(String, String)>,
    query: ListQuery,
    _marker: PhantomData<T>,
}

impl<T: Queryable> QueryFeatures<T> {
    pub fn new(params: Vec<(String, String)>) -> Self {
        Self {
            params,
            query: ListQuery::default(),
            _marker: PhantomData,
        }
    }

    /// Run every step with the default order
    pub fn apply(params: Vec<(String, String)>) -> ListQuery {
        Self::new(params)
            .filter()
            .sort()
            .limit_fields()
            .paginate()
            .into_query()
    }

    /// Last value of a reserved parameter
    fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Translate `field=value` and `field[op]=value` pairs into filters
    pub fn filter(mut self) -> Self {
        let mut filters: Vec<FieldFilter> = Vec::new();

        for (key, raw) in &self.params {
            if RESERVED_PARAMS.contains(&key.as_str()) {
                continue;
            }
            let Some(caps) = FILTER_KEY.captures(key) else {
                tracing::warn!(key = %key, "dropping malformed filter key");
                continue;
            };
            let field = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let Some(op) = FilterOp::parse(caps.get(2).map(|m| m.as_str())) else {
                tracing::warn!(key = %key, "dropping unsupported filter operator");
                continue;
            };
            if T::protected_fields().contains(&field) || field == VERSION_FIELD {
                continue;
            }
            let Some(value) = coerce(T::field_kind(field), raw) else {
                tracing::warn!(field, value = %raw, "dropping filter with uncoercible value");
                continue;
            };

            // Last occurrence of the same field/operator wins
            filters.retain(|f| !(f.field == field && f.op == op));
            filters.push(FieldFilter::new(field, op, value));
        }

        self.query.filters = filters;
        self
    }

    /// Comma-separated sort keys, `-` prefix for descending
    pub fn sort(mut self) -> Self {
        let mut keys: Vec<SortKey> = self
            .param("sort")
            .map(|raw| parse_sort(raw, T::protected_fields()))
            .unwrap_or_default();

        if keys.is_empty() {
            keys = parse_sort(DEFAULT_SORT, &[]);
        }
        if !keys.iter().any(|k| k.field == "id") {
            keys.push(SortKey {
                field: "id".to_string(),
                descending: false,
            });
        }

        self.query.sort = keys;
        self
    }

    /// Comma-separated field allow-list (or `-field` deny-list)
    pub fn limit_fields(mut self) -> Self {
        let protected = T::protected_fields();
        let requested: Vec<&str> = self
            .param("fields")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let includes: Vec<String> = requested
            .iter()
            .filter(|f| !f.starts_with('-'))
            .filter(|f| PROJECTED_FIELD.is_match(f) && !protected.contains(f))
            .map(|f| f.to_string())
            .collect();
        let excludes: Vec<String> = requested
            .iter()
            .filter_map(|f| f.strip_prefix('-'))
            .filter(|f| PROJECTED_FIELD.is_match(f))
            .map(str::to_string)
            .collect();

        self.query.projection = if !includes.is_empty() {
            Projection::Include(includes)
        } else {
            let mut hidden: Vec<String> = excludes;
            if hidden.is_empty() {
                hidden.push(VERSION_FIELD.to_string());
            }
            for field in T::hidden_fields().iter().chain(protected) {
                if !hidden.iter().any(|h| h == field) {
                    hidden.push(field.to_string());
                }
            }
            Projection::Exclude(hidden)
        };
        self
    }

    /// 1-based `page` and `limit` into skip/limit
    pub fn paginate(mut self) -> Self {
        let page = positive(self.param("page")).unwrap_or(DEFAULT_PAGE);
        let limit = positive(self.param("limit")).unwrap_or(DEFAULT_LIMIT);
        self.query.skip = (page - 1).saturating_mul(limit);
        self.query.limit = Some(limit);
        self
    }

    pub fn into_query(self) -> ListQuery {
        self.query
    }
}

fn positive(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 1.0)
        .map(|v| v.trunc() as u64)
}

fn parse_sort(raw: &str, protected: &[&str]) -> Vec<SortKey> {
    let mut keys: Vec<SortKey> = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (field, descending) = match part.strip_prefix('-') {
            Some(field) => (field, true),
            None => (part.strip_prefix('+').unwrap_or(part), false),
        };
        if !FIELD_NAME.is_match(field) || protected.contains(&field) {
            continue;
        }
        if keys.iter().any(|k| k.field == field) {
            continue;
        }
        keys.push(SortKey {
            field: field.to_string(),
            descending,
        });
    }
    keys
}

/// Coerce a query-string value according to the field kind
fn coerce(kind: Option<FieldKind>, raw: &str) -> Option<Value> {
    let raw = raw.trim();
    match kind {
        Some(FieldKind::Number) => number(raw),
        Some(FieldKind::Integer) => raw
            .parse::<i64>()
            .ok()
            .map(Value::from)
            .or_else(|| number(raw)),
        Some(FieldKind::Boolean) => boolean(raw),
        Some(FieldKind::Date) => timestamp::normalize(raw).map(Value::String),
        Some(FieldKind::String) => Some(Value::String(raw.to_string())),
        None => number(raw)
            .or_else(|| boolean(raw))
            .or_else(|| Some(Value::String(raw.to_string()))),
    }
}

fn number(raw: &str) -> Option<Value> {
    if let Ok(i) = raw.parse::<i64>() {
        return Some(json!(i));
    }
    raw.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(|f| json!(f))
}

fn boolean(raw: &str) -> Option<Value> {
    match raw {
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Item;

    impl Queryable for Item {
        fn field_kind(field: &str) -> Option<FieldKind> {
            match field {
                "price" => Some(FieldKind::Number),
                "duration" => Some(FieldKind::Integer),
                "secret" => Some(FieldKind::Boolean),
                "createdAt" => Some(FieldKind::Date),
                "name" | "difficulty" => Some(FieldKind::String),
                _ => None,
            }
        }

        fn hidden_fields() -> &'static [&'static str] {
            &["createdAt"]
        }

        fn protected_fields() -> &'static [&'static str] {
            &["password"]
        }
    }

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let q = QueryFeatures::<Item>::apply(vec![]);
        assert!(q.filters.is_empty());
        assert_eq!(q.sort[0].field, "createdAt");
        assert!(q.sort[0].descending);
        assert_eq!(q.sort[1].field, "id");
        assert_eq!(q.skip, 0);
        assert_eq!(q.limit, Some(100));
        assert_eq!(
            q.projection,
            Projection::Exclude(vec!["__v".into(), "createdAt".into(), "password".into()])
        );
    }

    #[test]
    fn test_filter_strips_reserved_keys_and_maps_operators() {
        let q = QueryFeatures::<Item>::new(params(&[
            ("difficulty", "easy"),
            ("price[gte]", "100"),
            ("duration[lt]", "10"),
            ("page", "2"),
            ("sort", "price"),
            ("limit", "5"),
            ("fields", "name"),
        ]))
        .filter()
        .into_query();

        assert_eq!(
            q.filters,
            vec![
                FieldFilter::new("difficulty", FilterOp::Eq, json!("easy")),
                FieldFilter::new("price", FilterOp::Gte, json!(100)),
                FieldFilter::new("duration", FilterOp::Lt, json!(10)),
            ]
        );
        assert_eq!(FilterOp::Gte.mongo_operator(), Some("$gte"));
        assert_eq!(FilterOp::Eq.mongo_operator(), None);
    }

    #[test]
    fn test_filter_drops_unusable_clauses() {
        let q = QueryFeatures::<Item>::new(params(&[
            ("price[gte]", "cheap"),
            ("price[regex]", "1"),
            ("$where", "1"),
            ("password", "secret"),
            ("secret", "maybe"),
        ]))
        .filter()
        .into_query();
        assert!(q.filters.is_empty());
    }

    #[test]
    fn test_filter_last_value_wins() {
        let q = QueryFeatures::<Item>::new(params(&[("price[lt]", "500"), ("price[lt]", "900")]))
            .filter()
            .into_query();
        assert_eq!(q.filters, vec![FieldFilter::new("price", FilterOp::Lt, json!(900))]);
    }

    #[test]
    fn test_filter_unknown_field_best_effort() {
        let q = QueryFeatures::<Item>::new(params(&[("rank", "3"), ("flag", "true"), ("tag", "x")]))
            .filter()
            .into_query();
        assert_eq!(q.filters[0].value, json!(3));
        assert_eq!(q.filters[1].value, json!(true));
        assert_eq!(q.filters[2].value, json!("x"));
    }

    #[test]
    fn test_filter_dates_are_normalized() {
        let q = QueryFeatures::<Item>::new(params(&[("createdAt[gte]", "2021-01-01")]))
            .filter()
            .into_query();
        assert_eq!(q.filters[0].value, json!("2021-01-01T00:00:00.000Z"));
    }

    #[test]
    fn test_sort_multiple_keys() {
        let q = QueryFeatures::<Item>::new(params(&[("sort", "-price, name,password")]))
            .sort()
            .into_query();
        let fields: Vec<(&str, bool)> = q
            .sort
            .iter()
            .map(|k| (k.field.as_str(), k.descending))
            .collect();
        assert_eq!(fields, vec![("price", true), ("name", false), ("id", false)]);
    }

    #[test]
    fn test_limit_fields_include_drops_protected() {
        let q = QueryFeatures::<Item>::new(params(&[("fields", "name,price,password")]))
            .limit_fields()
            .into_query();
        assert_eq!(
            q.projection,
            Projection::Include(vec!["name".into(), "price".into()])
        );
    }

    #[test]
    fn test_limit_fields_ignores_nested_paths() {
        let fields = [("fields", "name,startLocation.description")];
        let q = QueryFeatures::<Item>::new(params(&fields))
            .limit_fields()
            .into_query();
        assert_eq!(q.projection, Projection::Include(vec!["name".into()]));

        let q = QueryFeatures::<Item>::new(params(&[("fields", "-startLocation.description")]))
            .limit_fields()
            .into_query();
        assert_eq!(
            q.projection,
            Projection::Exclude(vec!["__v".into(), "createdAt".into(), "password".into()])
        );
    }

    #[test]
    fn test_limit_fields_exclude_keeps_hidden_excluded() {
        let q = QueryFeatures::<Item>::new(params(&[("fields", "-name")]))
            .limit_fields()
            .into_query();
        assert_eq!(
            q.projection,
            Projection::Exclude(vec!["name".into(), "createdAt".into(), "password".into()])
        );
    }

    #[test]
    fn test_paginate() {
        let q = QueryFeatures::<Item>::new(params(&[("page", "3"), ("limit", "5")]))
            .paginate()
            .into_query();
        assert_eq!(q.skip, 10);
        assert_eq!(q.limit, Some(5));
    }

    #[test]
    fn test_paginate_falls_back_on_garbage() {
        for (page, limit) in [("0", "0"), ("-1", "-5"), ("abc", "xyz")] {
            let q = QueryFeatures::<Item>::new(params(&[("page", page), ("limit", limit)]))
                .paginate()
                .into_query();
            assert_eq!(q.skip, 0);
            assert_eq!(q.limit, Some(100));
        }
    }
}
