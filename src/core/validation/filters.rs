//! Reusable field filters
//!
//! These filters transform field values before validation

use anyhow::Result;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

pub type FilterFn = Box<dyn Fn(&str, Value) -> Result<Value> + Send + Sync>;

static NON_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("slug pattern is valid"));

/// Filter: trim whitespace from string
pub fn trim() -> FilterFn {
    Box::new(|_: &str, value: Value| {
        if let Some(s) = value.as_str() {
            Ok(Value::String(s.trim().to_string()))
        } else {
            Ok(value)
        }
    })
}

/// Lowercase, dash-separated slug
///
/// `"The Forest Hiker"` becomes `"the-forest-hiker"`.
pub fn slugify(input: &str) -> String {
    let lowered = input.to_lowercase();
    NON_SLUG
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

/// Escape HTML metacharacters so stored strings cannot carry markup
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Recursively sanitize a request body
///
/// Object keys starting with `$` or containing `.` are dropped (they would be
/// read as query operators by the database) and every string has its HTML
/// metacharacters escaped.
pub fn sanitize(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(k, _)| !k.starts_with('$') && !k.contains('.'))
                .map(|(k, v)| (k, sanitize(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize).collect()),
        Value::String(s) => Value::String(escape_html(&s)),
        other => other,
    }
}
