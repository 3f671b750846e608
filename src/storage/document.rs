//! Record conversions and backend translations of a [`ListQuery`]
//!
//! Stores work on JSON documents: MongoDB receives them as BSON with `id`
//! renamed to `_id`, the in-memory store evaluates the same [`ListQuery`]
//! directly against `serde_json::Value`s so both backends answer a list
//! request identically.

use crate::core::error::{StorageError, StoreResult};
use crate::core::query::{FieldFilter, FilterOp, ListQuery, Projection, SortKey, VERSION_FIELD};
use mongodb::bson::{self, Bson, Document};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::cmp::Ordering;

// ---------------------------------------------------------------------------
// JSON <-> BSON
// ---------------------------------------------------------------------------

/// Convert a JSON object into a BSON document, renaming `id` to `_id`
pub fn json_to_document(json: Value) -> StoreResult<Document> {
    let bson_val = bson::to_bson(&json).map_err(|e| StorageError::Serialization {
        message: format!("failed to convert JSON to BSON: {}", e),
    })?;

    let mut doc = match bson_val {
        Bson::Document(d) => d,
        _ => {
            return Err(StorageError::Serialization {
                message: "expected a JSON object".to_string(),
            });
        }
    };

    if let Some(id) = doc.remove("id") {
        doc.insert("_id", id);
    }
    Ok(doc)
}

/// Convert a BSON document back into JSON, renaming `_id` to `id`
pub fn document_to_json(mut doc: Document) -> Value {
    if let Some(id) = doc.remove("_id") {
        doc.insert("id", id);
    }
    Bson::Document(doc).into_relaxed_extjson()
}

/// Serialize a record for storage; new documents get version `0`
pub fn record_to_document<T: Serialize>(record: &T) -> StoreResult<Document> {
    let mut doc = json_to_document(serde_json::to_value(record)?)?;
    doc.insert(VERSION_FIELD, 0_i32);
    Ok(doc)
}

pub fn document_to_record<T: DeserializeOwned>(doc: Document) -> StoreResult<T> {
    Ok(serde_json::from_value(document_to_json(doc))?)
}

fn mongo_field(field: &str) -> &str {
    if field == "id" { "_id" } else { field }
}

// ---------------------------------------------------------------------------
// MongoDB translation
// ---------------------------------------------------------------------------

/// Build the `find` filter, combined with a store's visibility clause
///
/// Caller clauses never replace `base`: when both are present they are joined
/// under `$and`, so a filter on a visibility field cannot widen the result.
pub fn mongo_filter(filters: &[FieldFilter], base: Document) -> StoreResult<Document> {
    let mut clauses = Document::new();
    for filter in filters {
        let value = bson::to_bson(&filter.value).map_err(|e| StorageError::Serialization {
            message: e.to_string(),
        })?;
        let field = mongo_field(&filter.field).to_string();

        let Some(op) = filter.op.mongo_operator() else {
            clauses.insert(field, value);
            continue;
        };

        // Range clauses on one field share a sub-document
        if let Some(Bson::Document(existing)) = clauses.get_mut(&field) {
            if existing.keys().all(|k| k.starts_with('$')) {
                existing.insert(op, value);
                continue;
            }
        }
        let mut clause = Document::new();
        clause.insert(op, value);
        clauses.insert(field, clause);
    }

    if base.is_empty() {
        return Ok(clauses);
    }
    if clauses.is_empty() {
        return Ok(base);
    }
    let mut combined = Document::new();
    combined.insert(
        "$and",
        Bson::Array(vec![Bson::Document(base), Bson::Document(clauses)]),
    );
    Ok(combined)
}

pub fn mongo_sort(keys: &[SortKey]) -> Document {
    let mut sort = Document::new();
    for key in keys {
        sort.insert(mongo_field(&key.field), if key.descending { -1 } else { 1 });
    }
    sort
}

pub fn mongo_projection(projection: &Projection) -> Option<Document> {
    let (fields, flag) = match projection {
        Projection::Include(fields) => (fields, 1),
        Projection::Exclude(fields) => (fields, 0),
    };
    if fields.is_empty() {
        return None;
    }
    let mut doc = Document::new();
    for field in fields {
        doc.insert(mongo_field(field), flag);
    }
    Some(doc)
}

// ---------------------------------------------------------------------------
// In-memory evaluation
// ---------------------------------------------------------------------------

/// Resolve a dotted path inside a JSON document
fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |current, segment| current.get(segment))
}

/// Order two scalars the way the query operators compare them
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

fn scalar_matches(candidate: &Value, op: FilterOp, expected: &Value) -> bool {
    let Some(ordering) = compare(candidate, expected) else {
        return false;
    };
    match op {
        FilterOp::Eq => ordering == Ordering::Equal,
        FilterOp::Gte => ordering != Ordering::Less,
        FilterOp::Gt => ordering == Ordering::Greater,
        FilterOp::Lte => ordering != Ordering::Greater,
        FilterOp::Lt => ordering == Ordering::Less,
    }
}

/// Whether `doc` satisfies one filter; array fields match if any element does
pub fn filter_matches(doc: &Value, filter: &FieldFilter) -> bool {
    match lookup(doc, &filter.field) {
        Some(Value::Array(items)) => items
            .iter()
            .any(|item| scalar_matches(item, filter.op, &filter.value)),
        Some(value) => scalar_matches(value, filter.op, &filter.value),
        None => filter.op == FilterOp::Eq && filter.value.is_null(),
    }
}

/// Rank of a value's type in the sort order: missing/null < numbers < strings < other
fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    }
}

fn sort_value<'a>(doc: &'a Value, field: &str, descending: bool) -> Option<&'a Value> {
    match lookup(doc, field) {
        // Arrays sort by their smallest element ascending, largest descending
        Some(Value::Array(items)) => items.iter().reduce(|best, item| match compare(item, best) {
            Some(Ordering::Less) if !descending => item,
            Some(Ordering::Greater) if descending => item,
            _ => best,
        }),
        other => other,
    }
}

pub fn compare_documents(a: &Value, b: &Value, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let left = sort_value(a, &key.field, key.descending);
        let right = sort_value(b, &key.field, key.descending);
        let ordering = match (left, right) {
            (Some(l), Some(r)) => compare(l, r).unwrap_or_else(|| {
                type_rank(Some(l)).cmp(&type_rank(Some(r)))
            }),
            (l, r) => type_rank(l).cmp(&type_rank(r)),
        };
        let ordering = if key.descending { ordering.reverse() } else { ordering };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Apply a projection to a top-level JSON object; `id` is always kept on includes
pub fn project(doc: Value, projection: &Projection) -> Value {
    let Value::Object(mut map) = doc else {
        return doc;
    };
    match projection {
        Projection::Include(fields) => {
            map.retain(|key, _| key == "id" || fields.iter().any(|f| f == key));
        }
        Projection::Exclude(fields) => {
            for field in fields {
                map.remove(field);
            }
        }
    }
    Value::Object(map)
}

/// Run a list query over in-memory documents
pub fn run_query(docs: Vec<Value>, query: &ListQuery) -> Vec<Value> {
    let mut matched: Vec<Value> = docs
        .into_iter()
        .filter(|doc| query.filters.iter().all(|f| filter_matches(doc, f)))
        .collect();

    matched.sort_by(|a, b| compare_documents(a, b, &query.sort));

    let skip = usize::try_from(query.skip).unwrap_or(usize::MAX);
    let limit = query
        .limit
        .and_then(|l| usize::try_from(l).ok())
        .unwrap_or(usize::MAX);

    matched
        .into_iter()
        .skip(skip)
        .take(limit)
        .map(|doc| project(doc, &query.projection))
        .collect()
}
