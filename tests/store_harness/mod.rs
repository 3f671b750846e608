//! Shared test harness for store backend testing
//!
//! Provides fixture builders for tours and users plus the
//! `tour_store_tests!` and `user_store_tests!` contract suites.
//!
//! # Usage
//!
//! From any integration test file in `tests/`:
//! ```rust,ignore
//! #[macro_use]
//! mod store_harness;
//! use store_harness::*;
//! ```

#![allow(dead_code)]

#[macro_use]
pub mod tour_store_tests;
#[macro_use]
pub mod user_store_tests;

use chrono::{DateTime, SubsecRound, Utc};
use natours::core::query::{ListQuery, QueryFeatures, Queryable};
use natours::entities::tour::Tour;
use natours::entities::user::User;
use serde_json::{Value, json};

/// A valid tour payload; callers override fields with `extra`
pub fn tour_payload(name: &str, price: f64, difficulty: &str, rating: f64) -> Value {
    json!({
        "name": name,
        "duration": 5,
        "maxGroupSize": 10,
        "difficulty": difficulty,
        "ratingsAverage": rating,
        "ratingsQuantity": 10,
        "price": price,
        "summary": "A tour used by the store contract tests",
        "imageCover": "cover.jpg",
        "startDates": ["2021-04-25T09:00:00.000Z", "2021-07-20T09:00:00.000Z"],
    })
}

pub fn make_tour(name: &str, price: f64, difficulty: &str, rating: f64) -> Tour {
    Tour::from_payload(tour_payload(name, price, difficulty, rating), now())
        .expect("fixture tour should be valid")
}

pub fn make_secret_tour(name: &str) -> Tour {
    let mut payload = tour_payload(name, 999.0, "easy", 4.9);
    payload["secretTours"] = json!(true);
    Tour::from_payload(payload, now()).expect("fixture tour should be valid")
}

/// Tour whose start dates are the given RFC 3339 strings
pub fn make_tour_starting(name: &str, dates: &[&str]) -> Tour {
    let mut payload = tour_payload(name, 500.0, "medium", 4.6);
    payload["startDates"] = json!(dates);
    Tour::from_payload(payload, now()).expect("fixture tour should be valid")
}

pub fn make_user(name: &str, email: &str) -> User {
    User::new(name, email, None, "$2b$04$not-a-real-hash", now())
}

/// Build a list query from query-string pairs, as the handlers do
pub fn query_for<T: Queryable>(pairs: &[(&str, &str)]) -> ListQuery {
    QueryFeatures::<T>::apply(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )
}

/// Values of `field` across documents, in order
pub fn column<'a>(docs: &'a [Value], field: &str) -> Vec<&'a Value> {
    docs.iter().map(|d| &d[field]).collect()
}

pub fn names(docs: &[Value]) -> Vec<String> {
    docs.iter()
        .filter_map(|d| d["name"].as_str().map(str::to_string))
        .collect()
}

/// Current time at the millisecond precision the stores keep
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

pub fn past(minutes: i64) -> DateTime<Utc> {
    now() - chrono::Duration::minutes(minutes)
}
