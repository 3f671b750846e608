//! In-process test application for the HTTP-level tests
//!
//! Builds the full router (middleware included) over in-memory stores and a
//! `MemoryMailer`, and keeps handles on all three so tests can seed data and
//! read sent mail back.

#![allow(dead_code)]

use axum_test::TestServer;
use chrono::Utc;
use natours::config::AppConfig;
use natours::core::auth::Role;
use natours::core::service::{TourStore, UserStore};
use natours::entities::tour::Tour;
use natours::mail::MemoryMailer;
use natours::server::ServerBuilder;
use natours::storage::{InMemoryTourStore, InMemoryUserStore};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

pub const JWT_SECRET: &str = "a-very-long-and-secure-test-secret";
pub const PASSWORD: &str = "pass1234";

pub struct TestApp {
    pub server: TestServer,
    pub tours: InMemoryTourStore,
    pub users: InMemoryUserStore,
    pub mailer: MemoryMailer,
}

pub fn test_config(overrides: &[(&str, &str)]) -> AppConfig {
    let mut vars: HashMap<String, String> = [
        ("NODE_ENV", "development"),
        ("DATABASE", "mongodb://localhost:27017"),
        ("JWT_SECRET", JWT_SECRET),
        ("JWT_EXPIRES_IN", "90d"),
        ("BCRYPT_COST", "4"),
        ("EMAIL_TRANSPORT", "memory"),
        ("RATE_LIMIT_MAX", "10000"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in overrides {
        vars.insert(k.to_string(), v.to_string());
    }
    AppConfig::from_map(&vars).expect("test config should load")
}

pub fn spawn_app_with(overrides: &[(&str, &str)], mailer: MemoryMailer) -> TestApp {
    let tours = InMemoryTourStore::new();
    let users = InMemoryUserStore::new();

    let app = ServerBuilder::new(test_config(overrides))
        .with_tour_store(tours.clone())
        .with_user_store(users.clone())
        .with_mailer(Arc::new(mailer.clone()))
        .build()
        .expect("Failed to build app");

    TestApp {
        server: TestServer::new(app),
        tours,
        users,
        mailer,
    }
}

pub fn spawn_app() -> TestApp {
    spawn_app_with(&[], MemoryMailer::new())
}

pub fn tour_body(name: &str, price: f64) -> Value {
    json!({
        "name": name,
        "duration": 5,
        "maxGroupSize": 25,
        "difficulty": "easy",
        "ratingsAverage": 4.7,
        "ratingsQuantity": 37,
        "price": price,
        "summary": "Breathtaking hike through the Canadian Banff National Park",
        "imageCover": "tour-1-cover.jpg",
        "startDates": ["2021-04-25,10:00", "2021-07-20,10:00"],
    })
}

impl TestApp {
    /// Insert a tour straight into the store
    pub async fn seed_tour(&self, body: Value) -> Tour {
        let tour = Tour::from_payload(body, Utc::now()).expect("seed tour should be valid");
        self.tours.create(tour).await.expect("seed tour should insert")
    }

    pub async fn seed_tours(&self) {
        for (name, price, difficulty, rating) in [
            ("The Forest Hiker", 397.0, "easy", 4.7),
            ("The Sea Explorer", 497.0, "medium", 4.8),
            ("The Snow Adventurer", 997.0, "difficult", 4.5),
            ("The City Wanderer", 1197.0, "easy", 4.6),
            ("The Park Camper", 1497.0, "medium", 4.9),
            ("The Sports Lover", 2997.0, "difficult", 4.7),
        ] {
            let mut body = tour_body(name, price);
            body["difficulty"] = json!(difficulty);
            body["ratingsAverage"] = json!(rating);
            self.seed_tour(body).await;
        }
    }

    /// Sign up through the API; returns the token and the new user's id
    pub async fn signup(&self, name: &str, email: &str) -> (String, Uuid) {
        let response = self
            .server
            .post("/api/v1/users/signup")
            .json(&json!({
                "name": name,
                "email": email,
                "password": PASSWORD,
                "passwordConfirm": PASSWORD,
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);

        let body: Value = response.json();
        let token = body["token"].as_str().expect("token").to_string();
        let id = body["data"]["user"]["id"]
            .as_str()
            .and_then(|id| Uuid::parse_str(id).ok())
            .expect("user id");
        (token, id)
    }

    /// Sign up and give the account `role`
    pub async fn signup_as(&self, role: Role, email: &str) -> (String, Uuid) {
        let (token, id) = self.signup("Test Person", email).await;
        let mut user = self.users.get(&id).await.unwrap().expect("user exists");
        user.role = role;
        self.users.save(user).await.unwrap();
        (token, id)
    }
}
