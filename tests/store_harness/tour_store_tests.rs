//! Macro-generated contract suite for `TourStore` implementations.
//!
//! # Usage
//!
//! ```rust,ignore
//! #[macro_use]
//! mod store_harness;
//!
//! use store_harness::*;
//! use natours::storage::InMemoryTourStore;
//!
//! tour_store_tests!(InMemoryTourStore::new());
//! ```
//!
//! # Generated Tests
//!
//! ## CRUD
//! - `test_create_and_get`, `test_get_nonexistent`, `test_duplicate_name_rejected`
//! - `test_replace_existing`, `test_replace_nonexistent`
//! - `test_delete_existing`, `test_delete_nonexistent`
//! - `test_create_many_and_delete_all`
//!
//! ## Queries
//! - `test_filter_price_gte`, `test_filter_exact_difficulty`
//! - `test_sort_descending_price`, `test_pagination`, `test_field_selection`
//! - `test_default_projection_hides_internal_fields`
//!
//! ## Visibility & aggregates
//! - `test_secret_tours_invisible`
//! - `test_stats_by_difficulty`, `test_monthly_plan`

/// Generate a full `TourStore` conformance test suite.
///
/// `$factory` must evaluate to a fresh, empty store; it is re-evaluated for
/// each test.
#[macro_export]
macro_rules! tour_store_tests {
    ($factory:expr) => {
        mod tour_store_contract_tests {
            use super::*;
            use natours::core::error::StorageError;
            use natours::core::service::TourStore;
            use natours::entities::tour::Tour;
            use serde_json::json;
            use uuid::Uuid;

            async fn seed(store: &impl TourStore) {
                for (name, price, difficulty, rating) in [
                    ("The Forest Hiker", 397.0, "easy", 4.7),
                    ("The Sea Explorer", 497.0, "medium", 4.8),
                    ("The Snow Adventurer", 997.0, "difficult", 4.5),
                    ("The City Wanderer", 1197.0, "easy", 4.6),
                    ("The Park Camper", 1497.0, "medium", 4.0),
                ] {
                    store
                        .create(make_tour(name, price, difficulty, rating))
                        .await
                        .unwrap();
                }
            }

            // ==================================================================
            // CRUD
            // ==================================================================

            #[tokio::test]
            async fn test_create_and_get() {
                let store = $factory;
                let tour = make_tour("The Forest Hiker", 397.0, "easy", 4.7);
                let id = tour.id;

                let created = store.create(tour.clone()).await.unwrap();
                assert_eq!(created, tour);

                let fetched = store.get(&id).await.unwrap().expect("tour should exist");
                assert_eq!(fetched.name, "The Forest Hiker");
                assert_eq!(fetched.slug, "the-forest-hiker");
                assert_eq!(fetched.start_dates, tour.start_dates);
                assert_eq!(fetched.created_at, tour.created_at);
            }

            #[tokio::test]
            async fn test_get_nonexistent() {
                let store = $factory;
                assert!(store.get(&Uuid::new_v4()).await.unwrap().is_none());
            }

            #[tokio::test]
            async fn test_duplicate_name_rejected() {
                let store = $factory;
                store
                    .create(make_tour("The Forest Hiker", 397.0, "easy", 4.7))
                    .await
                    .unwrap();

                let err = store
                    .create(make_tour("The Forest Hiker", 500.0, "medium", 4.1))
                    .await
                    .unwrap_err();
                match err {
                    StorageError::Duplicate { field, value } => {
                        assert_eq!(field, "name");
                        assert_eq!(value, "The Forest Hiker");
                    }
                    other => panic!("expected duplicate error, got {:?}", other),
                }
            }

            #[tokio::test]
            async fn test_replace_existing() {
                let store = $factory;
                let tour = store
                    .create(make_tour("The Forest Hiker", 397.0, "easy", 4.7))
                    .await
                    .unwrap();

                let patched = tour.apply_patch(json!({ "price": 450 })).unwrap();
                let replaced = store.replace(patched).await.unwrap().expect("replaced");
                assert_eq!(replaced.price, 450.0);

                let fetched = store.get(&tour.id).await.unwrap().unwrap();
                assert_eq!(fetched.price, 450.0);
                assert_eq!(fetched.created_at, tour.created_at);
            }

            #[tokio::test]
            async fn test_replace_nonexistent() {
                let store = $factory;
                let tour = make_tour("The Forest Hiker", 397.0, "easy", 4.7);
                assert!(store.replace(tour).await.unwrap().is_none());
            }

            #[tokio::test]
            async fn test_delete_existing() {
                let store = $factory;
                let tour = store
                    .create(make_tour("The Forest Hiker", 397.0, "easy", 4.7))
                    .await
                    .unwrap();

                assert!(store.delete(&tour.id).await.unwrap());
                assert!(store.get(&tour.id).await.unwrap().is_none());
            }

            #[tokio::test]
            async fn test_delete_nonexistent() {
                let store = $factory;
                assert!(!store.delete(&Uuid::new_v4()).await.unwrap());
            }

            #[tokio::test]
            async fn test_create_many_and_delete_all() {
                let store = $factory;
                let tours: Vec<Tour> = ["The Forest Hiker", "The Sea Explorer", "The Star Gazer"]
                    .iter()
                    .map(|name| make_tour(name, 500.0, "easy", 4.5))
                    .collect();
                assert_eq!(store.create_many(tours).await.unwrap(), 3);
                store.create(make_secret_tour("The Secret Hideaway")).await.unwrap();

                let listed = store.find(&query_for::<Tour>(&[])).await.unwrap();
                assert_eq!(listed.len(), 3);

                // Secret tours are removed too
                assert_eq!(store.delete_all().await.unwrap(), 4);
                assert!(store.find(&query_for::<Tour>(&[])).await.unwrap().is_empty());
            }

            // ==================================================================
            // Queries
            // ==================================================================

            #[tokio::test]
            async fn test_filter_price_gte() {
                let store = $factory;
                seed(&store).await;

                let docs = store
                    .find(&query_for::<Tour>(&[("price[gte]", "997")]))
                    .await
                    .unwrap();
                assert_eq!(docs.len(), 3);
                assert!(docs.iter().all(|d| d["price"].as_f64().unwrap() >= 997.0));
            }

            #[tokio::test]
            async fn test_filter_exact_difficulty() {
                let store = $factory;
                seed(&store).await;

                let docs = store
                    .find(&query_for::<Tour>(&[("difficulty", "easy"), ("sort", "price")]))
                    .await
                    .unwrap();
                assert_eq!(names(&docs), vec!["The Forest Hiker", "The City Wanderer"]);
            }

            #[tokio::test]
            async fn test_sort_descending_price() {
                let store = $factory;
                seed(&store).await;

                let docs = store
                    .find(&query_for::<Tour>(&[("sort", "-price")]))
                    .await
                    .unwrap();
                let prices: Vec<f64> = column(&docs, "price")
                    .iter()
                    .map(|v| v.as_f64().unwrap())
                    .collect();
                assert_eq!(prices, vec![1497.0, 1197.0, 997.0, 497.0, 397.0]);
            }

            #[tokio::test]
            async fn test_pagination() {
                let store = $factory;
                seed(&store).await;

                let page = store
                    .find(&query_for::<Tour>(&[
                        ("sort", "price"),
                        ("page", "2"),
                        ("limit", "2"),
                    ]))
                    .await
                    .unwrap();
                assert_eq!(names(&page), vec!["The Snow Adventurer", "The City Wanderer"]);

                let beyond = store
                    .find(&query_for::<Tour>(&[("page", "4"), ("limit", "2")]))
                    .await
                    .unwrap();
                assert!(beyond.is_empty());
            }

            #[tokio::test]
            async fn test_field_selection() {
                let store = $factory;
                seed(&store).await;

                let docs = store
                    .find(&query_for::<Tour>(&[("fields", "name,price")]))
                    .await
                    .unwrap();
                assert_eq!(docs.len(), 5);
                for doc in &docs {
                    let obj = doc.as_object().unwrap();
                    assert!(obj.contains_key("id"));
                    assert!(obj.contains_key("name"));
                    assert!(obj.contains_key("price"));
                    assert!(!obj.contains_key("duration"));
                    assert!(!obj.contains_key("summary"));
                }
            }

            #[tokio::test]
            async fn test_default_projection_hides_internal_fields() {
                let store = $factory;
                seed(&store).await;

                let docs = store.find(&query_for::<Tour>(&[])).await.unwrap();
                for doc in &docs {
                    let obj = doc.as_object().unwrap();
                    assert!(obj.contains_key("id"));
                    assert!(obj.contains_key("summary"));
                    assert!(!obj.contains_key("__v"));
                    assert!(!obj.contains_key("createdAt"));
                }
            }

            // ==================================================================
            // Visibility & aggregates
            // ==================================================================

            #[tokio::test]
            async fn test_secret_tours_invisible() {
                let store = $factory;
                seed(&store).await;
                let secret = store
                    .create(make_secret_tour("The Secret Hideaway"))
                    .await
                    .unwrap();

                assert!(store.get(&secret.id).await.unwrap().is_none());

                let all = store.find(&query_for::<Tour>(&[])).await.unwrap();
                assert_eq!(all.len(), 5);
                assert!(!names(&all).contains(&"The Secret Hideaway".to_string()));

                // Asking for them explicitly does not help
                let asked = store
                    .find(&query_for::<Tour>(&[("secretTours", "true")]))
                    .await
                    .unwrap();
                assert!(asked.is_empty());

                assert!(store.replace(secret.clone()).await.unwrap().is_none());
                assert!(!store.delete(&secret.id).await.unwrap());

                let stats = store.stats().await.unwrap();
                let easy = stats.iter().find(|s| s.difficulty == "easy").unwrap();
                assert_eq!(easy.num_tours, 2);
            }

            #[tokio::test]
            async fn test_stats_by_difficulty() {
                let store = $factory;
                seed(&store).await;

                let stats = store.stats().await.unwrap();
                // The Park Camper (4.0) is below the rating threshold
                let groups: Vec<&str> = stats.iter().map(|s| s.difficulty.as_str()).collect();
                assert_eq!(groups, vec!["medium", "easy", "difficult"]);

                let easy = &stats[1];
                assert_eq!(easy.num_tours, 2);
                assert_eq!(easy.num_ratings, 20);
                assert!((easy.avg_price - 797.0).abs() < 1e-9);
                assert!((easy.avg_rating - 4.65).abs() < 1e-9);
                assert_eq!(easy.min_price, 397.0);
                assert_eq!(easy.max_price, 1197.0);

                let medium = &stats[0];
                assert_eq!(medium.num_tours, 1);
                assert_eq!(medium.avg_price, 497.0);
            }

            #[tokio::test]
            async fn test_monthly_plan() {
                let store = $factory;
                store
                    .create(make_tour_starting(
                        "The Forest Hiker",
                        &["2021-04-25T09:00:00.000Z", "2021-07-20T09:00:00.000Z"],
                    ))
                    .await
                    .unwrap();
                store
                    .create(make_tour_starting(
                        "The Sea Explorer",
                        &["2021-07-19T09:00:00.000Z", "2022-07-01T09:00:00.000Z"],
                    ))
                    .await
                    .unwrap();
                store
                    .create(make_tour_starting(
                        "The Star Gazer",
                        &["2021-12-31T23:00:00.000Z", "2022-01-01T00:00:00.000Z"],
                    ))
                    .await
                    .unwrap();

                let plan = store.monthly_plan(2021).await.unwrap();
                let months: Vec<(u32, u64)> =
                    plan.iter().map(|p| (p.month, p.num_tour_starts)).collect();
                assert_eq!(months, vec![(7, 2), (4, 1), (12, 1)]);

                let mut july = plan[0].tours.clone();
                july.sort();
                assert_eq!(july, vec!["The Forest Hiker", "The Sea Explorer"]);

                assert!(store.monthly_plan(1999).await.unwrap().is_empty());
            }
        }
    };
}
