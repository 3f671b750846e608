//! Macro-generated contract suite for `UserStore` implementations.
//!
//! # Generated Tests
//!
//! - `test_create_and_get`, `test_duplicate_email_rejected`
//! - `test_find_by_email`
//! - `test_find_by_reset_token`, `test_expired_reset_token_not_found`
//! - `test_save_existing`, `test_save_nonexistent`
//! - `test_inactive_users_invisible`
//! - `test_list_hides_credentials`, `test_list_filter_and_sort`
//! - `test_delete`

/// Generate a full `UserStore` conformance test suite.
///
/// `$factory` must evaluate to a fresh, empty store.
#[macro_export]
macro_rules! user_store_tests {
    ($factory:expr) => {
        mod user_store_contract_tests {
            use super::*;
            use natours::core::auth::Role;
            use natours::core::error::StorageError;
            use natours::core::service::UserStore;
            use natours::entities::user::{User, hash_reset_token};
            use uuid::Uuid;

            #[tokio::test]
            async fn test_create_and_get() {
                let store = $factory;
                let user = make_user("Jonas", "jonas@example.com");

                store.create(user.clone()).await.unwrap();
                let fetched = store.get(&user.id).await.unwrap().expect("user should exist");
                assert_eq!(fetched, user);
                assert_eq!(fetched.role, Role::User);
                assert!(fetched.active);
            }

            #[tokio::test]
            async fn test_duplicate_email_rejected() {
                let store = $factory;
                store
                    .create(make_user("Jonas", "jonas@example.com"))
                    .await
                    .unwrap();

                let err = store
                    .create(make_user("Other Jonas", "jonas@example.com"))
                    .await
                    .unwrap_err();
                assert!(
                    matches!(err, StorageError::Duplicate { ref field, .. } if field == "email"),
                    "expected duplicate email, got {:?}",
                    err
                );
            }

            #[tokio::test]
            async fn test_find_by_email() {
                let store = $factory;
                let user = make_user("Jonas", "jonas@example.com");
                store.create(user.clone()).await.unwrap();

                let found = store.find_by_email("jonas@example.com").await.unwrap();
                assert_eq!(found.map(|u| u.id), Some(user.id));
                assert!(store.find_by_email("nobody@example.com").await.unwrap().is_none());
            }

            #[tokio::test]
            async fn test_find_by_reset_token() {
                let store = $factory;
                let mut user = make_user("Jonas", "jonas@example.com");
                let token = user.create_password_reset_token(chrono::Utc::now());
                store.create(user.clone()).await.unwrap();

                let found = store
                    .find_by_reset_token(&hash_reset_token(&token), chrono::Utc::now())
                    .await
                    .unwrap();
                assert_eq!(found.map(|u| u.id), Some(user.id));

                // The raw token is never stored
                let raw = store
                    .find_by_reset_token(&token, chrono::Utc::now())
                    .await
                    .unwrap();
                assert!(raw.is_none());
            }

            #[tokio::test]
            async fn test_expired_reset_token_not_found() {
                let store = $factory;
                let mut user = make_user("Jonas", "jonas@example.com");
                let token = user.create_password_reset_token(past(11));
                store.create(user).await.unwrap();

                let found = store
                    .find_by_reset_token(&hash_reset_token(&token), chrono::Utc::now())
                    .await
                    .unwrap();
                assert!(found.is_none());
            }

            #[tokio::test]
            async fn test_save_existing() {
                let store = $factory;
                let mut user = make_user("Jonas", "jonas@example.com");
                store.create(user.clone()).await.unwrap();

                user.name = "Jonas Schmedtmann".to_string();
                user.role = Role::LeadGuide;
                let saved = store.save(user.clone()).await.unwrap().expect("saved");
                assert_eq!(saved.name, "Jonas Schmedtmann");

                let fetched = store.get(&user.id).await.unwrap().unwrap();
                assert_eq!(fetched.role, Role::LeadGuide);
            }

            #[tokio::test]
            async fn test_save_nonexistent() {
                let store = $factory;
                let user = make_user("Ghost", "ghost@example.com");
                assert!(store.save(user).await.unwrap().is_none());
            }

            #[tokio::test]
            async fn test_inactive_users_invisible() {
                let store = $factory;
                let mut user = make_user("Jonas", "jonas@example.com");
                store.create(user.clone()).await.unwrap();
                store
                    .create(make_user("Laura", "laura@example.com"))
                    .await
                    .unwrap();

                user.active = false;
                assert!(store.save(user.clone()).await.unwrap().is_some());

                assert!(store.get(&user.id).await.unwrap().is_none());
                assert!(store.find_by_email("jonas@example.com").await.unwrap().is_none());
                let listed = store.find(&query_for::<User>(&[])).await.unwrap();
                assert_eq!(names(&listed), vec!["Laura"]);
                assert!(!store.delete(&user.id).await.unwrap());

                // Soft-deleted accounts still hold their email
                assert!(store
                    .create(make_user("Jonas Again", "jonas@example.com"))
                    .await
                    .is_err());
            }

            #[tokio::test]
            async fn test_list_hides_credentials() {
                let store = $factory;
                let mut user = make_user("Jonas", "jonas@example.com");
                user.create_password_reset_token(chrono::Utc::now());
                store.create(user).await.unwrap();

                for query in [
                    query_for::<User>(&[]),
                    query_for::<User>(&[("fields", "name,password,passwordResetToken")]),
                    query_for::<User>(&[("fields", "-name")]),
                ] {
                    let docs = store.find(&query).await.unwrap();
                    assert_eq!(docs.len(), 1);
                    let obj = docs[0].as_object().unwrap();
                    assert!(!obj.contains_key("password"));
                    assert!(!obj.contains_key("passwordResetToken"));
                    assert!(!obj.contains_key("passwordResetExpires"));
                    assert!(!obj.contains_key("active"));
                }
            }

            #[tokio::test]
            async fn test_list_filter_and_sort() {
                let store = $factory;
                for (name, email) in [
                    ("Charlie", "charlie@example.com"),
                    ("Alice", "alice@example.com"),
                    ("Bob", "bob@example.com"),
                ] {
                    store.create(make_user(name, email)).await.unwrap();
                }
                let mut admin = make_user("Admin", "admin@example.com");
                admin.role = Role::Admin;
                store.create(admin).await.unwrap();

                let sorted = store
                    .find(&query_for::<User>(&[("role", "user"), ("sort", "name")]))
                    .await
                    .unwrap();
                assert_eq!(names(&sorted), vec!["Alice", "Bob", "Charlie"]);

                // Protected fields cannot be used to filter
                let probed = store
                    .find(&query_for::<User>(&[("password", "x")]))
                    .await
                    .unwrap();
                assert_eq!(probed.len(), 4);
            }

            #[tokio::test]
            async fn test_delete() {
                let store = $factory;
                let user = make_user("Jonas", "jonas@example.com");
                store.create(user.clone()).await.unwrap();

                assert!(store.delete(&user.id).await.unwrap());
                assert!(store.get(&user.id).await.unwrap().is_none());
                assert!(!store.delete(&Uuid::new_v4()).await.unwrap());
            }
        }
    };
}
