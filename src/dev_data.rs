//! Development fixtures: load tours from a JSON file into a store

use crate::core::service::TourStore;
use crate::entities::tour::Tour;
use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::Value;
use std::path::Path;

/// Default fixture file, relative to the repository root
pub const DEFAULT_TOURS_FILE: &str = "dev-data/tours-simple.json";

/// Parse a JSON array of tour payloads, validating each one
pub fn parse_tours(raw: &str) -> Result<Vec<Tour>> {
    let payloads: Vec<Value> = serde_json::from_str(raw).context("expected a JSON array of tours")?;
    let now = Utc::now();

    payloads
        .into_iter()
        .enumerate()
        .map(|(index, payload)| {
            Tour::from_payload(payload, now)
                .map_err(|err| anyhow::anyhow!("tour #{} is invalid: {}", index + 1, err))
        })
        .collect()
}

pub fn read_tours(path: &Path) -> Result<Vec<Tour>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_tours(&raw)
}

/// Insert every fixture tour; returns how many were stored
pub async fn import(store: &dyn TourStore, tours: Vec<Tour>) -> Result<usize> {
    let count = store.create_many(tours).await?;
    tracing::info!(count, "Data successfully loaded.");
    Ok(count)
}

/// Remove every tour, secret ones included
pub async fn delete_all(store: &dyn TourStore) -> Result<u64> {
    let count = store.delete_all().await?;
    tracing::info!(count, "Data successfully deleted!");
    Ok(count)
}
