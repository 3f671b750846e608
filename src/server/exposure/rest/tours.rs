//! Tour handlers

use crate::core::auth::AuthPolicy;
use crate::core::error::{AppError, AppResult, ValidationError};
use crate::core::extractors::{CurrentUser, QueryPairs, ValidId};
use crate::core::query::QueryFeatures;
use crate::core::response::Envelope;
use crate::core::validation::ApiJson;
use crate::entities::tour::{Tour, present_document};
use crate::server::host::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::Utc;
use serde_json::{Value, json};

/// Query preset of the top-5-cheap alias; overrides what the caller sent
const TOP_CHEAP_PRESET: [(&str, &str); 3] = [
    ("limit", "5"),
    ("sort", "-ratingsAverage,price"),
    ("fields", "name,price,ratingsAverage,summary,difficulty"),
];

pub async fn list_tours(
    State(state): State<AppState>,
    QueryPairs(params): QueryPairs,
) -> AppResult<Envelope> {
    let query = QueryFeatures::<Tour>::apply(params);
    let docs = state.tours.find(&query).await?;
    Ok(Envelope::list(
        "tours",
        docs.into_iter().map(present_document).collect(),
    ))
}

pub async fn top_five_cheap(
    state: State<AppState>,
    QueryPairs(mut params): QueryPairs,
) -> AppResult<Envelope> {
    // Reserved parameters resolve to their last occurrence
    params.extend(
        TOP_CHEAP_PRESET
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string())),
    );
    list_tours(state, QueryPairs(params)).await
}

pub async fn tour_stats(State(state): State<AppState>) -> AppResult<Envelope> {
    let stats = state.tours.stats().await?;
    Ok(Envelope::data(json!({ "stats": stats })))
}

pub async fn monthly_plan(
    State(state): State<AppState>,
    Path(year): Path<String>,
) -> AppResult<Envelope> {
    let parsed = year
        .trim()
        .parse::<i32>()
        .ok()
        .filter(|y| (1..=9999).contains(y))
        .ok_or_else(|| ValidationError::InvalidParam {
            name: "year".to_string(),
            value: year.clone(),
        })?;

    let plan = state.tours.monthly_plan(parsed).await?;
    Ok(Envelope::data(json!({ "plan": plan })))
}

pub async fn get_tour(State(state): State<AppState>, ValidId(id): ValidId) -> AppResult<Envelope> {
    let tour = state
        .tours
        .get(&id)
        .await?
        .ok_or_else(|| AppError::not_found("tour"))?;
    Ok(Envelope::data(json!({ "tour": tour.present()? })))
}

pub async fn create_tour(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(body): ApiJson<Value>,
) -> AppResult<Envelope> {
    user.require(&AuthPolicy::tour_managers())?;

    let tour = Tour::from_payload(body, Utc::now())?;
    let tour = state.tours.create(tour).await?;
    tracing::info!(tour_id = %tour.id, name = %tour.name, "tour created");

    Ok(Envelope::data(json!({ "tour": tour.present()? })).with_status(StatusCode::CREATED))
}

pub async fn update_tour(
    State(state): State<AppState>,
    user: CurrentUser,
    ValidId(id): ValidId,
    ApiJson(body): ApiJson<Value>,
) -> AppResult<Envelope> {
    user.require(&AuthPolicy::tour_managers())?;

    let existing = state
        .tours
        .get(&id)
        .await?
        .ok_or_else(|| AppError::not_found("tour"))?;
    let updated = existing.apply_patch(body)?;
    let tour = state
        .tours
        .replace(updated)
        .await?
        .ok_or_else(|| AppError::not_found("tour"))?;

    Ok(Envelope::data(json!({ "tour": tour.present()? })))
}

pub async fn delete_tour(
    State(state): State<AppState>,
    user: CurrentUser,
    ValidId(id): ValidId,
) -> AppResult<StatusCode> {
    user.require(&AuthPolicy::tour_managers())?;

    if !state.tours.delete(&id).await? {
        return Err(AppError::not_found("tour"));
    }
    tracing::info!(tour_id = %id, "tour deleted");
    Ok(StatusCode::NO_CONTENT)
}
