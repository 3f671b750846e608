//! Tour model
//!
//! A tour is created from (and updated with) an untyped JSON payload: the
//! payload is run through [`Tour::rules`] first so every problem is reported
//! at once, then deserialized into the typed record. Updates merge the patch
//! into the stored record and validate the merged result, so cross-field
//! rules (discount below price) always see the full picture.

use crate::core::error::{AppError, AppResult, FieldValidationError, ValidationError};
use crate::core::query::{FieldKind, Queryable};
use crate::core::timestamp;
use crate::core::validation::{FieldRules, filters, validators};
use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use uuid::Uuid;

pub const DEFAULT_RATINGS_AVERAGE: f64 = 4.5;

/// Minimum rating for a tour to count in [`DifficultyStats`]
pub const STATS_MIN_RATING: f64 = 4.5;

/// Fields a client may write; everything else in a payload is ignored
const WRITABLE_FIELDS: [&str; 14] = [
    "name",
    "duration",
    "maxGroupSize",
    "difficulty",
    "ratingsAverage",
    "ratingsQuantity",
    "price",
    "priceDiscount",
    "summary",
    "description",
    "imageCover",
    "images",
    "startDates",
    "secretTours",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Difficult,
}

impl Difficulty {
    pub const NAMES: [&'static str; 3] = ["easy", "medium", "difficult"];

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Difficult => "difficult",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tour {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub duration: u32,
    pub max_group_size: u32,
    pub difficulty: Difficulty,
    pub ratings_average: f64,
    pub ratings_quantity: u32,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_discount: Option<f64>,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub image_cover: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(with = "timestamp::serde_millis")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "timestamp::serde_millis_vec")]
    pub start_dates: Vec<DateTime<Utc>>,
    #[serde(default)]
    pub secret_tours: bool,
}

/// Writable part of a tour, deserialized once the payload passed validation
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TourInput {
    name: String,
    duration: u32,
    max_group_size: u32,
    difficulty: Difficulty,
    #[serde(default = "default_ratings_average")]
    ratings_average: f64,
    #[serde(default)]
    ratings_quantity: u32,
    price: f64,
    #[serde(default)]
    price_discount: Option<f64>,
    summary: String,
    #[serde(default)]
    description: Option<String>,
    image_cover: String,
    #[serde(default)]
    images: Vec<String>,
    #[serde(default, with = "timestamp::serde_millis_vec")]
    start_dates: Vec<DateTime<Utc>>,
    #[serde(default)]
    secret_tours: bool,
}

fn default_ratings_average() -> f64 {
    DEFAULT_RATINGS_AVERAGE
}

static TOUR_RULES: LazyLock<FieldRules> = LazyLock::new(|| {
    let mut rules = FieldRules::new("tour");
    rules
        .add_filter("name", filters::trim())
        .add_filter("summary", filters::trim())
        .add_filter("description", filters::trim())
        .add_validator("name", validators::required("A tour must have a name"))
        .add_validator("name", validators::string())
        .add_validator(
            "name",
            validators::string_length(
                10,
                40,
                "A tour name must have more or equal than 10 characters",
                "A tour name must have less or equal than 40 characters",
            ),
        )
        .add_validator("duration", validators::required("A tour must have a duration"))
        .add_validator("duration", validators::whole_number())
        .add_validator(
            "duration",
            validators::min_value(1.0, "A tour must last at least one day"),
        )
        .add_validator(
            "maxGroupSize",
            validators::required("A tour must have a group size"),
        )
        .add_validator("maxGroupSize", validators::whole_number())
        .add_validator(
            "maxGroupSize",
            validators::min_value(1.0, "A group must have at least one member"),
        )
        .add_validator(
            "difficulty",
            validators::required("A tour must have a difficulty"),
        )
        .add_validator(
            "difficulty",
            validators::in_list(
                &Difficulty::NAMES,
                "Difficulty is either: easy, medium, difficult",
            ),
        )
        .add_validator("ratingsAverage", validators::number())
        .add_validator(
            "ratingsAverage",
            validators::min_value(1.0, "Rating must be above 1.0"),
        )
        .add_validator(
            "ratingsAverage",
            validators::max_value(5.0, "Rating must be below 5.0"),
        )
        .add_validator("ratingsQuantity", validators::whole_number())
        .add_validator("price", validators::required("A tour must have a price"))
        .add_validator("price", validators::number())
        .add_validator(
            "price",
            validators::min_value(0.0, "A price can not be negative"),
        )
        .add_validator("priceDiscount", validators::number())
        .add_validator(
            "summary",
            validators::required("A tour must have a description"),
        )
        .add_validator("summary", validators::string())
        .add_validator("description", validators::string())
        .add_validator(
            "imageCover",
            validators::required("A tour must have a cover image"),
        )
        .add_validator("imageCover", validators::string())
        .add_validator("images", validators::string_list())
        .add_validator("startDates", validators::date_list())
        .add_validator("secretTours", validators::boolean())
        .add_record_rule(Box::new(discount_below_price));
    rules
});

fn discount_below_price(record: &Map<String, Value>) -> Option<FieldValidationError> {
    let discount = record.get("priceDiscount").and_then(Value::as_f64)?;
    let price = record.get("price").and_then(Value::as_f64)?;
    (discount >= price).then(|| {
        FieldValidationError::new(
            "priceDiscount",
            format!(
                "Discount price ({}) should be below regular price",
                record.get("priceDiscount").cloned().unwrap_or_default()
            ),
        )
    })
}

impl Tour {
    pub fn rules() -> &'static FieldRules {
        &TOUR_RULES
    }

    /// Build a new tour from a client payload
    pub fn from_payload(payload: Value, now: DateTime<Utc>) -> AppResult<Tour> {
        let record = writable(payload)?;
        let input = validated_input(Value::Object(record))?;
        Ok(Tour::assemble(Uuid::new_v4(), now, input))
    }

    /// Apply a partial update, re-validating the merged record
    pub fn apply_patch(&self, patch: Value) -> AppResult<Tour> {
        let patch = writable(patch)?;
        let mut record = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        record.retain(|key, _| WRITABLE_FIELDS.contains(&key.as_str()));
        record.extend(patch);

        let input = validated_input(Value::Object(record))?;
        Ok(Tour::assemble(self.id, self.created_at, input))
    }

    fn assemble(id: Uuid, created_at: DateTime<Utc>, input: TourInput) -> Tour {
        Tour {
            id,
            slug: filters::slugify(&input.name),
            name: input.name,
            duration: input.duration,
            max_group_size: input.max_group_size,
            difficulty: input.difficulty,
            ratings_average: input.ratings_average,
            ratings_quantity: input.ratings_quantity,
            price: input.price,
            price_discount: input.price_discount,
            summary: input.summary,
            description: input.description,
            image_cover: input.image_cover,
            images: input.images,
            created_at,
            start_dates: input.start_dates,
            secret_tours: input.secret_tours,
        }
    }

    /// Weeks the tour lasts, derived from `duration`
    pub fn duration_weeks(&self) -> f64 {
        f64::from(self.duration) / 7.0
    }

    /// Client representation: hidden fields removed, `durationWeeks` added
    pub fn present(&self) -> AppResult<Value> {
        let mut doc = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut doc {
            for field in Tour::hidden_fields() {
                map.remove(*field);
            }
        }
        Ok(present_document(doc))
    }
}

/// Add the `durationWeeks` virtual to a (possibly projected) tour document
pub fn present_document(mut doc: Value) -> Value {
    if let Value::Object(map) = &mut doc {
        if let Some(duration) = map.get("duration").and_then(Value::as_f64) {
            map.insert("durationWeeks".to_string(), Value::from(duration / 7.0));
        }
    }
    doc
}

fn writable(payload: Value) -> AppResult<Map<String, Value>> {
    match payload {
        Value::Object(mut map) => {
            map.retain(|key, _| WRITABLE_FIELDS.contains(&key.as_str()));
            Ok(map)
        }
        _ => Err(ValidationError::InvalidBody {
            message: "Request body must be a JSON object".to_string(),
        }
        .into()),
    }
}

fn validated_input(record: Value) -> AppResult<TourInput> {
    let record = Tour::rules().validate_and_filter(record)?;
    serde_json::from_value(record).map_err(|e| {
        AppError::Validation(ValidationError::InvalidBody {
            message: e.to_string(),
        })
    })
}

impl Queryable for Tour {
    fn field_kind(field: &str) -> Option<FieldKind> {
        let kind = match field {
            "id" | "name" | "slug" | "difficulty" | "summary" | "description"
            | "imageCover" | "images" => FieldKind::String,
            "duration" | "maxGroupSize" | "ratingsQuantity" => FieldKind::Integer,
            "ratingsAverage" | "price" | "priceDiscount" => FieldKind::Number,
            "createdAt" | "startDates" => FieldKind::Date,
            "secretTours" => FieldKind::Boolean,
            _ => return None,
        };
        Some(kind)
    }

    fn hidden_fields() -> &'static [&'static str] {
        &["createdAt"]
    }
}

// =============================================================================
// Aggregate reports
// =============================================================================

/// One row of `GET /tours/tour-stats`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyStats {
    pub difficulty: String,
    pub num_tours: u64,
    pub num_ratings: u64,
    pub avg_rating: f64,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
}

impl DifficultyStats {
    /// Group well-rated tours by difficulty, cheapest average first
    pub fn compute<'a>(tours: impl IntoIterator<Item = &'a Tour>) -> Vec<DifficultyStats> {
        let mut groups: BTreeMap<Difficulty, Vec<&Tour>> = BTreeMap::new();
        for tour in tours {
            if tour.ratings_average >= STATS_MIN_RATING {
                groups.entry(tour.difficulty).or_default().push(tour);
            }
        }

        let mut stats: Vec<DifficultyStats> = groups
            .into_iter()
            .map(|(difficulty, tours)| {
                let count = tours.len() as f64;
                let prices = tours.iter().map(|t| t.price);
                DifficultyStats {
                    difficulty: difficulty.as_str().to_string(),
                    num_tours: tours.len() as u64,
                    num_ratings: tours.iter().map(|t| u64::from(t.ratings_quantity)).sum(),
                    avg_rating: tours.iter().map(|t| t.ratings_average).sum::<f64>() / count,
                    avg_price: tours.iter().map(|t| t.price).sum::<f64>() / count,
                    min_price: prices.clone().fold(f64::INFINITY, f64::min),
                    max_price: prices.fold(f64::NEG_INFINITY, f64::max),
                }
            })
            .collect();

        stats.sort_by(|a, b| {
            a.avg_price
                .total_cmp(&b.avg_price)
                .then_with(|| a.difficulty.cmp(&b.difficulty))
        });
        stats
    }
}

/// One row of `GET /tours/monthly-plan/{year}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPlan {
    pub month: u32,
    pub num_tour_starts: u64,
    pub tours: Vec<String>,
}

impl MonthlyPlan {
    pub const MAX_MONTHS: usize = 12;

    /// Half-open `[start, end)` range covering `year`
    pub fn year_bounds(year: i32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let start = Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single()?;
        let end = Utc.with_ymd_and_hms(year.checked_add(1)?, 1, 1, 0, 0, 0).single()?;
        Some((start, end))
    }

    /// Count tour starts per month of `year`, busiest month first
    pub fn compute<'a>(tours: impl IntoIterator<Item = &'a Tour>, year: i32) -> Vec<MonthlyPlan> {
        let mut months: BTreeMap<u32, Vec<String>> = BTreeMap::new();
        for tour in tours {
            for start in tour.start_dates.iter().filter(|d| d.year() == year) {
                months.entry(start.month()).or_default().push(tour.name.clone());
            }
        }

        let mut plan: Vec<MonthlyPlan> = months
            .into_iter()
            .map(|(month, tours)| MonthlyPlan {
                month,
                num_tour_starts: tours.len() as u64,
                tours,
            })
            .collect();

        plan.sort_by(|a, b| {
            b.num_tour_starts
                .cmp(&a.num_tour_starts)
                .then_with(|| a.month.cmp(&b.month))
        });
        plan.truncate(Self::MAX_MONTHS);
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> Value {
        json!({
            "name": "The Forest Hiker",
            "duration": 5,
            "maxGroupSize": 25,
            "difficulty": "easy",
            "price": 397,
            "summary": "Breathtaking hike through the Canadian Banff National Park",
            "imageCover": "tour-1-cover.jpg",
            "startDates": ["2021-04-25,10:00", "2021-07-20,10:00"]
        })
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_from_payload_applies_defaults() {
        let tour = Tour::from_payload(payload(), now()).unwrap();
        assert_eq!(tour.slug, "the-forest-hiker");
        assert_eq!(tour.ratings_average, DEFAULT_RATINGS_AVERAGE);
        assert_eq!(tour.ratings_quantity, 0);
        assert!(!tour.secret_tours);
        assert_eq!(tour.created_at, now());
        assert_eq!(tour.start_dates.len(), 2);
    }

    #[test]
    fn test_from_payload_ignores_unknown_and_server_fields() {
        let mut body = payload();
        body["slug"] = json!("forged");
        body["createdAt"] = json!("2000-01-01");
        body["rating"] = json!(4.7);
        let tour = Tour::from_payload(body, now()).unwrap();
        assert_eq!(tour.slug, "the-forest-hiker");
        assert_eq!(tour.created_at, now());
    }

    #[test]
    fn test_missing_fields_are_all_reported() {
        let err = Tour::from_payload(json!({"name": "Short"}), now()).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Invalid input data."));
        assert!(message.contains("A tour name must have more or equal than 10 characters"));
        assert!(message.contains("A tour must have a duration"));
        assert!(message.contains("A tour must have a price"));
        assert!(message.contains("A tour must have a cover image"));
    }

    #[test]
    fn test_difficulty_and_rating_bounds() {
        let mut body = payload();
        body["difficulty"] = json!("extreme");
        body["ratingsAverage"] = json!(6);
        let message = Tour::from_payload(body, now()).unwrap_err().to_string();
        assert!(message.contains("Difficulty is either: easy, medium, difficult"));
        assert!(message.contains("Rating must be below 5.0"));
    }

    #[test]
    fn test_discount_must_be_below_price() {
        let mut body = payload();
        body["priceDiscount"] = json!(500);
        let message = Tour::from_payload(body, now()).unwrap_err().to_string();
        assert!(message.contains("Discount price (500) should be below regular price"));
    }

    #[test]
    fn test_patch_is_validated_against_stored_price() {
        let tour = Tour::from_payload(payload(), now()).unwrap();
        assert!(tour.apply_patch(json!({"priceDiscount": 400})).is_err());

        let updated = tour
            .apply_patch(json!({"priceDiscount": 100, "name": "The Forest Hiker Deluxe"}))
            .unwrap();
        assert_eq!(updated.id, tour.id);
        assert_eq!(updated.created_at, tour.created_at);
        assert_eq!(updated.price_discount, Some(100.0));
        assert_eq!(updated.slug, "the-forest-hiker-deluxe");
    }

    #[test]
    fn test_present_adds_duration_weeks_and_hides_created_at() {
        let mut body = payload();
        body["duration"] = json!(14);
        let doc = Tour::from_payload(body, now()).unwrap().present().unwrap();
        assert_eq!(doc["durationWeeks"], json!(2.0));
        assert!(doc.get("createdAt").is_none());
        assert_eq!(doc["slug"], "the-forest-hiker");
    }

    fn tour(name: &str, difficulty: Difficulty, price: f64, rating: f64, starts: &[&str]) -> Tour {
        let mut body = payload();
        body["name"] = json!(name);
        body["difficulty"] = json!(difficulty.as_str());
        body["price"] = json!(price);
        body["ratingsAverage"] = json!(rating);
        body["ratingsQuantity"] = json!(10);
        body["startDates"] = json!(starts);
        Tour::from_payload(body, now()).unwrap()
    }

    #[test]
    fn test_difficulty_stats() {
        let tours = vec![
            tour("The Sea Explorer Tour", Difficulty::Medium, 497.0, 4.8, &[]),
            tour("The Forest Hiker Tour", Difficulty::Easy, 397.0, 4.7, &[]),
            tour("The City Wanderer Tour", Difficulty::Easy, 1197.0, 4.6, &[]),
            tour("The Low Rated Tour", Difficulty::Difficult, 100.0, 4.0, &[]),
        ];
        let stats = DifficultyStats::compute(&tours);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].difficulty, "medium");
        assert_eq!(stats[1].difficulty, "easy");
        assert_eq!(stats[1].num_tours, 2);
        assert_eq!(stats[1].num_ratings, 20);
        assert_eq!(stats[1].avg_price, 797.0);
        assert_eq!(stats[1].min_price, 397.0);
        assert_eq!(stats[1].max_price, 1197.0);
    }

    #[test]
    fn test_monthly_plan() {
        let tours = vec![
            tour(
                "The Sea Explorer Tour",
                Difficulty::Medium,
                497.0,
                4.8,
                &["2021-06-19,10:00", "2022-06-19,10:00"],
            ),
            tour(
                "The Forest Hiker Tour",
                Difficulty::Easy,
                397.0,
                4.7,
                &["2021-04-25,10:00", "2021-06-20,10:00"],
            ),
            tour(
                "The Snow Adventurer",
                Difficulty::Difficult,
                997.0,
                4.5,
                &["2021-01-05,10:00"],
            ),
        ];
        let plan = MonthlyPlan::compute(&tours, 2021);
        let months: Vec<u32> = plan.iter().map(|p| p.month).collect();
        assert_eq!(months, vec![6, 1, 4]);
        assert_eq!(plan[0].num_tour_starts, 2);
        assert_eq!(
            plan[0].tours,
            vec!["The Sea Explorer Tour", "The Forest Hiker Tour"]
        );
        assert!(MonthlyPlan::compute(&tours, 2030).is_empty());
    }
}
