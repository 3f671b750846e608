//! Domain records stored by the API

pub mod tour;
pub mod user;

pub use tour::{Difficulty, DifficultyStats, MonthlyPlan, Tour};
pub use user::User;
