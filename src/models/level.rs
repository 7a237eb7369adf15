// src/models/level.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::progress::LevelStatus;
use crate::models::question::Question;

/// Represents the 'levels' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Level {
    pub id: i64,

    /// Unique sequence number. Immutable once progress records reference it.
    pub level_number: i64,

    pub title: String,
    pub theme: String,
    pub image_url: String,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Admin view: a level together with its full question set (answers included).
#[derive(Debug, Serialize)]
pub struct LevelWithQuestions {
    #[serde(flatten)]
    pub level: Level,
    pub questions: Vec<Question>,
}

/// Student view: level metadata joined with the caller's progress.
#[derive(Debug, Serialize)]
pub struct StudentLevel {
    pub id: i64,
    pub level_number: i64,
    pub title: String,
    pub theme: String,
    pub image_url: String,
    pub status: LevelStatus,
    pub high_score: i64,
}

/// DTO for creating a new level.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateLevelRequest {
    #[validate(range(min = 1, message = "Level number must be at least 1."))]
    pub level_number: i64,
    #[validate(length(min = 1, max = 200, message = "Level title is required."))]
    pub title: String,
    #[validate(length(min = 1, max = 200, message = "Level theme is required."))]
    pub theme: String,
    #[validate(length(min = 1, max = 1000, message = "Level image URL is required."))]
    pub image_url: String,
}

/// DTO for updating a level. Fields are optional; the sequence number is immutable.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateLevelRequest {
    #[validate(length(min = 1, max = 200, message = "Level title must not be empty."))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 200, message = "Level theme must not be empty."))]
    pub theme: Option<String>,
    #[validate(length(min = 1, max = 1000, message = "Level image URL must not be empty."))]
    pub image_url: Option<String>,
}
