// src/models/progress.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// A student's state for one level.
///
/// Transitions only move forward: locked -> unlocked -> completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum LevelStatus {
    Locked,
    Unlocked,
    Completed,
}

/// Represents one row of the 'level_progress' table: a (student, level) pair.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub id: i64,
    pub user_id: i64,
    pub level_number: i64,
    pub status: LevelStatus,

    /// Best percentage score ever achieved. Monotone non-decreasing.
    pub high_score: i64,
}

/// DTO for recording a passed playthrough of a level.
#[derive(Debug, Deserialize, Validate)]
pub struct CompleteLevelRequest {
    #[validate(range(min = 1, message = "Level number must be at least 1."))]
    pub level_number: i64,
    #[validate(range(min = 0, max = 100, message = "Score must be between 0 and 100."))]
    pub score: i64,
}
