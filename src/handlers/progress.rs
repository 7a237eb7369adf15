// src/handlers/progress.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    models::progress::{CompleteLevelRequest, LevelStatus, ProgressEntry},
    utils::jwt::Claims,
};

/// Creates any missing progress entries for a student.
///
/// A student with no entries at all gets one per existing level, with the
/// first level (by sequence number) unlocked. Levels added after registration
/// are filled in as locked.
pub async fn init_progress(pool: &SqlitePool, user_id: i64) -> Result<(), AppError> {
    let existing: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM level_progress WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(pool)
            .await?;

    let level_numbers: Vec<i64> =
        sqlx::query_scalar("SELECT level_number FROM levels ORDER BY level_number ASC")
            .fetch_all(pool)
            .await?;

    for (index, level_number) in level_numbers.iter().enumerate() {
        let status = if existing == 0 && index == 0 {
            LevelStatus::Unlocked
        } else {
            LevelStatus::Locked
        };

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO level_progress (user_id, level_number, status, high_score)
            VALUES (?, ?, ?, 0)
            "#,
        )
        .bind(user_id)
        .bind(level_number)
        .bind(status)
        .execute(pool)
        .await?;
    }

    Ok(())
}

/// Fetches a student's entries ordered by level sequence.
pub async fn fetch_progress(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Vec<ProgressEntry>, AppError> {
    let entries = sqlx::query_as::<_, ProgressEntry>(
        r#"
        SELECT id, user_id, level_number, status, high_score
        FROM level_progress
        WHERE user_id = ?
        ORDER BY level_number ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(entries)
}

/// Returns the calling student's progress, creating it on first access.
pub async fn get_progress(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    init_progress(&pool, user_id).await?;

    let entries = fetch_progress(&pool, user_id).await?;

    Ok(Json(entries))
}

/// Records a passed playthrough of a level.
///
/// High score is monotone (max of old and new); status becomes completed
/// unconditionally; the immediately-next entry is unlocked if still locked.
/// Re-submission with a lower score changes nothing. Failed playthroughs are
/// never submitted here - the client reports those as score 0 and moves on.
pub async fn complete_level(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CompleteLevelRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let user_id = claims.user_id()?;

    let entry = sqlx::query_as::<_, ProgressEntry>(
        r#"
        SELECT id, user_id, level_number, status, high_score
        FROM level_progress
        WHERE user_id = ? AND level_number = ?
        "#,
    )
    .bind(user_id)
    .bind(payload.level_number)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Level not found in progress".to_string()))?;

    let high_score = entry.high_score.max(payload.score);

    sqlx::query("UPDATE level_progress SET status = ?, high_score = ? WHERE id = ?")
        .bind(LevelStatus::Completed)
        .bind(high_score)
        .bind(entry.id)
        .execute(&pool)
        .await?;

    // Unlock the next level by sequence order, if there is one and it is
    // still locked. At most one entry transitions per completion.
    let next = sqlx::query_as::<_, ProgressEntry>(
        r#"
        SELECT id, user_id, level_number, status, high_score
        FROM level_progress
        WHERE user_id = ? AND level_number > ?
        ORDER BY level_number ASC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .bind(payload.level_number)
    .fetch_optional(&pool)
    .await?;

    if let Some(next) = next {
        if next.status == LevelStatus::Locked {
            sqlx::query("UPDATE level_progress SET status = ? WHERE id = ?")
                .bind(LevelStatus::Unlocked)
                .bind(next.id)
                .execute(&pool)
                .await?;
        }
    }

    let entries = fetch_progress(&pool, user_id).await?;

    Ok(Json(serde_json::json!({
        "message": "Level completed successfully",
        "progress": entries,
    })))
}
