// src/handlers/level.rs

use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use validator::Validate;

use crate::{
    error::AppError,
    handlers::progress::init_progress,
    models::{
        level::{CreateLevelRequest, Level, LevelWithQuestions, StudentLevel, UpdateLevelRequest},
        progress::{LevelStatus, ProgressEntry},
        question::{
            CreateQuestionRequest, PublicQuestion, Question, UpdateQuestionRequest,
            validate_options,
        },
    },
    utils::jwt::Claims,
};

const LEVEL_COLUMNS: &str = "id, level_number, title, theme, image_url, created_at";

async fn fetch_level_by_id(pool: &SqlitePool, id: i64) -> Result<Level, AppError> {
    sqlx::query_as::<_, Level>(&format!(
        "SELECT {LEVEL_COLUMNS} FROM levels WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Level not found".to_string()))
}

/// Lists all levels joined with the caller's progress.
/// Student only.
pub async fn get_student_levels(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    init_progress(&pool, user_id).await?;

    let levels = sqlx::query_as::<_, Level>(&format!(
        "SELECT {LEVEL_COLUMNS} FROM levels ORDER BY level_number ASC"
    ))
    .fetch_all(&pool)
    .await?;

    let entries = sqlx::query_as::<_, ProgressEntry>(
        r#"
        SELECT id, user_id, level_number, status, high_score
        FROM level_progress
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    let by_level: HashMap<i64, &ProgressEntry> =
        entries.iter().map(|e| (e.level_number, e)).collect();

    let response: Vec<StudentLevel> = levels
        .into_iter()
        .map(|level| {
            let entry = by_level.get(&level.level_number);
            StudentLevel {
                id: level.id,
                level_number: level.level_number,
                title: level.title,
                theme: level.theme,
                image_url: level.image_url,
                status: entry.map(|e| e.status).unwrap_or(LevelStatus::Locked),
                high_score: entry.map(|e| e.high_score).unwrap_or(0),
            }
        })
        .collect();

    Ok(Json(response))
}

/// Returns a level's questions with the correct answers withheld.
/// Student only; the level must be unlocked for the caller.
pub async fn get_level_questions(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(level_number): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let level = sqlx::query_as::<_, Level>(&format!(
        "SELECT {LEVEL_COLUMNS} FROM levels WHERE level_number = ?"
    ))
    .bind(level_number)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Level not found".to_string()))?;

    let status: Option<LevelStatus> = sqlx::query_scalar(
        "SELECT status FROM level_progress WHERE user_id = ? AND level_number = ?",
    )
    .bind(user_id)
    .bind(level_number)
    .fetch_optional(&pool)
    .await?;

    match status {
        Some(LevelStatus::Unlocked) | Some(LevelStatus::Completed) => {}
        _ => return Err(AppError::Forbidden("Level is locked".to_string())),
    }

    let questions = sqlx::query_as::<_, PublicQuestion>(
        r#"
        SELECT id, level_number, question_text, image_url, options
        FROM questions
        WHERE level_number = ?
        ORDER BY id ASC
        "#,
    )
    .bind(level_number)
    .fetch_all(&pool)
    .await?;

    Ok(Json(serde_json::json!({
        "level": level,
        "questions": questions,
    })))
}

/// Lists all levels with their full question sets, answers included.
/// Admin only.
pub async fn get_all_levels(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let levels = sqlx::query_as::<_, Level>(&format!(
        "SELECT {LEVEL_COLUMNS} FROM levels ORDER BY level_number ASC"
    ))
    .fetch_all(&pool)
    .await?;

    let questions = sqlx::query_as::<_, Question>(
        r#"
        SELECT id, level_number, question_text, image_url, options, correct_answer, created_at
        FROM questions
        ORDER BY id ASC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    let mut by_level: HashMap<i64, Vec<Question>> = HashMap::new();
    for question in questions {
        by_level.entry(question.level_number).or_default().push(question);
    }

    let response: Vec<LevelWithQuestions> = levels
        .into_iter()
        .map(|level| {
            let questions = by_level.remove(&level.level_number).unwrap_or_default();
            LevelWithQuestions { level, questions }
        })
        .collect();

    Ok(Json(response))
}

/// Creates a new level and appends a locked progress entry for every student
/// that already has progress.
/// Admin only.
pub async fn create_level(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateLevelRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO levels (level_number, title, theme, image_url)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(payload.level_number)
    .bind(&payload.title)
    .bind(&payload.theme)
    .bind(&payload.image_url)
    .execute(&pool)
    .await
    .map_err(|e| {
        if e.to_string().contains("UNIQUE constraint failed") {
            AppError::Conflict(format!(
                "Level number {} already exists",
                payload.level_number
            ))
        } else {
            tracing::error!("Failed to create level: {:?}", e);
            AppError::from(e)
        }
    })?;

    // Existing students see the new level as locked.
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO level_progress (user_id, level_number, status, high_score)
        SELECT DISTINCT user_id, ?, 'locked', 0 FROM level_progress
        "#,
    )
    .bind(payload.level_number)
    .execute(&pool)
    .await?;

    let level = fetch_level_by_id(&pool, result.last_insert_rowid()).await?;

    Ok((StatusCode::CREATED, Json(level)))
}

/// Updates a level's title, theme or image. The sequence number is immutable
/// identity once progress records reference it.
/// Admin only.
pub async fn update_level(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateLevelRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let level = fetch_level_by_id(&pool, id).await?;

    if payload.title.is_none() && payload.theme.is_none() && payload.image_url.is_none() {
        return Ok(Json(level));
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE levels SET ");
    let mut separated = builder.separated(", ");

    if let Some(title) = payload.title {
        separated.push("title = ");
        separated.push_bind_unseparated(title);
    }

    if let Some(theme) = payload.theme {
        separated.push("theme = ");
        separated.push_bind_unseparated(theme);
    }

    if let Some(image_url) = payload.image_url {
        separated.push("image_url = ");
        separated.push_bind_unseparated(image_url);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to update level: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let level = fetch_level_by_id(&pool, id).await?;

    Ok(Json(level))
}

/// Deletes a level and everything hanging off it: its questions, then the
/// matching entry in every student's progress, then the level itself.
///
/// The steps run sequentially without a cross-table transaction; a failure
/// partway is logged and surfaced, leaving a manually-recoverable state.
/// Admin only.
pub async fn delete_level(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let level = fetch_level_by_id(&pool, id).await?;

    let questions = sqlx::query("DELETE FROM questions WHERE level_number = ?")
        .bind(level.level_number)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!(
                "Cascade delete of level {} failed at questions step: {:?}",
                level.level_number,
                e
            );
            AppError::from(e)
        })?;

    let entries = sqlx::query("DELETE FROM level_progress WHERE level_number = ?")
        .bind(level.level_number)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!(
                "Cascade delete of level {} failed at progress step ({} questions already deleted): {:?}",
                level.level_number,
                questions.rows_affected(),
                e
            );
            AppError::from(e)
        })?;

    sqlx::query("DELETE FROM levels WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!(
                "Cascade delete of level {} failed at final step ({} questions, {} progress entries already deleted): {:?}",
                level.level_number,
                questions.rows_affected(),
                entries.rows_affected(),
                e
            );
            AppError::from(e)
        })?;

    tracing::info!(
        "Deleted level {} with {} questions and {} progress entries",
        level.level_number,
        questions.rows_affected(),
        entries.rows_affected()
    );

    Ok(Json(serde_json::json!({
        "message": "Level deleted successfully"
    })))
}

/// Creates a question under a level.
/// Admin only. Enforces 3-4 options with the correct answer among them.
pub async fn create_question(
    State(pool): State<SqlitePool>,
    Path(level_id): Path<i64>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    if !payload.options.contains(&payload.correct_answer) {
        return Err(AppError::BadRequest(
            "Correct answer must be one of the options".to_string(),
        ));
    }

    let level = fetch_level_by_id(&pool, level_id).await?;

    let options_json = serde_json::to_string(&payload.options)?;

    let result = sqlx::query(
        r#"
        INSERT INTO questions (level_number, question_text, image_url, options, correct_answer)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(level.level_number)
    .bind(&payload.question_text)
    .bind(&payload.image_url)
    .bind(&options_json)
    .bind(&payload.correct_answer)
    .execute(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create question: {:?}", e);
        AppError::from(e)
    })?;

    let question = fetch_question_by_id(&pool, result.last_insert_rowid()).await?;

    Ok((StatusCode::CREATED, Json(question)))
}

async fn fetch_question_by_id(pool: &SqlitePool, id: i64) -> Result<Question, AppError> {
    sqlx::query_as::<_, Question>(
        r#"
        SELECT id, level_number, question_text, image_url, options, correct_answer, created_at
        FROM questions
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Question not found".to_string()))
}

/// Updates a question. The option-count and membership invariants are checked
/// against the effective state after the update.
/// Admin only.
pub async fn update_question(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let question = fetch_question_by_id(&pool, id).await?;

    let effective_options = payload.options.as_ref().unwrap_or(&question.options.0);
    let effective_answer = payload
        .correct_answer
        .as_ref()
        .unwrap_or(&question.correct_answer);

    if validate_options(effective_options).is_err() {
        return Err(AppError::BadRequest(
            "Options must be an array of 3-4 items".to_string(),
        ));
    }

    if !effective_options.contains(effective_answer) {
        return Err(AppError::BadRequest(
            "Correct answer must be one of the options".to_string(),
        ));
    }

    if payload.question_text.is_none()
        && payload.image_url.is_none()
        && payload.options.is_none()
        && payload.correct_answer.is_none()
    {
        return Ok(Json(question));
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE questions SET ");
    let mut separated = builder.separated(", ");

    if let Some(question_text) = payload.question_text {
        separated.push("question_text = ");
        separated.push_bind_unseparated(question_text);
    }

    if let Some(image_url) = payload.image_url {
        separated.push("image_url = ");
        separated.push_bind_unseparated(image_url);
    }

    if let Some(options) = payload.options {
        separated.push("options = ");
        separated.push_bind_unseparated(serde_json::to_string(&options)?);
    }

    if let Some(correct_answer) = payload.correct_answer {
        separated.push("correct_answer = ");
        separated.push_bind_unseparated(correct_answer);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to update question: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let question = fetch_question_by_id(&pool, id).await?;

    Ok(Json(question))
}

/// Deletes a question by ID.
/// Admin only.
pub async fn delete_question(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM questions WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete question: {:?}", e);
            AppError::from(e)
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
