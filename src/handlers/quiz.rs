// src/handlers/quiz.rs

use axum::{Json, extract::State, response::IntoResponse};
use serde::Deserialize;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    engine::matcher,
    error::AppError,
    models::question::Question,
};

/// DTO for grading a selected option.
#[derive(Debug, Deserialize, Validate)]
pub struct CheckAnswerRequest {
    #[validate(range(min = 1))]
    pub question_id: i64,
    #[validate(length(min = 1, max = 500, message = "Selected option is required."))]
    pub selected_option: String,
}

/// DTO for matching a voice transcript against a question's options.
#[derive(Debug, Deserialize, Validate)]
pub struct MatchVoiceRequest {
    #[validate(range(min = 1))]
    pub question_id: i64,
    #[validate(length(min = 1, max = 1000, message = "Transcript is required."))]
    pub transcript: String,
}

async fn fetch_question(pool: &SqlitePool, question_id: i64) -> Result<Question, AppError> {
    sqlx::query_as::<_, Question>(
        r#"
        SELECT id, level_number, question_text, image_url, options, correct_answer, created_at
        FROM questions
        WHERE id = ?
        "#,
    )
    .bind(question_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Question not found".to_string()))
}

/// Grades a selected option against the stored ground truth.
///
/// The correct answer is never sent to the client before this point; the
/// response reveals it so the UI can show feedback. Comparison is
/// case-insensitive.
pub async fn check_answer(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CheckAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let question = fetch_question(&pool, payload.question_id).await?;

    let correct =
        question.correct_answer.to_lowercase() == payload.selected_option.to_lowercase();

    Ok(Json(serde_json::json!({
        "correct": correct,
        "correct_answer": question.correct_answer,
    })))
}

/// Resolves a speech transcript to one of the question's options.
///
/// The browser captures speech and sends the raw transcript; the matcher
/// picks the closest option above the similarity threshold or rejects. The
/// client then submits the matched option through `check_answer` like any
/// clicked one.
pub async fn match_voice(
    State(pool): State<SqlitePool>,
    Json(payload): Json<MatchVoiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let question = fetch_question(&pool, payload.question_id).await?;

    let response = match matcher::best_match(&payload.transcript, &question.options) {
        Some(m) => serde_json::json!({
            "matched": true,
            "option": m.option,
            "similarity": m.similarity,
        }),
        None => serde_json::json!({
            "matched": false,
            "option": null,
            "similarity": null,
        }),
    };

    Ok(Json(response))
}
