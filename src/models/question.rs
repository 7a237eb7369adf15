// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    /// Sequence number of the owning level.
    pub level_number: i64,

    /// The prompt text spoken to the student.
    pub question_text: String,

    pub image_url: String,

    /// 3-4 answer options, stored as a JSON array in the database.
    pub options: Json<Vec<String>>,

    /// The correct answer. Always a member of `options`.
    pub correct_answer: String,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for sending a question to the student (excludes the correct answer).
#[derive(Debug, Serialize, FromRow)]
pub struct PublicQuestion {
    pub id: i64,
    pub level_number: i64,
    pub question_text: String,
    pub image_url: String,
    pub options: Json<Vec<String>>,
}

/// DTO for creating a new question under a level.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 1000, message = "Question text is required."))]
    pub question_text: String,
    #[validate(length(min = 1, max = 1000, message = "Question image URL is required."))]
    pub image_url: String,
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,
    #[validate(length(min = 1, max = 500, message = "Correct answer is required."))]
    pub correct_answer: String,
}

/// DTO for updating a question. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    pub question_text: Option<String>,
    pub image_url: Option<String>,
    #[validate(custom(function = validate_optional_options))]
    pub options: Option<Vec<String>>,
    pub correct_answer: Option<String>,
}

pub fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    if options.len() < 3 || options.len() > 4 {
        let mut err = validator::ValidationError::new("options_count");
        err.message = Some("Options must be an array of 3-4 items.".into());
        return Err(err);
    }
    for opt in options {
        if opt.is_empty() || opt.len() > 500 {
            let mut err = validator::ValidationError::new("option_length");
            err.message = Some("Each option must be 1-500 characters.".into());
            return Err(err);
        }
    }
    Ok(())
}

fn validate_optional_options(options: &Vec<String>) -> Result<(), validator::ValidationError> {
    validate_options(options)
}
