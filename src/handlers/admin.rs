// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use validator::Validate;

use crate::{
    error::AppError,
    handlers::progress::{fetch_progress, init_progress},
    models::user::User,
    utils::{hash::hash_password, jwt::Claims},
};

/// Query parameters for the paginated user listing.
#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

/// Lists users with pagination, username search and sorting.
/// Admin only.
pub async fn list_users(
    State(pool): State<SqlitePool>,
    Query(params): Query<ListUsersQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(10).clamp(1, 100);

    // Sort column and direction are interpolated, so whitelist them.
    let sort_by = match params.sort_by.as_deref() {
        Some("username") => "username",
        _ => "created_at",
    };
    let order = match params.order.as_deref() {
        Some("asc") => "ASC",
        _ => "DESC",
    };

    let search = params.search.filter(|s| !s.is_empty());

    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT id, username, password, role, created_at FROM users");
    if let Some(search) = &search {
        builder.push(" WHERE username LIKE ");
        builder.push_bind(format!("%{}%", search));
    }
    builder.push(format!(" ORDER BY {} {}", sort_by, order));
    builder.push(" LIMIT ");
    builder.push_bind(limit);
    builder.push(" OFFSET ");
    builder.push_bind((page - 1) * limit);

    let users: Vec<User> = builder.build_query_as().fetch_all(&pool).await.map_err(|e| {
        tracing::error!("Failed to list users: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let mut count_builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT COUNT(*) FROM users");
    if let Some(search) = &search {
        count_builder.push(" WHERE username LIKE ");
        count_builder.push_bind(format!("%{}%", search));
    }

    let total_users: i64 = count_builder
        .build_query_scalar()
        .fetch_one(&pool)
        .await?;

    Ok(Json(serde_json::json!({
        "users": users,
        "total_users": total_users,
        "total_pages": (total_users + limit - 1) / limit,
        "current_page": page,
    })))
}

/// DTO for Admin creating a user (can specify role).
#[derive(Debug, Deserialize, Validate)]
pub struct AdminCreateUserRequest {
    #[validate(length(
        min = 3,
        max = 50,
        message = "Username must be at least 3 characters long."
    ))]
    pub username: String,
    #[validate(length(
        min = 6,
        max = 128,
        message = "Password must be at least 6 characters long."
    ))]
    pub password: String,
    /// 'student' or 'admin'. Defaults to student.
    pub role: Option<String>,
}

/// Creates a new user with a specific role. Students get their progress
/// entries initialized immediately.
/// Admin only.
pub async fn create_user(
    State(pool): State<SqlitePool>,
    Json(payload): Json<AdminCreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let role = payload.role.as_deref().unwrap_or("student");
    if role != "student" && role != "admin" {
        return Err(AppError::BadRequest(
            "Role must be 'student' or 'admin'".to_string(),
        ));
    }

    let hashed_password = hash_password(&payload.password)?;

    let result = sqlx::query("INSERT INTO users (username, password, role) VALUES (?, ?, ?)")
        .bind(&payload.username)
        .bind(&hashed_password)
        .bind(role)
        .execute(&pool)
        .await
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint failed") {
                AppError::Conflict(format!("Username '{}' already exists", payload.username))
            } else {
                tracing::error!("Failed to create user: {:?}", e);
                AppError::InternalServerError(e.to_string())
            }
        })?;

    let id = result.last_insert_rowid();

    if role == "student" {
        init_progress(&pool, id).await?;
    }

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": id,
            "username": payload.username,
            "role": role,
        })),
    ))
}

/// DTO for updating a user. Fields are optional but validated when present.
#[derive(Debug, Deserialize, Validate)]
pub struct AdminUpdateUserRequest {
    #[validate(length(
        min = 3,
        max = 50,
        message = "Username must be at least 3 characters long."
    ))]
    pub username: Option<String>,
    pub role: Option<String>,
    #[validate(length(
        min = 6,
        max = 128,
        message = "Password must be at least 6 characters long."
    ))]
    pub password: Option<String>,
}

/// Updates user information.
/// Admin only.
pub async fn update_user(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<AdminUpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    sqlx::query("SELECT id FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    if let Some(new_username) = &payload.username {
        let taken = sqlx::query("SELECT id FROM users WHERE username = ? AND id != ?")
            .bind(new_username)
            .bind(id)
            .fetch_optional(&pool)
            .await?;
        if taken.is_some() {
            return Err(AppError::Conflict(format!(
                "Username '{}' already exists",
                new_username
            )));
        }

        sqlx::query("UPDATE users SET username = ? WHERE id = ?")
            .bind(new_username)
            .bind(id)
            .execute(&pool)
            .await?;
    }

    if let Some(new_role) = &payload.role {
        if new_role != "student" && new_role != "admin" {
            return Err(AppError::BadRequest(
                "Role must be 'student' or 'admin'".to_string(),
            ));
        }
        sqlx::query("UPDATE users SET role = ? WHERE id = ?")
            .bind(new_role)
            .bind(id)
            .execute(&pool)
            .await?;
    }

    if let Some(new_password) = &payload.password {
        let hashed = hash_password(new_password)?;
        sqlx::query("UPDATE users SET password = ? WHERE id = ?")
            .bind(hashed)
            .bind(id)
            .execute(&pool)
            .await?;
    }

    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, password, role, created_at FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(user))
}

/// Deletes a user and their progress.
/// Admin only. Prevents deleting self.
pub async fn delete_user(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if id == claims.user_id()? {
        return Err(AppError::BadRequest("Cannot delete yourself".to_string()));
    }

    // Progress is lifecycle-bound to the account: prune it first.
    sqlx::query("DELETE FROM level_progress WHERE user_id = ?")
        .bind(id)
        .execute(&pool)
        .await?;

    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete user: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Returns one user's progress entries.
/// Admin only.
pub async fn get_user_progress(
    State(pool): State<SqlitePool>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let username: Option<String> = sqlx::query_scalar("SELECT username FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&pool)
        .await?;

    let username = username.ok_or(AppError::NotFound("User not found".to_string()))?;

    let entries = fetch_progress(&pool, user_id).await?;

    Ok(Json(serde_json::json!({
        "user_id": user_id,
        "username": username,
        "progress": entries,
    })))
}

/// Aggregates the dashboard statistics: student and level counts, mean of all
/// positive high scores, completion rate, registrations per day over the last
/// 30 days, and per-level score means. Read-only snapshot, computed on demand.
/// Admin only.
pub async fn dashboard_stats(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let total_users: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'student'")
            .fetch_one(&pool)
            .await?;

    let total_levels: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM levels")
        .fetch_one(&pool)
        .await?;

    let avg_score: i64 = sqlx::query_scalar(
        r#"
        SELECT CAST(COALESCE(ROUND(AVG(high_score)), 0) AS INTEGER)
        FROM level_progress
        WHERE high_score > 0
        "#,
    )
    .fetch_one(&pool)
    .await?;

    // Completion rate over actual progress entries. The original divided by
    // levels x users, which undercounts when students hold differing entry
    // sets (levels added after registration).
    let (completed_entries, total_entries): (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0),
            COUNT(*)
        FROM level_progress
        "#,
    )
    .fetch_one(&pool)
    .await?;

    let completion_rate = if total_entries > 0 {
        (100.0 * completed_entries as f64 / total_entries as f64).round() as i64
    } else {
        0
    };

    let registrations: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT date(created_at) AS day, COUNT(*) AS registrations
        FROM users
        WHERE role = 'student' AND created_at >= datetime('now', '-30 days')
        GROUP BY day
        ORDER BY day ASC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    let registration_data: Vec<serde_json::Value> = registrations
        .into_iter()
        .map(|(date, count)| serde_json::json!({"date": date, "registrations": count}))
        .collect();

    let performance: Vec<(i64, i64)> = sqlx::query_as(
        r#"
        SELECT
            l.level_number,
            CAST(COALESCE(ROUND(AVG(CASE WHEN p.high_score > 0 THEN p.high_score END)), 0) AS INTEGER)
        FROM levels l
        LEFT JOIN level_progress p ON p.level_number = l.level_number
        GROUP BY l.level_number
        ORDER BY l.level_number ASC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    let performance_data: Vec<serde_json::Value> = performance
        .into_iter()
        .map(|(level_number, avg)| {
            serde_json::json!({"level": format!("Level {}", level_number), "avg_score": avg})
        })
        .collect();

    Ok(Json(serde_json::json!({
        "kpis": {
            "total_users": total_users,
            "total_levels": total_levels,
            "avg_score": avg_score,
            "completion_rate": completion_rate,
        },
        "registration_data": registration_data,
        "performance_data": performance_data,
    })))
}
