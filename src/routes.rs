// src/routes.rs

use axum::{
    Router, http::Method, middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, auth, level, progress, quiz},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware, student_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, levels, progress, admin).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (Database Pool + Config).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    // Student-facing quiz surface: level list with progress, unlocked-level
    // questions (answers withheld), answer grading and voice matching.
    let level_routes = Router::new()
        .route("/student", get(level::get_student_levels))
        .route(
            "/{level_number}/questions/student",
            get(level::get_level_questions),
        )
        .route("/quiz/check-answer", post(quiz::check_answer))
        .route("/quiz/match-voice", post(quiz::match_voice))
        .layer(middleware::from_fn(student_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let progress_routes = Router::new()
        .route("/", get(progress::get_progress))
        .route("/complete-level", post(progress::complete_level))
        .layer(middleware::from_fn(student_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let admin_routes = Router::new()
        .route("/dashboard-stats", get(admin::dashboard_stats))
        .route("/users", get(admin::list_users).post(admin::create_user))
        .route(
            "/users/{id}",
            put(admin::update_user).delete(admin::delete_user),
        )
        .route("/progress/{user_id}", get(admin::get_user_progress))
        .route(
            "/levels",
            get(level::get_all_levels).post(level::create_level),
        )
        .route(
            "/levels/{id}",
            put(level::update_level).delete(level::delete_level),
        )
        .route("/levels/{id}/questions", post(level::create_question))
        .route(
            "/questions/{id}",
            put(level::update_question).delete(level::delete_question),
        )
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/levels", level_routes)
        .nest("/api/progress", progress_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
