// tests/admin_tests.rs

use lingo_levels::{config::Config, routes, state::AppState, utils::hash::hash_password};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

async fn spawn_app() -> (String, SqlitePool) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory SQLite");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "admin_test_secret".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        admin_username: None,
        admin_password: None,
    };

    let state = AppState {
        pool: pool.clone(),
        config,
    };

    let app = routes::create_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (address, pool)
}

async fn admin_token(address: &str, pool: &SqlitePool, client: &reqwest::Client) -> String {
    let hashed = hash_password("admin-password").unwrap();
    sqlx::query("INSERT INTO users (username, password, role) VALUES (?, ?, 'admin')")
        .bind("admin")
        .bind(hashed)
        .execute(pool)
        .await
        .unwrap();

    let body = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({"username": "admin", "password": "admin-password"}))
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();

    body["token"].as_str().unwrap().to_string()
}

async fn register_student(address: &str, client: &reqwest::Client, username: &str) -> (String, i64) {
    let body = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": username,
            "password": "password123",
            "confirm_password": "password123"
        }))
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();

    (
        body["token"].as_str().unwrap().to_string(),
        body["id"].as_i64().unwrap(),
    )
}

async fn create_level(
    address: &str,
    client: &reqwest::Client,
    token: &str,
    level_number: i64,
) -> i64 {
    let response = client
        .post(format!("{}/api/admin/levels", address))
        .bearer_auth(token)
        .json(&serde_json::json!({
            "level_number": level_number,
            "title": format!("Level {}", level_number),
            "theme": "travel",
            "image_url": "https://example.com/level.png"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);

    response.json::<serde_json::Value>().await.unwrap()["id"]
        .as_i64()
        .unwrap()
}

async fn create_question(
    address: &str,
    client: &reqwest::Client,
    token: &str,
    level_id: i64,
) -> i64 {
    let response = client
        .post(format!("{}/api/admin/levels/{}/questions", address, level_id))
        .bearer_auth(token)
        .json(&serde_json::json!({
            "question_text": "Pick the greeting",
            "image_url": "https://example.com/q.png",
            "options": ["Hello", "Goodbye", "Thanks"],
            "correct_answer": "Hello"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);

    response.json::<serde_json::Value>().await.unwrap()["id"]
        .as_i64()
        .unwrap()
}

#[tokio::test]
async fn admin_routes_are_role_gated() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();

    // No token.
    let response = client
        .get(format!("{}/api/admin/users", address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    // Student token.
    let (token, _) = register_student(&address, &client, "not_an_admin").await;
    let response = client
        .get(format!("{}/api/admin/users", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn question_invariants_are_enforced() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let admin = admin_token(&address, &pool, &client).await;
    let level_id = create_level(&address, &client, &admin, 1).await;

    // Too few options.
    let response = client
        .post(format!("{}/api/admin/levels/{}/questions", address, level_id))
        .bearer_auth(&admin)
        .json(&serde_json::json!({
            "question_text": "Pick one",
            "image_url": "https://example.com/q.png",
            "options": ["A", "B"],
            "correct_answer": "A"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    // Correct answer not among the options.
    let response = client
        .post(format!("{}/api/admin/levels/{}/questions", address, level_id))
        .bearer_auth(&admin)
        .json(&serde_json::json!({
            "question_text": "Pick one",
            "image_url": "https://example.com/q.png",
            "options": ["A", "B", "C"],
            "correct_answer": "D"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    // Updating options must keep the stored correct answer a member.
    let question_id = create_question(&address, &client, &admin, level_id).await;
    let response = client
        .put(format!("{}/api/admin/questions/{}", address, question_id))
        .bearer_auth(&admin)
        .json(&serde_json::json!({"options": ["Yes", "No", "Maybe"]}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    // Swapping options and answer together is fine.
    let response = client
        .put(format!("{}/api/admin/questions/{}", address, question_id))
        .bearer_auth(&admin)
        .json(&serde_json::json!({
            "options": ["Yes", "No", "Maybe"],
            "correct_answer": "Maybe"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body = response.json::<serde_json::Value>().await.unwrap();
    assert_eq!(body["correct_answer"], "Maybe");
}

#[tokio::test]
async fn updating_a_level_is_partial() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let admin = admin_token(&address, &pool, &client).await;
    let level_id = create_level(&address, &client, &admin, 1).await;

    // Title-only update leaves the other fields untouched.
    let response = client
        .put(format!("{}/api/admin/levels/{}", address, level_id))
        .bearer_auth(&admin)
        .json(&serde_json::json!({"title": "Renamed"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body = response.json::<serde_json::Value>().await.unwrap();
    assert_eq!(body["title"], "Renamed");
    assert_eq!(body["theme"], "travel");
    assert_eq!(body["image_url"], "https://example.com/level.png");
    assert_eq!(body["level_number"], 1);

    // Empty body is a no-op returning the unchanged level.
    let response = client
        .put(format!("{}/api/admin/levels/{}", address, level_id))
        .bearer_auth(&admin)
        .json(&serde_json::json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body = response.json::<serde_json::Value>().await.unwrap();
    assert_eq!(body["title"], "Renamed");
    assert_eq!(body["theme"], "travel");

    // Present-but-empty fields are rejected, same as on create.
    let response = client
        .put(format!("{}/api/admin/levels/{}", address, level_id))
        .bearer_auth(&admin)
        .json(&serde_json::json!({"title": ""}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    // Unknown level.
    let response = client
        .put(format!("{}/api/admin/levels/999999", address))
        .bearer_auth(&admin)
        .json(&serde_json::json!({"title": "Ghost"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn level_creation_conflicts_and_appends_locked_progress() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let admin = admin_token(&address, &pool, &client).await;

    create_level(&address, &client, &admin, 1).await;
    let (_, student_id) = register_student(&address, &client, "learner").await;

    // Duplicate sequence number.
    let response = client
        .post(format!("{}/api/admin/levels", address))
        .bearer_auth(&admin)
        .json(&serde_json::json!({
            "level_number": 1,
            "title": "Duplicate",
            "theme": "travel",
            "image_url": "https://example.com/level.png"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);

    // New level lands as locked in existing progress.
    create_level(&address, &client, &admin, 2).await;
    let status: String = sqlx::query_scalar(
        "SELECT status FROM level_progress WHERE user_id = ? AND level_number = 2",
    )
    .bind(student_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(status, "locked");
}

#[tokio::test]
async fn deleting_a_level_cascades_to_questions_and_progress() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let admin = admin_token(&address, &pool, &client).await;

    let l1 = create_level(&address, &client, &admin, 1).await;
    let l2 = create_level(&address, &client, &admin, 2).await;
    create_question(&address, &client, &admin, l1).await;
    create_question(&address, &client, &admin, l2).await;

    let (_, student_id) = register_student(&address, &client, "learner").await;

    let response = client
        .delete(format!("{}/api/admin/levels/{}", address, l2))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let questions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions WHERE level_number = 2")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(questions, 0);

    let entries: Vec<i64> =
        sqlx::query_scalar("SELECT level_number FROM level_progress WHERE user_id = ?")
            .bind(student_id)
            .fetch_all(&pool)
            .await
            .unwrap();
    assert_eq!(entries, vec![1]);

    // Level 1 and its question are untouched.
    let questions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions WHERE level_number = 1")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(questions, 1);

    let response = client
        .delete(format!("{}/api/admin/levels/{}", address, l2))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn user_management_flow() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let admin = admin_token(&address, &pool, &client).await;
    create_level(&address, &client, &admin, 1).await;

    // Admin-created student gets progress immediately.
    let response = client
        .post(format!("{}/api/admin/users", address))
        .bearer_auth(&admin)
        .json(&serde_json::json!({"username": "new_student", "password": "password123"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let created = response.json::<serde_json::Value>().await.unwrap();
    assert_eq!(created["role"], "student");
    let student_id = created["id"].as_i64().unwrap();

    let entries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM level_progress WHERE user_id = ?")
        .bind(student_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(entries, 1);

    // Invalid role.
    let response = client
        .post(format!("{}/api/admin/users", address))
        .bearer_auth(&admin)
        .json(&serde_json::json!({
            "username": "strange_role",
            "password": "password123",
            "role": "teacher"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    // Search finds the student.
    let body = client
        .get(format!("{}/api/admin/users?search=new_stu&limit=5", address))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();
    assert_eq!(body["total_users"], 1);
    assert_eq!(body["users"][0]["username"], "new_student");
    // Password hashes never leave the API.
    assert!(body["users"][0].get("password").is_none());

    // Updates enforce the same field lengths as creation.
    let response = client
        .put(format!("{}/api/admin/users/{}", address, student_id))
        .bearer_auth(&admin)
        .json(&serde_json::json!({"password": "abc"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let response = client
        .put(format!("{}/api/admin/users/{}", address, student_id))
        .bearer_auth(&admin)
        .json(&serde_json::json!({"username": "ab"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    // Renaming onto an existing username conflicts.
    register_student(&address, &client, "taken_name").await;
    let response = client
        .put(format!("{}/api/admin/users/{}", address, student_id))
        .bearer_auth(&admin)
        .json(&serde_json::json!({"username": "taken_name"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);

    // Self-deletion is refused.
    let admin_id: i64 = sqlx::query_scalar("SELECT id FROM users WHERE username = 'admin'")
        .fetch_one(&pool)
        .await
        .unwrap();
    let response = client
        .delete(format!("{}/api/admin/users/{}", address, admin_id))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    // Deleting a student prunes their progress.
    let response = client
        .delete(format!("{}/api/admin/users/{}", address, student_id))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    let entries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM level_progress WHERE user_id = ?")
        .bind(student_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(entries, 0);
}

#[tokio::test]
async fn dashboard_stats_aggregate_progress() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let admin = admin_token(&address, &pool, &client).await;

    create_level(&address, &client, &admin, 1).await;
    create_level(&address, &client, &admin, 2).await;

    let (token_a, _) = register_student(&address, &client, "student_a").await;
    register_student(&address, &client, "student_b").await;

    // student_a completes level 1 with 80.
    let response = client
        .post(format!("{}/api/progress/complete-level", address))
        .bearer_auth(&token_a)
        .json(&serde_json::json!({"level_number": 1, "score": 80}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let body = client
        .get(format!("{}/api/admin/dashboard-stats", address))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();

    assert_eq!(body["kpis"]["total_users"], 2);
    assert_eq!(body["kpis"]["total_levels"], 2);
    // Only positive high scores count toward the mean.
    assert_eq!(body["kpis"]["avg_score"], 80);
    // 1 completed entry out of 4 (2 students x 2 levels).
    assert_eq!(body["kpis"]["completion_rate"], 25);

    // Both students registered today.
    let registrations = body["registration_data"].as_array().unwrap();
    let total: i64 = registrations
        .iter()
        .map(|r| r["registrations"].as_i64().unwrap())
        .sum();
    assert_eq!(total, 2);

    let performance = body["performance_data"].as_array().unwrap();
    assert_eq!(performance.len(), 2);
    assert_eq!(performance[0]["level"], "Level 1");
    assert_eq!(performance[0]["avg_score"], 80);
    assert_eq!(performance[1]["level"], "Level 2");
    assert_eq!(performance[1]["avg_score"], 0);
}

#[tokio::test]
async fn admin_can_inspect_a_students_progress() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let admin = admin_token(&address, &pool, &client).await;
    create_level(&address, &client, &admin, 1).await;

    let (_, student_id) = register_student(&address, &client, "watched").await;

    let body = client
        .get(format!("{}/api/admin/progress/{}", address, student_id))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();
    assert_eq!(body["username"], "watched");
    assert_eq!(body["progress"][0]["status"], "unlocked");

    let response = client
        .get(format!("{}/api/admin/progress/999999", address))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}
