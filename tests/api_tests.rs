// tests/api_tests.rs

use std::sync::Arc;

use assessment_backend::{
    config::Config,
    engine::SessionSettings,
    models::{
        question::{Difficulty, OptionTag, Question},
        survey::{Survey, SurveyStatus},
        user::{User, UserStatus},
    },
    repository::{MemoryCatalogStore, MemoryProgressStore, MemorySubmissionService, MemoryUserStore},
    routes,
    state::{AppState, Stores},
    utils::hash::hash_password,
};
use serde_json::{Value, json};

const PASSWORD: &str = "password123";

fn question(survey_id: &str, i: usize, correct: OptionTag) -> Question {
    Question {
        id: format!("{}-q{}", survey_id, i),
        survey_id: survey_id.to_string(),
        section_id: "general".to_string(),
        question_text: format!("Question {}", i),
        options: [
            "Alpha".to_string(),
            "Beta".to_string(),
            "Gamma".to_string(),
            "Delta".to_string(),
        ],
        correct_answer: correct,
        complexity: Difficulty::Medium,
        marks: 2,
        explanation: Some("Because.".to_string()),
        topic: None,
        is_active: true,
    }
}

fn survey(id: &str, status: SurveyStatus) -> Survey {
    Survey {
        id: id.to_string(),
        name: format!("Survey {}", id),
        description: None,
        duration_minutes: 30,
        total_questions: 3,
        passing_percentage: 70,
        max_attempts: 1,
        status,
    }
}

fn user(id: i64, username: &str, role: &str, password_hash: &str) -> User {
    User {
        id,
        username: username.to_string(),
        password: password_hash.to_string(),
        role: role.to_string(),
        permissions: None,
        status: UserStatus::Active,
    }
}

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
async fn spawn_app() -> String {
    // 1. Seed in-memory stores
    let password_hash = hash_password(PASSWORD).unwrap();

    let users = MemoryUserStore::new();
    users.insert(user(1, "admin", "admin", &password_hash)).await;
    users.insert(user(2, "field_one", "enumerator", &password_hash)).await;
    users.insert(user(3, "field_two", "enumerator", &password_hash)).await;
    users.insert(user(4, "lead", "supervisor", &password_hash)).await;
    users
        .insert(User {
            permissions: Some(vec!["reports.view".to_string()]),
            ..user(5, "analyst", "enumerator", &password_hash)
        })
        .await;
    users
        .insert(User {
            status: UserStatus::Suspended,
            ..user(6, "benched", "enumerator", &password_hash)
        })
        .await;

    let catalog = MemoryCatalogStore::new();
    catalog
        .insert(
            survey("census-basics", SurveyStatus::Active),
            vec![
                question("census-basics", 0, OptionTag::A),
                question("census-basics", 1, OptionTag::B),
                question("census-basics", 2, OptionTag::C),
            ],
        )
        .await;
    catalog
        .insert(
            survey("draft-survey", SurveyStatus::Draft),
            vec![question("draft-survey", 0, OptionTag::D)],
        )
        .await;

    let stores = Stores {
        users: Arc::new(users),
        catalog: Arc::new(catalog),
        progress: Arc::new(MemoryProgressStore::new()),
        submissions: Arc::new(MemorySubmissionService::new()),
    };

    // 2. Create test configuration and state
    let config = Config {
        database_url: None,
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        admin_username: None,
        admin_password: None,
        session: SessionSettings::default(),
    };

    let state = AppState::new(config, stores);

    // 3. Create the router with the app state
    let app = routes::create_router(state);

    // 4. Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // 5. Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

async fn login(client: &reqwest::Client, address: &str, username: &str) -> String {
    let response = client
        .post(format!("{}/api/auth/login", address))
        .json(&json!({ "username": username, "password": PASSWORD }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 200);

    let body: Value = response.json().await.unwrap();
    body["token"].as_str().unwrap().to_string()
}

async fn start_session(client: &reqwest::Client, address: &str, token: &str) -> String {
    let response = client
        .post(format!("{}/api/sessions", address))
        .bearer_auth(token)
        .json(&json!({ "test_id": "census-basics" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 201);

    let body: Value = response.json().await.unwrap();
    body["session"]["session_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_check_404() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn login_returns_role_details() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let body: Value = client
        .post(format!("{}/api/auth/login", address))
        .json(&json!({ "username": "analyst", "password": PASSWORD }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["type"], "Bearer");
    assert_eq!(body["role"], "enumerator");
    assert_eq!(body["role_name"], "Enumerator");
    assert_eq!(body["permissions"], json!(["reports.view"]));
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let wrong_password = client
        .post(format!("{}/api/auth/login", address))
        .json(&json!({ "username": "field_one", "password": "not-it" }))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong_password.status().as_u16(), 401);

    let unknown = client
        .post(format!("{}/api/auth/login", address))
        .json(&json!({ "username": "nobody", "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status().as_u16(), 401);

    let empty = client
        .post(format!("{}/api/auth/login", address))
        .json(&json!({ "username": "", "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status().as_u16(), 400);

    let suspended = client
        .post(format!("{}/api/auth/login", address))
        .json(&json!({ "username": "benched", "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(suspended.status().as_u16(), 403);
}

#[tokio::test]
async fn access_routes_require_a_token() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/access/menu", address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    let response = client
        .get(format!("{}/api/access/menu", address))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn enumerator_menu_follows_role_defaults() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = login(&client, &address, "field_one").await;

    let menu: Vec<Value> = client
        .get(format!("{}/api/access/menu", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let ids: Vec<&str> = menu.iter().map(|m| m["id"].as_str().unwrap()).collect();
    assert_eq!(ids, ["dashboard", "my-tests", "my-results", "my-certificates"]);

    let check: Value = client
        .get(format!("{}/api/access/check?permission=tests.take", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(check["allowed"], true);

    let menu_check: Value = client
        .get(format!("{}/api/access/menu/users", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(menu_check["allowed"], false);
}

#[tokio::test]
async fn permission_override_replaces_role_defaults() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = login(&client, &address, "analyst").await;

    let check: Value = client
        .get(format!("{}/api/access/check?permission=tests.take", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(check["allowed"], false);

    // The override grants reports.view but the menu entry is not offered to enumerators.
    let menu: Vec<Value> = client
        .get(format!("{}/api/access/menu", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(menu.is_empty());

    let response = client
        .post(format!("{}/api/sessions", address))
        .bearer_auth(&token)
        .json(&json!({ "test_id": "census-basics" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn permission_catalog_is_grouped() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = login(&client, &address, "lead").await;

    let catalog: Value = client
        .get(format!("{}/api/access/permissions", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let tests = catalog["Test Management"].as_array().unwrap();
    assert_eq!(tests.len(), 4);
    assert!(tests.iter().any(|p| p["id"] == "tests.manage_sessions"));
}

#[tokio::test]
async fn supervisor_cannot_take_tests() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = login(&client, &address, "lead").await;

    let response = client
        .post(format!("{}/api/sessions", address))
        .bearer_auth(&token)
        .json(&json!({ "test_id": "census-basics" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn start_rejects_unknown_and_closed_tests() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = login(&client, &address, "field_one").await;

    let missing = client
        .post(format!("{}/api/sessions", address))
        .bearer_auth(&token)
        .json(&json!({ "test_id": "no-such-test" }))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status().as_u16(), 404);

    let draft = client
        .post(format!("{}/api/sessions", address))
        .bearer_auth(&token)
        .json(&json!({ "test_id": "draft-survey" }))
        .send()
        .await
        .unwrap();
    assert_eq!(draft.status().as_u16(), 400);
}

#[tokio::test]
async fn test_session_flow() {
    // 1. Login and start
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = login(&client, &address, "field_one").await;

    let response = client
        .post(format!("{}/api/sessions", address))
        .bearer_auth(&token)
        .json(&json!({ "test_id": "census-basics" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    let session_id = body["session"]["session_id"].as_str().unwrap().to_string();
    assert_eq!(body["session"]["remaining_seconds"], 1800);
    assert_eq!(body["session"]["phase"]["state"], "running");
    let questions = body["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 3);
    assert!(questions[0].get("correct_answer").is_none());

    // 2. Answer two questions, one of them wrongly
    for (index, option) in [(0, "A"), (1, "C")] {
        let response = client
            .put(format!("{}/api/sessions/{}/answers/{}", address, session_id, index))
            .bearer_auth(&token)
            .json(&json!({ "option": option }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
    }

    let bad_option = client
        .put(format!("{}/api/sessions/{}/answers/2", address, session_id))
        .bearer_auth(&token)
        .json(&json!({ "option": "E" }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_option.status().as_u16(), 400);

    let out_of_range = client
        .put(format!("{}/api/sessions/{}/answers/9", address, session_id))
        .bearer_auth(&token)
        .json(&json!({ "option": "A" }))
        .send()
        .await
        .unwrap();
    assert_eq!(out_of_range.status().as_u16(), 400);

    // 3. Mark for review and navigate past the end
    let review: Value = client
        .post(format!("{}/api/sessions/{}/review/2", address, session_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(review["marked"], true);

    let view: Value = client
        .post(format!("{}/api/sessions/{}/navigate", address, session_id))
        .bearer_auth(&token)
        .json(&json!({ "index": 42 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(view["current_index"], 2);
    assert_eq!(view["answered"], 2);
    assert_eq!(view["marked"], 1);
    assert_eq!(view["statuses"], json!(["answered", "answered", "marked"]));

    // 4. Another user cannot see the session
    let other = login(&client, &address, "field_two").await;
    let response = client
        .get(format!("{}/api/sessions/{}", address, session_id))
        .bearer_auth(&other)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    // 5. Save and submit
    let response = client
        .post(format!("{}/api/sessions/{}/save", address, session_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    let response = client
        .post(format!("{}/api/sessions/{}/submit", address, session_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let result: Value = response.json().await.unwrap();
    assert_eq!(result["correct"], 1);
    assert_eq!(result["attempted"], 2);
    assert_eq!(result["percentage"], 33);
    assert_eq!(result["passed"], false);
    assert_eq!(result["obtained_marks"], 2);
    assert_eq!(result["total_marks"], 6);

    // 6. The finished session is gone
    let response = client
        .post(format!("{}/api/sessions/{}/submit", address, session_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn offline_session_reports_paused_phase() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = login(&client, &address, "field_one").await;
    let session_id = start_session(&client, &address, &token).await;

    let view: Value = client
        .post(format!("{}/api/sessions/{}/connectivity", address, session_id))
        .bearer_auth(&token)
        .json(&json!({ "online": false }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(view["phase"], json!({ "state": "paused", "reason": "offline" }));
    assert_eq!(view["online"], false);

    // Submitting while paused is refused.
    let response = client
        .post(format!("{}/api/sessions/{}/submit", address, session_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);

    let view: Value = client
        .post(format!("{}/api/sessions/{}/connectivity", address, session_id))
        .bearer_auth(&token)
        .json(&json!({ "online": true }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(view["phase"]["state"], "running");
}

#[tokio::test]
async fn exit_then_resume_keeps_answers() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = login(&client, &address, "field_one").await;
    let session_id = start_session(&client, &address, &token).await;

    client
        .put(format!("{}/api/sessions/{}/answers/1", address, session_id))
        .bearer_auth(&token)
        .json(&json!({ "option": "B" }))
        .send()
        .await
        .unwrap();

    let response = client
        .post(format!("{}/api/sessions/{}/exit", address, session_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    // Someone else cannot resume it.
    let other = login(&client, &address, "field_two").await;
    let response = client
        .post(format!("{}/api/sessions", address))
        .bearer_auth(&other)
        .json(&json!({ "test_id": "census-basics", "session_id": session_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    let response = client
        .post(format!("{}/api/sessions", address))
        .bearer_auth(&token)
        .json(&json!({ "test_id": "census-basics", "session_id": session_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["session"]["answered"], 1);
    assert_eq!(body["session"]["statuses"][1], "answered");
}

#[tokio::test]
async fn session_managers_can_pause_and_resume() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = login(&client, &address, "field_one").await;
    let session_id = start_session(&client, &address, &token).await;

    // Supervisors lack tests.manage_sessions by default.
    let supervisor = login(&client, &address, "lead").await;
    let response = client
        .post(format!("{}/api/admin/sessions/{}/pause", address, session_id))
        .bearer_auth(&supervisor)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    let admin = login(&client, &address, "admin").await;
    let view: Value = client
        .post(format!("{}/api/admin/sessions/{}/pause", address, session_id))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(view["phase"], json!({ "state": "paused", "reason": "manual" }));

    // Reconnecting does not lift a manual pause.
    let view: Value = client
        .post(format!("{}/api/sessions/{}/connectivity", address, session_id))
        .bearer_auth(&token)
        .json(&json!({ "online": true }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(view["phase"]["state"], "paused");

    let response = client
        .post(format!("{}/api/admin/sessions/{}/resume", address, session_id))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let response = client
        .post(format!("{}/api/admin/sessions/{}/resume", address, session_id))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);
}
