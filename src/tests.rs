use crate::handlers::CAUSER_HEADER;
use crate::handlers::roles::SyncRolesRequest;
use crate::handlers::users::{CreateUserRequest, UpdateUserRequest};
use crate::schemas::{profile_cache_key, ApiResponse, CachedData, ErrorResponse};
use crate::test_utils::setup_test_app;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use model::entities::page::{self, ContentStatus};
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::{json, Value};

fn create_request(name: &str, email: &str) -> CreateUserRequest {
    CreateUserRequest {
        name: name.to_string(),
        email: email.to_string(),
        password: "password123".to_string(),
        phone: None,
        avatar: None,
        language: None,
        timezone: None,
        is_active: None,
        profile_data: None,
    }
}

async fn create(server: &TestServer, name: &str, email: &str) -> i64 {
    let response = server.post("/api/v1/users").json(&create_request(name, email)).await;
    response.assert_status(StatusCode::CREATED);
    let body: ApiResponse<Value> = response.json();
    body.data["id"].as_i64().unwrap()
}

async fn server() -> (TestServer, crate::schemas::AppState) {
    let (app, state) = setup_test_app().await;
    (TestServer::new(app).unwrap(), state)
}

#[tokio::test]
async fn test_health_check() {
    let (server, _) = server().await;
    let response = server.get("/health").await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let (server, _) = server().await;
    let response = server.get("/api-docs/openapi.json").await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert!(body["paths"]["/api/v1/users/{user_id}/summary"].is_object());
}

#[tokio::test]
async fn test_create_user() {
    let (server, _) = server().await;
    let response = server
        .post("/api/v1/users")
        .json(&create_request("Jane Doe", "jane@example.com"))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: ApiResponse<Value> = response.json();
    assert!(body.success);
    assert_eq!(body.message, "User created successfully");

    let user = body.data.as_object().unwrap();
    assert_eq!(user["email"], "jane@example.com");
    assert_eq!(user["is_active"], true);
    assert!(!user.contains_key("password"));
    assert!(!user.contains_key("remember_token"));
    assert_eq!(
        user["avatar_url"],
        "https://ui-avatars.com/api/?name=Jane%20Doe&color=7F9CF5&background=EBF4FF"
    );
}

#[tokio::test]
async fn test_create_user_with_avatar_uses_storage_url() {
    let (server, _) = server().await;
    let mut request = create_request("Omar", "omar@example.com");
    request.avatar = Some("avatars/omar.png".to_string());

    let response = server.post("/api/v1/users").json(&request).await;
    response.assert_status(StatusCode::CREATED);
    let body: ApiResponse<Value> = response.json();
    assert_eq!(body.data["avatar_url"], "https://cms.example.com/storage/avatars/omar.png");
}

#[tokio::test]
async fn test_create_user_validation_errors() {
    let (server, _) = server().await;

    let response = server
        .post("/api/v1/users")
        .json(&create_request("Jane", "not-an-email"))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: ErrorResponse = response.json();
    assert_eq!(body.code, "VALIDATION_ERROR");
    assert!(!body.success);

    let mut short_password = create_request("Jane", "jane@example.com");
    short_password.password = "short".to_string();
    let response = server.post("/api/v1/users").json(&short_password).await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_duplicate_email_is_conflict() {
    let (server, _) = server().await;
    create(&server, "A", "dup@example.com").await;

    let response = server
        .post("/api/v1/users")
        .json(&create_request("B", "dup@example.com"))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    let body: ErrorResponse = response.json();
    assert_eq!(body.code, "EMAIL_ALREADY_EXISTS");
}

#[tokio::test]
async fn test_get_missing_user() {
    let (server, _) = server().await;
    let response = server.get("/api/v1/users/999").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: ErrorResponse = response.json();
    assert_eq!(body.code, "USER_NOT_FOUND");
}

#[tokio::test]
async fn test_update_user_records_activity() {
    let (server, _) = server().await;
    let id = create(&server, "Huda", "huda@example.com").await;

    let update = UpdateUserRequest {
        name: Some("Huda Ali".to_string()),
        language: Some("ar".to_string()),
        ..Default::default()
    };
    let response = server
        .put(&format!("/api/v1/users/{}", id))
        .add_header(HeaderName::from_static(CAUSER_HEADER), HeaderValue::from_static("1"))
        .json(&update)
        .await;
    response.assert_status(StatusCode::OK);
    let body: ApiResponse<Value> = response.json();
    assert_eq!(body.data["name"], "Huda Ali");
    assert_eq!(body.data["language"], "ar");

    let response = server.get(&format!("/api/v1/users/{}/activity", id)).await;
    response.assert_status(StatusCode::OK);
    let body: ApiResponse<Vec<Value>> = response.json();
    assert_eq!(body.data.len(), 2);
    assert_eq!(body.data[0]["description"], "updated");
    assert_eq!(body.data[0]["causer_id"], 1);
    assert_eq!(
        body.data[0]["properties"],
        json!({"attributes": {"name": "Huda Ali"}, "old": {"name": "Huda"}})
    );
    assert_eq!(body.data[1]["description"], "created");
}

#[tokio::test]
async fn test_soft_delete_restore_and_listing() {
    let (server, _) = server().await;
    let a = create(&server, "A", "a@example.com").await;
    create(&server, "B", "b@example.com").await;

    server
        .delete(&format!("/api/v1/users/{}", a))
        .await
        .assert_status(StatusCode::OK);
    server
        .get(&format!("/api/v1/users/{}", a))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let listed: ApiResponse<Vec<Value>> = server.get("/api/v1/users?active=true").await.json();
    assert_eq!(listed.data.len(), 1);

    let trashed: ApiResponse<Vec<Value>> = server.get("/api/v1/users?trashed=only").await.json();
    assert_eq!(trashed.data.len(), 1);
    assert_eq!(trashed.data[0]["id"], a);
    assert!(trashed.data[0]["deleted_at"].is_string());

    let everyone: ApiResponse<Vec<Value>> = server.get("/api/v1/users?trashed=with").await.json();
    assert_eq!(everyone.data.len(), 2);

    server
        .post(&format!("/api/v1/users/{}/restore", a))
        .await
        .assert_status(StatusCode::OK);
    let listed: ApiResponse<Vec<Value>> = server.get("/api/v1/users").await.json();
    assert_eq!(listed.data.len(), 2);
}

#[tokio::test]
async fn test_list_query_is_validated() {
    let (server, _) = server().await;
    server
        .get("/api/v1/users?trashed=sometimes")
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    server
        .get("/api/v1/users?limit=0")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_filters_by_role_and_pages() {
    let (server, _) = server().await;
    let a = create(&server, "A", "a@example.com").await;
    let b = create(&server, "B", "b@example.com").await;
    create(&server, "C", "c@example.com").await;

    server
        .post(&format!("/api/v1/users/{}/roles/editor", b))
        .await
        .assert_status(StatusCode::OK);

    let editors: ApiResponse<Vec<Value>> = server.get("/api/v1/users?role=editor").await.json();
    assert_eq!(editors.data.len(), 1);
    assert_eq!(editors.data[0]["id"], b);

    let first_page: ApiResponse<Vec<Value>> = server.get("/api/v1/users?page=1&limit=2").await.json();
    assert_eq!(first_page.data.len(), 2);
    assert_eq!(first_page.data[0]["id"], a);
}

#[tokio::test]
async fn test_purge_requires_soft_delete_and_no_content() {
    let (server, state) = server().await;
    let id = create(&server, "Author", "author@example.com").await;

    let response = server.delete(&format!("/api/v1/users/{}/purge", id)).await;
    response.assert_status(StatusCode::CONFLICT);
    let body: ErrorResponse = response.json();
    assert_eq!(body.code, "USER_NOT_TRASHED");

    let page = page::ActiveModel {
        title: Set("About".to_string()),
        slug: Set("about".to_string()),
        status: Set(ContentStatus::Published),
        created_by: Set(id as i32),
        ..Default::default()
    }
    .insert(&state.db)
    .await
    .unwrap();

    server
        .delete(&format!("/api/v1/users/{}", id))
        .await
        .assert_status(StatusCode::OK);

    // content survives the soft delete and blocks the purge
    let content: ApiResponse<Value> = server
        .post(&format!("/api/v1/users/{}/restore", id))
        .await
        .json();
    assert!(content.success);
    let content: ApiResponse<Value> = server.get(&format!("/api/v1/users/{}/content", id)).await.json();
    assert_eq!(content.data["pages"], json!([page.id]));

    server
        .delete(&format!("/api/v1/users/{}", id))
        .await
        .assert_status(StatusCode::OK);
    server
        .delete(&format!("/api/v1/users/{}/purge", id))
        .await
        .assert_status(StatusCode::INTERNAL_SERVER_ERROR);

    page::Entity::delete_by_id(page.id).exec(&state.db).await.unwrap();
    server
        .delete(&format!("/api/v1/users/{}/purge", id))
        .await
        .assert_status(StatusCode::OK);
    server
        .get(&format!("/api/v1/users/{}/activity", id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_summary_is_localized_and_tracks_role_changes() {
    let (server, _) = server().await;
    let id = create(&server, "Jane Doe", "jane@example.com").await;

    let response = server
        .put(&format!("/api/v1/users/{}/roles", id))
        .json(&SyncRolesRequest {
            roles: vec!["editor".to_string(), "admin".to_string()],
        })
        .await;
    response.assert_status(StatusCode::OK);
    let roles: ApiResponse<Vec<String>> = response.json();
    assert_eq!(roles.data, vec!["admin".to_string(), "editor".to_string()]);

    let summary: ApiResponse<Value> = server
        .get(&format!("/api/v1/users/{}/summary?locale=ar", id))
        .await
        .json();
    assert_eq!(summary.data["language"], "ar");
    assert_eq!(summary.data["roles"], json!(["admin", "editor"]));
    assert!(summary.data.get("last_login").is_none());
    assert!(summary.data.get("password").is_none());

    // served from cache, still localized per request
    let summary: ApiResponse<Value> = server.get(&format!("/api/v1/users/{}/summary", id)).await.json();
    assert_eq!(summary.message, "User summary retrieved from cache");
    assert_eq!(summary.data["language"], "en");

    server
        .delete(&format!("/api/v1/users/{}/roles/admin", id))
        .await
        .assert_status(StatusCode::OK);
    let summary: ApiResponse<Value> = server.get(&format!("/api/v1/users/{}/summary", id)).await.json();
    assert_eq!(summary.data["roles"], json!(["editor"]));
}

#[tokio::test]
async fn test_summary_ignores_profile_cached_before_a_mutation() {
    let (server, state) = server().await;
    let id = create(&server, "Jane Doe", "jane@example.com").await;
    let user_id = id as i32;

    // a summary load that read the old row before the update committed
    let epoch = state.profile_epoch();
    let stale = state.users.find(user_id).await.unwrap();
    let roles = state.users.roles().roles_of(&stale).await.unwrap();

    server
        .put(&format!("/api/v1/users/{}", id))
        .json(&UpdateUserRequest {
            name: Some("Jane Smith".to_string()),
            ..Default::default()
        })
        .await
        .assert_status(StatusCode::OK);

    state
        .cache
        .insert(
            profile_cache_key(user_id),
            CachedData::Profile { user: stale, roles, epoch },
        )
        .await;

    let summary: ApiResponse<Value> = server.get(&format!("/api/v1/users/{}/summary", id)).await.json();
    assert_eq!(summary.message, "User summary retrieved successfully");
    assert_eq!(summary.data["name"], "Jane Smith");

    let summary: ApiResponse<Value> = server.get(&format!("/api/v1/users/{}/summary", id)).await.json();
    assert_eq!(summary.message, "User summary retrieved from cache");
    assert_eq!(summary.data["name"], "Jane Smith");
}

#[tokio::test]
async fn test_blank_name_is_unprocessable() {
    let (server, _) = server().await;
    let response = server
        .post("/api/v1/users")
        .json(&create_request("   ", "blank@example.com"))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: ErrorResponse = response.json();
    assert_eq!(body.code, "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_unknown_role_is_not_found() {
    let (server, _) = server().await;
    let id = create(&server, "A", "a@example.com").await;

    let response = server.post(&format!("/api/v1/users/{}/roles/wizard", id)).await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: ErrorResponse = response.json();
    assert_eq!(body.code, "ROLE_NOT_FOUND");
}

#[tokio::test]
async fn test_login() {
    let (server, _) = server().await;
    let id = create(&server, "A", "a@example.com").await;

    let response = server
        .post("/api/v1/auth/login")
        .json(&json!({"email": "a@example.com", "password": "wrong-password"}))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let response = server
        .post("/api/v1/auth/login")
        .json(&json!({"email": "a@example.com", "password": "password123"}))
        .await;
    response.assert_status(StatusCode::OK);
    let body: ApiResponse<Value> = response.json();
    assert_eq!(body.data["id"], id);
    assert!(body.data["last_login_at"].is_string());

    let summary: ApiResponse<Value> = server.get(&format!("/api/v1/users/{}/summary", id)).await.json();
    assert!(summary.data["last_login"].is_string());
}

#[tokio::test]
async fn test_login_of_inactive_user_is_forbidden() {
    let (server, _) = server().await;
    let mut request = create_request("Off", "off@example.com");
    request.is_active = Some(false);
    server.post("/api/v1/users").json(&request).await.assert_status(StatusCode::CREATED);

    let response = server
        .post("/api/v1/auth/login")
        .json(&json!({"email": "off@example.com", "password": "password123"}))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
    let body: ErrorResponse = response.json();
    assert_eq!(body.code, "USER_INACTIVE");
}

#[tokio::test]
async fn test_verify_email() {
    let (server, _) = server().await;
    let id = create(&server, "A", "a@example.com").await;

    let response = server.post(&format!("/api/v1/users/{}/verify-email", id)).await;
    response.assert_status(StatusCode::OK);
    let body: ApiResponse<Value> = response.json();
    assert!(body.data["email_verified_at"].is_string());
}
