mod test_utils;

use actix_web::{http::StatusCode, test};
use photo_backend::entities::{token::AuthResponse, user::UserResponse};
use serde_json::{json, Value};

use test_utils::{bearer, init_app, TestContext, TEST_PASSWORD};

#[actix_rt::test]
async fn register_returns_created_user_without_password() {
    let ctx = TestContext::new().await;
    let app = init_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/register")
        .set_json(json!({
            "username": "ada",
            "email": "Ada@Example.com",
            "password": TEST_PASSWORD,
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["username"], "ada");
    assert_eq!(body["email"], "ada@example.com");
    assert!(body.get("password_hash").is_none());
    assert!(body.get("password").is_none());
}

#[actix_rt::test]
async fn duplicate_username_and_email_conflict() {
    let ctx = TestContext::new().await;
    ctx.register("grace").await;
    let app = init_app!(ctx);

    let same_name = test::TestRequest::post()
        .uri("/api/v1/auth/register")
        .set_json(json!({"username": "grace", "email": "other@example.com", "password": TEST_PASSWORD}))
        .to_request();
    let resp = test::call_service(&app, same_name).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("Username"));

    let same_email = test::TestRequest::post()
        .uri("/api/v1/auth/register")
        .set_json(json!({"username": "hopper", "email": "grace@example.com", "password": TEST_PASSWORD}))
        .to_request();
    let resp = test::call_service(&app, same_email).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("Email"));
}

#[actix_rt::test]
async fn register_rejects_invalid_payloads() {
    let ctx = TestContext::new().await;
    let app = init_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/register")
        .set_json(json!({"username": "x", "email": "not-an-email", "password": "123"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Validation failed");
    let fields: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"email"));
    assert!(fields.contains(&"password"));

    let malformed = test::TestRequest::post()
        .uri("/api/v1/auth/register")
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, malformed).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn login_issues_bearer_tokens() {
    let ctx = TestContext::new().await;
    ctx.register("linus").await;
    let app = init_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/login")
        .set_json(json!({"username": "linus", "password": TEST_PASSWORD}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let tokens: AuthResponse = test::read_body_json(resp).await;
    assert_eq!(tokens.token_type, "bearer");
    assert!(!tokens.access_token.is_empty());
    assert_ne!(tokens.access_token, tokens.refresh_token);
}

#[actix_rt::test]
async fn login_with_wrong_password_or_unknown_user_is_unauthorized() {
    let ctx = TestContext::new().await;
    ctx.register("margaret").await;
    let app = init_app!(ctx);

    for (username, password) in [("margaret", "wrong-password"), ("nobody", TEST_PASSWORD)] {
        let req = test::TestRequest::post()
            .uri("/api/v1/auth/login")
            .set_json(json!({"username": username, "password": password}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{username}");

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Wrong credentials");
    }
}

#[actix_rt::test]
async fn refresh_token_issues_a_new_pair() {
    let ctx = TestContext::new().await;
    ctx.register("barbara").await;
    let tokens = ctx
        .state
        .auth_handler
        .login(photo_backend::entities::user::LoginUser {
            username: "barbara".into(),
            password: TEST_PASSWORD.into(),
        })
        .await
        .unwrap();
    let app = init_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/refresh-token")
        .set_json(json!({"refresh_token": tokens.refresh_token}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let refreshed: AuthResponse = test::read_body_json(resp).await;
    let me = test::TestRequest::get()
        .uri("/api/v1/users/me")
        .insert_header(bearer(&refreshed.access_token))
        .to_request();
    assert_eq!(test::call_service(&app, me).await.status(), StatusCode::OK);
}

#[actix_rt::test]
async fn access_token_is_not_accepted_as_refresh_token() {
    let ctx = TestContext::new().await;
    let access = ctx.token_for("ken").await;
    let app = init_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/refresh-token")
        .set_json(json!({"refresh_token": access}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn me_returns_the_token_owner() {
    let ctx = TestContext::new().await;
    let id = ctx.register("dennis").await;
    let token = ctx.token_for_existing("dennis").await;
    let app = init_app!(ctx);

    let req = test::TestRequest::get()
        .uri("/api/v1/users/me")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let user: UserResponse = test::read_body_json(resp).await;
    assert_eq!(user.id, id);
    assert_eq!(user.username, "dennis");
}

#[actix_rt::test]
async fn protected_routes_reject_missing_or_bad_tokens() {
    let ctx = TestContext::new().await;
    let app = init_app!(ctx);

    let missing = test::TestRequest::get().uri("/api/v1/users/me").to_request();
    let resp = test::call_service(&app, missing).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Unauthorized");

    let garbage = test::TestRequest::get()
        .uri("/api/v1/images")
        .insert_header(bearer("not.a.jwt"))
        .to_request();
    assert_eq!(test::call_service(&app, garbage).await.status(), StatusCode::UNAUTHORIZED);

    let wrong_scheme = test::TestRequest::get()
        .uri("/api/v1/images")
        .insert_header(("Authorization", "Basic dXNlcjpwYXNz"))
        .to_request();
    assert_eq!(test::call_service(&app, wrong_scheme).await.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn public_routes_need_no_token() {
    let ctx = TestContext::new().await;
    let app = init_app!(ctx);

    let home = test::TestRequest::get().uri("/").to_request();
    assert_eq!(test::call_service(&app, home).await.status(), StatusCode::OK);

    let health = test::TestRequest::get().uri("/api/v1/health").to_request();
    let resp = test::call_service(&app, health).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert!(body.get("database").is_some());
    assert!(body.get("inference").is_some());
}
