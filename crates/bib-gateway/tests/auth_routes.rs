mod common;

use actix_web::cookie::SameSite;
use actix_web::{test, web, HttpResponse};

use bib_gateway::oauth::GoogleStrategy;
use common::{google_config, make_state, spawn_server, test_config};

fn register_body(username: &str, email: &str) -> serde_json::Value {
    serde_json::json!({
        "name": "Ada Lovelace",
        "username": username,
        "email": email,
        "password": "Secret123",
    })
}

#[actix_rt::test]
async fn test_register_returns_token_and_cookie() {
    let state = make_state(test_config("http://127.0.0.1:1"));
    let app = gateway_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(register_body("Ada_L", "Ada@Example.com"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);

    let cookie = resp
        .response()
        .cookies()
        .find(|c| c.name() == "token")
        .expect("token cookie")
        .into_owned();
    assert_eq!(cookie.http_only(), Some(true));
    assert_eq!(cookie.same_site(), Some(SameSite::Strict));
    assert_ne!(cookie.secure(), Some(true));

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["token"], cookie.value());
    assert_eq!(body["user"]["username"], "ada_l");
    assert_eq!(body["user"]["email"], "ada@example.com");
    assert_eq!(body["user"]["role"], "user");
    assert_eq!(body["user"]["isEmailVerified"], false);
    assert!(body["user"].get("password").is_none());
    assert!(body["user"].get("passwordHash").is_none());
    assert!(!body.to_string().contains("$2"));
}

#[actix_rt::test]
async fn test_register_rejects_duplicates() {
    let state = make_state(test_config("http://127.0.0.1:1"));
    let app = gateway_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(register_body("ada", "ada@example.com"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 201);

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(register_body("someone_else", "ada@example.com"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "User already exists with this email");

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(register_body("ADA", "other@example.com"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "User already exists with this username");
}

#[actix_rt::test]
async fn test_register_validation_errors() {
    let state = make_state(test_config("http://127.0.0.1:1"));
    let app = gateway_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(serde_json::json!({
            "name": "A",
            "username": "no spaces",
            "email": "not-an-email",
            "password": "short",
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Validation failed");
    let fields: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    for field in ["name", "username", "email", "password"] {
        assert!(fields.contains(&field), "missing error for {field}");
    }
}

#[actix_rt::test]
async fn test_malformed_json_is_bad_request() {
    let state = make_state(test_config("http://127.0.0.1:1"));
    let app = gateway_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
}

#[actix_rt::test]
async fn test_login_by_email_or_username() {
    let state = make_state(test_config("http://127.0.0.1:1"));
    let app = gateway_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(register_body("ada", "ada@example.com"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 201);

    for identifier in ["ada@example.com", "ada", "ADA"] {
        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(serde_json::json!({"email": identifier, "password": "Secret123"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200, "login with {identifier}");
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["user"]["username"], "ada");
        assert!(body["token"].as_str().is_some());
    }
}

#[actix_rt::test]
async fn test_login_failures_are_indistinguishable() {
    let state = make_state(test_config("http://127.0.0.1:1"));
    let app = gateway_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(register_body("ada", "ada@example.com"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 201);

    for (identifier, password) in [("ada", "Wrong123"), ("nobody", "Secret123")] {
        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(serde_json::json!({"email": identifier, "password": password}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Invalid credentials");
    }

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(serde_json::json!({"email": "", "password": ""}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_rt::test]
async fn test_me_with_bearer_and_cookie() {
    let state = make_state(test_config("http://127.0.0.1:1"));
    let app = gateway_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(register_body("ada", "ada@example.com"))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    let token = body["token"].as_str().unwrap().to_string();

    let req = test::TestRequest::get()
        .uri("/api/auth/me")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let me: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(me["success"], true);
    assert_eq!(me["data"]["email"], "ada@example.com");
    assert!(me["data"]["createdAt"].as_str().is_some());

    let req = test::TestRequest::get()
        .uri("/api/auth/me")
        .cookie(actix_web::cookie::Cookie::new("token", token.clone()))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
}

#[actix_rt::test]
async fn test_me_rejects_missing_and_bad_tokens() {
    let state = make_state(test_config("http://127.0.0.1:1"));
    let app = gateway_app!(state);

    let req = test::TestRequest::get().uri("/api/auth/me").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Not authorized to access this route");

    let req = test::TestRequest::get()
        .uri("/api/auth/me")
        .insert_header(("Authorization", "Bearer not.a.jwt"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);

    let req = test::TestRequest::get()
        .uri("/api/auth/me")
        .cookie(actix_web::cookie::Cookie::new("token", "none"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);

    // Valid signature, unknown user
    let orphan = state.tokens.issue("no-such-user").unwrap();
    let req = test::TestRequest::get()
        .uri("/api/auth/me")
        .insert_header(("Authorization", format!("Bearer {orphan}")))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);
}

#[actix_rt::test]
async fn test_logout_clears_cookie() {
    let state = make_state(test_config("http://127.0.0.1:1"));
    let app = gateway_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(register_body("ada", "ada@example.com"))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    let token = body["token"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri("/api/auth/logout")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let cookie = resp
        .response()
        .cookies()
        .find(|c| c.name() == "token")
        .expect("token cookie")
        .into_owned();
    assert_eq!(cookie.value(), "none");
    assert_eq!(cookie.http_only(), Some(true));
    assert_eq!(
        cookie.max_age(),
        Some(actix_web::cookie::time::Duration::seconds(10))
    );
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "User logged out successfully");

    let req = test::TestRequest::post().uri("/api/auth/logout").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);
}

#[actix_rt::test]
async fn test_check_username() {
    let state = make_state(test_config("http://127.0.0.1:1"));
    let app = gateway_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(register_body("ada", "ada@example.com"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 201);

    let req = test::TestRequest::post()
        .uri("/api/auth/check-username")
        .set_json(serde_json::json!({"username": "Ada"}))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["available"], false);
    assert_eq!(body["message"], "Username is already taken");

    let req = test::TestRequest::post()
        .uri("/api/auth/check-username")
        .set_json(serde_json::json!({"username": "grace"}))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["available"], true);
    assert_eq!(body["message"], "Username is available");

    let req = test::TestRequest::post()
        .uri("/api/auth/check-username")
        .set_json(serde_json::json!({"username": "x!"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Invalid username format");
    assert!(body["errors"].as_array().is_some());
}

#[actix_rt::test]
async fn test_google_disabled_redirects_to_sign_in() {
    let state = make_state(test_config("http://127.0.0.1:1"));
    let app = gateway_app!(state);

    let req = test::TestRequest::get().uri("/api/auth/google").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 302);
    assert_eq!(
        resp.headers().get("location").unwrap(),
        "http://frontend.test/sign-in?error=auth_failed"
    );
}

#[actix_rt::test]
async fn test_google_start_redirects_to_provider() {
    let mut config = test_config("http://127.0.0.1:1");
    config.google = Some(google_config());
    let state = make_state(config);
    let app = gateway_app!(state);

    let req = test::TestRequest::get().uri("/api/auth/google").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 302);
    let location = resp.headers().get("location").unwrap().to_str().unwrap();
    assert!(location.starts_with("https://accounts.google.com/"));
    assert!(location.contains("client_id=test-client"));
}

fn mock_google(cfg: &mut web::ServiceConfig) {
    cfg.route(
        "/token",
        web::post().to(|| async {
            HttpResponse::Ok().json(serde_json::json!({
                "access_token": "provider-access-token",
                "token_type": "Bearer",
            }))
        }),
    )
    .route(
        "/userinfo",
        web::get().to(|| async {
            HttpResponse::Ok().json(serde_json::json!({
                "sub": "google-123",
                "name": "Grace Hopper",
                "email": "Grace.Hopper@example.com",
                "picture": "https://img.example.com/grace.png",
            }))
        }),
    )
    .route(
        "/token-denied",
        web::post().to(|| async {
            HttpResponse::BadRequest().json(serde_json::json!({"error": "invalid_grant"}))
        }),
    );
}

fn google_state(
    state: &web::Data<bib_gateway::AppState>,
    token_path: &str,
) -> web::Data<bib_gateway::AppState> {
    let addr = spawn_server(mock_google);
    let strategy = GoogleStrategy::new(
        google_config(),
        state.http_client.clone(),
        state.config.session_secret.clone(),
    )
    .with_endpoints(
        format!("http://{addr}{token_path}"),
        format!("http://{addr}/userinfo"),
    );
    web::Data::new(state.get_ref().clone().with_google(strategy))
}

#[actix_rt::test]
async fn test_google_callback_creates_account() {
    let base = make_state(test_config("http://127.0.0.1:1"));
    let state = google_state(&base, "/token");
    let app = gateway_app!(state);

    let signed = state.google.as_ref().unwrap().issue_state();
    let req = test::TestRequest::get()
        .uri(&format!("/api/auth/google/callback?code=abc&state={signed}"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 302);

    let location = resp
        .headers()
        .get("location")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let token = location
        .strip_prefix("http://frontend.test/auth/callback?token=")
        .expect("callback redirect");
    assert!(resp.response().cookies().any(|c| c.name() == "token"));

    let claims = state.tokens.verify(token).unwrap();
    let user = state.db.find_user_by_id(&claims.id).unwrap().unwrap();
    assert_eq!(user.email, "grace.hopper@example.com");
    assert_eq!(user.google_id.as_deref(), Some("google-123"));
    assert!(user.is_email_verified);
    assert!(user.password_hash.is_none());
    assert!(user.username.starts_with("gracehopper_"));
}

#[actix_rt::test]
async fn test_google_callback_failures() {
    let base = make_state(test_config("http://127.0.0.1:1"));
    let state = google_state(&base, "/token-denied");
    let app = gateway_app!(state);
    let failed = "http://frontend.test/sign-in?error=auth_failed";

    let signed = state.google.as_ref().unwrap().issue_state();
    for uri in [
        "/api/auth/google/callback?error=access_denied".to_string(),
        format!("/api/auth/google/callback?state={signed}"),
        "/api/auth/google/callback?code=abc&state=forged".to_string(),
        format!("/api/auth/google/callback?code=abc&state={signed}"),
    ] {
        let req = test::TestRequest::get().uri(&uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 302, "{uri}");
        assert_eq!(resp.headers().get("location").unwrap(), failed, "{uri}");
    }
}

#[actix_rt::test]
async fn test_unknown_route_is_json_404() {
    let state = make_state(test_config("http://127.0.0.1:1"));
    let app = gateway_app!(state);

    let req = test::TestRequest::get().uri("/api/nope?x=1").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Route /api/nope?x=1 not found");

    let req = test::TestRequest::get().uri("/api/auth/nope").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}

#[actix_rt::test]
async fn test_info_and_health() {
    let state = make_state(test_config("http://newsletter.test"));
    let app = gateway_app!(state);

    let req = test::TestRequest::get().uri("/").to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["gateway"], true);
    assert_eq!(body["endpoints"]["newsletter"], "/api/newsletter");
    assert_eq!(body["services"]["newsletter"], "http://newsletter.test");

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["database"], "ok");
}

#[actix_rt::test]
async fn test_metrics_token_enforced() {
    let mut config = test_config("http://127.0.0.1:1");
    config.metrics_token = Some("scrape-me".to_string());
    let state = make_state(config);
    let app = gateway_app!(state);

    let req = test::TestRequest::get().uri("/metrics").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);

    let req = test::TestRequest::get()
        .uri("/metrics")
        .insert_header(("Authorization", "Bearer scrape-me"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
}
