use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use authkeep::config::Config;
use authkeep::services::{AuthService, NewAccount};
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;

const PASSWORD: &str = "correct horse battery";

async fn spawn_app() -> (Arc<authkeep::api::AppState>, Router) {
    let db_path =
        std::env::temp_dir().join(format!("authkeep-api-test-{}.db", uuid::Uuid::new_v4()));

    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}", db_path.display());
    config.server.secure_cookies = false;
    config.security.argon2_memory_cost_kib = 256;
    config.security.argon2_time_cost = 1;

    let state = authkeep::api::create_app_state_from_config(config, None)
        .await
        .expect("failed to create app state");
    let router = authkeep::api::router(state.clone());
    (state, router)
}

fn json_request(method: &str, uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn authed(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

/// Pull the session token out of a `Set-Cookie` header.
fn session_cookie(response: &axum::response::Response) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| v.strip_prefix("session_token="))
        .map(|rest| rest.split(';').next().unwrap_or_default().to_string())
}

async fn login(app: &Router, username: &str) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            &serde_json::json!({ "username": username, "password": PASSWORD }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    session_cookie(&response).expect("login sets session cookie")
}

#[tokio::test]
async fn test_health_needs_no_credentials() {
    let (_state, app) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["database"], true);

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["service"], "authkeep");
}

#[tokio::test]
async fn test_register_me_logout_flow() {
    let (_state, app) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/register",
            &serde_json::json!({
                "username": "alice",
                "email": "alice@example.com",
                "password": PASSWORD,
                "full_name": "Alice Liddell"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));
    assert!(set_cookie.contains("Max-Age=604800"));

    let token = session_cookie(&response).unwrap();
    let body = body_json(response).await;
    assert_eq!(body["data"]["user"]["username"], "alice");
    assert!(body["data"]["user"].get("password_hash").is_none());
    assert!(!body.to_string().contains(&token));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/auth/me")
                .header(header::COOKIE, format!("session_token={token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["email"], "alice@example.com");

    let response = app
        .clone()
        .oneshot(authed("POST", "/api/auth/logout", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(authed("GET", "/api/auth/me", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await["error"],
        "Invalid or expired credentials"
    );

    let response = app
        .oneshot(authed("GET", "/api/auth/verify", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["valid"], false);
}

#[tokio::test]
async fn test_login_failures_look_identical() {
    let (state, app) = spawn_app().await;
    state
        .auth_service()
        .create_user(
            NewAccount {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password: PASSWORD.to_string(),
                full_name: None,
            },
            false,
        )
        .await
        .unwrap();

    let mut bodies = Vec::new();
    for (username, password) in [
        ("alice", "wrong password"),
        ("mallory", PASSWORD),
        ("alice", ""),
        ("", PASSWORD),
    ] {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/auth/login",
                &serde_json::json!({ "username": username, "password": password }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(session_cookie(&response).is_none());
        bodies.push(body_json(response).await);
    }

    assert!(bodies.iter().all(|body| *body == bodies[0]));
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let (_state, app) = spawn_app().await;
    let payload = serde_json::json!({
        "username": "alice",
        "email": "alice@example.com",
        "password": PASSWORD
    });

    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/auth/register", &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .oneshot(json_request("POST", "/api/auth/register", &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let body = body_json(response).await;
    assert_eq!(body["error"], "Username already exists");
    assert!(!body.to_string().contains("UNIQUE"));
}

#[tokio::test]
async fn test_admin_routes_are_gated() {
    let (state, app) = spawn_app().await;
    for (username, is_admin) in [("root", true), ("alice", false)] {
        state
            .auth_service()
            .create_user(
                NewAccount {
                    username: username.to_string(),
                    email: format!("{username}@example.com"),
                    password: PASSWORD.to_string(),
                    full_name: None,
                },
                is_admin,
            )
            .await
            .unwrap();
    }

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/api/admin/users").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let alice = login(&app, "alice").await;
    let response = app
        .clone()
        .oneshot(authed("GET", "/api/admin/users", &alice))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "Admin access required");

    let root = login(&app, "root").await;
    let response = app
        .clone()
        .oneshot(authed("GET", "/api/admin/users", &root))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let users = body_json(response).await;
    assert_eq!(users["data"].as_array().unwrap().len(), 2);

    let response = app
        .clone()
        .oneshot(authed("GET", "/api/admin/sessions", &root))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let sessions = body_json(response).await;
    let listed = sessions["data"].as_array().unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|s| s.get("session_token").is_none()));

    let response = app
        .oneshot(authed("GET", "/api/admin/metrics", &alice))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_deactivation_ends_sessions() {
    let (state, app) = spawn_app().await;
    let mut ids = Vec::new();
    for (username, is_admin) in [("root", true), ("alice", false)] {
        let user = state
            .auth_service()
            .create_user(
                NewAccount {
                    username: username.to_string(),
                    email: format!("{username}@example.com"),
                    password: PASSWORD.to_string(),
                    full_name: None,
                },
                is_admin,
            )
            .await
            .unwrap();
        ids.push(user.id);
    }

    let root = login(&app, "root").await;
    let alice = login(&app, "alice").await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(format!("/api/admin/users/{}", ids[1]))
                .header(header::AUTHORIZATION, format!("Bearer {root}"))
                .header(header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
                .body(Body::from(r#"{"is_active": false}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["is_active"], false);

    let response = app
        .clone()
        .oneshot(authed("GET", "/api/auth/me", &alice))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(authed("DELETE", &format!("/api/admin/users/{}", ids[0]), &root))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(authed("DELETE", "/api/admin/users/9999", &root))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
