mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{FakeLlm, USER_EMAIL, spawn_app};
use serde_json::json;

#[tokio::test]
async fn login_me_logout_round() {
    let t = spawn_app("auth", FakeLlm::default()).await;

    // 1) no cookie -> 401
    let (status, body) = t.json("GET", "/api/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["message"], "Authentication required");

    // 2) wrong password -> 401
    let (status, body) = t
        .json(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "admin@cims.local", "password": "nope" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["message"], "Invalid email or password");

    // 3) unknown email -> same 401
    let (status, _) = t
        .json(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "ghost@cims.local", "password": "x" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // 4) login is case-insensitive on email and sets the session cookie
    let cookie = t.login("ADMIN@cims.local", common::ADMIN_PASSWORD).await;
    let (status, body) = t.json("GET", "/api/auth/me", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "admin@cims.local");
    assert_eq!(body["user"]["role"], "admin");
    assert!(body["user"].get("password_hash").is_none());
    assert!(!body["user"]["last_login_at"].is_null());

    // 5) logout clears the cookie
    let resp = t
        .request(
            Request::builder()
                .method("POST")
                .uri("/api/auth/logout")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .expect("failed to build request"),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let removal = resp
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with("token="));
    assert!(removal, "logout should emit a removal cookie");
    let body = common::read_json(resp).await;
    assert_eq!(body["message"], "Logged out successfully");
}

#[tokio::test]
async fn forged_or_stale_sessions_are_forbidden() {
    let t = spawn_app("auth-forged", FakeLlm::default()).await;

    // Plain-text cookie cannot be decrypted -> 403
    let (status, body) = t
        .json("GET", "/api/auth/me", Some("token=1:0"), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["message"], "Invalid or expired token");

    // Deactivated user keeps a valid cookie but is rejected
    let cookie = t.login_user().await;
    let user = t
        .db
        .find_user_by_email(USER_EMAIL)
        .await
        .expect("lookup failed")
        .expect("user missing");
    t.db.set_user_active(user.id, false)
        .await
        .expect("deactivate failed");
    let (status, body) = t.json("GET", "/api/auth/me", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["message"], "User not found or inactive");

    // ...and can no longer log in
    let (status, body) = t
        .json(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": USER_EMAIL, "password": common::USER_PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["message"], "Account is inactive");
}

#[tokio::test]
async fn admin_routes_reject_regular_users() {
    let t = spawn_app("auth-admin", FakeLlm::default()).await;
    let user = t.login_user().await;

    let (status, body) = t
        .json(
            "POST",
            "/api/locations",
            Some(&user),
            Some(json!({ "name": "Lab", "code": "LAB" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["message"], "Admin access required");

    let (status, _) = t.json("GET", "/api/llm-config", Some(&user), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Reads are open to any signed-in user
    let (status, body) = t.json("GET", "/api/locations", Some(&user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_array());
}

#[tokio::test]
async fn banner_health_and_unknown_routes() {
    let t = spawn_app("auth-misc", FakeLlm::default()).await;

    let (status, body) = t.json("GET", "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "CIMS API");

    let (status, body) = t.json("GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = t.json("GET", "/api/nowhere", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"]["code"].is_string());

    // Malformed JSON is a 400 in the common error shape
    let resp = t
        .request(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("not-json"))
                .expect("failed to build request"),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = common::read_json(resp).await;
    assert!(body["error"]["message"].is_string());
}
