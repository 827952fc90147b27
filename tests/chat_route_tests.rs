mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{FakeLlm, TestApp, read_body, spawn_app};
use serde_json::json;

async fn send_chat(t: &TestApp, cookie: &str, body: serde_json::Value) -> (StatusCode, Option<String>, String) {
    let req = Request::builder()
        .method("POST")
        .uri("/api/chat/stream")
        .header(header::COOKIE, cookie)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("failed to build request");
    let resp = t.request(req).await;
    let status = resp.status();
    let session = resp
        .headers()
        .get("x-session-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let text = String::from_utf8(read_body(resp).await).expect("response body was not utf-8");
    (status, session, text)
}

#[tokio::test]
async fn chat_streams_reply_and_keeps_history() {
    let t = spawn_app("chat", FakeLlm::replying(&["Check ", "the PSU ", "fans."])).await;
    let admin = t.login_admin().await;
    let user = t.login_user().await;

    t.json(
        "POST",
        "/api/equipment",
        Some(&admin),
        Some(json!({ "name": "Core Router", "area": "DC1", "vendor": "Cisco", "model": "ASR-9001", "type": "Router" })),
    )
    .await;

    let (status, session, text) = send_chat(&t, &user, json!({ "message": "Router is overheating" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(text, "Check the PSU fans.");
    let session = session.expect("x-session-id header");
    assert!(!session.is_empty());

    {
        let prompts = t.llm.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("ASR-9001"));
        assert!(prompts[0].ends_with("User: Router is overheating"));
        assert!(!prompts[0].contains("Conversation so far"));
    }

    let (status, echoed, _) = send_chat(
        &t,
        &user,
        json!({ "message": "Which fan?", "session_id": session }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(echoed.as_deref(), Some(session.as_str()));
    {
        let prompts = t.llm.prompts.lock().unwrap();
        assert!(prompts[1].contains("User: Router is overheating"));
        assert!(prompts[1].contains("Assistant: Check the PSU fans."));
    }

    let (status, history) = t
        .json("GET", &format!("/api/chat/history?session_id={session}"), Some(&user), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let history = history.as_array().expect("array");
    assert_eq!(history.len(), 4);
    assert_eq!(history[0]["role"], "user");
    assert_eq!(history[0]["content"], "Router is overheating");
    assert_eq!(history[1]["role"], "model");
    assert_eq!(history[1]["content"], "Check the PSU fans.");

    // other users never see this session
    let (_, others) = t
        .json("GET", &format!("/api/chat/history?session_id={session}"), Some(&admin), None)
        .await;
    assert_eq!(others.as_array().map(Vec::len), Some(0));

    let (status, body) = t
        .json("DELETE", &format!("/api/chat/history/{session}"), Some(&user), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Chat history cleared");
    let (_, history) = t
        .json("GET", &format!("/api/chat/history?session_id={session}"), Some(&user), None)
        .await;
    assert_eq!(history.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn chat_failures_are_reported_in_band() {
    let t = spawn_app("chat-fail", FakeLlm::failing("model offline")).await;
    let user = t.login_user().await;

    let (status, _, _) = send_chat(&t, &user, json!({ "message": "   " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, session, text) = send_chat(&t, &user, json!({ "message": "hello" })).await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.starts_with("Error: "), "unexpected body: {text}");
    assert!(text.contains("model offline"));

    // only the user's message is kept when the model never answered
    let session = session.expect("x-session-id header");
    let (_, history) = t
        .json("GET", &format!("/api/chat/history?session_id={session}"), Some(&user), None)
        .await;
    let history = history.as_array().expect("array");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["role"], "user");
}

#[tokio::test]
async fn chat_requires_login() {
    let t = spawn_app("chat-guard", FakeLlm::replying(&["hi"])).await;
    let (status, _) = t
        .json("POST", "/api/chat/stream", None, Some(json!({ "message": "hi" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
