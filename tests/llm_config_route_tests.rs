mod common;

use axum::http::StatusCode;
use common::{FakeLlm, spawn_app};
use serde_json::json;

#[tokio::test]
async fn key_management_flow() {
    let t = spawn_app("llm-config", FakeLlm::default()).await;
    let admin = t.login_admin().await;

    let (status, view) = t.json("GET", "/api/llm-config", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(view["selected_key_id"].is_null());
    assert_eq!(view["requires_selection"], false);
    assert_eq!(view["keys"].as_array().map(Vec::len), Some(0));

    let (status, body) = t
        .json(
            "POST",
            "/api/llm-config/keys",
            Some(&admin),
            Some(json!({ "provider": "mistral", "api_key": "abc" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Unsupported provider");

    let (status, body) = t
        .json(
            "POST",
            "/api/llm-config/keys",
            Some(&admin),
            Some(json!({ "provider": "gemini", "api_key": "   " })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "API key required");

    // the first key is selected automatically
    let (status, view) = t
        .json(
            "POST",
            "/api/llm-config/keys",
            Some(&admin),
            Some(json!({ "provider": "Gemini", "api_key": "AIzaSyFirstKey0001", "label": "primary" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let first_id = view["keys"][0]["id"].as_i64().expect("key id");
    assert_eq!(view["selected_key_id"], first_id);
    assert_eq!(view["keys"][0]["provider"], "gemini");
    assert_eq!(view["keys"][0]["masked_key"], "****0001");
    assert_eq!(view["keys"][0]["is_selected"], true);
    assert!(!view.to_string().contains("AIzaSyFirstKey0001"));

    let (_, view) = t
        .json(
            "POST",
            "/api/llm-config/keys",
            Some(&admin),
            Some(json!({ "provider": "openai", "api_key": "sk-second-key-2222" })),
        )
        .await;
    let second_id = view["keys"][0]["id"].as_i64().expect("key id");
    assert_ne!(second_id, first_id);
    assert_eq!(view["selected_key_id"], first_id);
    assert_eq!(view["keys"].as_array().map(Vec::len), Some(2));

    let (status, view) = t
        .json(
            "PATCH",
            "/api/llm-config/select",
            Some(&admin),
            Some(json!({ "key_id": second_id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["selected_key_id"], second_id);

    let (status, _) = t
        .json(
            "PATCH",
            "/api/llm-config/select",
            Some(&admin),
            Some(json!({ "key_id": 9999 })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // blank label clears, blank key keeps the stored material
    let (status, view) = t
        .json(
            "PATCH",
            &format!("/api/llm-config/keys/{first_id}"),
            Some(&admin),
            Some(json!({ "label": "  ", "api_key": "" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let first = view["keys"]
        .as_array()
        .and_then(|keys| keys.iter().find(|k| k["id"] == first_id))
        .expect("first key listed");
    assert!(first["label"].is_null());
    assert_eq!(first["masked_key"], "****0001");

    let (status, _) = t
        .json(
            "PATCH",
            "/api/llm-config/keys/9999",
            Some(&admin),
            Some(json!({ "label": "x" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // deleting the selected key falls back to the newest remaining one
    let (status, view) = t
        .json(
            "DELETE",
            &format!("/api/llm-config/keys/{second_id}"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["selected_key_id"], first_id);
    assert_eq!(view["keys"].as_array().map(Vec::len), Some(1));

    let (_, view) = t
        .json(
            "DELETE",
            &format!("/api/llm-config/keys/{first_id}"),
            Some(&admin),
            None,
        )
        .await;
    assert!(view["selected_key_id"].is_null());

    let (status, _) = t
        .json(
            "DELETE",
            &format!("/api/llm-config/keys/{first_id}"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn llm_config_is_admin_only() {
    let t = spawn_app("llm-config-guard", FakeLlm::default()).await;
    let user = t.login_user().await;

    let (status, _) = t.json("GET", "/api/llm-config", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = t.json("GET", "/api/llm-config", Some(&user), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let (status, _) = t
        .json(
            "POST",
            "/api/llm-config/keys",
            Some(&user),
            Some(json!({ "provider": "gemini", "api_key": "AIzaSyUserKey" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
