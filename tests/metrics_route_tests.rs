mod common;

use axum::http::StatusCode;
use common::{FakeLlm, spawn_app};
use serde_json::json;

#[tokio::test]
async fn definitions_and_groups() {
    let t = spawn_app("metrics", FakeLlm::default()).await;
    let admin = t.login_admin().await;
    let user = t.login_user().await;

    let (status, def) = t
        .json(
            "POST",
            "/api/metrics/definitions",
            Some(&admin),
            Some(json!({ "key": "cpu_usage", "display_name": "CPU usage", "default_unit": "%" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(def["key"], "cpu_usage");

    let (status, body) = t
        .json(
            "POST",
            "/api/metrics/definitions",
            Some(&admin),
            Some(json!({ "key": "cpu_usage", "display_name": "Again" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Metric key already exists");

    let (status, _) = t
        .json(
            "POST",
            "/api/metrics/definitions",
            Some(&user),
            Some(json!({ "key": "mem_usage", "display_name": "Memory" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, defs) = t.json("GET", "/api/metrics/definitions", Some(&user), None).await;
    assert_eq!(defs.as_array().map(Vec::len), Some(1));

    let (_, linux) = t
        .json(
            "POST",
            "/api/metrics/groups",
            Some(&admin),
            Some(json!({ "name": "Linux hosts" })),
        )
        .await;
    let linux_id = linux["id"].as_i64().expect("group id");
    assert_eq!(linux["members"].as_array().map(Vec::len), Some(0));

    let (_, windows) = t
        .json(
            "POST",
            "/api/metrics/groups",
            Some(&admin),
            Some(json!({ "name": "Windows hosts" })),
        )
        .await;
    let windows_id = windows["id"].as_i64().expect("group id");

    let (status, body) = t
        .json(
            "POST",
            "/api/metrics/groups",
            Some(&admin),
            Some(json!({ "name": "Linux hosts" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Group already exists");

    t.json(
        "POST",
        &format!("/api/metrics/groups/{linux_id}/members"),
        Some(&admin),
        Some(json!({ "metric_key": "cpu_usage" })),
    )
    .await;

    // rename keeps the members
    let (status, renamed) = t
        .json(
            "PUT",
            &format!("/api/metrics/groups/{linux_id}"),
            Some(&admin),
            Some(json!({ "name": "Linux servers", "description": "RHEL and Ubuntu" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(renamed["name"], "Linux servers");
    assert_eq!(renamed["description"], "RHEL and Ubuntu");
    assert_eq!(renamed["members"], json!(["cpu_usage"]));

    let (status, body) = t
        .json(
            "PUT",
            &format!("/api/metrics/groups/{windows_id}"),
            Some(&admin),
            Some(json!({ "name": "Linux servers" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Group already exists");

    let (status, _) = t
        .json(
            "PUT",
            "/api/metrics/groups/9999",
            Some(&admin),
            Some(json!({ "name": "Ghost" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = t
        .json(
            "POST",
            "/api/metrics/groups/9999/members",
            Some(&admin),
            Some(json!({ "metric_key": "cpu_usage" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_a_group_detaches_targets_and_rules() {
    let t = spawn_app("metrics-delete", FakeLlm::default()).await;
    let admin = t.login_admin().await;

    let (_, group) = t
        .json(
            "POST",
            "/api/metrics/groups",
            Some(&admin),
            Some(json!({ "name": "Core network" })),
        )
        .await;
    let group_id = group["id"].as_i64().expect("group id");
    t.json(
        "POST",
        &format!("/api/metrics/groups/{group_id}/members"),
        Some(&admin),
        Some(json!({ "metric_key": "if_errors" })),
    )
    .await;

    let (_, device) = t
        .json(
            "POST",
            "/api/device-items",
            Some(&admin),
            Some(json!({ "device_name": "core-sw-01", "category": "Switch", "metric_group_id": group_id })),
        )
        .await;
    let device_id = device["id"].as_i64().expect("device id");
    assert_eq!(device["metric_group_id"], group_id);

    let (_, vm) = t
        .json(
            "POST",
            "/api/vm-items",
            Some(&admin),
            Some(json!({ "name": "netflow-01", "metric_group_id": group_id })),
        )
        .await;
    let vm_id = vm["id"].as_i64().expect("vm id");
    assert_eq!(vm["metric_group_id"], group_id);

    let (_, rule) = t
        .json(
            "POST",
            "/api/alerts/rules",
            Some(&admin),
            Some(json!({
                "name": "Interface errors", "group_id": group_id, "metric_key": "if_errors",
                "operator": ">", "threshold": 100.0
            })),
        )
        .await;
    let rule_id = rule["id"].as_i64().expect("rule id");

    let (status, body) = t
        .json(
            "DELETE",
            &format!("/api/metrics/groups/{group_id}"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Group deleted");

    let (_, device) = t
        .json("GET", &format!("/api/device-items/{device_id}"), Some(&admin), None)
        .await;
    assert!(device["metric_group_id"].is_null());

    let (_, vm) = t
        .json("GET", &format!("/api/vm-items/{vm_id}"), Some(&admin), None)
        .await;
    assert!(vm["metric_group_id"].is_null());

    let (_, rules) = t.json("GET", "/api/alerts/rules", Some(&admin), None).await;
    let rule = rules
        .as_array()
        .and_then(|rules| rules.iter().find(|r| r["id"] == rule_id))
        .expect("rule survives the group");
    assert!(rule["group_id"].is_null());

    let (_, groups) = t.json("GET", "/api/metrics/groups", Some(&admin), None).await;
    assert_eq!(groups.as_array().map(Vec::len), Some(0));

    let (status, _) = t
        .json(
            "DELETE",
            &format!("/api/metrics/groups/{group_id}"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn alert_rules_update_and_delete() {
    let t = spawn_app("alert-rules", FakeLlm::default()).await;
    let admin = t.login_admin().await;
    let user = t.login_user().await;

    let (_, rule) = t
        .json(
            "POST",
            "/api/alerts/rules",
            Some(&admin),
            Some(json!({ "name": "Disk", "metric_key": "disk_usage", "operator": ">", "threshold": 80.0 })),
        )
        .await;
    let rule_id = rule["id"].as_i64().expect("rule id");
    assert_eq!(rule["severity"], "warning");

    let (status, updated) = t
        .json(
            "PUT",
            &format!("/api/alerts/rules/{rule_id}"),
            Some(&admin),
            Some(json!({
                "name": "Disk almost full", "metric_key": "disk_usage", "operator": ">=",
                "threshold": 95.0, "severity": "critical", "is_enabled": false
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Disk almost full");
    assert_eq!(updated["operator"], ">=");
    assert_eq!(updated["threshold"], 95.0);
    assert_eq!(updated["severity"], "critical");
    assert_eq!(updated["is_enabled"], false);

    let (status, _) = t
        .json(
            "PUT",
            &format!("/api/alerts/rules/{rule_id}"),
            Some(&admin),
            Some(json!({ "name": "x", "metric_key": "disk_usage", "operator": "==", "threshold": 1.0 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t
        .json(
            "PUT",
            &format!("/api/alerts/rules/{rule_id}"),
            Some(&user),
            Some(json!({ "name": "x", "metric_key": "disk_usage", "threshold": 1.0 })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t
        .json(
            "PUT",
            "/api/alerts/rules/9999",
            Some(&admin),
            Some(json!({ "name": "x", "metric_key": "disk_usage", "threshold": 1.0 })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = t
        .json("DELETE", &format!("/api/alerts/rules/{rule_id}"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Rule deleted");

    let (_, rules) = t.json("GET", "/api/alerts/rules", Some(&user), None).await;
    assert_eq!(rules.as_array().map(Vec::len), Some(0));

    let (status, _) = t
        .json("DELETE", &format!("/api/alerts/rules/{rule_id}"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
