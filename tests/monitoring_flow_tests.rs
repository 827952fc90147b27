mod common;

use axum::http::StatusCode;
use cims_schema::{ExtractedMetric, ExtractionPayload};
use common::{FakeLlm, TestApp, spawn_app};
use serde_json::{Value, json};
use std::time::Duration;

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake";

fn cpu_payload(value: f64) -> ExtractionPayload {
    ExtractionPayload {
        metrics: vec![
            ExtractedMetric {
                key: Some("cpu_usage".to_string()),
                value: Some(value),
                unit: Some("%".to_string()),
                confidence: Some(0.9),
                ..ExtractedMetric::default()
            },
            ExtractedMetric {
                key: Some("mem_usage".to_string()),
                value: None,
                ..ExtractedMetric::default()
            },
        ],
        raw_text: Some("CPU 97%".to_string()),
        confidence: Some(0.85),
        status: "ok".to_string(),
        capture_time: Some("2026-03-01T10:15:00Z".to_string()),
        error: None,
    }
}

/// Poll the upload until the background parse leaves `pending`.
async fn wait_parsed(t: &TestApp, cookie: &str, upload_id: i64) -> Value {
    for _ in 0..100 {
        let (status, upload) = t
            .json(
                "GET",
                &format!("/api/monitoring-uploads/{upload_id}"),
                Some(cookie),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        if upload["parse_status"] != "pending" {
            return upload;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("upload {upload_id} never left pending");
}

#[tokio::test]
async fn screenshot_to_samples_to_alerts() {
    let t = spawn_app("monitoring", FakeLlm::extracting(cpu_payload(97.0))).await;
    let admin = t.login_admin().await;
    let user = t.login_user().await;

    let (_, team) = t
        .json(
            "POST",
            "/api/teams",
            Some(&admin),
            Some(json!({ "name": "Server Ops", "email_alias": "ops@example.com" })),
        )
        .await;
    let (status, group) = t
        .json(
            "POST",
            "/api/metrics/groups",
            Some(&admin),
            Some(json!({ "name": "Linux hosts" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let group_id = group["id"].as_i64().expect("group id");
    let (status, _) = t
        .json(
            "POST",
            &format!("/api/metrics/groups/{group_id}/members"),
            Some(&admin),
            Some(json!({ "metric_key": "cpu_usage" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, device) = t
        .json(
            "POST",
            "/api/device-items",
            Some(&admin),
            Some(json!({
                "device_name": "db-01", "category": "Server", "metric_group_id": group_id
            })),
        )
        .await;
    let device_id = device["id"].as_i64().expect("device id");

    let (status, rule) = t
        .json(
            "POST",
            "/api/alerts/rules",
            Some(&admin),
            Some(json!({
                "name": "CPU hot", "group_id": group_id, "metric_key": "cpu_usage",
                "operator": ">=", "threshold": 90.0, "severity": "critical",
                "team_id": team["id"]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rule["is_enabled"], true);

    // unsupported operator -> 400
    let (status, _) = t
        .json(
            "POST",
            "/api/alerts/rules",
            Some(&admin),
            Some(json!({ "name": "bad", "metric_key": "cpu_usage", "operator": "!=", "threshold": 1.0 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let device_field = device_id.to_string();
    let (status, upload) = t
        .multipart(
            "/api/monitoring-uploads",
            &user,
            &[
                ("device_item_id", device_field.as_str()),
                ("dashboard_label", "Grafana - db-01"),
                ("capture_time", "not a date"),
            ],
            Some(("dash.png", "image/png", PNG_BYTES)),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(upload["capture_time"].is_null());
    let upload_id = upload["id"].as_i64().expect("upload id");

    let parsed = wait_parsed(&t, &user, upload_id).await;
    assert_eq!(parsed["parse_status"], "ready");
    assert_eq!(parsed["raw_text"], "CPU 97%");
    assert_eq!(parsed["extracted_metrics"].as_array().map(Vec::len), Some(2));
    assert!(
        parsed["capture_time"]
            .as_str()
            .is_some_and(|s| s.starts_with("2026-03-01T10:15:00"))
    );

    // stored extraction is used when the body omits metrics; the null value is skipped
    let (status, body) = t
        .json(
            "POST",
            &format!("/api/monitoring-uploads/{upload_id}/confirm"),
            Some(&user),
            Some(json!({})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Upload confirmed");
    assert_eq!(body["samples_created"], 1);

    let (_, upload) = t
        .json("GET", &format!("/api/monitoring-uploads/{upload_id}"), Some(&user), None)
        .await;
    assert_eq!(upload["parse_status"], "ok");

    let (_, samples) = t
        .json(
            "GET",
            &format!("/api/metrics/samples?device_item_id={device_id}&metric_key=cpu_usage"),
            Some(&user),
            None,
        )
        .await;
    let samples = samples.as_array().expect("array");
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0]["value"], 97.0);
    assert_eq!(samples[0]["source_upload_id"], upload_id);

    let (_, alerts) = t.json("GET", "/api/alerts", Some(&user), None).await;
    let alerts = alerts.as_array().expect("array");
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["status"], "open");
    assert_eq!(alerts[0]["severity"], "critical");
    assert_eq!(alerts[0]["summary"], "cpu_usage >= 90");
    let alert_id = alerts[0]["id"].as_i64().expect("alert id");

    // a second breach refreshes the open alert instead of opening another
    let (status, body) = t
        .json(
            "POST",
            &format!("/api/monitoring-uploads/{upload_id}/confirm"),
            Some(&user),
            Some(json!({
                "metrics": [{ "key": "cpu_usage", "value": 99.5, "unit": "%" }],
                "capture_time": "2026-03-01T11:00:00"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["samples_created"], 1);
    let (_, alerts) = t.json("GET", "/api/alerts", Some(&user), None).await;
    assert_eq!(alerts.as_array().map(Vec::len), Some(1));
    assert_eq!(alerts[0]["latest_value"], 99.5);

    // status workflow
    let (status, update) = t
        .json(
            "POST",
            &format!("/api/alerts/{alert_id}/updates"),
            Some(&user),
            Some(json!({ "status": "in_progress", "note": "Looking at it" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(update["status"], "in_progress");

    let (status, _) = t
        .json(
            "POST",
            &format!("/api/alerts/{alert_id}/updates"),
            Some(&user),
            Some(json!({ "status": "sleeping" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t
        .json(
            "POST",
            &format!("/api/alerts/{alert_id}/assign"),
            Some(&user),
            Some(json!({ "team_id": team["id"] })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = t
        .json(
            "POST",
            &format!("/api/alerts/{alert_id}/assign"),
            Some(&admin),
            Some(json!({ "team_id": team["id"] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, detail) = t
        .json("GET", &format!("/api/alerts/{alert_id}"), Some(&user), None)
        .await;
    assert_eq!(detail["status"], "in_progress");
    assert_eq!(detail["updates"][0]["note"], "Looking at it");

    // resolved alerts no longer absorb new breaches
    t.json(
        "POST",
        &format!("/api/alerts/{alert_id}/updates"),
        Some(&user),
        Some(json!({ "status": "resolved" })),
    )
    .await;
    t.json(
        "POST",
        &format!("/api/monitoring-uploads/{upload_id}/confirm"),
        Some(&user),
        Some(json!({ "metrics": [{ "key": "cpu_usage", "value": 95.0 }] })),
    )
    .await;
    let (_, alerts) = t.json("GET", "/api/alerts", Some(&user), None).await;
    assert_eq!(alerts.as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn confirm_resolves_targets_by_ip() {
    let t = spawn_app("monitoring-ip", FakeLlm::extracting(cpu_payload(10.0))).await;
    let admin = t.login_admin().await;

    let (_, vm) = t
        .json(
            "POST",
            "/api/vm-items",
            Some(&admin),
            Some(json!({ "name": "web-01", "ip_address": "10.2.0.7" })),
        )
        .await;
    let vm_id = vm["id"].as_i64().expect("vm id");

    let (status, upload) = t
        .multipart(
            "/api/monitoring-uploads",
            &admin,
            &[],
            Some(("dash.png", "image/png", PNG_BYTES)),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let upload_id = upload["id"].as_i64().expect("upload id");
    wait_parsed(&t, &admin, upload_id).await;

    let (status, body) = t
        .json(
            "POST",
            &format!("/api/monitoring-uploads/{upload_id}/confirm"),
            Some(&admin),
            Some(json!({
                "metrics": [
                    { "key": "cpu_usage", "value": 12.0, "ip_address": "10.2.0.7" },
                    { "key": "cpu_usage", "value": 13.0, "ip_address": "10.9.9.9" },
                    { "key": "cpu_usage", "value": 14.0 }
                ]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["samples_created"], 1);

    let (_, samples) = t
        .json("GET", &format!("/api/metrics/samples?vm_id={vm_id}"), Some(&admin), None)
        .await;
    assert_eq!(samples[0]["value"], 12.0);

    let (status, body) = t
        .json(
            "POST",
            &format!("/api/monitoring-uploads/{upload_id}/confirm"),
            Some(&admin),
            Some(json!({ "capture_time": "yesterday-ish" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Invalid capture_time");
}

#[tokio::test]
async fn failed_extraction_marks_upload_error() {
    let t = spawn_app(
        "monitoring-fail",
        FakeLlm::failing("upstream said: Incorrect API key provided: sk-abcdefghijklmnopqrstuvwx"),
    )
    .await;
    let user = t.login_user().await;

    let (status, upload) = t
        .multipart(
            "/api/monitoring-uploads",
            &user,
            &[("dashboard_label", "broken")],
            Some(("dash.png", "image/png", PNG_BYTES)),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(upload["parse_status"], "pending");
    let upload_id = upload["id"].as_i64().expect("upload id");

    let parsed = wait_parsed(&t, &user, upload_id).await;
    assert_eq!(parsed["parse_status"], "error");
    let err = parsed["parse_error"].as_str().expect("parse_error");
    assert!(!err.contains("sk-abcdefghijklmnopqrstuvwx"), "key leaked: {err}");

    let (status, _) = t
        .json(
            "GET",
            &format!("/api/monitoring-uploads/{upload_id}/file"),
            Some(&user),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, list) = t.json("GET", "/api/monitoring-uploads", Some(&user), None).await;
    assert_eq!(list.as_array().map(Vec::len), Some(1));
}
