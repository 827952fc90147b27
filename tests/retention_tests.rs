mod common;

use axum::http::StatusCode;
use chrono::Utc;
use cims::db::SampleFilter;
use cims::db::patch::{MetricSampleCreate, MonitoringUploadCreate};
use cims::service::retention::{PurgeReport, purge_expired_uploads};
use common::{FakeLlm, spawn_app};

#[tokio::test]
async fn purge_removes_expired_uploads_samples_and_files() {
    let t = spawn_app("retention", FakeLlm::default()).await;

    let dir = t.cfg.storage.monitoring_dir();
    std::fs::create_dir_all(&dir).expect("failed to create monitoring dir");
    let path = dir.join("old.png");
    std::fs::write(&path, b"png").expect("failed to write upload file");

    let upload = t
        .db
        .create_monitoring_upload(MonitoringUploadCreate {
            device_item_id: None,
            vm_id: None,
            location_id: None,
            file_path: path.to_string_lossy().into_owned(),
            file_name: "old.png".to_string(),
            mime_type: Some("image/png".to_string()),
            uploaded_by_user_id: None,
            capture_time: None,
            dashboard_label: None,
        })
        .await
        .expect("failed to create upload");

    let (_, vm) = t
        .json(
            "POST",
            "/api/vm-items",
            Some(&t.login_admin().await),
            Some(serde_json::json!({ "name": "batch-01" })),
        )
        .await;
    let vm_id = vm["id"].as_i64().expect("vm id");
    t.db
        .insert_metric_sample(MetricSampleCreate {
            device_item_id: None,
            vm_id: Some(vm_id),
            captured_at: Utc::now(),
            metric_key: "cpu_usage".to_string(),
            value: 42.0,
            unit: Some("%".to_string()),
            source_upload_id: Some(upload.id),
            confidence: None,
        })
        .await
        .expect("failed to insert sample");

    // a generous window keeps everything
    let report = purge_expired_uploads(&t.db, 30).await.expect("purge failed");
    assert_eq!(report, PurgeReport::default());
    assert!(path.exists());

    let report = purge_expired_uploads(&t.db, 0).await.expect("purge failed");
    assert_eq!(
        report,
        PurgeReport {
            uploads: 1,
            samples: 1,
            files: 1
        }
    );
    assert!(!path.exists());

    let samples = t
        .db
        .list_metric_samples(&SampleFilter {
            vm_id: Some(vm_id),
            ..SampleFilter::default()
        })
        .await
        .expect("failed to list samples");
    assert!(samples.is_empty());

    let admin = t.login_admin().await;
    let (status, _) = t
        .json(
            "GET",
            &format!("/api/monitoring-uploads/{}", upload.id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // nothing left on a second pass
    let report = purge_expired_uploads(&t.db, 0).await.expect("purge failed");
    assert_eq!(report.uploads, 0);
}
