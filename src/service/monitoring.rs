use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use cims_schema::{ExtractedMetric, ExtractionPayload};
use serde::Deserialize;
use tracing::{debug, info};

use super::alert_engine::evaluate_sample;
use crate::db::patch::MetricSampleCreate;
use crate::db::{Db, DbMonitoringUpload, ParseOutcome, ParseStatus};
use crate::error::CimsError;
use crate::llm::sanitize_error_message;

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Lenient ISO-8601 parse. Offset-less timestamps are taken as UTC.
pub fn parse_capture_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Map the model's payload onto the stored parse result.
pub fn outcome_from_payload(payload: ExtractionPayload) -> ParseOutcome {
    let ok = payload.is_ok();
    let error = match (&payload.error, ok) {
        (Some(e), _) => Some(sanitize_error_message(e)),
        (None, false) => Some("Model could not extract metrics from the screenshot".to_string()),
        (None, true) => None,
    };
    ParseOutcome {
        status: if ok { ParseStatus::Ready } else { ParseStatus::Error },
        capture_time: payload.capture_time.as_deref().and_then(parse_capture_time),
        raw_text: payload.raw_text,
        metrics: payload.metrics,
        confidence: payload.confidence,
        error,
    }
}

/// Parse result for an upload that never reached the model or whose call failed.
pub fn failed_outcome(message: &str) -> ParseOutcome {
    ParseOutcome {
        status: ParseStatus::Error,
        raw_text: None,
        metrics: Vec::new(),
        confidence: Some(0.0),
        error: Some(sanitize_error_message(message)),
        capture_time: None,
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfirmRequest {
    /// Reviewed metrics; the stored extraction is used when absent.
    #[serde(default)]
    pub metrics: Option<Vec<ExtractedMetric>>,
    #[serde(default)]
    pub capture_time: Option<String>,
}

/// Persist the reviewed metrics of an upload as samples and mark it confirmed.
///
/// Returns the number of samples created.
pub async fn confirm_upload(db: &Db, upload_id: i64, req: ConfirmRequest) -> Result<usize, CimsError> {
    let upload = db.get_monitoring_upload(upload_id).await?;

    let captured_at = match req.capture_time.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(raw) => parse_capture_time(raw)
            .ok_or_else(|| CimsError::bad_request("Invalid capture_time"))?,
        None => upload.capture_time.unwrap_or_else(Utc::now),
    };

    let metrics = match req.metrics {
        Some(m) => m,
        None => upload
            .extracted_metrics
            .as_ref()
            .map(|j| j.0.clone())
            .unwrap_or_default(),
    };

    let mut created = 0;
    for metric in metrics {
        let Some((device_item_id, vm_id)) = resolve_target(db, &upload, &metric).await? else {
            debug!(upload_id, key = ?metric.key, "Metric has no target, skipped");
            continue;
        };
        let Some(key) = metric.key.as_deref().map(str::trim).filter(|k| !k.is_empty()) else {
            continue;
        };
        let Some(value) = metric.value else {
            debug!(upload_id, key, "Metric has no value, skipped");
            continue;
        };

        let sample = db
            .insert_metric_sample(MetricSampleCreate {
                device_item_id,
                vm_id,
                captured_at,
                metric_key: key.to_string(),
                value,
                unit: metric.unit.clone(),
                source_upload_id: Some(upload.id),
                confidence: metric.confidence,
            })
            .await?;
        evaluate_sample(db, &sample).await?;
        created += 1;
    }

    db.set_parse_status(upload_id, ParseStatus::Ok).await?;
    info!(upload_id, samples_created = created, "Monitoring upload confirmed");
    Ok(created)
}

/// Device/VM a metric belongs to: its own ids, else the upload's, else a lookup by IP
/// (VM first, then device). `None` when nothing matches.
async fn resolve_target(
    db: &Db,
    upload: &DbMonitoringUpload,
    metric: &ExtractedMetric,
) -> Result<Option<(Option<i64>, Option<i64>)>, CimsError> {
    let mut device_item_id = metric.device_item_id.or(upload.device_item_id);
    let mut vm_id = metric.vm_id.or(upload.vm_id);

    if device_item_id.is_none() && vm_id.is_none() {
        if let Some(ip) = metric.ip_address.as_deref().map(str::trim).filter(|ip| !ip.is_empty()) {
            if let Some(vm) = db.find_vm_by_ip(ip).await? {
                vm_id = Some(vm.id);
            } else if let Some(device) = db.find_device_by_ip(ip).await? {
                device_item_id = Some(device.id);
            }
        }
    }

    if device_item_id.is_none() && vm_id.is_none() {
        return Ok(None);
    }
    Ok(Some((device_item_id, vm_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn capture_time_accepts_common_shapes() {
        let dt = parse_capture_time("2024-05-01T10:15:00Z").unwrap();
        assert_eq!((dt.hour(), dt.minute()), (10, 15));

        let dt = parse_capture_time("2024-05-01T12:15:00+02:00").unwrap();
        assert_eq!(dt.hour(), 10);

        let dt = parse_capture_time("2024-05-01 10:15:30").unwrap();
        assert_eq!(dt.second(), 30);

        let dt = parse_capture_time("2024-05-01").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day(), dt.hour()), (2024, 5, 1, 0));

        assert!(parse_capture_time("yesterday").is_none());
        assert!(parse_capture_time("  ").is_none());
    }

    #[test]
    fn payload_status_maps_to_parse_status() {
        let payload: ExtractionPayload = serde_json::from_str(
            r#"{"metrics":[{"key":"cpu_util","value":42.0}],"confidence":0.9,"capture_time":"2024-05-01T10:00:00Z"}"#,
        )
        .unwrap();
        let outcome = outcome_from_payload(payload);
        assert_eq!(outcome.status, ParseStatus::Ready);
        assert_eq!(outcome.metrics.len(), 1);
        assert!(outcome.capture_time.is_some());
        assert!(outcome.error.is_none());

        let outcome = outcome_from_payload(ExtractionPayload::failed(
            "401 Incorrect API key provided: sk-abcdefghijklmnop9999",
            None,
        ));
        assert_eq!(outcome.status, ParseStatus::Error);
        let err = outcome.error.unwrap();
        assert!(!err.contains("abcdefghijklmnop"));
    }
}
