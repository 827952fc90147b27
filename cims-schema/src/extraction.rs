//! Payloads the models are asked to return: dashboard metric extraction and
//! generated SOP manuals.

use serde::{Deserialize, Serialize};

/// One metric reading read off a monitoring screenshot.
///
/// The same shape is used for the reviewed metrics a client sends back on
/// confirm, which may additionally pin the reading to a device or VM.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ExtractedMetric {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,

    #[serde(default)]
    pub key: Option<String>,

    /// `null` when the model could not read the value.
    #[serde(default)]
    pub value: Option<f64>,

    #[serde(default)]
    pub unit: Option<String>,

    #[serde(default)]
    pub confidence: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_item_id: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractionPayload {
    #[serde(default)]
    pub metrics: Vec<ExtractedMetric>,

    #[serde(default)]
    pub raw_text: Option<String>,

    #[serde(default)]
    pub confidence: Option<f64>,

    /// `"ok"` or `"error"`.
    #[serde(default = "default_status")]
    pub status: String,

    /// ISO-8601 timestamp if the dashboard shows one.
    #[serde(default)]
    pub capture_time: Option<String>,

    #[serde(default)]
    pub error: Option<String>,
}

fn default_status() -> String {
    "ok".to_string()
}

impl ExtractionPayload {
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok") && self.error.is_none()
    }

    pub fn failed(error: impl Into<String>, raw_text: Option<String>) -> Self {
        Self {
            metrics: Vec::new(),
            raw_text,
            confidence: Some(0.0),
            status: "error".to_string(),
            capture_time: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkItem {
    pub title: String,
    pub uri: String,
}

/// Generated SOP manual content.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ManualDraft {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub monitoring: Vec<String>,
    #[serde(default)]
    pub maintenance: Vec<String>,
    #[serde(default)]
    pub troubleshooting: Vec<String>,
    #[serde(default)]
    pub links: Vec<LinkItem>,
    #[serde(default)]
    pub illustration_prompt: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_defaults_status_to_ok_and_accepts_null_values() {
        let payload: ExtractionPayload = serde_json::from_value(json!({
            "metrics": [
                {"ip_address": "10.0.1.11", "key": "cpu_util", "value": 42.5, "unit": "%", "confidence": 0.9},
                {"ip_address": "10.0.1.11", "key": "net_in", "value": null, "unit": "%"}
            ],
            "raw_text": "CPU 42.5%"
        }))
        .unwrap();

        assert!(payload.is_ok());
        assert_eq!(payload.metrics.len(), 2);
        assert_eq!(payload.metrics[0].value, Some(42.5));
        assert_eq!(payload.metrics[1].value, None);
    }

    #[test]
    fn failed_payload_is_not_ok() {
        let payload = ExtractionPayload::failed("boom", None);
        assert!(!payload.is_ok());
        assert!(payload.metrics.is_empty());
    }
}
