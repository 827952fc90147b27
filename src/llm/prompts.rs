use crate::db::DbEquipment;
use serde_json::json;

pub const METRIC_EXTRACTION_PROMPT: &str = r#"Extract metrics from this monitoring dashboard screenshot.
If multiple hosts/VMs are present, return one metric per host with the host/VM IP.
Return JSON ONLY in this format:
{
  "metrics": [
    {"ip_address": "10.0.1.11", "key": "cpu_util", "value": 0.0, "unit": "%", "confidence": 0.0},
    {"ip_address": "10.0.1.11", "key": "ram_util", "value": 0.0, "unit": "%", "confidence": 0.0}
  ],
  "raw_text": "...",
  "confidence": 0.0,
  "status": "ok",
  "capture_time": null
}
Use keys like cpu_util, ram_util, disk_util, net_in, net_out."#;

pub fn manual_prompt(equipment: &DbEquipment) -> String {
    format!(
        r#"Create a technical SOP manual for {vendor} {model} ({name}).

Provide a JSON response with:
{{
    "summary": "A 2-3 sentence overview of the equipment",
    "monitoring": ["Step 1: ...", "Step 2: ...", ...],
    "maintenance": ["Monthly: ...", "Quarterly: ...", ...],
    "troubleshooting": ["Issue: ... Solution: ...", ...],
    "links": [{{"title": "...", "uri": "..."}}],
    "illustration_prompt": "50-word description for technical diagram"
}}

Return ONLY valid JSON."#,
        vendor = equipment.vendor,
        model = equipment.model,
        name = equipment.name,
    )
}

/// Chat turn carrying the inventory, the prior session transcript and the new message.
pub fn chat_prompt(inventory: &[DbEquipment], history: &[(String, String)], message: &str) -> String {
    let inventory: Vec<_> = inventory
        .iter()
        .map(|e| {
            json!({
                "id": e.id,
                "name": e.name,
                "vendor": e.vendor,
                "model": e.model,
                "area": e.area,
                "type": e.kind,
            })
        })
        .collect();
    let inventory = serde_json::to_string_pretty(&inventory).unwrap_or_else(|_| "[]".to_string());

    let mut prompt = format!(
        "You are DC-Ops Master, an AI assistant for data center operations.\n\n\
         Current Inventory:\n{inventory}\n\n\
         Help engineers with equipment monitoring, troubleshooting, and maintenance.\n"
    );

    if !history.is_empty() {
        prompt.push_str("\nConversation so far:\n");
        for (role, content) in history {
            let speaker = if role == "model" { "Assistant" } else { "User" };
            prompt.push_str(&format!("{speaker}: {content}\n"));
        }
    }

    prompt.push_str(&format!("\nUser: {message}"));
    prompt
}
