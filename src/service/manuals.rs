use cims_schema::ManualDraft;
use tracing::{debug, warn};

use crate::db::DbEquipment;
use crate::db::patch::ManualUpsert;
use crate::llm::{LlmBackend, parse_json_object, prompts::manual_prompt};

/// Ask the model for an SOP manual; any failure yields [`fallback_manual`].
pub async fn generate_manual(llm: &dyn LlmBackend, equipment: &DbEquipment) -> ManualUpsert {
    let text = match llm.complete(&manual_prompt(equipment)).await {
        Ok(text) => text,
        Err(e) => {
            warn!(equipment_id = equipment.id, error = %e.public_message(), "Manual generation failed, using fallback");
            return fallback_manual(equipment);
        }
    };

    let Some(mut draft) = parse_json_object::<ManualDraft>(&text) else {
        warn!(equipment_id = equipment.id, "Manual output was not valid JSON, using fallback");
        return fallback_manual(equipment);
    };

    if draft.summary.trim().is_empty() {
        draft.summary = format!(
            "Technical documentation for {} {}",
            equipment.vendor, equipment.model
        );
    }
    debug!(equipment_id = equipment.id, "Manual generated");
    draft.into()
}

/// Deterministic generic SOP used when the model is unavailable.
pub fn fallback_manual(equipment: &DbEquipment) -> ManualUpsert {
    let lines = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    ManualUpsert {
        summary: format!(
            "Technical documentation for {} {}.",
            equipment.vendor, equipment.model
        ),
        monitoring: lines(&[
            "Check system status indicators",
            "Verify network connectivity",
            "Review system logs for errors",
            "Monitor resource utilization",
        ]),
        maintenance: lines(&[
            "Monthly: Clean air filters and vents",
            "Quarterly: Update firmware if available",
            "Quarterly: Review and rotate logs",
            "Annually: Full system health check",
        ]),
        troubleshooting: lines(&[
            "Issue: No response - Solution: Check power and network connections",
            "Issue: High CPU - Solution: Review running processes and logs",
            "Issue: Connectivity issues - Solution: Verify network configuration",
        ]),
        links: Some(Vec::new()),
        illustration_prompt: Some(format!(
            "Technical diagram of {} {}",
            equipment.vendor, equipment.model
        )),
        image_url: None,
    }
}
