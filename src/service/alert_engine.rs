use tracing::{debug, info, warn};

use super::notifier::notify_team;
use crate::db::{AlertCreate, Db, DbMetricSample};
use crate::error::CimsError;

/// Evaluate `value <op> threshold`. Unknown operators never fire.
pub fn compare(operator: &str, value: f64, threshold: f64) -> bool {
    match operator.trim() {
        ">" => value > threshold,
        ">=" => value >= threshold,
        "<" => value < threshold,
        "<=" => value <= threshold,
        _ => false,
    }
}

/// Run every matching rule against a freshly stored sample.
///
/// A breach refreshes the target's active alert for that rule, or opens a new one,
/// assigns it to the rule's team and notifies that team. Returns the number of
/// alerts opened.
pub async fn evaluate_sample(db: &Db, sample: &DbMetricSample) -> Result<usize, CimsError> {
    let group_id = db
        .target_metric_group(sample.device_item_id, sample.vm_id)
        .await?;
    let rules = db.matching_alert_rules(&sample.metric_key, group_id).await?;

    let mut opened = 0;
    for rule in rules {
        if !compare(&rule.operator, sample.value, rule.threshold) {
            continue;
        }

        let summary = rule
            .message_template
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| format!("{} {} {}", sample.metric_key, rule.operator, rule.threshold));

        if let Some(existing) = db
            .find_active_alert(rule.id, sample.device_item_id, sample.vm_id)
            .await?
        {
            db.refresh_alert(existing.id, sample.value, &summary).await?;
            debug!(alert_id = existing.id, rule_id = rule.id, value = sample.value, "Active alert refreshed");
            continue;
        }

        let alert = db
            .create_alert(AlertCreate {
                device_item_id: sample.device_item_id,
                vm_id: sample.vm_id,
                rule_id: rule.id,
                severity: rule.severity.clone(),
                latest_value: sample.value,
                summary,
                evidence_upload_id: sample.source_upload_id,
            })
            .await?;
        opened += 1;
        info!(
            alert_id = alert.id,
            rule_id = rule.id,
            metric_key = %sample.metric_key,
            value = sample.value,
            "Alert opened"
        );

        if let Some(team_id) = rule.team_id {
            db.assign_alert(alert.id, Some(team_id), None).await?;
            if let Err(e) = notify_team(db, team_id, &alert).await {
                warn!(alert_id = alert.id, team_id, error = %e, "Team notification failed");
            }
        }
    }

    Ok(opened)
}
