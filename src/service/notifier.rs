use tracing::{info, warn};

use crate::db::{Db, DbAlert};
use crate::error::CimsError;

/// Announce a newly opened alert to the owning team's mail alias.
///
/// Delivery is a structured log line; teams without an alias are skipped.
pub async fn notify_team(db: &Db, team_id: i64, alert: &DbAlert) -> Result<(), CimsError> {
    let Some(team) = db.find_team(team_id).await? else {
        warn!(team_id, alert_id = alert.id, "Alert assigned to unknown team, not notifying");
        return Ok(());
    };
    let Some(alias) = team.email_alias.as_deref().filter(|a| !a.trim().is_empty()) else {
        return Ok(());
    };

    let summary = alert.summary.as_deref().unwrap_or("");
    info!(
        team = %team.name,
        to = %alias,
        alert_id = alert.id,
        severity = %alert.severity,
        subject = %format!("Alert: {summary}"),
        "Team alert notification"
    );
    Ok(())
}
