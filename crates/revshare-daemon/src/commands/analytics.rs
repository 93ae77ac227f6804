//! Revenue reporting command handlers.

use std::sync::Arc;

use revshare_ledger::analytics::TimeRange;
use revshare_types::RecipientId;
use serde_json::Value;

use super::{optional_str, required_str, to_json, Result};
use crate::DaemonState;

/// Lifetime totals for a recipient.
pub async fn get_revenue_summary(state: &Arc<DaemonState>, params: &Value) -> Result {
    let recipient = RecipientId::new(required_str(params, "recipient_id")?);
    to_json(&state.ledger.analytics.recipient_summary(&recipient)?)
}

/// Windowed statistics. `time_range` is one of `7d`, `30d`, `90d`, `1y`;
/// anything else falls back to `30d`.
pub async fn get_revenue_analytics(state: &Arc<DaemonState>, params: &Value) -> Result {
    let recipient = RecipientId::new(required_str(params, "recipient_id")?);
    let range = optional_str(params, "time_range")?
        .map(TimeRange::parse_or_default)
        .unwrap_or_default();
    let now = state.ledger.context().clock.now();
    to_json(
        &state
            .ledger
            .analytics
            .revenue_analytics(&recipient, range, now)?,
    )
}
