//! Claim command handlers.

use std::sync::Arc;

use revshare_types::RecipientId;
use serde_json::Value;

use super::{required_amount, required_str, to_json, Result};
use crate::DaemonState;

/// Get a recipient's claimable balance.
pub async fn get_claimable_balance(state: &Arc<DaemonState>, params: &Value) -> Result {
    let recipient = RecipientId::new(required_str(params, "recipient_id")?);
    let claimable = state.ledger.claims.get_claimable_balance(&recipient)?;
    Ok(serde_json::json!({
        "recipient_id": recipient,
        "claimable": claimable,
    }))
}

/// Claim completed earnings.
pub async fn claim(state: &Arc<DaemonState>, params: &Value) -> Result {
    let recipient = RecipientId::new(required_str(params, "recipient_id")?);
    let amount = required_amount(params, "amount")?;
    to_json(&state.ledger.claims.claim(&recipient, amount)?)
}

/// List claim receipts for a recipient.
pub async fn get_claims(state: &Arc<DaemonState>, params: &Value) -> Result {
    let recipient = RecipientId::new(required_str(params, "recipient_id")?);
    to_json(&state.ledger.claims.get_claims_for_recipient(&recipient)?)
}
