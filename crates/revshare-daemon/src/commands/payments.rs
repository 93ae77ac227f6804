//! Payment and transaction command handlers.

use std::sync::Arc;

use revshare_ledger::PaymentRequest;
use revshare_types::{ContentId, PayerId, RecipientId, SplitId, TransactionId};
use serde_json::Value;

use super::{optional_str, required_amount, required_str, to_json, Result};
use crate::DaemonState;

/// Record a payment against an active split.
///
/// The transaction starts pending and is handed to the settlement worker.
pub async fn record_payment(state: &Arc<DaemonState>, params: &Value) -> Result {
    let request = PaymentRequest {
        content_id: ContentId::new(required_str(params, "content_id")?),
        split_id: SplitId::new(required_str(params, "split_id")?),
        payer_id: PayerId::new(required_str(params, "payer_id")?),
        gross_amount: required_amount(params, "gross_amount")?,
        token_denomination: optional_str(params, "token_denomination")?.map(str::to_string),
    };
    let tx = state.ledger.transactions.record_payment(request)?;
    let distributions = state.ledger.transactions.get_distributions(&tx.transaction_id)?;
    Ok(serde_json::json!({
        "transaction": to_json(&tx)?,
        "distributions": to_json(&distributions)?,
    }))
}

/// Get a transaction with its distributions.
pub async fn get_transaction(state: &Arc<DaemonState>, params: &Value) -> Result {
    let transaction_id = TransactionId::new(required_str(params, "transaction_id")?);
    let tx = state.ledger.transactions.get_transaction(&transaction_id)?;
    let distributions = state.ledger.transactions.get_distributions(&transaction_id)?;
    Ok(serde_json::json!({
        "transaction": to_json(&tx)?,
        "distributions": to_json(&distributions)?,
    }))
}

/// List transactions that pay a recipient, oldest first.
pub async fn get_transactions_for_recipient(
    state: &Arc<DaemonState>,
    params: &Value,
) -> Result {
    let recipient = RecipientId::new(required_str(params, "recipient_id")?);
    to_json(
        &state
            .ledger
            .transactions
            .get_transactions_for_recipient(&recipient)?,
    )
}
