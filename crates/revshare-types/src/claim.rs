//! Claim receipts.

use serde::{Deserialize, Serialize};

use crate::{Amount, ClaimId, RecipientId, Timestamp, TransactionId};

/// Immutable receipt for a batch of distributions paid out to a recipient.
///
/// `total_amount` is what was actually claimed and can exceed
/// `requested_amount`, since distributions are never split.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub claim_id: ClaimId,
    pub recipient_id: RecipientId,
    pub requested_amount: Amount,
    pub total_amount: Amount,
    /// Oldest transaction first.
    pub covered_transaction_ids: Vec<TransactionId>,
    pub claimed_at: Timestamp,
}
