//! Ledger events pushed to subscribers.

use serde::{Deserialize, Serialize};

use crate::{Timestamp, TransactionStatus};

/// Envelope for all ledger events.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub kind: LedgerEventKind,
    pub timestamp: Timestamp,
    pub payload: serde_json::Value,
}

/// All event kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEventKind {
    SplitCreated,
    SplitSuperseded,
    SplitActivationChanged,
    PaymentRecorded,
    TransactionSettled,
    TransactionFailed,
    RevenueClaimed,
}

impl LedgerEventKind {
    /// Event emitted when a transaction reaches `status`.
    pub fn for_settlement(status: TransactionStatus) -> Option<Self> {
        match status {
            TransactionStatus::Completed => Some(Self::TransactionSettled),
            TransactionStatus::Failed => Some(Self::TransactionFailed),
            TransactionStatus::Pending => None,
        }
    }
}
