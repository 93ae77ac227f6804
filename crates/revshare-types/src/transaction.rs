//! Payment transactions and their per-recipient distributions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{
    Amount, BasisPoints, ClaimId, ContentId, PayerId, RecipientId, SplitId, Timestamp,
    TransactionId,
};

/// Settlement state of a transaction.
///
/// `Pending` moves to exactly one of the two terminal states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown transaction status: {other}")),
        }
    }
}

/// A recorded payment against a split version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: TransactionId,
    /// Ledger-assigned, strictly increasing. Orders transactions that share
    /// a `created_at` second.
    pub sequence: u64,
    pub content_id: ContentId,
    /// The split version in effect when the payment was recorded.
    pub split_id: SplitId,
    pub payer_id: PayerId,
    /// Minor units.
    pub gross_amount: Amount,
    pub token_denomination: String,
    pub status: TransactionStatus,
    pub created_at: Timestamp,
    pub settled_at: Option<Timestamp>,
}

/// One recipient's computed share of a single transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    pub transaction_id: TransactionId,
    pub recipient_id: RecipientId,
    /// Minor units.
    pub amount: Amount,
    /// Share at computation time.
    pub share_bps: BasisPoints,
    pub claimed: bool,
    pub claimed_at: Option<Timestamp>,
    /// Receipt that claimed this line item.
    pub claim_id: Option<ClaimId>,
}
