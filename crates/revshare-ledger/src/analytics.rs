//! Read-only revenue views for a recipient.
//!
//! Failed transactions never produce revenue and are excluded from every
//! amount below; they are only counted in `failed`/`failed_count`.

use std::str::FromStr;
use std::sync::Arc;

use revshare_types::{Amount, RecipientId, Timestamp, Transaction, TransactionStatus};
use serde::{Deserialize, Serialize};

use crate::store::{LedgerStore, RecipientEntry};
use crate::{LedgerContext, LedgerError, Result};

/// Number of transactions returned in [`RevenueAnalytics::recent_transactions`].
pub const RECENT_TRANSACTIONS_LIMIT: usize = 10;

const DAY_SECS: u64 = 24 * 60 * 60;

/// Lifetime totals for one recipient.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientSummary {
    /// Pending plus completed.
    pub total_earned: Amount,
    /// On transactions awaiting settlement.
    pub pending: Amount,
    /// Completed and not yet claimed.
    pub claimable: Amount,
    pub claimed: Amount,
    /// On transactions that failed to settle.
    pub failed: Amount,
}

/// Look-back window for [`Analytics::revenue_analytics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "7d")]
    Week,
    #[default]
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "90d")]
    Quarter,
    #[serde(rename = "1y")]
    Year,
}

impl TimeRange {
    pub fn duration_secs(&self) -> u64 {
        match self {
            Self::Week => 7 * DAY_SECS,
            Self::Month => 30 * DAY_SECS,
            Self::Quarter => 90 * DAY_SECS,
            Self::Year => 365 * DAY_SECS,
        }
    }

    /// Parse a range label, falling back to 30 days for anything unknown.
    pub fn parse_or_default(label: &str) -> Self {
        label.parse().unwrap_or_default()
    }
}

impl FromStr for TimeRange {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "7d" => Ok(Self::Week),
            "30d" => Ok(Self::Month),
            "90d" => Ok(Self::Quarter),
            "1y" => Ok(Self::Year),
            other => Err(LedgerError::Validation(format!("unknown time range: {other}"))),
        }
    }
}

/// A transaction and the recipient's amount from it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientTransaction {
    pub transaction: Transaction,
    pub amount: Amount,
    pub claimed: bool,
}

/// Revenue statistics over a time window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueAnalytics {
    pub time_range: TimeRange,
    pub from: Timestamp,
    pub to: Timestamp,
    pub total_revenue: Amount,
    pub transaction_count: usize,
    pub completed_count: usize,
    pub pending_count: usize,
    pub failed_count: usize,
    /// Floor of `total_revenue / (completed_count + pending_count)`.
    pub average_transaction: Amount,
    /// Newest first.
    pub recent_transactions: Vec<RecipientTransaction>,
}

/// Read-only revenue reporting.
pub struct Analytics {
    store: Arc<dyn LedgerStore>,
}

impl Analytics {
    pub fn new(context: &LedgerContext) -> Self {
        Self {
            store: context.store.clone(),
        }
    }

    pub fn recipient_summary(&self, recipient: &RecipientId) -> Result<RecipientSummary> {
        let mut summary = RecipientSummary::default();
        for entry in self.store.entries_for_recipient(recipient)? {
            let amount = entry.distribution.amount;
            let bucket = match entry.transaction.status {
                TransactionStatus::Pending => &mut summary.pending,
                TransactionStatus::Failed => &mut summary.failed,
                TransactionStatus::Completed if entry.distribution.claimed => &mut summary.claimed,
                TransactionStatus::Completed => &mut summary.claimable,
            };
            *bucket = bucket.checked_add(amount).ok_or(LedgerError::Overflow)?;
        }
        summary.total_earned = [summary.pending, summary.claimable, summary.claimed]
            .into_iter()
            .try_fold(0u64, |acc, v| acc.checked_add(v))
            .ok_or(LedgerError::Overflow)?;
        Ok(summary)
    }

    /// Statistics for transactions created in `(now - range, now]`.
    pub fn revenue_analytics(
        &self,
        recipient: &RecipientId,
        range: TimeRange,
        now: Timestamp,
    ) -> Result<RevenueAnalytics> {
        let from = now.saturating_sub(range.duration_secs());
        let in_range: Vec<RecipientEntry> = self
            .store
            .entries_for_recipient(recipient)?
            .into_iter()
            .filter(|e| e.transaction.created_at > from && e.transaction.created_at <= now)
            .collect();

        let count = |status: TransactionStatus| {
            in_range
                .iter()
                .filter(|e| e.transaction.status == status)
                .count()
        };
        let completed_count = count(TransactionStatus::Completed);
        let pending_count = count(TransactionStatus::Pending);
        let failed_count = count(TransactionStatus::Failed);

        let total_revenue = in_range
            .iter()
            .filter(|e| e.transaction.status != TransactionStatus::Failed)
            .try_fold(0u64, |acc, e| acc.checked_add(e.distribution.amount))
            .ok_or(LedgerError::Overflow)?;
        let earning = (completed_count + pending_count) as u64;
        let average_transaction = total_revenue.checked_div(earning).unwrap_or(0);

        let recent_transactions = in_range
            .iter()
            .rev()
            .take(RECENT_TRANSACTIONS_LIMIT)
            .map(|e| RecipientTransaction {
                transaction: e.transaction.clone(),
                amount: e.distribution.amount,
                claimed: e.distribution.claimed,
            })
            .collect();

        Ok(RevenueAnalytics {
            time_range: range,
            from,
            to: now,
            total_revenue,
            transaction_count: in_range.len(),
            completed_count,
            pending_count,
            failed_count,
            average_transaction,
            recent_transactions,
        })
    }
}
