//! Transaction ledger.
//!
//! Records payments against active splits, snapshots the split's recipients
//! into distributions, and tracks settlement:
//!
//! ```text
//! pending ──► completed
//!    └──────► failed
//! ```
//!
//! Both terminal states are final. Repeating a transition into the state a
//! transaction is already in is a no-op.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use revshare_types::{
    Amount, ContentId, Distribution, LedgerEventKind, PayerId, RecipientId, SplitId, Transaction,
    TransactionId, TransactionStatus, NATIVE_TOKEN,
};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::distribution::compute_distributions;
use crate::events::EventBus;
use crate::settlement::SettlementScheduler;
use crate::store::{LedgerStore, Transition};
use crate::{generate_id, LedgerContext, LedgerError, Result};

/// A validated payment event from the caller.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub content_id: ContentId,
    pub split_id: SplitId,
    pub payer_id: PayerId,
    /// Minor units.
    pub gross_amount: Amount,
    /// Defaults to [`NATIVE_TOKEN`].
    #[serde(default)]
    pub token_denomination: Option<String>,
}

/// Records payments and owns their settlement state.
pub struct TransactionLedger {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    sequence: AtomicU64,
    scheduler: Option<Arc<dyn SettlementScheduler>>,
}

impl TransactionLedger {
    /// Create a ledger, continuing the sequence from whatever the store holds.
    pub fn new(
        context: &LedgerContext,
        scheduler: Option<Arc<dyn SettlementScheduler>>,
    ) -> Result<Self> {
        let last = context.store.last_sequence()?;
        Ok(Self {
            store: context.store.clone(),
            clock: context.clock.clone(),
            events: context.events.clone(),
            sequence: AtomicU64::new(last),
            scheduler,
        })
    }

    /// Record a payment and its distributions as a pending transaction.
    ///
    /// Returns immediately; settlement happens out of band through the
    /// configured scheduler.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NotFound`] if no active split has `split_id`
    /// - [`LedgerError::Validation`] if the amount is zero, the payer or
    ///   token is blank, or the split belongs to different content
    pub fn record_payment(&self, request: PaymentRequest) -> Result<Transaction> {
        if request.gross_amount == 0 {
            return Err(LedgerError::Validation(
                "gross amount must be positive".to_string(),
            ));
        }
        if request.payer_id.is_blank() {
            return Err(LedgerError::Validation("payer id is required".to_string()));
        }
        let token_denomination = request
            .token_denomination
            .unwrap_or_else(|| NATIVE_TOKEN.to_string());
        if token_denomination.trim().is_empty() {
            return Err(LedgerError::Validation(
                "token denomination must not be empty".to_string(),
            ));
        }

        let split = self
            .store
            .split(&request.split_id)?
            .filter(|split| split.active)
            .ok_or_else(|| LedgerError::not_found("active split", &request.split_id))?;
        if split.content_id != request.content_id {
            return Err(LedgerError::Validation(format!(
                "split {} belongs to content {}, not {}",
                split.split_id, split.content_id, request.content_id
            )));
        }

        let shares = compute_distributions(&split.recipients, request.gross_amount)?;

        let transaction_id = TransactionId::new(generate_id("tx"));
        let now = self.clock.now();
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let tx = Transaction {
            transaction_id: transaction_id.clone(),
            sequence,
            content_id: request.content_id,
            split_id: split.split_id,
            payer_id: request.payer_id,
            gross_amount: request.gross_amount,
            token_denomination,
            status: TransactionStatus::Pending,
            created_at: now,
            settled_at: None,
        };
        let distributions: Vec<Distribution> = shares
            .into_iter()
            .map(|share| Distribution {
                transaction_id: transaction_id.clone(),
                recipient_id: share.recipient_id,
                amount: share.amount,
                share_bps: share.share_bps,
                claimed: false,
                claimed_at: None,
                claim_id: None,
            })
            .collect();

        self.store.insert_transaction(&tx, &distributions)?;

        tracing::info!(
            transaction_id = %tx.transaction_id,
            split_id = %tx.split_id,
            gross_amount = tx.gross_amount,
            recipients = distributions.len(),
            "payment recorded"
        );
        self.events.emit(
            LedgerEventKind::PaymentRecorded,
            now,
            serde_json::json!({
                "transaction_id": tx.transaction_id,
                "content_id": tx.content_id,
                "split_id": tx.split_id,
                "gross_amount": tx.gross_amount,
            }),
        );

        if let Some(scheduler) = &self.scheduler {
            scheduler.schedule(&tx);
        }

        Ok(tx)
    }

    /// Mark a pending transaction completed.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NotFound`] if the transaction is unknown
    /// - [`LedgerError::Conflict`] if it already failed
    pub fn mark_completed(&self, transaction_id: &TransactionId) -> Result<Transaction> {
        self.settle(transaction_id, TransactionStatus::Completed)
    }

    /// Mark a pending transaction failed.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NotFound`] if the transaction is unknown
    /// - [`LedgerError::Conflict`] if it already completed
    pub fn mark_failed(&self, transaction_id: &TransactionId) -> Result<Transaction> {
        self.settle(transaction_id, TransactionStatus::Failed)
    }

    fn settle(
        &self,
        transaction_id: &TransactionId,
        status: TransactionStatus,
    ) -> Result<Transaction> {
        let now = self.clock.now();
        let transition = self
            .store
            .transition(transaction_id, status, now)?
            .ok_or_else(|| LedgerError::not_found("transaction", transaction_id))?;

        match transition {
            Transition::Applied(tx) => {
                tracing::info!(
                    transaction_id = %transaction_id,
                    status = %status,
                    "transaction settled"
                );
                if let Some(kind) = LedgerEventKind::for_settlement(status) {
                    self.events.emit(
                        kind,
                        now,
                        serde_json::json!({
                            "transaction_id": transaction_id,
                            "status": status,
                        }),
                    );
                }
                Ok(tx)
            }
            Transition::Unchanged(tx) => {
                tracing::debug!(
                    transaction_id = %transaction_id,
                    status = %status,
                    "transaction already settled"
                );
                Ok(tx)
            }
            Transition::Rejected(tx) => Err(LedgerError::Conflict(format!(
                "transaction {transaction_id} is {} and cannot become {status}",
                tx.status
            ))),
        }
    }

    /// # Errors
    ///
    /// - [`LedgerError::NotFound`] if the transaction is unknown
    pub fn get_transaction(&self, transaction_id: &TransactionId) -> Result<Transaction> {
        self.store
            .transaction(transaction_id)?
            .ok_or_else(|| LedgerError::not_found("transaction", transaction_id))
    }

    /// Distributions of a transaction in recipient list order.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NotFound`] if the transaction is unknown
    pub fn get_distributions(&self, transaction_id: &TransactionId) -> Result<Vec<Distribution>> {
        self.get_transaction(transaction_id)?;
        self.store.distributions(transaction_id)
    }

    /// Transactions paying `recipient`, oldest first.
    pub fn get_transactions_for_recipient(
        &self,
        recipient: &RecipientId,
    ) -> Result<Vec<Transaction>> {
        self.store.transactions_for_recipient(recipient)
    }

    /// All transactions still waiting for settlement, oldest first.
    pub fn pending_transactions(&self) -> Result<Vec<Transaction>> {
        self.store.pending_transactions()
    }

    /// Fail every pending transaction created more than `timeout_secs` ago.
    ///
    /// Returns the ids that were failed.
    pub fn expire_pending(&self, timeout_secs: u64) -> Result<Vec<TransactionId>> {
        let now = self.clock.now();
        let mut expired = Vec::new();
        for tx in self.store.pending_transactions()? {
            if now.saturating_sub(tx.created_at) < timeout_secs {
                continue;
            }
            match self.mark_failed(&tx.transaction_id) {
                Ok(_) => expired.push(tx.transaction_id),
                // Settled concurrently.
                Err(LedgerError::Conflict(_)) => {}
                Err(e) => return Err(e),
            }
        }
        if !expired.is_empty() {
            tracing::warn!(count = expired.len(), "expired pending transactions");
        }
        Ok(expired)
    }
}
