//! Background settlement.
//!
//! [`TransactionLedger::record_payment`] hands every new transaction to a
//! [`SettlementScheduler`]. The default scheduler is the sending half of an
//! unbounded channel; the [`SettlementWorker`] drains it and settles each
//! transaction in its own task by polling a [`ConfirmationSource`]:
//!
//! - `Confirmed` marks the transaction completed
//! - `Rejected` marks it failed
//! - no decision before the settlement timeout marks it failed
//!
//! Poll errors are logged and retried on the next interval. This is the only
//! operation the ledger retries on its own.

use std::sync::Arc;
use std::time::Duration;

use revshare_types::{Transaction, TransactionStatus};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;

use crate::clock::Clock;
use crate::transactions::TransactionLedger;
use crate::{LedgerError, Result};

/// Default delay before [`DelayedConfirmation`] confirms a payment.
pub const DEFAULT_CONFIRMATION_DELAY_SECS: u64 = 5;

/// Default interval between confirmation polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default time a transaction may stay pending before it is failed.
pub const DEFAULT_SETTLEMENT_TIMEOUT: Duration = Duration::from_secs(300);

/// Receives transactions that need settling.
pub trait SettlementScheduler: Send + Sync {
    /// Must not block the caller.
    fn schedule(&self, tx: &Transaction);
}

/// Outcome of one confirmation poll.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Confirmation {
    /// No decision yet.
    Pending,
    Confirmed,
    Rejected(String),
}

/// External source of payment confirmations.
pub trait ConfirmationSource: Send + Sync + 'static {
    fn poll(&self, tx: &Transaction) -> Result<Confirmation>;
}

/// Confirms every payment a fixed number of seconds after it was recorded.
pub struct DelayedConfirmation {
    clock: Arc<dyn Clock>,
    delay_secs: u64,
}

impl DelayedConfirmation {
    pub fn new(clock: Arc<dyn Clock>, delay_secs: u64) -> Self {
        Self { clock, delay_secs }
    }
}

impl ConfirmationSource for DelayedConfirmation {
    fn poll(&self, tx: &Transaction) -> Result<Confirmation> {
        if self.clock.now() >= tx.created_at.saturating_add(self.delay_secs) {
            Ok(Confirmation::Confirmed)
        } else {
            Ok(Confirmation::Pending)
        }
    }
}

/// Worker timing.
#[derive(Clone, Debug)]
pub struct SettlementConfig {
    pub poll_interval: Duration,
    /// Measured from the transaction's `created_at`.
    pub timeout: Duration,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_SETTLEMENT_TIMEOUT,
        }
    }
}

/// Sending half of the settlement queue.
#[derive(Clone)]
pub struct SettlementHandle {
    sender: mpsc::UnboundedSender<Transaction>,
}

impl SettlementScheduler for SettlementHandle {
    fn schedule(&self, tx: &Transaction) {
        if self.sender.send(tx.clone()).is_err() {
            tracing::warn!(
                transaction_id = %tx.transaction_id,
                "settlement worker stopped; transaction left pending"
            );
        }
    }
}

/// Receiving half of the settlement queue.
pub struct SettlementQueue {
    receiver: mpsc::UnboundedReceiver<Transaction>,
}

/// Create a connected scheduler handle and worker queue.
pub fn channel() -> (SettlementHandle, SettlementQueue) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (SettlementHandle { sender }, SettlementQueue { receiver })
}

/// Advances pending transactions to a terminal state.
pub struct SettlementWorker<C: ConfirmationSource> {
    ledger: Arc<TransactionLedger>,
    source: Arc<C>,
    clock: Arc<dyn Clock>,
    config: SettlementConfig,
}

impl<C: ConfirmationSource> SettlementWorker<C> {
    pub fn new(
        ledger: Arc<TransactionLedger>,
        source: Arc<C>,
        clock: Arc<dyn Clock>,
        config: SettlementConfig,
    ) -> Self {
        Self {
            ledger,
            source,
            clock,
            config,
        }
    }

    /// Run until `shutdown` fires or every scheduler handle is dropped.
    ///
    /// Transactions already pending in the store when the worker starts are
    /// picked up first. Settlements still in flight at shutdown are
    /// abandoned and stay pending until the next start.
    pub async fn run(
        self,
        mut queue: SettlementQueue,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<()> {
        let mut tasks = JoinSet::new();

        let recovered = self.ledger.pending_transactions()?;
        if !recovered.is_empty() {
            tracing::info!(count = recovered.len(), "resuming settlement of pending transactions");
        }
        for tx in recovered {
            tasks.spawn(self.settle_task(tx));
        }

        loop {
            tokio::select! {
                received = queue.receiver.recv() => match received {
                    Some(tx) => {
                        tasks.spawn(self.settle_task(tx));
                    }
                    None => break,
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!("settlement task panicked: {e}");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!(in_flight = tasks.len(), "settlement worker shutting down");
                    tasks.abort_all();
                    return Ok(());
                }
            }
        }

        // Queue closed: let in-flight settlements finish.
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!("settlement task panicked: {e}");
            }
        }
        Ok(())
    }

    fn settle_task(
        &self,
        tx: Transaction,
    ) -> impl std::future::Future<Output = ()> + Send + 'static {
        let ledger = self.ledger.clone();
        let source = self.source.clone();
        let config = self.config.clone();
        let age = Duration::from_secs(self.clock.now().saturating_sub(tx.created_at));
        let remaining = config.timeout.saturating_sub(age);
        async move {
            let transaction_id = tx.transaction_id.clone();
            match settle(&ledger, source.as_ref(), &config, remaining, tx).await {
                Ok(status) => {
                    tracing::debug!(
                        transaction_id = %transaction_id,
                        status = %status,
                        "settlement finished"
                    );
                }
                Err(LedgerError::Conflict(reason)) => {
                    tracing::warn!(
                        transaction_id = %transaction_id,
                        "settlement skipped: {reason}"
                    );
                }
                Err(e) => {
                    tracing::error!(transaction_id = %transaction_id, "settlement failed: {e}");
                }
            }
        }
    }
}

/// Settle one transaction, waiting at most `remaining` for a decision.
pub async fn settle<C: ConfirmationSource + ?Sized>(
    ledger: &TransactionLedger,
    source: &C,
    config: &SettlementConfig,
    remaining: Duration,
    tx: Transaction,
) -> Result<TransactionStatus> {
    let decision = tokio::time::timeout(
        remaining,
        poll_until_decided(source, &tx, config.poll_interval),
    )
    .await;

    let settled = match decision {
        Ok(Confirmation::Confirmed) => ledger.mark_completed(&tx.transaction_id)?,
        Ok(Confirmation::Rejected(reason)) => {
            tracing::warn!(transaction_id = %tx.transaction_id, "payment rejected: {reason}");
            ledger.mark_failed(&tx.transaction_id)?
        }
        // Never returned by `poll_until_decided`.
        Ok(Confirmation::Pending) => return Ok(TransactionStatus::Pending),
        Err(_elapsed) => {
            tracing::warn!(transaction_id = %tx.transaction_id, "settlement timed out");
            ledger.mark_failed(&tx.transaction_id)?
        }
    };
    Ok(settled.status)
}

async fn poll_until_decided<C: ConfirmationSource + ?Sized>(
    source: &C,
    tx: &Transaction,
    interval: Duration,
) -> Confirmation {
    loop {
        match source.poll(tx) {
            Ok(Confirmation::Pending) => {}
            Ok(decided) => return decided,
            Err(e) => {
                tracing::warn!(
                    transaction_id = %tx.transaction_id,
                    "confirmation poll failed, retrying: {e}"
                );
            }
        }
        tokio::time::sleep(interval).await;
    }
}
