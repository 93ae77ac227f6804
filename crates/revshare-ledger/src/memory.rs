//! In-memory [`LedgerStore`].
//!
//! Indexed collections behind one `RwLock`. Each trait call takes the lock
//! once, so every method is atomic with respect to every other.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use revshare_types::{
    Claim, ContentId, CreatorId, Distribution, RecipientId, RevenueSplit, SplitId, Timestamp,
    Transaction, TransactionId, TransactionStatus,
};

use crate::store::{LedgerStore, RecipientEntry, Transition};
use crate::{LedgerError, Result};

#[derive(Default)]
struct MemoryState {
    splits: HashMap<SplitId, RevenueSplit>,
    splits_by_content: HashMap<ContentId, Vec<SplitId>>,
    splits_by_creator: HashMap<CreatorId, Vec<SplitId>>,
    transactions: HashMap<TransactionId, Transaction>,
    /// Distributions per transaction, recipient list order.
    distributions: HashMap<TransactionId, Vec<Distribution>>,
    transactions_by_recipient: HashMap<RecipientId, Vec<TransactionId>>,
    claims_by_recipient: HashMap<RecipientId, Vec<Claim>>,
    last_sequence: u64,
}

impl MemoryState {
    fn insert_split(&mut self, split: &RevenueSplit) -> Result<()> {
        if self.splits.contains_key(&split.split_id) {
            return Err(LedgerError::Conflict(format!(
                "split {} already exists",
                split.split_id
            )));
        }
        self.splits.insert(split.split_id.clone(), split.clone());
        self.splits_by_content
            .entry(split.content_id.clone())
            .or_default()
            .push(split.split_id.clone());
        self.splits_by_creator
            .entry(split.creator_id.clone())
            .or_default()
            .push(split.split_id.clone());
        Ok(())
    }

    fn collect_splits(&self, ids: Option<&Vec<SplitId>>) -> Vec<RevenueSplit> {
        ids.map(|ids| {
            ids.iter()
                .filter_map(|id| self.splits.get(id).cloned())
                .collect()
        })
        .unwrap_or_default()
    }

    fn recipient_transactions(&self, recipient: &RecipientId) -> Vec<&Transaction> {
        let mut txs: Vec<&Transaction> = self
            .transactions_by_recipient
            .get(recipient)
            .map(|ids| ids.iter().filter_map(|id| self.transactions.get(id)).collect())
            .unwrap_or_default();
        txs.sort_by_key(|tx| (tx.created_at, tx.sequence));
        txs
    }

    fn distribution_mut(
        &mut self,
        transaction_id: &TransactionId,
        recipient: &RecipientId,
    ) -> Option<&mut Distribution> {
        self.distributions
            .get_mut(transaction_id)?
            .iter_mut()
            .find(|d| &d.recipient_id == recipient)
    }
}

/// In-memory ledger store.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryState>> {
        self.state
            .read()
            .map_err(|_| LedgerError::Storage("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>> {
        self.state
            .write()
            .map_err(|_| LedgerError::Storage("memory store lock poisoned".into()))
    }
}

impl LedgerStore for MemoryStore {
    fn insert_split(&self, split: &RevenueSplit) -> Result<()> {
        self.write()?.insert_split(split)
    }

    fn split(&self, split_id: &SplitId) -> Result<Option<RevenueSplit>> {
        Ok(self.read()?.splits.get(split_id).cloned())
    }

    fn splits_for_content(&self, content_id: &ContentId) -> Result<Vec<RevenueSplit>> {
        let state = self.read()?;
        Ok(state.collect_splits(state.splits_by_content.get(content_id)))
    }

    fn splits_for_creator(&self, creator_id: &CreatorId) -> Result<Vec<RevenueSplit>> {
        let state = self.read()?;
        Ok(state.collect_splits(state.splits_by_creator.get(creator_id)))
    }

    fn set_split_active(
        &self,
        split_id: &SplitId,
        active: bool,
        updated_at: Timestamp,
    ) -> Result<Option<RevenueSplit>> {
        let mut state = self.write()?;
        Ok(state.splits.get_mut(split_id).map(|split| {
            split.active = active;
            split.updated_at = updated_at;
            split.clone()
        }))
    }

    fn supersede_split(&self, previous: &SplitId, replacement: &RevenueSplit) -> Result<()> {
        let mut state = self.write()?;
        match state.splits.get(previous) {
            None => return Err(LedgerError::not_found("split", previous)),
            Some(split) if !split.active => {
                return Err(LedgerError::Conflict(format!(
                    "split {previous} is no longer active"
                )))
            }
            Some(_) => {}
        }
        state.insert_split(replacement)?;
        if let Some(split) = state.splits.get_mut(previous) {
            split.active = false;
            split.updated_at = replacement.created_at;
        }
        Ok(())
    }

    fn last_sequence(&self) -> Result<u64> {
        Ok(self.read()?.last_sequence)
    }

    fn insert_transaction(&self, tx: &Transaction, distributions: &[Distribution]) -> Result<()> {
        let mut state = self.write()?;
        if state.transactions.contains_key(&tx.transaction_id) {
            return Err(LedgerError::Conflict(format!(
                "transaction {} already exists",
                tx.transaction_id
            )));
        }
        state.transactions.insert(tx.transaction_id.clone(), tx.clone());
        state
            .distributions
            .insert(tx.transaction_id.clone(), distributions.to_vec());
        for distribution in distributions {
            state
                .transactions_by_recipient
                .entry(distribution.recipient_id.clone())
                .or_default()
                .push(tx.transaction_id.clone());
        }
        state.last_sequence = state.last_sequence.max(tx.sequence);
        Ok(())
    }

    fn transaction(&self, transaction_id: &TransactionId) -> Result<Option<Transaction>> {
        Ok(self.read()?.transactions.get(transaction_id).cloned())
    }

    fn distributions(&self, transaction_id: &TransactionId) -> Result<Vec<Distribution>> {
        Ok(self
            .read()?
            .distributions
            .get(transaction_id)
            .cloned()
            .unwrap_or_default())
    }

    fn transition(
        &self,
        transaction_id: &TransactionId,
        status: TransactionStatus,
        settled_at: Timestamp,
    ) -> Result<Option<Transition>> {
        let mut state = self.write()?;
        let Some(tx) = state.transactions.get_mut(transaction_id) else {
            return Ok(None);
        };
        let outcome = if tx.status == status {
            Transition::Unchanged(tx.clone())
        } else if tx.status.is_terminal() {
            Transition::Rejected(tx.clone())
        } else {
            tx.status = status;
            tx.settled_at = Some(settled_at);
            Transition::Applied(tx.clone())
        };
        Ok(Some(outcome))
    }

    fn transactions_for_recipient(&self, recipient: &RecipientId) -> Result<Vec<Transaction>> {
        let state = self.read()?;
        Ok(state
            .recipient_transactions(recipient)
            .into_iter()
            .cloned()
            .collect())
    }

    fn entries_for_recipient(&self, recipient: &RecipientId) -> Result<Vec<RecipientEntry>> {
        let state = self.read()?;
        let entries = state
            .recipient_transactions(recipient)
            .into_iter()
            .filter_map(|tx| {
                let distribution = state
                    .distributions
                    .get(&tx.transaction_id)?
                    .iter()
                    .find(|d| &d.recipient_id == recipient)?;
                Some(RecipientEntry {
                    transaction: tx.clone(),
                    distribution: distribution.clone(),
                })
            })
            .collect();
        Ok(entries)
    }

    fn pending_transactions(&self) -> Result<Vec<Transaction>> {
        let state = self.read()?;
        let mut pending: Vec<Transaction> = state
            .transactions
            .values()
            .filter(|tx| tx.status == TransactionStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|tx| (tx.created_at, tx.sequence));
        Ok(pending)
    }

    fn record_claim(&self, claim: &Claim) -> Result<()> {
        let mut state = self.write()?;

        // Check every line item before touching any of them.
        for transaction_id in &claim.covered_transaction_ids {
            let completed = state
                .transactions
                .get(transaction_id)
                .is_some_and(|tx| tx.status == TransactionStatus::Completed);
            let unclaimed = state
                .distributions
                .get(transaction_id)
                .and_then(|ds| ds.iter().find(|d| d.recipient_id == claim.recipient_id))
                .is_some_and(|d| !d.claimed);
            if !completed || !unclaimed {
                return Err(LedgerError::Conflict(format!(
                    "distribution of {transaction_id} to {} is not claimable",
                    claim.recipient_id
                )));
            }
        }

        for transaction_id in &claim.covered_transaction_ids {
            if let Some(distribution) = state.distribution_mut(transaction_id, &claim.recipient_id)
            {
                distribution.claimed = true;
                distribution.claimed_at = Some(claim.claimed_at);
                distribution.claim_id = Some(claim.claim_id.clone());
            }
        }
        state
            .claims_by_recipient
            .entry(claim.recipient_id.clone())
            .or_default()
            .push(claim.clone());
        Ok(())
    }

    fn claims_for_recipient(&self, recipient: &RecipientId) -> Result<Vec<Claim>> {
        Ok(self
            .read()?
            .claims_by_recipient
            .get(recipient)
            .cloned()
            .unwrap_or_default())
    }
}
