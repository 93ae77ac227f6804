//! Storage interface.
//!
//! A [`LedgerStore`] owns every split, transaction, distribution and claim
//! record. Business rules live in the components; the store only guarantees
//! that each method is atomic and that the compare-and-set style methods
//! ([`LedgerStore::transition`], [`LedgerStore::record_claim`],
//! [`LedgerStore::supersede_split`]) re-check their precondition under the
//! same lock or database transaction that performs the write.

use revshare_types::{
    Claim, ContentId, CreatorId, Distribution, RecipientId, RevenueSplit, SplitId, Timestamp,
    Transaction, TransactionId, TransactionStatus,
};

use crate::Result;

/// Result of a status transition request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    /// The transaction moved from pending to the requested state.
    Applied(Transaction),
    /// The transaction was already in the requested state. Nothing changed.
    Unchanged(Transaction),
    /// The transaction is in the other terminal state. Nothing changed.
    Rejected(Transaction),
}

/// A transaction paired with one recipient's distribution from it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecipientEntry {
    pub transaction: Transaction,
    pub distribution: Distribution,
}

/// Persistent home of all ledger records.
pub trait LedgerStore: Send + Sync {
    /// Insert a new split. [`crate::LedgerError::Conflict`] if the id exists.
    fn insert_split(&self, split: &RevenueSplit) -> Result<()>;

    fn split(&self, split_id: &SplitId) -> Result<Option<RevenueSplit>>;

    /// Splits for a content item in insertion order.
    fn splits_for_content(&self, content_id: &ContentId) -> Result<Vec<RevenueSplit>>;

    /// Splits owned by a creator in insertion order.
    fn splits_for_creator(&self, creator_id: &CreatorId) -> Result<Vec<RevenueSplit>>;

    /// Set the active flag. `None` if the split does not exist.
    fn set_split_active(
        &self,
        split_id: &SplitId,
        active: bool,
        updated_at: Timestamp,
    ) -> Result<Option<RevenueSplit>>;

    /// Insert `replacement` and deactivate `previous` in one step.
    ///
    /// Fails with `NotFound` if `previous` is missing and `Conflict` if it is
    /// no longer active or the replacement id is taken.
    fn supersede_split(&self, previous: &SplitId, replacement: &RevenueSplit) -> Result<()>;

    /// Highest transaction sequence stored so far, 0 when empty.
    fn last_sequence(&self) -> Result<u64>;

    /// Insert a transaction together with all of its distributions.
    fn insert_transaction(&self, tx: &Transaction, distributions: &[Distribution]) -> Result<()>;

    fn transaction(&self, transaction_id: &TransactionId) -> Result<Option<Transaction>>;

    /// Distributions of one transaction in recipient list order.
    fn distributions(&self, transaction_id: &TransactionId) -> Result<Vec<Distribution>>;

    /// Move a pending transaction to `status`. `None` if it does not exist.
    fn transition(
        &self,
        transaction_id: &TransactionId,
        status: TransactionStatus,
        settled_at: Timestamp,
    ) -> Result<Option<Transition>>;

    /// Transactions with a distribution for `recipient`, ordered by
    /// `(created_at, sequence)`.
    fn transactions_for_recipient(&self, recipient: &RecipientId) -> Result<Vec<Transaction>>;

    /// Every distribution owed to `recipient` with its owning transaction,
    /// ordered by `(created_at, sequence)` of the transaction.
    fn entries_for_recipient(&self, recipient: &RecipientId) -> Result<Vec<RecipientEntry>>;

    /// All pending transactions ordered by `(created_at, sequence)`.
    fn pending_transactions(&self) -> Result<Vec<Transaction>>;

    /// Store `claim` and mark the recipient's distribution on every covered
    /// transaction as claimed.
    ///
    /// Fails with `Conflict` and changes nothing if any of those
    /// distributions is already claimed, missing, or belongs to a
    /// transaction that is not completed.
    fn record_claim(&self, claim: &Claim) -> Result<()>;

    /// Claim receipts for `recipient` in creation order.
    fn claims_for_recipient(&self, recipient: &RecipientId) -> Result<Vec<Claim>>;
}
