//! [`LedgerStore`] backed by a single SQLite connection.
//!
//! Every compound write runs inside one SQLite transaction, so a failed
//! precondition rolls back whatever was already written.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use revshare_ledger::store::{LedgerStore, RecipientEntry, Transition};
use revshare_ledger::{LedgerError, Result};
use revshare_types::{
    Claim, ContentId, CreatorId, Distribution, RecipientId, RevenueSplit, SplitId, Timestamp,
    Transaction, TransactionId, TransactionStatus,
};
use rusqlite::Connection;

use crate::queries::{claims, splits, transactions};
use crate::DbError;

/// SQLite ledger store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database file at `path`.
    pub fn open(path: &Path) -> std::result::Result<Self, DbError> {
        tracing::info!(path = %path.display(), "opening ledger database");
        Ok(Self::from_connection(crate::open(path)?))
    }

    /// In-memory database (for testing).
    pub fn open_memory() -> std::result::Result<Self, DbError> {
        Ok(Self::from_connection(crate::open_memory()?))
    }

    /// Wrap an already configured and migrated connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn lock(&self) -> std::result::Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::LockPoisoned)
    }
}

impl LedgerStore for SqliteStore {
    fn insert_split(&self, split: &RevenueSplit) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(DbError::from)?;
        if splits::exists(&tx, &split.split_id)? {
            return Err(
                DbError::Constraint(format!("split {} already exists", split.split_id)).into(),
            );
        }
        splits::insert(&tx, split)?;
        tx.commit().map_err(DbError::from)?;
        Ok(())
    }

    fn split(&self, split_id: &SplitId) -> Result<Option<RevenueSplit>> {
        let conn = self.lock()?;
        Ok(splits::get(&conn, split_id)?)
    }

    fn splits_for_content(&self, content_id: &ContentId) -> Result<Vec<RevenueSplit>> {
        let conn = self.lock()?;
        Ok(splits::list_by_content(&conn, content_id)?)
    }

    fn splits_for_creator(&self, creator_id: &CreatorId) -> Result<Vec<RevenueSplit>> {
        let conn = self.lock()?;
        Ok(splits::list_by_creator(&conn, creator_id)?)
    }

    fn set_split_active(
        &self,
        split_id: &SplitId,
        active: bool,
        updated_at: Timestamp,
    ) -> Result<Option<RevenueSplit>> {
        let conn = self.lock()?;
        if splits::set_active(&conn, split_id, active, updated_at)? == 0 {
            return Ok(None);
        }
        Ok(splits::get(&conn, split_id)?)
    }

    fn supersede_split(&self, previous: &SplitId, replacement: &RevenueSplit) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(DbError::from)?;
        match splits::get(&tx, previous)? {
            None => return Err(LedgerError::not_found("split", previous)),
            Some(split) if !split.active => {
                return Err(LedgerError::Conflict(format!(
                    "split {previous} is no longer active"
                )))
            }
            Some(_) => {}
        }
        if splits::exists(&tx, &replacement.split_id)? {
            return Err(LedgerError::Conflict(format!(
                "split {} already exists",
                replacement.split_id
            )));
        }
        splits::insert(&tx, replacement)?;
        splits::deactivate_if_active(&tx, previous, replacement.created_at)?;
        tx.commit().map_err(DbError::from)?;
        Ok(())
    }

    fn last_sequence(&self) -> Result<u64> {
        let conn = self.lock()?;
        Ok(transactions::max_sequence(&conn)?)
    }

    fn insert_transaction(&self, tx: &Transaction, distributions: &[Distribution]) -> Result<()> {
        let mut conn = self.lock()?;
        let db_tx = conn.transaction().map_err(DbError::from)?;
        if transactions::exists(&db_tx, &tx.transaction_id)? {
            return Err(LedgerError::Conflict(format!(
                "transaction {} already exists",
                tx.transaction_id
            )));
        }
        transactions::insert(&db_tx, tx, distributions)?;
        db_tx.commit().map_err(DbError::from)?;
        Ok(())
    }

    fn transaction(&self, transaction_id: &TransactionId) -> Result<Option<Transaction>> {
        let conn = self.lock()?;
        Ok(transactions::get(&conn, transaction_id)?)
    }

    fn distributions(&self, transaction_id: &TransactionId) -> Result<Vec<Distribution>> {
        let conn = self.lock()?;
        Ok(transactions::distributions(&conn, transaction_id)?)
    }

    fn transition(
        &self,
        transaction_id: &TransactionId,
        status: TransactionStatus,
        settled_at: Timestamp,
    ) -> Result<Option<Transition>> {
        let mut conn = self.lock()?;
        let db_tx = conn.transaction().map_err(DbError::from)?;
        let Some(current) = transactions::get(&db_tx, transaction_id)? else {
            return Ok(None);
        };
        let outcome = if current.status == status {
            Transition::Unchanged(current)
        } else if current.status.is_terminal() {
            Transition::Rejected(current)
        } else {
            transactions::settle_pending(&db_tx, transaction_id, status, settled_at)?;
            let updated = transactions::get(&db_tx, transaction_id)?
                .ok_or_else(|| LedgerError::not_found("transaction", transaction_id))?;
            Transition::Applied(updated)
        };
        db_tx.commit().map_err(DbError::from)?;
        Ok(Some(outcome))
    }

    fn transactions_for_recipient(&self, recipient: &RecipientId) -> Result<Vec<Transaction>> {
        let conn = self.lock()?;
        let rows = transactions::list_for_recipient(&conn, recipient)?;
        Ok(rows.into_iter().map(|(tx, _)| tx).collect())
    }

    fn entries_for_recipient(&self, recipient: &RecipientId) -> Result<Vec<RecipientEntry>> {
        let conn = self.lock()?;
        let rows = transactions::list_for_recipient(&conn, recipient)?;
        Ok(rows
            .into_iter()
            .map(|(transaction, distribution)| RecipientEntry {
                transaction,
                distribution,
            })
            .collect())
    }

    fn pending_transactions(&self) -> Result<Vec<Transaction>> {
        let conn = self.lock()?;
        Ok(transactions::list_pending(&conn)?)
    }

    fn record_claim(&self, claim: &Claim) -> Result<()> {
        let mut conn = self.lock()?;
        let db_tx = conn.transaction().map_err(DbError::from)?;
        let not_claimable = |transaction_id: &TransactionId| {
            LedgerError::Conflict(format!(
                "distribution of {transaction_id} to {} is not claimable",
                claim.recipient_id
            ))
        };

        for transaction_id in &claim.covered_transaction_ids {
            if !transactions::exists(&db_tx, transaction_id)? {
                return Err(not_claimable(transaction_id));
            }
        }
        claims::insert(&db_tx, claim)?;
        for transaction_id in &claim.covered_transaction_ids {
            let marked = transactions::mark_claimed(
                &db_tx,
                transaction_id,
                &claim.recipient_id,
                &claim.claim_id,
                claim.claimed_at,
            )?;
            if marked == 0 {
                // Dropping the transaction rolls back the receipt and earlier marks.
                return Err(not_claimable(transaction_id));
            }
        }
        db_tx.commit().map_err(DbError::from)?;
        Ok(())
    }

    fn claims_for_recipient(&self, recipient: &RecipientId) -> Result<Vec<Claim>> {
        let conn = self.lock()?;
        Ok(claims::list_for_recipient(&conn, recipient)?)
    }
}

#[cfg(test)]
mod tests {
    use revshare_types::{ClaimId, PayerId, RecipientShare, NATIVE_TOKEN};

    use super::*;

    fn split(id: &str) -> RevenueSplit {
        RevenueSplit {
            split_id: SplitId::new(id),
            content_id: ContentId::new("content-1"),
            creator_id: CreatorId::new("creator"),
            recipients: vec![RecipientShare::new("a", 7000), RecipientShare::new("b", 3000)],
            active: true,
            version: 1,
            supersedes: None,
            created_at: 10,
            updated_at: 10,
        }
    }

    fn payment(id: &str, sequence: u64, created_at: u64) -> (Transaction, Vec<Distribution>) {
        let tx = Transaction {
            transaction_id: TransactionId::new(id),
            sequence,
            content_id: ContentId::new("content-1"),
            split_id: SplitId::new("split-1"),
            payer_id: PayerId::new("payer"),
            gross_amount: 100,
            token_denomination: NATIVE_TOKEN.to_string(),
            status: TransactionStatus::Pending,
            created_at,
            settled_at: None,
        };
        let distributions = [("a", 70, 7000), ("b", 30, 3000)]
            .into_iter()
            .map(|(recipient, amount, share_bps)| Distribution {
                transaction_id: TransactionId::new(id),
                recipient_id: RecipientId::new(recipient),
                amount,
                share_bps,
                claimed: false,
                claimed_at: None,
                claim_id: None,
            })
            .collect();
        (tx, distributions)
    }

    fn seeded() -> SqliteStore {
        let store = SqliteStore::open_memory().expect("open");
        store.insert_split(&split("split-1")).expect("split");
        for (id, seq, at) in [("tx-1", 1, 100), ("tx-2", 2, 100), ("tx-3", 3, 50)] {
            let (tx, ds) = payment(id, seq, at);
            store.insert_transaction(&tx, &ds).expect("insert");
        }
        store
    }

    fn claim_of(ids: &[&str]) -> Claim {
        Claim {
            claim_id: ClaimId::new("claim-1"),
            recipient_id: RecipientId::new("a"),
            requested_amount: 70,
            total_amount: 70 * ids.len() as u64,
            covered_transaction_ids: ids.iter().map(|id| TransactionId::new(*id)).collect(),
            claimed_at: 500,
        }
    }

    #[test]
    fn test_duplicate_split_conflicts() {
        let store = SqliteStore::open_memory().expect("open");
        store.insert_split(&split("split-1")).expect("first");
        let err = store.insert_split(&split("split-1")).expect_err("duplicate");
        assert!(matches!(err, LedgerError::Conflict(_)));
    }

    #[test]
    fn test_supersede_split() {
        let store = SqliteStore::open_memory().expect("open");
        store.insert_split(&split("split-1")).expect("split");
        let mut next = split("split-2");
        next.version = 2;
        next.supersedes = Some(SplitId::new("split-1"));
        next.created_at = 20;
        store
            .supersede_split(&SplitId::new("split-1"), &next)
            .expect("supersede");

        let old = store.split(&SplitId::new("split-1")).expect("get").expect("exists");
        assert!(!old.active);
        assert_eq!(old.updated_at, 20);

        let mut again = split("split-3");
        again.supersedes = Some(SplitId::new("split-1"));
        let err = store
            .supersede_split(&SplitId::new("split-1"), &again)
            .expect_err("inactive previous");
        assert!(matches!(err, LedgerError::Conflict(_)));
        assert!(store.split(&SplitId::new("split-3")).expect("get").is_none());

        let err = store
            .supersede_split(&SplitId::new("missing"), &again)
            .expect_err("missing previous");
        assert!(matches!(err, LedgerError::NotFound { .. }));
    }

    #[test]
    fn test_set_split_active_missing() {
        let store = SqliteStore::open_memory().expect("open");
        assert!(store
            .set_split_active(&SplitId::new("missing"), false, 5)
            .expect("update")
            .is_none());
    }

    #[test]
    fn test_split_and_transaction_lookups() {
        let store = seeded();
        let by_content = store
            .splits_for_content(&ContentId::new("content-1"))
            .expect("by content");
        assert_eq!(by_content, vec![split("split-1")]);
        let by_creator = store
            .splits_for_creator(&CreatorId::new("creator"))
            .expect("by creator");
        assert_eq!(by_creator.len(), 1);
        assert!(store
            .splits_for_creator(&CreatorId::new("someone-else"))
            .expect("by creator")
            .is_empty());

        let (expected, distributions) = payment("tx-2", 2, 100);
        assert_eq!(
            store.transaction(&TransactionId::new("tx-2")).expect("get"),
            Some(expected)
        );
        assert_eq!(
            store.distributions(&TransactionId::new("tx-2")).expect("dist"),
            distributions
        );
        let for_b: Vec<u64> = store
            .transactions_for_recipient(&RecipientId::new("b"))
            .expect("for b")
            .iter()
            .map(|tx| tx.sequence)
            .collect();
        assert_eq!(for_b, vec![3, 1, 2]);
    }

    #[test]
    fn test_recipient_entries_ordered_by_time_then_sequence() {
        let store = seeded();
        let ids: Vec<String> = store
            .entries_for_recipient(&RecipientId::new("a"))
            .expect("entries")
            .into_iter()
            .map(|e| e.transaction.transaction_id.to_string())
            .collect();
        assert_eq!(ids, vec!["tx-3", "tx-1", "tx-2"]);
        assert_eq!(store.last_sequence().expect("sequence"), 3);
        assert_eq!(store.pending_transactions().expect("pending").len(), 3);
    }

    #[test]
    fn test_transition_outcomes() {
        let store = seeded();
        let id = TransactionId::new("tx-1");

        let applied = store
            .transition(&id, TransactionStatus::Completed, 200)
            .expect("transition")
            .expect("exists");
        let Transition::Applied(tx) = applied else {
            unreachable!("expected applied, got {applied:?}");
        };
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.settled_at, Some(200));

        assert!(matches!(
            store.transition(&id, TransactionStatus::Completed, 300).expect("transition"),
            Some(Transition::Unchanged(_))
        ));
        assert!(matches!(
            store.transition(&id, TransactionStatus::Failed, 300).expect("transition"),
            Some(Transition::Rejected(_))
        ));
        assert!(store
            .transition(&TransactionId::new("nope"), TransactionStatus::Failed, 300)
            .expect("transition")
            .is_none());
    }

    #[test]
    fn test_record_claim_is_all_or_nothing() {
        let store = seeded();
        store
            .transition(&TransactionId::new("tx-1"), TransactionStatus::Completed, 200)
            .expect("complete");

        // tx-2 is still pending, so nothing may be marked.
        let err = store
            .record_claim(&claim_of(&["tx-1", "tx-2"]))
            .expect_err("pending line item");
        assert!(matches!(err, LedgerError::Conflict(_)));
        assert!(store
            .claims_for_recipient(&RecipientId::new("a"))
            .expect("claims")
            .is_empty());
        assert!(!store.distributions(&TransactionId::new("tx-1")).expect("dist")[0].claimed);

        store.record_claim(&claim_of(&["tx-1"])).expect("claim");
        let ds = store.distributions(&TransactionId::new("tx-1")).expect("dist");
        assert!(ds[0].claimed);
        assert_eq!(ds[0].claim_id, Some(ClaimId::new("claim-1")));
        assert!(!ds[1].claimed);

        let mut again = claim_of(&["tx-1"]);
        again.claim_id = ClaimId::new("claim-2");
        assert!(matches!(
            store.record_claim(&again).expect_err("double claim"),
            LedgerError::Conflict(_)
        ));

        let claims = store.claims_for_recipient(&RecipientId::new("a")).expect("claims");
        assert_eq!(claims, vec![claim_of(&["tx-1"])]);
    }

    #[test]
    fn test_record_claim_unknown_transaction() {
        let store = seeded();
        let err = store
            .record_claim(&claim_of(&["missing"]))
            .expect_err("unknown transaction");
        assert!(matches!(err, LedgerError::Conflict(_)));
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("revshare.db");
        {
            let store = SqliteStore::open(&path).expect("open");
            store.insert_split(&split("split-1")).expect("split");
            let (tx, ds) = payment("tx-1", 1, 100);
            store.insert_transaction(&tx, &ds).expect("insert");
            store
                .transition(&tx.transaction_id, TransactionStatus::Completed, 150)
                .expect("complete");
        }

        let store = SqliteStore::open(&path).expect("reopen");
        assert_eq!(store.last_sequence().expect("sequence"), 1);
        let tx = store
            .transaction(&TransactionId::new("tx-1"))
            .expect("get")
            .expect("exists");
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.settled_at, Some(150));
        assert_eq!(
            store.split(&SplitId::new("split-1")).expect("get"),
            Some(split("split-1"))
        );
    }
}
