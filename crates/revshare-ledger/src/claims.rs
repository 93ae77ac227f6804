//! Claim processing.
//!
//! A recipient's claimable balance is the sum of its unclaimed
//! distributions on completed transactions. Claims walk those distributions
//! oldest transaction first and take whole distributions until the
//! requested amount is covered. The last one taken is never split, so the
//! receipt's `total_amount` may exceed the request.
//!
//! Claims for one recipient are serialized by a per-recipient lock around
//! the read-then-mark sequence. The store additionally refuses to mark a
//! distribution that is already claimed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use revshare_types::{Amount, Claim, ClaimId, LedgerEventKind, RecipientId, TransactionStatus};

use crate::clock::Clock;
use crate::events::EventBus;
use crate::store::{LedgerStore, RecipientEntry};
use crate::{generate_id, LedgerContext, LedgerError, Result};

/// Aggregates and settles a recipient's unclaimed distributions.
pub struct ClaimProcessor {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    locks: Mutex<HashMap<RecipientId, Arc<Mutex<()>>>>,
}

impl ClaimProcessor {
    pub fn new(context: &LedgerContext) -> Self {
        Self {
            store: context.store.clone(),
            clock: context.clock.clone(),
            events: context.events.clone(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Sum of unclaimed distributions on completed transactions.
    pub fn get_claimable_balance(&self, recipient: &RecipientId) -> Result<Amount> {
        let entries = self.claimable_entries(recipient)?;
        sum_amounts(&entries)
    }

    /// Claim at least `requested_amount` from the recipient's balance.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Validation`] if `requested_amount` is zero
    /// - [`LedgerError::InsufficientBalance`] if it exceeds the claimable
    ///   balance; nothing is changed
    pub fn claim(&self, recipient: &RecipientId, requested_amount: Amount) -> Result<Claim> {
        if requested_amount == 0 {
            return Err(LedgerError::Validation("claim amount must be positive".to_string()));
        }
        if recipient.is_blank() {
            return Err(LedgerError::Validation("recipient id is required".to_string()));
        }

        let lock = self.recipient_lock(recipient)?;
        let result = match lock.lock() {
            Ok(_guard) => self.claim_locked(recipient, requested_amount),
            Err(_) => Err(LedgerError::Storage("claim lock poisoned".into())),
        };
        drop(lock);
        self.release_lock(recipient);
        result
    }

    /// Claim with the recipient's lock held.
    fn claim_locked(&self, recipient: &RecipientId, requested_amount: Amount) -> Result<Claim> {
        let entries = self.claimable_entries(recipient)?;
        let available = sum_amounts(&entries)?;
        if requested_amount > available {
            tracing::debug!(
                recipient = %recipient,
                requested_amount,
                available,
                "claim exceeds claimable balance"
            );
            return Err(LedgerError::InsufficientBalance {
                requested: requested_amount,
                available,
            });
        }

        let mut total_amount: Amount = 0;
        let mut covered_transaction_ids = Vec::new();
        for entry in entries {
            if total_amount >= requested_amount {
                break;
            }
            // Cannot overflow: bounded by `available`.
            total_amount += entry.distribution.amount;
            covered_transaction_ids.push(entry.transaction.transaction_id);
        }

        let claim = Claim {
            claim_id: ClaimId::new(generate_id("claim")),
            recipient_id: recipient.clone(),
            requested_amount,
            total_amount,
            covered_transaction_ids,
            claimed_at: self.clock.now(),
        };
        self.store.record_claim(&claim)?;

        tracing::info!(
            claim_id = %claim.claim_id,
            recipient = %recipient,
            requested_amount,
            total_amount,
            transactions = claim.covered_transaction_ids.len(),
            "revenue claimed"
        );
        self.events.emit(
            LedgerEventKind::RevenueClaimed,
            claim.claimed_at,
            serde_json::json!({
                "claim_id": claim.claim_id,
                "recipient_id": recipient,
                "total_amount": total_amount,
            }),
        );

        Ok(claim)
    }

    /// Claim receipts for `recipient`, oldest first.
    pub fn get_claims_for_recipient(&self, recipient: &RecipientId) -> Result<Vec<Claim>> {
        self.store.claims_for_recipient(recipient)
    }

    fn claimable_entries(&self, recipient: &RecipientId) -> Result<Vec<RecipientEntry>> {
        Ok(self
            .store
            .entries_for_recipient(recipient)?
            .into_iter()
            .filter(|entry| {
                entry.transaction.status == TransactionStatus::Completed
                    && !entry.distribution.claimed
            })
            .collect())
    }

    fn recipient_lock(&self, recipient: &RecipientId) -> Result<Arc<Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| LedgerError::Storage("claim lock table poisoned".into()))?;
        Ok(locks.entry(recipient.clone()).or_default().clone())
    }

    /// Drop the recipient's lock entry once no claim holds it.
    fn release_lock(&self, recipient: &RecipientId) {
        let Ok(mut locks) = self.locks.lock() else {
            return;
        };
        if locks
            .get(recipient)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(recipient);
        }
    }
}

fn sum_amounts(entries: &[RecipientEntry]) -> Result<Amount> {
    entries.iter().try_fold(0u64, |acc, entry| {
        acc.checked_add(entry.distribution.amount)
            .ok_or(LedgerError::Overflow)
    })
}

#[cfg(test)]
mod tests {
    use std::thread;

    use revshare_types::{ContentId, PayerId, RecipientShare, SplitId, TransactionId};

    use super::*;
    use crate::splits::{NewSplit, SplitRegistry};
    use crate::transactions::{PaymentRequest, TransactionLedger};
    use crate::{ManualClock, MemoryStore};

    struct Fixture {
        clock: Arc<ManualClock>,
        ledger: TransactionLedger,
        claims: ClaimProcessor,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(1_700_000_000));
        let context =
            LedgerContext::new(Arc::new(MemoryStore::new()), clock.clone(), EventBus::new(64));
        SplitRegistry::new(&context)
            .create_split(NewSplit {
                split_id: Some(SplitId::new("split-1")),
                content_id: ContentId::new("content-1"),
                creator_id: "creator".into(),
                recipients: vec![RecipientShare::new("a", 5000), RecipientShare::new("b", 5000)],
            })
            .expect("split");
        Fixture {
            clock,
            ledger: TransactionLedger::new(&context, None).expect("ledger"),
            claims: ClaimProcessor::new(&context),
        }
    }

    /// Record a payment, mark it completed, and return its id.
    fn settled_payment(f: &Fixture, gross: Amount) -> TransactionId {
        let tx = f
            .ledger
            .record_payment(PaymentRequest {
                content_id: ContentId::new("content-1"),
                split_id: SplitId::new("split-1"),
                payer_id: PayerId::new("payer"),
                gross_amount: gross,
                token_denomination: None,
            })
            .expect("record");
        f.ledger.mark_completed(&tx.transaction_id).expect("complete");
        f.clock.advance(1);
        tx.transaction_id
    }

    fn a() -> RecipientId {
        RecipientId::new("a")
    }

    fn held_locks(f: &Fixture) -> usize {
        f.claims.locks.lock().expect("lock table").len()
    }

    #[test]
    fn test_recipient_locks_are_released() {
        let f = fixture();
        settled_payment(&f, 100);
        f.claims.claim(&a(), 50).expect("claim");
        assert_eq!(held_locks(&f), 0);

        let err = f.claims.claim(&RecipientId::new("b"), 51).expect_err("overdraw");
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        assert_eq!(held_locks(&f), 0);

        // A lock still held elsewhere survives the release.
        let held = f.claims.recipient_lock(&a()).expect("lock");
        f.claims.release_lock(&a());
        assert_eq!(held_locks(&f), 1);
        drop(held);
        f.claims.release_lock(&a());
        assert_eq!(held_locks(&f), 0);
    }

    #[test]
    fn test_pending_distributions_are_not_claimable() {
        let f = fixture();
        f.ledger
            .record_payment(PaymentRequest {
                content_id: ContentId::new("content-1"),
                split_id: SplitId::new("split-1"),
                payer_id: PayerId::new("payer"),
                gross_amount: 100,
                token_denomination: None,
            })
            .expect("record");
        assert_eq!(f.claims.get_claimable_balance(&a()).expect("balance"), 0);
        assert!(matches!(
            f.claims.claim(&a(), 1),
            Err(LedgerError::InsufficientBalance { requested: 1, available: 0 })
        ));
    }

    #[test]
    fn test_failed_distributions_are_not_claimable() {
        let f = fixture();
        let tx = f
            .ledger
            .record_payment(PaymentRequest {
                content_id: ContentId::new("content-1"),
                split_id: SplitId::new("split-1"),
                payer_id: PayerId::new("payer"),
                gross_amount: 100,
                token_denomination: None,
            })
            .expect("record");
        f.ledger.mark_failed(&tx.transaction_id).expect("fail");
        assert_eq!(f.claims.get_claimable_balance(&a()).expect("balance"), 0);
    }

    #[test]
    fn test_full_claim_drains_balance() {
        let f = fixture();
        let first = settled_payment(&f, 100);
        let second = settled_payment(&f, 40);
        assert_eq!(f.claims.get_claimable_balance(&a()).expect("balance"), 70);

        let claim = f.claims.claim(&a(), 70).expect("claim");
        assert_eq!(claim.total_amount, 70);
        assert_eq!(claim.requested_amount, 70);
        assert_eq!(claim.covered_transaction_ids, vec![first, second]);
        assert_eq!(f.claims.get_claimable_balance(&a()).expect("balance"), 0);

        // The other recipient is untouched.
        assert_eq!(
            f.claims
                .get_claimable_balance(&RecipientId::new("b"))
                .expect("balance"),
            70
        );
    }

    #[test]
    fn test_partial_claim_takes_oldest_whole_distributions() {
        let f = fixture();
        let first = settled_payment(&f, 60); // a: 30
        let second = settled_payment(&f, 40); // a: 20
        let third = settled_payment(&f, 20); // a: 10

        // 35 needs the first two; the second is taken whole.
        let claim = f.claims.claim(&a(), 35).expect("claim");
        assert_eq!(claim.total_amount, 50);
        assert_eq!(claim.covered_transaction_ids, vec![first, second]);
        assert_eq!(f.claims.get_claimable_balance(&a()).expect("balance"), 10);

        let claim = f.claims.claim(&a(), 10).expect("claim");
        assert_eq!(claim.covered_transaction_ids, vec![third]);

        let ds = f.ledger.get_distributions(&claim.covered_transaction_ids[0]).expect("ds");
        let mine = ds.iter().find(|d| d.recipient_id == a()).expect("a");
        assert!(mine.claimed);
        assert_eq!(mine.claim_id, Some(claim.claim_id.clone()));

        assert_eq!(f.claims.get_claims_for_recipient(&a()).expect("claims").len(), 2);
    }

    #[test]
    fn test_overdraw_changes_nothing() {
        let f = fixture();
        settled_payment(&f, 100);
        let err = f.claims.claim(&a(), 51).expect_err("overdraw");
        assert!(matches!(
            err,
            LedgerError::InsufficientBalance { requested: 51, available: 50 }
        ));
        assert_eq!(f.claims.get_claimable_balance(&a()).expect("balance"), 50);
        assert!(f.claims.get_claims_for_recipient(&a()).expect("claims").is_empty());
    }

    #[test]
    fn test_zero_claim_rejected() {
        let f = fixture();
        assert!(matches!(f.claims.claim(&a(), 0), Err(LedgerError::Validation(_))));
    }

    #[test]
    fn test_concurrent_claims_pay_once() {
        let f = Arc::new(fixture());
        settled_payment(&f, 100); // a: 50

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let f = f.clone();
                thread::spawn(move || f.claims.claim(&RecipientId::new("a"), 50))
            })
            .collect();
        let results: Vec<Result<Claim>> = handles
            .into_iter()
            .map(|h| h.join().expect("thread"))
            .collect();

        let wins: Vec<&Claim> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(wins.len(), 1);
        assert_eq!(wins[0].total_amount, 50);
        assert!(results.iter().filter(|r| r.is_err()).all(|r| matches!(
            r,
            Err(LedgerError::InsufficientBalance { available: 0, .. })
        )));
        assert_eq!(f.claims.get_claimable_balance(&a()).expect("balance"), 0);
    }
}
