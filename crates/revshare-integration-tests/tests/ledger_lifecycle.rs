//! Integration test: payment to claim lifecycle.
//!
//! Every scenario runs against the in-memory and the SQLite store:
//! 1. Payment of 101 on a 70/20/10 split distributes 70/20/11
//! 2. Claims drain completed distributions oldest first
//! 3. Overdrawing fails without touching state
//! 4. Inactive and superseded splits stop accepting payments
//! 5. Failed transactions never become claimable

use revshare_integration_tests::{backends, payment, Harness};
use revshare_ledger::LedgerError;
use revshare_types::{RecipientId, SplitId, TransactionStatus};

fn recipient(id: &str) -> RecipientId {
    RecipientId::new(id)
}

#[test]
fn test_payment_distributes_and_claims_drain() {
    for (name, store) in backends() {
        let h = Harness::new(store);
        h.split("split-1", "content-1", &[("a", 7000), ("b", 2000), ("c", 1000)]);

        let tx = h.pay_settled("split-1", "content-1", 101);
        assert_eq!(tx.status, TransactionStatus::Completed, "{name}");
        let amounts: Vec<u64> = h
            .ledger
            .transactions
            .get_distributions(&tx.transaction_id)
            .expect("distributions")
            .iter()
            .map(|d| d.amount)
            .collect();
        assert_eq!(amounts, vec![70, 20, 11], "{name}");

        let claims = &h.ledger.claims;
        assert_eq!(claims.get_claimable_balance(&recipient("a")).expect("a"), 70, "{name}");
        assert_eq!(claims.get_claimable_balance(&recipient("b")).expect("b"), 20, "{name}");
        assert_eq!(claims.get_claimable_balance(&recipient("c")).expect("c"), 11, "{name}");

        let receipt = claims.claim(&recipient("a"), 70).expect("claim a");
        assert_eq!(receipt.total_amount, 70, "{name}");
        assert_eq!(receipt.covered_transaction_ids, vec![tx.transaction_id.clone()], "{name}");
        assert_eq!(claims.get_claimable_balance(&recipient("a")).expect("a"), 0, "{name}");

        // b and c are untouched by a's claim.
        assert_eq!(claims.get_claimable_balance(&recipient("b")).expect("b"), 20, "{name}");
        let distributions = h
            .ledger
            .transactions
            .get_distributions(&tx.transaction_id)
            .expect("distributions");
        assert!(distributions[0].claimed, "{name}");
        assert_eq!(distributions[0].claim_id, Some(receipt.claim_id), "{name}");
        assert!(!distributions[1].claimed && !distributions[2].claimed, "{name}");
    }
}

#[test]
fn test_claim_walks_oldest_first_with_overshoot() {
    for (name, store) in backends() {
        let h = Harness::new(store);
        h.split("split-1", "content-1", &[("a", 10_000)]);

        let first = h.pay_settled("split-1", "content-1", 30);
        h.clock.advance(10);
        let second = h.pay_settled("split-1", "content-1", 50);
        h.clock.advance(10);
        let third = h.pay_settled("split-1", "content-1", 20);

        let receipt = h.ledger.claims.claim(&recipient("a"), 40).expect("claim");
        assert_eq!(receipt.requested_amount, 40, "{name}");
        assert_eq!(receipt.total_amount, 80, "{name}");
        assert_eq!(
            receipt.covered_transaction_ids,
            vec![first.transaction_id, second.transaction_id],
            "{name}"
        );
        assert_eq!(
            h.ledger.claims.get_claimable_balance(&recipient("a")).expect("balance"),
            20,
            "{name}"
        );

        let rest = h.ledger.claims.claim(&recipient("a"), 20).expect("claim rest");
        assert_eq!(rest.covered_transaction_ids, vec![third.transaction_id], "{name}");

        let history = h
            .ledger
            .claims
            .get_claims_for_recipient(&recipient("a"))
            .expect("history");
        assert_eq!(history.len(), 2, "{name}");
    }
}

#[test]
fn test_overdraw_changes_nothing() {
    for (name, store) in backends() {
        let h = Harness::new(store);
        h.split("split-1", "content-1", &[("a", 5000), ("b", 5000)]);
        let tx = h.pay_settled("split-1", "content-1", 100);

        let err = h.ledger.claims.claim(&recipient("a"), 51).expect_err("overdraw");
        assert!(
            matches!(err, LedgerError::InsufficientBalance { requested: 51, available: 50 }),
            "{name}: {err:?}"
        );
        assert_eq!(
            h.ledger.claims.get_claimable_balance(&recipient("a")).expect("balance"),
            50,
            "{name}"
        );
        assert!(h
            .ledger
            .transactions
            .get_distributions(&tx.transaction_id)
            .expect("distributions")
            .iter()
            .all(|d| !d.claimed));
        assert!(h
            .ledger
            .claims
            .get_claims_for_recipient(&recipient("a"))
            .expect("history")
            .is_empty());
    }
}

#[test]
fn test_pending_and_failed_are_not_claimable() {
    for (name, store) in backends() {
        let h = Harness::new(store);
        h.split("split-1", "content-1", &[("a", 10_000)]);
        let pending = h.pay("split-1", "content-1", 40);
        let failed = h.pay("split-1", "content-1", 60);
        h.ledger
            .transactions
            .mark_failed(&failed.transaction_id)
            .expect("fail");

        assert_eq!(
            h.ledger.claims.get_claimable_balance(&recipient("a")).expect("balance"),
            0,
            "{name}"
        );
        assert!(matches!(
            h.ledger.claims.claim(&recipient("a"), 1),
            Err(LedgerError::InsufficientBalance { available: 0, .. })
        ));

        // A failed transaction cannot be completed later.
        let err = h
            .ledger
            .transactions
            .mark_completed(&failed.transaction_id)
            .expect_err("terminal");
        assert!(matches!(err, LedgerError::Conflict(_)), "{name}: {err:?}");

        // Completing twice is a no-op.
        let done = h
            .ledger
            .transactions
            .mark_completed(&pending.transaction_id)
            .expect("complete");
        let again = h
            .ledger
            .transactions
            .mark_completed(&pending.transaction_id)
            .expect("complete again");
        assert_eq!(done.settled_at, again.settled_at, "{name}");

        let summary = h
            .ledger
            .analytics
            .recipient_summary(&recipient("a"))
            .expect("summary");
        assert_eq!(summary.claimable, 40, "{name}");
        assert_eq!(summary.failed, 60, "{name}");
        assert_eq!(summary.total_earned, 40, "{name}");
    }
}

#[test]
fn test_inactive_split_rejects_payments() {
    for (name, store) in backends() {
        let h = Harness::new(store);
        h.split("split-1", "content-1", &[("a", 10_000)]);
        h.ledger
            .splits
            .set_active(&SplitId::new("split-1"), false)
            .expect("deactivate");

        let err = h
            .ledger
            .transactions
            .record_payment(payment("split-1", "content-1", 100))
            .expect_err("inactive");
        assert!(matches!(err, LedgerError::NotFound { .. }), "{name}: {err:?}");
        assert!(h
            .ledger
            .transactions
            .get_transactions_for_recipient(&recipient("a"))
            .expect("list")
            .is_empty());

        h.ledger
            .splits
            .set_active(&SplitId::new("split-1"), true)
            .expect("reactivate");
        h.pay("split-1", "content-1", 100);
    }
}

#[test]
fn test_split_update_keeps_history() {
    for (name, store) in backends() {
        let h = Harness::new(store);
        h.split("split-1", "content-1", &[("a", 5000), ("b", 5000)]);
        let old_tx = h.pay_settled("split-1", "content-1", 100);

        h.clock.advance(60);
        let next = h
            .ledger
            .splits
            .update_split(
                &SplitId::new("split-1"),
                vec![
                    revshare_types::RecipientShare::new("a", 2000),
                    revshare_types::RecipientShare::new("b", 8000),
                ],
            )
            .expect("update");
        assert_eq!(next.version, 2, "{name}");
        assert_eq!(next.supersedes, Some(SplitId::new("split-1")), "{name}");

        let err = h
            .ledger
            .transactions
            .record_payment(payment("split-1", "content-1", 100))
            .expect_err("superseded");
        assert!(matches!(err, LedgerError::NotFound { .. }), "{name}");

        let new_tx = h.pay_settled(next.split_id.as_str(), "content-1", 100);
        let reread = h
            .ledger
            .transactions
            .get_transaction(&old_tx.transaction_id)
            .expect("old tx");
        assert_eq!(reread.split_id, SplitId::new("split-1"), "{name}");
        assert_eq!(new_tx.split_id, next.split_id, "{name}");

        // 50 from the old terms plus 20 from the new ones.
        assert_eq!(
            h.ledger.claims.get_claimable_balance(&recipient("a")).expect("balance"),
            70,
            "{name}"
        );

        let splits = h
            .ledger
            .splits
            .get_splits_for_content(&"content-1".into())
            .expect("splits");
        let active: Vec<bool> = splits.iter().map(|s| s.active).collect();
        assert_eq!(active, vec![false, true], "{name}");
    }
}
