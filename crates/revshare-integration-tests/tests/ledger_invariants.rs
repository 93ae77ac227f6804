//! Property-based tests for ledger-wide invariants.
//!
//! Properties tested, after any sequence of payments, settlements and claims:
//! 1. Conservation: every recorded unit is pending, claimable, claimed or failed
//! 2. Receipts: claimed amounts equal the sum of claim receipts
//! 3. No distribution is ever claimed twice

use std::collections::HashSet;

use proptest::prelude::*;
use revshare_integration_tests::Harness;
use revshare_ledger::{LedgerError, MemoryStore};
use revshare_types::{RecipientId, TransactionId};

const RECIPIENTS: [&str; 3] = ["a", "b", "c"];

#[derive(Clone, Debug)]
enum Op {
    Pay(u64),
    Complete(usize),
    Fail(usize),
    Claim(usize, u64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1u64..1_000_000).prop_map(Op::Pay),
        any::<usize>().prop_map(Op::Complete),
        any::<usize>().prop_map(Op::Fail),
        (0usize..RECIPIENTS.len(), 1u64..500_000).prop_map(|(r, amount)| Op::Claim(r, amount)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn ledger_conserves_value(
        shares in (1u16..9_998).prop_flat_map(|a| (Just(a), 1u16..(10_000 - a))),
        ops in prop::collection::vec(op(), 1..60),
    ) {
        let (a, b) = shares;
        let c = 10_000 - a - b;
        let h = Harness::new(std::sync::Arc::new(MemoryStore::new()));
        h.split("split-1", "content-1", &[("a", a), ("b", b), ("c", c)]);

        let mut recorded: Vec<TransactionId> = Vec::new();
        let mut gross_total: u64 = 0;
        let mut receipts = Vec::new();

        for op in ops {
            match op {
                Op::Pay(amount) => {
                    recorded.push(h.pay("split-1", "content-1", amount).transaction_id);
                    gross_total += amount;
                }
                Op::Complete(_) | Op::Fail(_) if recorded.is_empty() => {}
                Op::Complete(i) => {
                    let id = &recorded[i % recorded.len()];
                    let result = h.ledger.transactions.mark_completed(id);
                    prop_assert!(
                        result.is_ok() || matches!(result, Err(LedgerError::Conflict(_)))
                    );
                }
                Op::Fail(i) => {
                    let id = &recorded[i % recorded.len()];
                    let result = h.ledger.transactions.mark_failed(id);
                    prop_assert!(
                        result.is_ok() || matches!(result, Err(LedgerError::Conflict(_)))
                    );
                }
                Op::Claim(r, amount) => {
                    match h.ledger.claims.claim(&RecipientId::new(RECIPIENTS[r]), amount) {
                        Ok(receipt) => {
                            prop_assert!(receipt.total_amount >= amount);
                            receipts.push(receipt);
                        }
                        Err(LedgerError::InsufficientBalance { requested, available }) => {
                            prop_assert_eq!(requested, amount);
                            prop_assert!(available < amount);
                        }
                        Err(other) => prop_assert!(false, "unexpected claim error: {other}"),
                    }
                }
            }
        }

        let mut accounted: u64 = 0;
        let mut claimed: u64 = 0;
        for recipient in RECIPIENTS {
            let summary = h
                .ledger
                .analytics
                .recipient_summary(&RecipientId::new(recipient))
                .expect("summary");
            accounted += summary.pending + summary.claimable + summary.claimed + summary.failed;
            claimed += summary.claimed;
        }
        prop_assert_eq!(accounted, gross_total);
        prop_assert_eq!(claimed, receipts.iter().map(|r| r.total_amount).sum::<u64>());

        let mut seen = HashSet::new();
        for receipt in &receipts {
            for id in &receipt.covered_transaction_ids {
                prop_assert!(
                    seen.insert((receipt.recipient_id.clone(), id.clone())),
                    "distribution of {} to {} claimed twice", id, receipt.recipient_id
                );
            }
        }
    }
}
