//! Integration test harness for the revenue ledger.
//!
//! The tests in `tests/` drive complete flows through the public API of
//! `revshare-ledger` over both store backends. This crate only holds the
//! shared fixtures.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p revshare-integration-tests
//! ```

use std::sync::Arc;

use revshare_db::SqliteStore;
use revshare_ledger::{
    Clock, EventBus, Ledger, LedgerContext, LedgerStore, ManualClock, MemoryStore, NewSplit,
    PaymentRequest, SettlementScheduler,
};
use revshare_types::{
    Amount, ContentId, PayerId, RecipientShare, RevenueSplit, SplitId, Timestamp, Transaction,
};

/// Base timestamp for test scenarios.
pub const BASE_TIME: Timestamp = 1_700_000_000;

/// Store backends every scenario runs against.
pub fn backends() -> Vec<(&'static str, Arc<dyn LedgerStore>)> {
    vec![
        ("memory", Arc::new(MemoryStore::new())),
        (
            "sqlite",
            Arc::new(SqliteStore::open_memory().expect("in-memory sqlite store")),
        ),
    ]
}

/// A ledger over one store with a hand-driven clock.
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub ledger: Ledger,
}

impl Harness {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self::with_scheduler(store, None)
    }

    pub fn with_scheduler(
        store: Arc<dyn LedgerStore>,
        scheduler: Option<Arc<dyn SettlementScheduler>>,
    ) -> Self {
        let clock = Arc::new(ManualClock::new(BASE_TIME));
        let context = LedgerContext::new(store, clock.clone(), EventBus::new(256));
        let ledger = Ledger::new(context, scheduler).expect("assemble ledger");
        Self { clock, ledger }
    }

    /// Register `split_id` for `content_id` with `(recipient, bps)` shares.
    pub fn split(
        &self,
        split_id: &str,
        content_id: &str,
        shares: &[(&str, u16)],
    ) -> RevenueSplit {
        self.ledger
            .splits
            .create_split(NewSplit {
                split_id: Some(SplitId::new(split_id)),
                content_id: ContentId::new(content_id),
                creator_id: "creator".into(),
                recipients: shares
                    .iter()
                    .map(|(recipient, bps)| RecipientShare::new(*recipient, *bps))
                    .collect(),
            })
            .expect("create split")
    }

    /// Record a payment that stays pending.
    pub fn pay(&self, split_id: &str, content_id: &str, gross_amount: Amount) -> Transaction {
        self.ledger
            .transactions
            .record_payment(payment(split_id, content_id, gross_amount))
            .expect("record payment")
    }

    /// Record a payment and mark it completed.
    pub fn pay_settled(
        &self,
        split_id: &str,
        content_id: &str,
        gross_amount: Amount,
    ) -> Transaction {
        let tx = self.pay(split_id, content_id, gross_amount);
        self.ledger
            .transactions
            .mark_completed(&tx.transaction_id)
            .expect("complete payment")
    }
}

pub fn payment(split_id: &str, content_id: &str, gross_amount: Amount) -> PaymentRequest {
    PaymentRequest {
        content_id: ContentId::new(content_id),
        split_id: SplitId::new(split_id),
        payer_id: PayerId::new("payer"),
        gross_amount,
        token_denomination: None,
    }
}

/// Unix seconds that follow tokio's clock, so paused-time tests move the
/// ledger's timestamps along with their sleeps.
pub struct TokioClock {
    base: Timestamp,
    start: tokio::time::Instant,
}

impl TokioClock {
    pub fn new(base: Timestamp) -> Self {
        Self {
            base,
            start: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Timestamp {
        self.base + self.start.elapsed().as_secs()
    }
}
