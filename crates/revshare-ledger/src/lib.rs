//! # revshare-ledger
//!
//! Revenue distribution and claims ledger.
//!
//! Content revenue is divided among recipients according to a split measured
//! in basis points. Every recorded payment produces one distribution per
//! recipient that reconciles exactly against the payment amount. Payments
//! settle asynchronously, and recipients claim completed distributions in
//! whole line items, oldest first.
//!
//! ## Modules
//!
//! - [`splits`] - Split registry and share validation
//! - [`distribution`] - Pure per-recipient distribution calculator
//! - [`transactions`] - Payment recording and settlement state machine
//! - [`claims`] - Claimable balances and atomic claims
//! - [`settlement`] - Background settlement worker
//! - [`analytics`] - Read-only recipient summaries
//! - [`store`] / [`memory`] - Storage interface and in-memory store
//! - [`clock`] / [`events`] - Injectable time source and event bus

pub mod analytics;
pub mod claims;
pub mod clock;
pub mod distribution;
pub mod events;
pub mod memory;
pub mod settlement;
pub mod splits;
pub mod store;
pub mod transactions;

use std::sync::Arc;

use revshare_types::Amount;

pub use analytics::Analytics;
pub use claims::ClaimProcessor;
pub use clock::{Clock, ManualClock, SystemClock};
pub use events::EventBus;
pub use memory::MemoryStore;
pub use settlement::{SettlementScheduler, SettlementWorker};
pub use splits::{NewSplit, SplitRegistry};
pub use store::LedgerStore;
pub use transactions::{PaymentRequest, TransactionLedger};

/// Error types for ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Malformed or out-of-range input. The caller must fix it and retry.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced split, transaction or recipient does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity that was looked up.
        entity: &'static str,
        /// The identifier that was not found.
        id: String,
    },

    /// Duplicate identifier, or a state change that collides with the
    /// current state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Claim exceeds the claimable balance.
    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        /// Amount the caller asked for.
        requested: Amount,
        /// Claimable balance at the time of the request.
        available: Amount,
    },

    /// Arithmetic overflow in an amount calculation.
    #[error("arithmetic overflow in ledger calculation")]
    Overflow,

    /// The backing store failed. Not recoverable by the caller.
    #[error("storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    /// `NotFound` for `entity` with the given id.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Convenience result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Shared collaborators handed to every ledger component.
#[derive(Clone)]
pub struct LedgerContext {
    pub store: Arc<dyn LedgerStore>,
    pub clock: Arc<dyn Clock>,
    pub events: EventBus,
}

impl LedgerContext {
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>, events: EventBus) -> Self {
        Self {
            store,
            clock,
            events,
        }
    }
}

/// The assembled ledger: one instance of every component over one store.
pub struct Ledger {
    pub splits: SplitRegistry,
    pub transactions: Arc<TransactionLedger>,
    pub claims: ClaimProcessor,
    pub analytics: Analytics,
    context: LedgerContext,
}

impl Ledger {
    /// Assemble a ledger over `context`.
    ///
    /// Recorded payments are handed to `scheduler` for settlement. Without a
    /// scheduler they stay pending until settled explicitly.
    pub fn new(
        context: LedgerContext,
        scheduler: Option<Arc<dyn SettlementScheduler>>,
    ) -> Result<Self> {
        let transactions = Arc::new(TransactionLedger::new(&context, scheduler)?);
        Ok(Self {
            splits: SplitRegistry::new(&context),
            transactions,
            claims: ClaimProcessor::new(&context),
            analytics: Analytics::new(&context),
            context,
        })
    }

    /// A ledger over a fresh [`MemoryStore`] with the system clock and no
    /// settlement scheduler.
    pub fn in_memory() -> Result<Self> {
        let context = LedgerContext::new(
            Arc::new(MemoryStore::new()),
            Arc::new(SystemClock),
            EventBus::new(1000),
        );
        Self::new(context, None)
    }

    pub fn context(&self) -> &LedgerContext {
        &self.context
    }

    pub fn events(&self) -> &EventBus {
        &self.context.events
    }
}

/// Generate an identifier of the form `{prefix}-{16 hex chars}`.
pub(crate) fn generate_id(prefix: &str) -> String {
    format!("{prefix}-{}", hex::encode(rand::random::<[u8; 8]>()))
}
