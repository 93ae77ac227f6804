//! Ledger event bus.
//!
//! Components publish a [`LedgerEvent`] after every committed state change.
//! Subscribers get an independent buffer; slow subscribers lag and drop the
//! oldest events rather than blocking the ledger.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use revshare_types::{LedgerEvent, LedgerEventKind, Timestamp};
use tokio::sync::broadcast;

/// Event bus for broadcasting ledger events to subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LedgerEvent>,
    sequence: Arc<AtomicU64>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, kind: LedgerEventKind, timestamp: Timestamp, payload: serde_json::Value) {
        self.sequence.fetch_add(1, Ordering::SeqCst);
        // No subscribers is not an error.
        let _ = self.sender.send(LedgerEvent {
            kind,
            timestamp,
            payload,
        });
    }

    /// Subscribe to events emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.sender.subscribe()
    }

    /// Number of events emitted so far.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}
