//! # revshare-types
//!
//! Shared domain types used across the revshare workspace.
//!
//! All monetary amounts are integers in the smallest denomination unit and
//! all shares are integer basis points. Nothing in this crate uses floating
//! point.

pub mod claim;
pub mod events;
pub mod ids;
pub mod split;
pub mod transaction;

pub use claim::Claim;
pub use events::{LedgerEvent, LedgerEventKind};
pub use ids::{ClaimId, ContentId, CreatorId, PayerId, RecipientId, SplitId, TransactionId};
pub use split::{RecipientShare, RevenueSplit};
pub use transaction::{Distribution, Transaction, TransactionStatus};

/// Amount in minor units of the payment token.
pub type Amount = u64;

/// Share of a split in basis points (0..=10000).
pub type BasisPoints = u16;

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// Basis points that make up a whole split (100%).
pub const BPS_DENOMINATOR: u16 = 10_000;

/// Token denomination used when the payer does not name one.
pub const NATIVE_TOKEN: &str = "0x0000000000000000000000000000000000000000";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bps_denominator_is_whole() {
        assert_eq!(BPS_DENOMINATOR, 100 * 100);
    }

    #[test]
    fn test_native_token_is_zero_address() {
        assert_eq!(NATIVE_TOKEN.len(), 42);
        assert!(NATIVE_TOKEN.trim_start_matches("0x").chars().all(|c| c == '0'));
    }
}
