//! Revenue split structures.

use serde::{Deserialize, Serialize};

use crate::{BasisPoints, ContentId, CreatorId, RecipientId, SplitId, Timestamp};

/// One recipient and the share of revenue it is owed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientShare {
    pub recipient_id: RecipientId,
    /// Share in basis points.
    pub share_bps: BasisPoints,
}

impl RecipientShare {
    pub fn new(recipient_id: impl Into<RecipientId>, share_bps: BasisPoints) -> Self {
        Self {
            recipient_id: recipient_id.into(),
            share_bps,
        }
    }
}

/// A revenue-sharing agreement for a content item.
///
/// The recipient list never changes after creation. Changing the terms
/// produces a new version that supersedes this one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueSplit {
    pub split_id: SplitId,
    pub content_id: ContentId,
    pub creator_id: CreatorId,
    /// Ordered; the last recipient absorbs rounding remainders.
    pub recipients: Vec<RecipientShare>,
    pub active: bool,
    /// Starts at 1 and increments with each superseding version.
    pub version: u32,
    /// The split version this one replaced, if any.
    pub supersedes: Option<SplitId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl RevenueSplit {
    /// Sum of all recipient shares, widened so it cannot overflow.
    pub fn total_bps(&self) -> u32 {
        self.recipients.iter().map(|r| u32::from(r.share_bps)).sum()
    }

    /// Share held by `recipient`, if it is part of this split.
    pub fn share_of(&self, recipient: &RecipientId) -> Option<BasisPoints> {
        self.recipients
            .iter()
            .find(|r| &r.recipient_id == recipient)
            .map(|r| r.share_bps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RevenueSplit {
        RevenueSplit {
            split_id: SplitId::new("split-a"),
            content_id: ContentId::new("content-1"),
            creator_id: CreatorId::new("creator-1"),
            recipients: vec![
                RecipientShare::new("alice", 7000),
                RecipientShare::new("bob", 3000),
            ],
            active: true,
            version: 1,
            supersedes: None,
            created_at: 1_700_000_000,
            updated_at: 1_700_000_000,
        }
    }

    #[test]
    fn test_total_bps() {
        assert_eq!(sample().total_bps(), 10_000);
    }

    #[test]
    fn test_share_of() {
        let split = sample();
        assert_eq!(split.share_of(&RecipientId::new("bob")), Some(3000));
        assert_eq!(split.share_of(&RecipientId::new("carol")), None);
    }
}
