//! Revenue split registry.
//!
//! A split maps a content item to an ordered list of recipients and their
//! shares in basis points. Shares must sum to exactly
//! [`BPS_DENOMINATOR`] (10000). Requests that do not are rejected, never
//! normalized.
//!
//! ## Versioning
//!
//! Recipient lists are immutable. [`SplitRegistry::update_split`] creates a
//! new version that records the split it supersedes and deactivates the
//! old one, so transactions recorded under the old terms keep pointing at
//! them.

use std::collections::HashSet;
use std::sync::Arc;

use revshare_types::{
    BasisPoints, ContentId, CreatorId, LedgerEventKind, RecipientShare, RevenueSplit, SplitId,
    BPS_DENOMINATOR,
};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::events::EventBus;
use crate::store::LedgerStore;
use crate::{generate_id, LedgerContext, LedgerError, Result};

/// Request to register a split.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewSplit {
    /// Caller-chosen id. Generated when absent.
    #[serde(default)]
    pub split_id: Option<SplitId>,
    pub content_id: ContentId,
    pub creator_id: CreatorId,
    pub recipients: Vec<RecipientShare>,
}

/// Convert a signed share from an external boundary into basis points.
///
/// # Errors
///
/// - [`LedgerError::Validation`] if the share is negative or above 10000
pub fn share_from_signed(share: i64) -> Result<BasisPoints> {
    if share < 0 {
        return Err(LedgerError::Validation(format!(
            "share must not be negative, got {share}"
        )));
    }
    if share > i64::from(BPS_DENOMINATOR) {
        return Err(LedgerError::Validation(format!(
            "share must be at most {BPS_DENOMINATOR} basis points, got {share}"
        )));
    }
    Ok(share as BasisPoints)
}

/// Validate a recipient list.
///
/// # Errors
///
/// - [`LedgerError::Validation`] if the list is empty, a recipient id is
///   blank or repeated, a share exceeds 10000, or the shares do not sum to
///   exactly 10000
pub fn validate_recipients(recipients: &[RecipientShare]) -> Result<()> {
    if recipients.is_empty() {
        return Err(LedgerError::Validation(
            "split must have at least one recipient".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(recipients.len());
    for recipient in recipients {
        if recipient.recipient_id.is_blank() {
            return Err(LedgerError::Validation(
                "recipient id must not be empty".to_string(),
            ));
        }
        if !seen.insert(&recipient.recipient_id) {
            return Err(LedgerError::Validation(format!(
                "duplicate recipient {}",
                recipient.recipient_id
            )));
        }
        if recipient.share_bps > BPS_DENOMINATOR {
            return Err(LedgerError::Validation(format!(
                "share for {} exceeds {BPS_DENOMINATOR} basis points",
                recipient.recipient_id
            )));
        }
    }

    let total: u32 = recipients.iter().map(|r| u32::from(r.share_bps)).sum();
    if total != u32::from(BPS_DENOMINATOR) {
        return Err(LedgerError::Validation(format!(
            "split shares must sum to {BPS_DENOMINATOR} basis points, got {total}"
        )));
    }
    Ok(())
}

/// Owns the mapping from content to revenue-sharing agreements.
pub struct SplitRegistry {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    events: EventBus,
}

impl SplitRegistry {
    pub fn new(context: &LedgerContext) -> Self {
        Self {
            store: context.store.clone(),
            clock: context.clock.clone(),
            events: context.events.clone(),
        }
    }

    /// Register a new active split.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Validation`] for invalid recipients or blank ids
    /// - [`LedgerError::Conflict`] if the supplied split id already exists
    pub fn create_split(&self, request: NewSplit) -> Result<RevenueSplit> {
        if request.content_id.is_blank() {
            return Err(LedgerError::Validation("content id is required".to_string()));
        }
        if request.creator_id.is_blank() {
            return Err(LedgerError::Validation("creator id is required".to_string()));
        }
        if request.split_id.as_ref().is_some_and(SplitId::is_blank) {
            return Err(LedgerError::Validation("split id must not be empty".to_string()));
        }
        validate_recipients(&request.recipients)?;

        let split_id = match request.split_id {
            Some(id) => {
                if self.store.split(&id)?.is_some() {
                    return Err(LedgerError::Conflict(format!("split {id} already exists")));
                }
                id
            }
            None => SplitId::new(generate_id("split")),
        };

        let now = self.clock.now();
        let split = RevenueSplit {
            split_id,
            content_id: request.content_id,
            creator_id: request.creator_id,
            recipients: request.recipients,
            active: true,
            version: 1,
            supersedes: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_split(&split)?;

        tracing::info!(
            split_id = %split.split_id,
            content_id = %split.content_id,
            recipients = split.recipients.len(),
            "revenue split created"
        );
        self.events.emit(
            LedgerEventKind::SplitCreated,
            now,
            serde_json::json!({
                "split_id": split.split_id,
                "content_id": split.content_id,
                "creator_id": split.creator_id,
            }),
        );

        Ok(split)
    }

    /// # Errors
    ///
    /// - [`LedgerError::NotFound`] if the split does not exist
    pub fn get_split(&self, split_id: &SplitId) -> Result<RevenueSplit> {
        self.store
            .split(split_id)?
            .ok_or_else(|| LedgerError::not_found("split", split_id))
    }

    /// All split versions for a content item, oldest first.
    pub fn get_splits_for_content(&self, content_id: &ContentId) -> Result<Vec<RevenueSplit>> {
        self.store.splits_for_content(content_id)
    }

    /// All split versions owned by a creator, oldest first.
    pub fn get_splits_for_creator(&self, creator_id: &CreatorId) -> Result<Vec<RevenueSplit>> {
        self.store.splits_for_creator(creator_id)
    }

    /// Toggle whether new payments may reference the split.
    ///
    /// Existing transactions and distributions are unaffected.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NotFound`] if the split does not exist
    pub fn set_active(&self, split_id: &SplitId, active: bool) -> Result<RevenueSplit> {
        let now = self.clock.now();
        let split = self
            .store
            .set_split_active(split_id, active, now)?
            .ok_or_else(|| LedgerError::not_found("split", split_id))?;

        tracing::info!(split_id = %split_id, active, "revenue split activation changed");
        self.events.emit(
            LedgerEventKind::SplitActivationChanged,
            now,
            serde_json::json!({"split_id": split_id, "active": active}),
        );
        Ok(split)
    }

    /// Replace a split's recipients by creating a new version.
    ///
    /// The new version is active, has `version + 1`, and records the old id
    /// in `supersedes`. The old version is deactivated.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NotFound`] if the split does not exist
    /// - [`LedgerError::Validation`] for invalid recipients, or if the split
    ///   is inactive
    /// - [`LedgerError::Conflict`] if another update superseded it first
    pub fn update_split(
        &self,
        split_id: &SplitId,
        recipients: Vec<RecipientShare>,
    ) -> Result<RevenueSplit> {
        let current = self.get_split(split_id)?;
        if !current.active {
            return Err(LedgerError::Validation(format!(
                "split {split_id} is inactive and cannot be updated"
            )));
        }
        validate_recipients(&recipients)?;
        if current.recipients == recipients {
            return Err(LedgerError::Validation(
                "new recipients are identical to the current split".to_string(),
            ));
        }

        let now = self.clock.now();
        let replacement = RevenueSplit {
            split_id: SplitId::new(generate_id("split")),
            content_id: current.content_id,
            creator_id: current.creator_id,
            recipients,
            active: true,
            version: current.version + 1,
            supersedes: Some(split_id.clone()),
            created_at: now,
            updated_at: now,
        };
        self.store.supersede_split(split_id, &replacement)?;

        tracing::info!(
            previous = %split_id,
            split_id = %replacement.split_id,
            version = replacement.version,
            "revenue split superseded"
        );
        self.events.emit(
            LedgerEventKind::SplitSuperseded,
            now,
            serde_json::json!({
                "previous_split_id": split_id,
                "split_id": replacement.split_id,
                "version": replacement.version,
            }),
        );

        Ok(replacement)
    }
}
