//! Revenue split command handlers.

use std::sync::Arc;

use revshare_ledger::NewSplit;
use revshare_types::{ContentId, CreatorId, SplitId};
use serde_json::Value;

use super::{optional_str, recipients, required_str, to_json, Result};
use crate::rpc::RpcError;
use crate::DaemonState;

/// Register a new split.
pub async fn create_split(state: &Arc<DaemonState>, params: &Value) -> Result {
    let request = NewSplit {
        split_id: optional_str(params, "split_id")?.map(SplitId::new),
        content_id: ContentId::new(required_str(params, "content_id")?),
        creator_id: CreatorId::new(required_str(params, "creator_id")?),
        recipients: recipients(params)?,
    };
    let split = state.ledger.splits.create_split(request)?;
    to_json(&split)
}

/// Get a split by id.
pub async fn get_split(state: &Arc<DaemonState>, params: &Value) -> Result {
    let split_id = SplitId::new(required_str(params, "split_id")?);
    to_json(&state.ledger.splits.get_split(&split_id)?)
}

/// List splits for a content item.
pub async fn get_splits_for_content(state: &Arc<DaemonState>, params: &Value) -> Result {
    let content_id = ContentId::new(required_str(params, "content_id")?);
    to_json(&state.ledger.splits.get_splits_for_content(&content_id)?)
}

/// List splits owned by a creator.
pub async fn get_splits_for_creator(state: &Arc<DaemonState>, params: &Value) -> Result {
    let creator_id = CreatorId::new(required_str(params, "creator_id")?);
    to_json(&state.ledger.splits.get_splits_for_creator(&creator_id)?)
}

/// Activate or deactivate a split.
pub async fn set_split_active(state: &Arc<DaemonState>, params: &Value) -> Result {
    let split_id = SplitId::new(required_str(params, "split_id")?);
    let active = params
        .get("active")
        .and_then(Value::as_bool)
        .ok_or_else(|| RpcError::invalid_params("active required"))?;
    to_json(&state.ledger.splits.set_active(&split_id, active)?)
}

/// Replace a split's recipients with a new version.
pub async fn update_split(state: &Arc<DaemonState>, params: &Value) -> Result {
    let split_id = SplitId::new(required_str(params, "split_id")?);
    let split = state
        .ledger
        .splits
        .update_split(&split_id, recipients(params)?)?;
    to_json(&split)
}
