//! IPC command handlers.
//!
//! Each submodule implements the commands for one IPC category. Handlers
//! validate wire parameters here and leave business rules to the ledger.

pub mod analytics;
pub mod claims;
pub mod payments;
pub mod splits;

use revshare_ledger::splits::share_from_signed;
use revshare_types::{Amount, RecipientShare};
use serde::Serialize;
use serde_json::Value;

use crate::rpc::RpcError;

pub(crate) type Result = std::result::Result<Value, RpcError>;

/// Required string parameter.
pub(crate) fn required_str<'a>(
    params: &'a Value,
    key: &str,
) -> std::result::Result<&'a str, RpcError> {
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError::invalid_params(&format!("{key} required")))
}

/// Optional string parameter. Present but not a string is an error.
pub(crate) fn optional_str<'a>(
    params: &'a Value,
    key: &str,
) -> std::result::Result<Option<&'a str>, RpcError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_str()
            .map(Some)
            .ok_or_else(|| RpcError::invalid_params(&format!("{key} must be a string"))),
    }
}

/// Required amount in minor units. Negative or fractional values are rejected.
pub(crate) fn required_amount(
    params: &Value,
    key: &str,
) -> std::result::Result<Amount, RpcError> {
    let value = params
        .get(key)
        .ok_or_else(|| RpcError::invalid_params(&format!("{key} required")))?;
    if let Some(amount) = value.as_u64() {
        return Ok(amount);
    }
    if value.as_i64().is_some() {
        return Err(RpcError::invalid_params(&format!("{key} must not be negative")));
    }
    Err(RpcError::invalid_params(&format!(
        "{key} must be a whole number of minor units"
    )))
}

/// Parse the `recipients` array of `{recipient_id, share_bps}` objects.
pub(crate) fn recipients(params: &Value) -> std::result::Result<Vec<RecipientShare>, RpcError> {
    let entries = params
        .get("recipients")
        .and_then(Value::as_array)
        .ok_or_else(|| RpcError::invalid_params("recipients required"))?;

    entries
        .iter()
        .map(|entry| -> std::result::Result<RecipientShare, RpcError> {
            let recipient_id = required_str(entry, "recipient_id")?;
            let share = entry
                .get("share_bps")
                .and_then(Value::as_i64)
                .ok_or_else(|| RpcError::invalid_params("share_bps must be an integer"))?;
            Ok(RecipientShare::new(recipient_id, share_from_signed(share)?))
        })
        .collect()
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result {
    serde_json::to_value(value)
        .map_err(|e| RpcError::internal_error(&format!("serialization error: {e}")))
}
