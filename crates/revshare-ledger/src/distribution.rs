//! Per-recipient distribution of a payment.
//!
//! Each recipient in list order receives
//! `floor(gross * share_bps / 10000)`. Floor division drops a few minor
//! units, so the last recipient receives `gross - sum(prior amounts)`
//! instead of its floored amount. The result always sums to `gross`.

use revshare_types::{Amount, BasisPoints, RecipientId, RecipientShare, BPS_DENOMINATOR};

use crate::{LedgerError, Result};

/// One recipient's computed amount.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComputedShare {
    pub recipient_id: RecipientId,
    pub amount: Amount,
    pub share_bps: BasisPoints,
}

/// Compute every recipient's amount for `gross_amount`.
///
/// Products are taken in `u128`, so no combination of `u64` amount and
/// basis points can overflow.
///
/// # Errors
///
/// - [`LedgerError::Validation`] if `recipients` is empty
/// - [`LedgerError::Overflow`] if the floored amounts exceed `gross_amount`,
///   which only happens when the shares sum to more than 10000
pub fn compute_distributions(
    recipients: &[RecipientShare],
    gross_amount: Amount,
) -> Result<Vec<ComputedShare>> {
    let Some((last, rest)) = recipients.split_last() else {
        return Err(LedgerError::Validation(
            "cannot distribute to an empty recipient list".to_string(),
        ));
    };

    let mut shares = Vec::with_capacity(recipients.len());
    let mut allocated: Amount = 0;

    for recipient in rest {
        let amount = floor_share(gross_amount, recipient.share_bps);
        allocated = allocated.checked_add(amount).ok_or(LedgerError::Overflow)?;
        shares.push(ComputedShare {
            recipient_id: recipient.recipient_id.clone(),
            amount,
            share_bps: recipient.share_bps,
        });
    }

    // Last recipient absorbs the rounding remainder.
    let remainder = gross_amount
        .checked_sub(allocated)
        .ok_or(LedgerError::Overflow)?;
    shares.push(ComputedShare {
        recipient_id: last.recipient_id.clone(),
        amount: remainder,
        share_bps: last.share_bps,
    });

    Ok(shares)
}

fn floor_share(gross_amount: Amount, share_bps: BasisPoints) -> Amount {
    let product = u128::from(gross_amount) * u128::from(share_bps);
    // share_bps <= 10000 keeps the quotient within gross_amount.
    (product / u128::from(BPS_DENOMINATOR)) as Amount
}
