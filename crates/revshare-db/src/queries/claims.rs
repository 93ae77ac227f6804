//! Claim receipt query functions.

use revshare_types::{Claim, ClaimId, RecipientId, TransactionId};
use rusqlite::Connection;

use crate::Result;

/// Insert a claim receipt and the transactions it covers.
pub fn insert(conn: &Connection, claim: &Claim) -> Result<()> {
    conn.execute(
        "INSERT INTO claims (claim_id, recipient_id, requested_amount, total_amount, claimed_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            claim.claim_id.as_str(),
            claim.recipient_id.as_str(),
            claim.requested_amount as i64,
            claim.total_amount as i64,
            claim.claimed_at as i64,
        ],
    )?;

    let mut stmt = conn.prepare(
        "INSERT INTO claim_transactions (claim_id, position, transaction_id) VALUES (?1, ?2, ?3)",
    )?;
    for (position, transaction_id) in claim.covered_transaction_ids.iter().enumerate() {
        stmt.execute(rusqlite::params![
            claim.claim_id.as_str(),
            position as i64,
            transaction_id.as_str(),
        ])?;
    }
    Ok(())
}

/// List claims for a recipient in creation order.
pub fn list_for_recipient(conn: &Connection, recipient: &RecipientId) -> Result<Vec<Claim>> {
    let mut stmt = conn.prepare(
        "SELECT claim_id, recipient_id, requested_amount, total_amount, claimed_at
         FROM claims
         WHERE recipient_id = ?1
         ORDER BY rowid",
    )?;
    let claims = stmt
        .query_map([recipient.as_str()], |row| {
            Ok(Claim {
                claim_id: ClaimId::new(row.get::<_, String>(0)?),
                recipient_id: RecipientId::new(row.get::<_, String>(1)?),
                requested_amount: row.get::<_, i64>(2)? as u64,
                total_amount: row.get::<_, i64>(3)? as u64,
                covered_transaction_ids: Vec::new(),
                claimed_at: row.get::<_, i64>(4)? as u64,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    claims
        .into_iter()
        .map(|mut claim| -> Result<Claim> {
            claim.covered_transaction_ids = covered_transactions(conn, &claim.claim_id)?;
            Ok(claim)
        })
        .collect()
}

fn covered_transactions(conn: &Connection, claim_id: &ClaimId) -> Result<Vec<TransactionId>> {
    let mut stmt = conn.prepare(
        "SELECT transaction_id FROM claim_transactions WHERE claim_id = ?1 ORDER BY position",
    )?;
    let ids = stmt
        .query_map([claim_id.as_str()], |row| {
            Ok(TransactionId::new(row.get::<_, String>(0)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}
