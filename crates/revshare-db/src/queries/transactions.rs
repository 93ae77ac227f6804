//! Transaction and distribution query functions.

use revshare_types::{
    ClaimId, ContentId, Distribution, PayerId, RecipientId, SplitId, Timestamp, Transaction,
    TransactionId, TransactionStatus,
};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::Result;

const TX_COLUMNS: &str = "t.transaction_id, t.sequence, t.content_id, t.split_id, t.payer_id,
     t.gross_amount, t.token_denomination, t.status, t.created_at, t.settled_at";

const DIST_COLUMNS: &str =
    "d.transaction_id, d.recipient_id, d.amount, d.share_bps, d.claimed, d.claimed_at, d.claim_id";

/// Insert a transaction and its distributions.
pub fn insert(conn: &Connection, tx: &Transaction, distributions: &[Distribution]) -> Result<()> {
    conn.execute(
        "INSERT INTO transactions
         (transaction_id, sequence, content_id, split_id, payer_id, gross_amount,
          token_denomination, status, created_at, settled_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        rusqlite::params![
            tx.transaction_id.as_str(),
            tx.sequence as i64,
            tx.content_id.as_str(),
            tx.split_id.as_str(),
            tx.payer_id.as_str(),
            tx.gross_amount as i64,
            tx.token_denomination,
            tx.status.as_str(),
            tx.created_at as i64,
            tx.settled_at.map(|t| t as i64),
        ],
    )?;

    let mut stmt = conn.prepare(
        "INSERT INTO distributions
         (transaction_id, position, recipient_id, amount, share_bps, claimed, claimed_at, claim_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    for (position, d) in distributions.iter().enumerate() {
        stmt.execute(rusqlite::params![
            d.transaction_id.as_str(),
            position as i64,
            d.recipient_id.as_str(),
            d.amount as i64,
            d.share_bps as i64,
            d.claimed,
            d.claimed_at.map(|t| t as i64),
            d.claim_id.as_ref().map(ClaimId::as_str),
        ])?;
    }
    Ok(())
}

/// Whether a transaction with this id exists.
pub fn exists(conn: &Connection, transaction_id: &TransactionId) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM transactions WHERE transaction_id = ?1",
            [transaction_id.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Get a transaction by id.
pub fn get(conn: &Connection, transaction_id: &TransactionId) -> Result<Option<Transaction>> {
    let tx = conn
        .query_row(
            &format!("SELECT {TX_COLUMNS} FROM transactions t WHERE t.transaction_id = ?1"),
            [transaction_id.as_str()],
            |row| transaction_from_row(row, 0),
        )
        .optional()?;
    Ok(tx)
}

/// Highest stored sequence, 0 when empty.
pub fn max_sequence(conn: &Connection) -> Result<u64> {
    let max: i64 = conn.query_row(
        "SELECT COALESCE(MAX(sequence), 0) FROM transactions",
        [],
        |row| row.get(0),
    )?;
    Ok(max as u64)
}

/// Distributions of one transaction in recipient list order.
pub fn distributions(
    conn: &Connection,
    transaction_id: &TransactionId,
) -> Result<Vec<Distribution>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DIST_COLUMNS} FROM distributions d
         WHERE d.transaction_id = ?1
         ORDER BY d.position"
    ))?;
    let rows = stmt
        .query_map([transaction_id.as_str()], |row| distribution_from_row(row, 0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Move a pending transaction to a terminal status. Returns the number of rows changed.
pub fn settle_pending(
    conn: &Connection,
    transaction_id: &TransactionId,
    status: TransactionStatus,
    settled_at: Timestamp,
) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE transactions SET status = ?1, settled_at = ?2
         WHERE transaction_id = ?3 AND status = 'pending'",
        rusqlite::params![status.as_str(), settled_at as i64, transaction_id.as_str()],
    )?;
    Ok(changed)
}

/// All pending transactions, oldest first.
pub fn list_pending(conn: &Connection) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TX_COLUMNS} FROM transactions t
         WHERE t.status = 'pending'
         ORDER BY t.created_at, t.sequence"
    ))?;
    let rows = stmt
        .query_map([], |row| transaction_from_row(row, 0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Every distribution owed to a recipient with its transaction, oldest first.
pub fn list_for_recipient(
    conn: &Connection,
    recipient: &RecipientId,
) -> Result<Vec<(Transaction, Distribution)>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TX_COLUMNS}, {DIST_COLUMNS}
         FROM distributions d
         JOIN transactions t ON t.transaction_id = d.transaction_id
         WHERE d.recipient_id = ?1
         ORDER BY t.created_at, t.sequence"
    ))?;
    let rows = stmt
        .query_map([recipient.as_str()], |row| {
            Ok((transaction_from_row(row, 0)?, distribution_from_row(row, 10)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Mark one recipient's distribution as claimed, only if it is unclaimed and
/// its transaction is completed. Returns the number of rows changed.
pub fn mark_claimed(
    conn: &Connection,
    transaction_id: &TransactionId,
    recipient: &RecipientId,
    claim_id: &ClaimId,
    claimed_at: Timestamp,
) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE distributions SET claimed = 1, claimed_at = ?1, claim_id = ?2
         WHERE transaction_id = ?3 AND recipient_id = ?4 AND claimed = 0
           AND EXISTS (SELECT 1 FROM transactions t
                       WHERE t.transaction_id = ?3 AND t.status = 'completed')",
        rusqlite::params![
            claimed_at as i64,
            claim_id.as_str(),
            transaction_id.as_str(),
            recipient.as_str(),
        ],
    )?;
    Ok(changed)
}

fn transaction_from_row(row: &Row<'_>, at: usize) -> rusqlite::Result<Transaction> {
    let status: String = row.get(at + 7)?;
    let status = status.parse::<TransactionStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(at + 7, Type::Text, e.into())
    })?;
    Ok(Transaction {
        transaction_id: TransactionId::new(row.get::<_, String>(at)?),
        sequence: row.get::<_, i64>(at + 1)? as u64,
        content_id: ContentId::new(row.get::<_, String>(at + 2)?),
        split_id: SplitId::new(row.get::<_, String>(at + 3)?),
        payer_id: PayerId::new(row.get::<_, String>(at + 4)?),
        gross_amount: row.get::<_, i64>(at + 5)? as u64,
        token_denomination: row.get(at + 6)?,
        status,
        created_at: row.get::<_, i64>(at + 8)? as u64,
        settled_at: row.get::<_, Option<i64>>(at + 9)?.map(|t| t as u64),
    })
}

fn distribution_from_row(row: &Row<'_>, at: usize) -> rusqlite::Result<Distribution> {
    Ok(Distribution {
        transaction_id: TransactionId::new(row.get::<_, String>(at)?),
        recipient_id: RecipientId::new(row.get::<_, String>(at + 1)?),
        amount: row.get::<_, i64>(at + 2)? as u64,
        share_bps: row.get::<_, i64>(at + 3)? as u16,
        claimed: row.get(at + 4)?,
        claimed_at: row.get::<_, Option<i64>>(at + 5)?.map(|t| t as u64),
        claim_id: row.get::<_, Option<String>>(at + 6)?.map(ClaimId::new),
    })
}
