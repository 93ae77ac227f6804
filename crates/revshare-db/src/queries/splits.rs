//! Revenue split query functions.

use revshare_types::{ContentId, CreatorId, RecipientShare, RevenueSplit, SplitId};
use rusqlite::{Connection, OptionalExtension, Row};

use crate::Result;

const SPLIT_COLUMNS: &str =
    "split_id, content_id, creator_id, active, version, supersedes, created_at, updated_at";

/// Insert a split and its recipient list.
pub fn insert(conn: &Connection, split: &RevenueSplit) -> Result<()> {
    conn.execute(
        "INSERT INTO splits
         (split_id, content_id, creator_id, active, version, supersedes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            split.split_id.as_str(),
            split.content_id.as_str(),
            split.creator_id.as_str(),
            split.active,
            split.version as i64,
            split.supersedes.as_ref().map(SplitId::as_str),
            split.created_at as i64,
            split.updated_at as i64,
        ],
    )?;

    let mut stmt = conn.prepare(
        "INSERT INTO split_recipients (split_id, position, recipient_id, share_bps)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    for (position, share) in split.recipients.iter().enumerate() {
        stmt.execute(rusqlite::params![
            split.split_id.as_str(),
            position as i64,
            share.recipient_id.as_str(),
            share.share_bps as i64,
        ])?;
    }
    Ok(())
}

/// Whether a split with this id exists.
pub fn exists(conn: &Connection, split_id: &SplitId) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM splits WHERE split_id = ?1",
            [split_id.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Get a split by id.
pub fn get(conn: &Connection, split_id: &SplitId) -> Result<Option<RevenueSplit>> {
    let header = conn
        .query_row(
            &format!("SELECT {SPLIT_COLUMNS} FROM splits WHERE split_id = ?1"),
            [split_id.as_str()],
            split_header,
        )
        .optional()?;
    match header {
        Some(split) => Ok(Some(with_recipients(conn, split)?)),
        None => Ok(None),
    }
}

/// List splits for a content item in insertion order.
pub fn list_by_content(conn: &Connection, content_id: &ContentId) -> Result<Vec<RevenueSplit>> {
    list_where(conn, "content_id = ?1", content_id.as_str())
}

/// List splits owned by a creator in insertion order.
pub fn list_by_creator(conn: &Connection, creator_id: &CreatorId) -> Result<Vec<RevenueSplit>> {
    list_where(conn, "creator_id = ?1", creator_id.as_str())
}

/// Update the active flag. Returns the number of rows changed.
pub fn set_active(
    conn: &Connection,
    split_id: &SplitId,
    active: bool,
    updated_at: u64,
) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE splits SET active = ?1, updated_at = ?2 WHERE split_id = ?3",
        rusqlite::params![active, updated_at as i64, split_id.as_str()],
    )?;
    Ok(changed)
}

/// Deactivate a split only if it is still active. Returns the number of rows changed.
pub fn deactivate_if_active(
    conn: &Connection,
    split_id: &SplitId,
    updated_at: u64,
) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE splits SET active = 0, updated_at = ?1 WHERE split_id = ?2 AND active = 1",
        rusqlite::params![updated_at as i64, split_id.as_str()],
    )?;
    Ok(changed)
}

fn list_where(conn: &Connection, predicate: &str, value: &str) -> Result<Vec<RevenueSplit>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SPLIT_COLUMNS} FROM splits WHERE {predicate} ORDER BY rowid"
    ))?;
    let headers = stmt
        .query_map([value], split_header)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    headers
        .into_iter()
        .map(|split| with_recipients(conn, split))
        .collect()
}

fn split_header(row: &Row<'_>) -> rusqlite::Result<RevenueSplit> {
    Ok(RevenueSplit {
        split_id: SplitId::new(row.get::<_, String>(0)?),
        content_id: ContentId::new(row.get::<_, String>(1)?),
        creator_id: CreatorId::new(row.get::<_, String>(2)?),
        recipients: Vec::new(),
        active: row.get(3)?,
        version: row.get::<_, i64>(4)? as u32,
        supersedes: row.get::<_, Option<String>>(5)?.map(SplitId::new),
        created_at: row.get::<_, i64>(6)? as u64,
        updated_at: row.get::<_, i64>(7)? as u64,
    })
}

fn with_recipients(conn: &Connection, mut split: RevenueSplit) -> Result<RevenueSplit> {
    let mut stmt = conn.prepare(
        "SELECT recipient_id, share_bps FROM split_recipients
         WHERE split_id = ?1
         ORDER BY position",
    )?;
    split.recipients = stmt
        .query_map([split.split_id.as_str()], |row| {
            Ok(RecipientShare::new(
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)? as u16,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(split)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::open_memory;

    fn split(id: &str, content: &str, creator: &str) -> RevenueSplit {
        RevenueSplit {
            split_id: SplitId::new(id),
            content_id: ContentId::new(content),
            creator_id: CreatorId::new(creator),
            recipients: vec![RecipientShare::new("z", 6000), RecipientShare::new("a", 4000)],
            active: true,
            version: 1,
            supersedes: None,
            created_at: 100,
            updated_at: 100,
        }
    }

    #[test]
    fn test_insert_and_get() {
        let conn = open_memory().expect("open");
        insert(&conn, &split("s1", "c1", "creator")).expect("insert");

        let loaded = get(&conn, &SplitId::new("s1")).expect("get").expect("exists");
        assert_eq!(loaded, split("s1", "c1", "creator"));
        // Recipient order survives even though "a" sorts before "z".
        assert_eq!(loaded.recipients[0].recipient_id.as_str(), "z");
        assert!(get(&conn, &SplitId::new("missing")).expect("get").is_none());
    }

    #[test]
    fn test_list_by_content_in_insertion_order() {
        let conn = open_memory().expect("open");
        insert(&conn, &split("s-b", "c1", "creator")).expect("insert");
        insert(&conn, &split("s-x", "c2", "creator")).expect("insert");
        insert(&conn, &split("s-a", "c1", "other")).expect("insert");

        let ids: Vec<String> = list_by_content(&conn, &ContentId::new("c1"))
            .expect("list")
            .into_iter()
            .map(|s| s.split_id.to_string())
            .collect();
        assert_eq!(ids, vec!["s-b", "s-a"]);
        assert_eq!(
            list_by_creator(&conn, &CreatorId::new("creator")).expect("list").len(),
            2
        );
    }

    #[test]
    fn test_deactivate_if_active_once() {
        let conn = open_memory().expect("open");
        insert(&conn, &split("s1", "c1", "creator")).expect("insert");
        assert_eq!(deactivate_if_active(&conn, &SplitId::new("s1"), 200).expect("update"), 1);
        assert_eq!(deactivate_if_active(&conn, &SplitId::new("s1"), 300).expect("update"), 0);

        let loaded = get(&conn, &SplitId::new("s1")).expect("get").expect("exists");
        assert!(!loaded.active);
        assert_eq!(loaded.updated_at, 200);
    }
}
