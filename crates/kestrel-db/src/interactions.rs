//! Blocks, mutes, faves and reports.

use kestrel_types::{Block, Report, StatusFave};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::columns;

fn map_block(row: &Row) -> rusqlite::Result<Block> {
    Ok(Block {
        id: row.get(0)?,
        uri: row.get(1)?,
        account_id: row.get(2)?,
        target_account_id: row.get(3)?,
        created_at: row.get(4)?,
        account: None,
        target_account: None,
    })
}

fn map_fave(row: &Row) -> rusqlite::Result<StatusFave> {
    Ok(StatusFave {
        id: row.get(0)?,
        uri: row.get(1)?,
        account_id: row.get(2)?,
        target_account_id: row.get(3)?,
        status_id: row.get(4)?,
        created_at: row.get(5)?,
        account: None,
        target_account: None,
        status: None,
    })
}

fn map_report(row: &Row) -> rusqlite::Result<Report> {
    Ok(Report {
        id: row.get(0)?,
        uri: row.get(1)?,
        account_id: row.get(2)?,
        target_account_id: row.get(3)?,
        status_ids: columns::json(row, 4)?,
        comment: row.get(5)?,
        forwarded: row.get(6)?,
        created_at: row.get(7)?,
        account: None,
        target_account: None,
    })
}

pub fn put_block(conn: &Connection, block: &Block) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO blocks (id, uri, account_id, target_account_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(account_id, target_account_id) DO UPDATE SET uri = excluded.uri",
        params![
            block.id,
            block.uri,
            block.account_id,
            block.target_account_id,
            block.created_at,
        ],
    )?;
    Ok(())
}

pub fn get_block(
    conn: &Connection,
    account_id: &str,
    target_account_id: &str,
) -> rusqlite::Result<Option<Block>> {
    conn.query_row(
        "SELECT id, uri, account_id, target_account_id, created_at
         FROM blocks WHERE account_id = ?1 AND target_account_id = ?2",
        params![account_id, target_account_id],
        map_block,
    )
    .optional()
}

pub fn delete_block_by_id(conn: &Connection, block_id: &str) -> rusqlite::Result<bool> {
    Ok(conn.execute("DELETE FROM blocks WHERE id = ?1", [block_id])? > 0)
}

/// Returns true when either account blocks the other.
pub fn is_either_blocked(conn: &Connection, a: &str, b: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM blocks
         WHERE (account_id = ?1 AND target_account_id = ?2)
            OR (account_id = ?2 AND target_account_id = ?1))",
        params![a, b],
        |row| row.get(0),
    )
}

pub fn delete_account_blocks(conn: &Connection, account_id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM blocks WHERE account_id = ?1 OR target_account_id = ?1",
        [account_id],
    )
}

pub fn mute_account(
    conn: &Connection,
    account_id: &str,
    target_account_id: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO account_mutes (account_id, target_account_id) VALUES (?1, ?2)",
        params![account_id, target_account_id],
    )?;
    Ok(())
}

pub fn is_muted(
    conn: &Connection,
    account_id: &str,
    target_account_id: &str,
) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM account_mutes WHERE account_id = ?1 AND target_account_id = ?2)",
        params![account_id, target_account_id],
        |row| row.get(0),
    )
}

pub fn put_fave(conn: &Connection, fave: &StatusFave) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO status_faves (id, uri, account_id, target_account_id, status_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(account_id, status_id) DO UPDATE SET uri = excluded.uri",
        params![
            fave.id,
            fave.uri,
            fave.account_id,
            fave.target_account_id,
            fave.status_id,
            fave.created_at,
        ],
    )?;
    Ok(())
}

pub fn get_fave_by_uri(conn: &Connection, uri: &str) -> rusqlite::Result<Option<StatusFave>> {
    conn.query_row(
        "SELECT id, uri, account_id, target_account_id, status_id, created_at
         FROM status_faves WHERE uri = ?1",
        [uri],
        map_fave,
    )
    .optional()
}

pub fn delete_fave_by_id(conn: &Connection, fave_id: &str) -> rusqlite::Result<bool> {
    Ok(conn.execute("DELETE FROM status_faves WHERE id = ?1", [fave_id])? > 0)
}

pub fn delete_faves_for_status(conn: &Connection, status_id: &str) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM status_faves WHERE status_id = ?1", [status_id])
}

pub fn put_report(conn: &Connection, report: &Report) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO reports (id, uri, account_id, target_account_id, status_ids_json, comment, forwarded, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(id) DO UPDATE SET
            comment = excluded.comment,
            forwarded = excluded.forwarded",
        params![
            report.id,
            report.uri,
            report.account_id,
            report.target_account_id,
            columns::to_json(&report.status_ids)?,
            report.comment,
            report.forwarded,
            report.created_at,
        ],
    )?;
    Ok(())
}

pub fn get_report(conn: &Connection, report_id: &str) -> rusqlite::Result<Option<Report>> {
    conn.query_row(
        "SELECT id, uri, account_id, target_account_id, status_ids_json, comment, forwarded, created_at
         FROM reports WHERE id = ?1",
        [report_id],
        map_report,
    )
    .optional()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::test_support::open;

    #[test]
    fn blocks_are_checked_both_ways() {
        let conn = open();
        let block = Block {
            id: "b1".to_string(),
            uri: "https://kestrel.test/blocks/b1".to_string(),
            account_id: "a1".to_string(),
            target_account_id: "a2".to_string(),
            created_at: Utc::now(),
            account: None,
            target_account: None,
        };
        put_block(&conn, &block).expect("block should succeed");
        assert!(is_either_blocked(&conn, "a2", "a1").expect("query should succeed"));
        assert!(get_block(&conn, "a1", "a2")
            .expect("query should succeed")
            .is_some());

        assert!(delete_block_by_id(&conn, "b1").expect("delete should succeed"));
        assert!(!is_either_blocked(&conn, "a1", "a2").expect("query should succeed"));
    }

    #[test]
    fn report_round_trips_status_ids() {
        let conn = open();
        let report = Report {
            id: "rep1".to_string(),
            uri: "https://kestrel.test/reports/rep1".to_string(),
            account_id: "a1".to_string(),
            target_account_id: "r1".to_string(),
            status_ids: vec!["s1".to_string(), "s2".to_string()],
            comment: "spam".to_string(),
            forwarded: true,
            created_at: Utc::now(),
            account: None,
            target_account: None,
        };
        put_report(&conn, &report).expect("report should succeed");
        let fetched = get_report(&conn, "rep1")
            .expect("query should succeed")
            .expect("report should exist");
        assert_eq!(fetched.status_ids, report.status_ids);
        assert!(fetched.forwarded);
    }
}
