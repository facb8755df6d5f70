//! Account migration records.

use chrono::{DateTime, Utc};
use kestrel_types::Move;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::columns;

const MOVE_COLUMNS: &str = "id, uri, origin_uri, target_uri, attempted_at, succeeded_at, created_at";

fn map_move(row: &Row) -> rusqlite::Result<Move> {
    Ok(Move {
        id: row.get(0)?,
        uri: row.get(1)?,
        origin_uri: row.get(2)?,
        target_uri: row.get(3)?,
        attempted_at: row.get(4)?,
        succeeded_at: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub fn get_move_by_uri(conn: &Connection, uri: &str) -> rusqlite::Result<Option<Move>> {
    conn.query_row(
        &format!("SELECT {MOVE_COLUMNS} FROM moves WHERE uri = ?1"),
        [uri],
        map_move,
    )
    .optional()
}

pub fn get_move_by_origin_target(
    conn: &Connection,
    origin_uri: &str,
    target_uri: &str,
) -> rusqlite::Result<Option<Move>> {
    conn.query_row(
        &format!("SELECT {MOVE_COLUMNS} FROM moves WHERE origin_uri = ?1 AND target_uri = ?2"),
        params![origin_uri, target_uri],
        map_move,
    )
    .optional()
}

/// Inserts a move. Fails with a constraint error when the uri or the
/// origin/target pair is already recorded.
pub fn insert_move(conn: &Connection, mv: &Move) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO moves (id, uri, origin_uri, target_uri, attempted_at, succeeded_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            mv.id,
            mv.uri,
            mv.origin_uri,
            mv.target_uri,
            mv.attempted_at,
            mv.succeeded_at,
            mv.created_at,
        ],
    )?;
    Ok(())
}

pub fn update_move_uri(conn: &Connection, move_id: &str, uri: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE moves SET uri = ?2 WHERE id = ?1",
        params![move_id, uri],
    )?;
    Ok(())
}

pub fn update_move_attempt(
    conn: &Connection,
    move_id: &str,
    attempted_at: Option<DateTime<Utc>>,
    succeeded_at: Option<DateTime<Utc>>,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE moves SET attempted_at = ?2, succeeded_at = ?3 WHERE id = ?1",
        params![move_id, attempted_at, succeeded_at],
    )?;
    Ok(())
}

fn moves_involving(conn: &Connection, uris: &[&str]) -> rusqlite::Result<Vec<Move>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MOVE_COLUMNS} FROM moves WHERE origin_uri = ?1 OR target_uri = ?1"
    ))?;
    let mut moves = Vec::new();
    for uri in uris {
        let rows = stmt.query_map([uri], map_move)?;
        moves.extend(columns::collect(rows)?);
    }
    Ok(moves)
}

/// Most recent `attempted_at` of any move whose origin or target is one of
/// `uris`.
pub fn latest_move_attempt_involving(
    conn: &Connection,
    uris: &[&str],
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    Ok(moves_involving(conn, uris)?
        .into_iter()
        .filter_map(|mv| mv.attempted_at)
        .max())
}

/// Most recent `succeeded_at` of any move whose origin or target is one of
/// `uris`.
pub fn latest_move_success_involving(
    conn: &Connection,
    uris: &[&str],
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    Ok(moves_involving(conn, uris)?
        .into_iter()
        .filter_map(|mv| mv.succeeded_at)
        .max())
}
