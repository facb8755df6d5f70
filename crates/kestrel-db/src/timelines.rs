//! Home and list timeline storage.
//!
//! A timeline holds status ids in insertion order. Ingest refuses a status
//! already present, and refuses a boost when its original or another boost
//! of the same original is already on the timeline. The refusal is a single
//! `INSERT ... WHERE NOT EXISTS`, so concurrent ingests of the same status
//! report exactly one insertion.

use kestrel_types::Status;
use rusqlite::{params, Connection};

use crate::columns;

/// Which timeline table an ingest targets.
#[derive(Debug, Clone, Copy)]
enum Timeline {
    Home,
    List,
}

impl Timeline {
    fn table(self) -> &'static str {
        match self {
            Self::Home => "home_timeline_items",
            Self::List => "list_timeline_items",
        }
    }

    fn owner_column(self) -> &'static str {
        match self {
            Self::Home => "account_id",
            Self::List => "list_id",
        }
    }
}

fn ingest(
    conn: &Connection,
    timeline: Timeline,
    owner_id: &str,
    status: &Status,
) -> rusqlite::Result<bool> {
    let table = timeline.table();
    let owner = timeline.owner_column();
    let inserted = conn.execute(
        &format!(
            "INSERT INTO {table} ({owner}, status_id, author_account_id, boost_of_id, boost_of_account_id)
             SELECT ?1, ?2, ?3, ?4, ?5
             WHERE NOT EXISTS (
                SELECT 1 FROM {table}
                WHERE {owner} = ?1
                  AND (status_id = ?2
                       OR (?4 IS NOT NULL AND (status_id = ?4 OR boost_of_id = ?4)))
             )"
        ),
        params![
            owner_id,
            status.id,
            status.account_id,
            status.boost_of_id,
            status.boost_of_account_id,
        ],
    )?;
    Ok(inserted > 0)
}

/// Places a status on an account's home timeline. Returns true if inserted.
pub fn ingest_home(conn: &Connection, account_id: &str, status: &Status) -> rusqlite::Result<bool> {
    ingest(conn, Timeline::Home, account_id, status)
}

/// Places a status on a list timeline. Returns true if inserted.
pub fn ingest_list(conn: &Connection, list_id: &str, status: &Status) -> rusqlite::Result<bool> {
    ingest(conn, Timeline::List, list_id, status)
}

fn status_ids(
    conn: &Connection,
    timeline: Timeline,
    owner_id: &str,
) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT status_id FROM {} WHERE {} = ?1 ORDER BY rowid",
        timeline.table(),
        timeline.owner_column()
    ))?;
    let rows = stmt.query_map([owner_id], |row| row.get(0))?;
    columns::collect(rows)
}

pub fn home_timeline_status_ids(
    conn: &Connection,
    account_id: &str,
) -> rusqlite::Result<Vec<String>> {
    status_ids(conn, Timeline::Home, account_id)
}

pub fn list_timeline_status_ids(conn: &Connection, list_id: &str) -> rusqlite::Result<Vec<String>> {
    status_ids(conn, Timeline::List, list_id)
}

/// Removes a status from every home and list timeline.
pub fn remove_status_from_timelines(conn: &Connection, status_id: &str) -> rusqlite::Result<usize> {
    let home = conn.execute(
        "DELETE FROM home_timeline_items WHERE status_id = ?1",
        [status_id],
    )?;
    let list = conn.execute(
        "DELETE FROM list_timeline_items WHERE status_id = ?1",
        [status_id],
    )?;
    Ok(home + list)
}

/// Removes everything authored or boosted by `author_id` from the home
/// timeline and lists of `owner_id`.
pub fn remove_author_from_owner_timelines(
    conn: &Connection,
    owner_id: &str,
    author_id: &str,
) -> rusqlite::Result<usize> {
    let home = conn.execute(
        "DELETE FROM home_timeline_items
         WHERE account_id = ?1 AND (author_account_id = ?2 OR boost_of_account_id = ?2)",
        params![owner_id, author_id],
    )?;
    let list = conn.execute(
        "DELETE FROM list_timeline_items
         WHERE list_id IN (SELECT id FROM lists WHERE account_id = ?1)
           AND (author_account_id = ?2 OR boost_of_account_id = ?2)",
        params![owner_id, author_id],
    )?;
    Ok(home + list)
}

/// Removes an account's own timelines and its statuses from everyone else's.
pub fn remove_account_from_timelines(
    conn: &Connection,
    account_id: &str,
) -> rusqlite::Result<usize> {
    let mut removed = conn.execute(
        "DELETE FROM home_timeline_items
         WHERE account_id = ?1 OR author_account_id = ?1 OR boost_of_account_id = ?1",
        [account_id],
    )?;
    removed += conn.execute(
        "DELETE FROM list_timeline_items
         WHERE list_id IN (SELECT id FROM lists WHERE account_id = ?1)
            OR author_account_id = ?1 OR boost_of_account_id = ?1",
        [account_id],
    )?;
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{open, status};

    #[test]
    fn duplicate_ingest_reports_not_inserted() {
        let conn = open();
        let s = status("s1", "a1");
        assert!(ingest_home(&conn, "viewer", &s).expect("ingest should succeed"));
        assert!(!ingest_home(&conn, "viewer", &s).expect("ingest should succeed"));
        assert!(ingest_home(&conn, "other", &s).expect("ingest should succeed"));
        assert_eq!(
            home_timeline_status_ids(&conn, "viewer").expect("query should succeed"),
            vec!["s1".to_string()]
        );
    }

    #[test]
    fn boost_of_present_original_is_refused() {
        let conn = open();
        let original = status("s1", "a1");
        let mut boost = status("s2", "a2");
        boost.boost_of_id = Some("s1".to_string());
        boost.boost_of_account_id = Some("a1".to_string());
        let mut second_boost = status("s3", "a3");
        second_boost.boost_of_id = Some("s1".to_string());
        second_boost.boost_of_account_id = Some("a1".to_string());

        assert!(ingest_list(&conn, "l1", &original).expect("ingest should succeed"));
        assert!(!ingest_list(&conn, "l1", &boost).expect("ingest should succeed"));

        assert!(ingest_list(&conn, "l2", &boost).expect("ingest should succeed"));
        assert!(!ingest_list(&conn, "l2", &second_boost).expect("ingest should succeed"));
    }

    #[test]
    fn removal_by_status_and_author() {
        let conn = open();
        let mut boost = status("s2", "a2");
        boost.boost_of_id = Some("s1".to_string());
        boost.boost_of_account_id = Some("a1".to_string());
        ingest_home(&conn, "viewer", &status("s1", "a1")).expect("ingest should succeed");
        ingest_home(&conn, "viewer2", &boost).expect("ingest should succeed");
        ingest_home(&conn, "viewer", &status("s4", "a4")).expect("ingest should succeed");

        assert_eq!(
            remove_author_from_owner_timelines(&conn, "viewer2", "a1")
                .expect("removal should succeed"),
            1
        );
        assert_eq!(
            remove_status_from_timelines(&conn, "s1").expect("removal should succeed"),
            1
        );
        assert_eq!(
            home_timeline_status_ids(&conn, "viewer").expect("query should succeed"),
            vec!["s4".to_string()]
        );
    }
}
