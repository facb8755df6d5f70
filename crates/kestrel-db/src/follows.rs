//! Follow and follow-request queries.

use kestrel_types::{Follow, FollowRequest};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::accounts::get_account_by_id;
use crate::columns;

const FOLLOW_COLUMNS: &str =
    "id, uri, account_id, target_account_id, show_reblogs, notify, created_at";

fn map_follow(row: &Row) -> rusqlite::Result<Follow> {
    Ok(Follow {
        id: row.get(0)?,
        uri: row.get(1)?,
        account_id: row.get(2)?,
        target_account_id: row.get(3)?,
        show_reblogs: row.get(4)?,
        notify: row.get(5)?,
        created_at: row.get(6)?,
        account: None,
        target_account: None,
    })
}

fn map_follow_request(row: &Row) -> rusqlite::Result<FollowRequest> {
    Ok(FollowRequest {
        id: row.get(0)?,
        uri: row.get(1)?,
        account_id: row.get(2)?,
        target_account_id: row.get(3)?,
        show_reblogs: row.get(4)?,
        notify: row.get(5)?,
        created_at: row.get(6)?,
        account: None,
        target_account: None,
    })
}

/// Stores a follow. An existing follow between the same pair is updated
/// in place, keeping its id.
pub fn put_follow(conn: &Connection, follow: &Follow) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO follows (id, uri, account_id, target_account_id, show_reblogs, notify, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(account_id, target_account_id) DO UPDATE SET
            uri = excluded.uri,
            show_reblogs = excluded.show_reblogs,
            notify = excluded.notify",
        params![
            follow.id,
            follow.uri,
            follow.account_id,
            follow.target_account_id,
            follow.show_reblogs,
            follow.notify,
            follow.created_at,
        ],
    )?;
    Ok(())
}

pub fn get_follow(
    conn: &Connection,
    account_id: &str,
    target_account_id: &str,
) -> rusqlite::Result<Option<Follow>> {
    conn.query_row(
        &format!(
            "SELECT {FOLLOW_COLUMNS} FROM follows WHERE account_id = ?1 AND target_account_id = ?2"
        ),
        params![account_id, target_account_id],
        map_follow,
    )
    .optional()
}

pub fn is_following(
    conn: &Connection,
    account_id: &str,
    target_account_id: &str,
) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM follows WHERE account_id = ?1 AND target_account_id = ?2)",
        params![account_id, target_account_id],
        |row| row.get(0),
    )
}

/// Follows of `account_id` owned by local accounts, with `account` set to
/// the follower.
pub fn get_account_local_followers(
    conn: &Connection,
    account_id: &str,
) -> rusqlite::Result<Vec<Follow>> {
    let mut stmt = conn.prepare(
        "SELECT f.id, f.uri, f.account_id, f.target_account_id, f.show_reblogs, f.notify, f.created_at
         FROM follows f JOIN accounts a ON a.id = f.account_id
         WHERE f.target_account_id = ?1 AND a.domain IS NULL
         ORDER BY f.created_at",
    )?;
    let rows = stmt.query_map([account_id], map_follow)?;
    let mut follows = columns::collect(rows)?;
    for follow in &mut follows {
        follow.account = get_account_by_id(conn, &follow.account_id)?.map(Box::new);
    }
    Ok(follows)
}

/// Follows owned by `account_id`, with `target_account` populated.
pub fn get_account_follows(conn: &Connection, account_id: &str) -> rusqlite::Result<Vec<Follow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {FOLLOW_COLUMNS} FROM follows WHERE account_id = ?1 ORDER BY created_at"
    ))?;
    let rows = stmt.query_map([account_id], map_follow)?;
    let mut follows = columns::collect(rows)?;
    for follow in &mut follows {
        follow.target_account = get_account_by_id(conn, &follow.target_account_id)?.map(Box::new);
    }
    Ok(follows)
}

/// Fills `account` and `target_account` when unset.
pub fn populate_follow(conn: &Connection, follow: &mut Follow) -> rusqlite::Result<()> {
    if follow.account.is_none() {
        follow.account = get_account_by_id(conn, &follow.account_id)?.map(Box::new);
    }
    if follow.target_account.is_none() {
        follow.target_account = get_account_by_id(conn, &follow.target_account_id)?.map(Box::new);
    }
    Ok(())
}

/// Removes the follow between a pair, returning it if one existed.
pub fn delete_follow(
    conn: &Connection,
    account_id: &str,
    target_account_id: &str,
) -> rusqlite::Result<Option<Follow>> {
    let existing = get_follow(conn, account_id, target_account_id)?;
    if let Some(follow) = &existing {
        conn.execute("DELETE FROM follows WHERE id = ?1", [&follow.id])?;
    }
    Ok(existing)
}

pub fn delete_follow_by_id(conn: &Connection, follow_id: &str) -> rusqlite::Result<bool> {
    Ok(conn.execute("DELETE FROM follows WHERE id = ?1", [follow_id])? > 0)
}

/// Removes follows in both directions between two accounts.
pub fn delete_follows_between(conn: &Connection, a: &str, b: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM follows
         WHERE (account_id = ?1 AND target_account_id = ?2)
            OR (account_id = ?2 AND target_account_id = ?1)",
        params![a, b],
    )
}

/// Removes every follow owned by or targeting `account_id`.
pub fn delete_account_follows(conn: &Connection, account_id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM follows WHERE account_id = ?1 OR target_account_id = ?1",
        [account_id],
    )
}

pub fn put_follow_request(conn: &Connection, request: &FollowRequest) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO follow_requests (id, uri, account_id, target_account_id, show_reblogs, notify, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(account_id, target_account_id) DO UPDATE SET
            uri = excluded.uri,
            show_reblogs = excluded.show_reblogs,
            notify = excluded.notify",
        params![
            request.id,
            request.uri,
            request.account_id,
            request.target_account_id,
            request.show_reblogs,
            request.notify,
            request.created_at,
        ],
    )?;
    Ok(())
}

pub fn get_follow_request(
    conn: &Connection,
    account_id: &str,
    target_account_id: &str,
) -> rusqlite::Result<Option<FollowRequest>> {
    conn.query_row(
        &format!(
            "SELECT {FOLLOW_COLUMNS} FROM follow_requests
             WHERE account_id = ?1 AND target_account_id = ?2"
        ),
        params![account_id, target_account_id],
        map_follow_request,
    )
    .optional()
}

/// Turns a pending request into a follow in one transaction.
///
/// Returns the new follow, or `None` when no request was pending.
pub fn accept_follow_request(
    conn: &Connection,
    account_id: &str,
    target_account_id: &str,
) -> rusqlite::Result<Option<Follow>> {
    let tx = conn.unchecked_transaction()?;
    let Some(request) = get_follow_request(&tx, account_id, target_account_id)? else {
        return Ok(None);
    };
    let follow = request.to_follow();
    put_follow(&tx, &follow)?;
    tx.execute("DELETE FROM follow_requests WHERE id = ?1", [&request.id])?;
    tx.commit()?;
    Ok(Some(follow))
}

pub fn delete_follow_request(
    conn: &Connection,
    account_id: &str,
    target_account_id: &str,
) -> rusqlite::Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM follow_requests WHERE account_id = ?1 AND target_account_id = ?2",
        params![account_id, target_account_id],
    )?;
    Ok(deleted > 0)
}

pub fn delete_follow_requests_between(
    conn: &Connection,
    a: &str,
    b: &str,
) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM follow_requests
         WHERE (account_id = ?1 AND target_account_id = ?2)
            OR (account_id = ?2 AND target_account_id = ?1)",
        params![a, b],
    )
}

/// Removes every follow request sent by or addressed to `account_id`.
pub fn delete_account_follow_requests(
    conn: &Connection,
    account_id: &str,
) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM follow_requests WHERE account_id = ?1 OR target_account_id = ?1",
        [account_id],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::upsert_account;
    use crate::test_support::{follow, local_account, open, remote_account};
    use chrono::Utc;

    #[test]
    fn local_followers_exclude_remote_accounts() {
        let conn = open();
        upsert_account(&conn, &local_account("a1", "alice")).expect("insert should succeed");
        upsert_account(&conn, &local_account("a2", "bob")).expect("insert should succeed");
        upsert_account(&conn, &remote_account("r1", "remote.example"))
            .expect("insert should succeed");

        put_follow(&conn, &follow("f1", "a2", "a1")).expect("follow should succeed");
        put_follow(&conn, &follow("f2", "r1", "a1")).expect("follow should succeed");

        let followers = get_account_local_followers(&conn, "a1").expect("query should succeed");
        assert_eq!(followers.len(), 1);
        assert_eq!(followers[0].account_id, "a2");
        assert_eq!(
            followers[0].account.as_ref().map(|a| a.username.as_str()),
            Some("bob")
        );
        assert!(is_following(&conn, "r1", "a1").expect("query should succeed"));
    }

    #[test]
    fn accept_follow_request_moves_row() {
        let conn = open();
        let request = FollowRequest {
            id: "fr1".to_string(),
            uri: "https://remote.example/follows/1".to_string(),
            account_id: "r1".to_string(),
            target_account_id: "a1".to_string(),
            show_reblogs: false,
            notify: true,
            created_at: Utc::now(),
            account: None,
            target_account: None,
        };
        put_follow_request(&conn, &request).expect("request should succeed");

        let follow = accept_follow_request(&conn, "r1", "a1")
            .expect("accept should succeed")
            .expect("request should have been pending");
        assert!(follow.notify);
        assert!(!follow.show_reblogs);
        assert!(get_follow_request(&conn, "r1", "a1")
            .expect("query should succeed")
            .is_none());
        assert!(is_following(&conn, "r1", "a1").expect("query should succeed"));

        assert!(accept_follow_request(&conn, "r1", "a1")
            .expect("accept should succeed")
            .is_none());
    }

    #[test]
    fn delete_between_removes_both_directions() {
        let conn = open();
        put_follow(&conn, &follow("f1", "a1", "a2")).expect("follow should succeed");
        put_follow(&conn, &follow("f2", "a2", "a1")).expect("follow should succeed");
        put_follow(&conn, &follow("f3", "a1", "a3")).expect("follow should succeed");

        assert_eq!(
            delete_follows_between(&conn, "a1", "a2").expect("delete should succeed"),
            2
        );
        assert!(is_following(&conn, "a1", "a3").expect("query should succeed"));
    }
}
