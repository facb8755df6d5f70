//! Status queries, including the rows that hang off a status: mentions,
//! tags, polls, poll votes, bookmarks and thread mutes.

use chrono::{DateTime, Utc};
use kestrel_types::{Mention, Poll, PollVote, Status, Tag};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::accounts::get_account_by_id;
use crate::columns;

const STATUS_COLUMNS: &str = "id, uri, account_id, local, federated, visibility, content,
    thread_id, in_reply_to_id, in_reply_to_uri, in_reply_to_account_id, boost_of_id,
    boost_of_account_id, poll_id, created_at";

fn map_status(row: &Row) -> rusqlite::Result<Status> {
    Ok(Status {
        id: row.get(0)?,
        uri: row.get(1)?,
        account_id: row.get(2)?,
        local: row.get(3)?,
        federated: row.get(4)?,
        visibility: columns::parsed(row, 5)?,
        content: row.get(6)?,
        thread_id: row.get(7)?,
        in_reply_to_id: row.get(8)?,
        in_reply_to_uri: row.get(9)?,
        in_reply_to_account_id: row.get(10)?,
        boost_of_id: row.get(11)?,
        boost_of_account_id: row.get(12)?,
        poll_id: row.get(13)?,
        created_at: row.get(14)?,
        account: None,
        boost_of: None,
        in_reply_to_account: None,
        mentions: Vec::new(),
        tags: Vec::new(),
        poll: None,
    })
}

fn map_poll(row: &Row) -> rusqlite::Result<Poll> {
    Ok(Poll {
        id: row.get(0)?,
        status_id: row.get(1)?,
        options: columns::json(row, 2)?,
        expires_at: row.get(3)?,
        closed_at: row.get(4)?,
        closing: false,
    })
}

fn map_poll_vote(row: &Row) -> rusqlite::Result<PollVote> {
    Ok(PollVote {
        id: row.get(0)?,
        poll_id: row.get(1)?,
        account_id: row.get(2)?,
        choices: columns::json(row, 3)?,
        created_at: row.get(4)?,
        account: None,
        poll: None,
    })
}

/// Stores a status together with its mentions, tags and poll.
pub fn insert_status(conn: &Connection, status: &Status) -> rusqlite::Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO statuses (
            id, uri, account_id, local, federated, visibility, content, thread_id,
            in_reply_to_id, in_reply_to_uri, in_reply_to_account_id, boost_of_id,
            boost_of_account_id, poll_id, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            status.id,
            status.uri,
            status.account_id,
            status.local,
            status.federated,
            status.visibility.as_str(),
            status.content,
            status.thread_id,
            status.in_reply_to_id,
            status.in_reply_to_uri,
            status.in_reply_to_account_id,
            status.boost_of_id,
            status.boost_of_account_id,
            status.poll_id,
            status.created_at,
        ],
    )?;
    write_attachments(&tx, status)?;
    tx.commit()
}

/// Rewrites the editable parts of a status and replaces its attachments.
pub fn update_status(conn: &Connection, status: &Status) -> rusqlite::Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "UPDATE statuses SET visibility = ?2, content = ?3, federated = ?4, poll_id = ?5
         WHERE id = ?1",
        params![
            status.id,
            status.visibility.as_str(),
            status.content,
            status.federated,
            status.poll_id,
        ],
    )?;
    tx.execute("DELETE FROM mentions WHERE status_id = ?1", [&status.id])?;
    tx.execute("DELETE FROM status_tags WHERE status_id = ?1", [&status.id])?;
    write_attachments(&tx, status)?;
    tx.commit()
}

fn write_attachments(conn: &Connection, status: &Status) -> rusqlite::Result<()> {
    for mention in &status.mentions {
        conn.execute(
            "INSERT OR IGNORE INTO mentions (id, status_id, origin_account_id, target_account_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                mention.id,
                status.id,
                mention.origin_account_id,
                mention.target_account_id
            ],
        )?;
    }
    for tag in &status.tags {
        conn.execute(
            "INSERT INTO tags (id, name, useable) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET useable = excluded.useable",
            params![tag.id, tag.name, tag.useable],
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO status_tags (status_id, tag_id) VALUES (?1, ?2)",
            params![status.id, tag.id],
        )?;
    }
    if let Some(poll) = &status.poll {
        conn.execute(
            "INSERT INTO polls (id, status_id, options_json, expires_at, closed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                options_json = excluded.options_json,
                expires_at = excluded.expires_at,
                closed_at = COALESCE(polls.closed_at, excluded.closed_at)",
            params![
                poll.id,
                status.id,
                columns::to_json(&poll.options)?,
                poll.expires_at,
                poll.closed_at,
            ],
        )?;
    }
    Ok(())
}

pub fn get_status_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<Status>> {
    conn.query_row(
        &format!("SELECT {STATUS_COLUMNS} FROM statuses WHERE id = ?1"),
        [id],
        map_status,
    )
    .optional()
}

pub fn get_status_by_uri(conn: &Connection, uri: &str) -> rusqlite::Result<Option<Status>> {
    conn.query_row(
        &format!("SELECT {STATUS_COLUMNS} FROM statuses WHERE uri = ?1"),
        [uri],
        map_status,
    )
    .optional()
}

/// Fills every unset relationship field of `status`.
///
/// A boosted status is populated one level deep: its own author, tags and
/// mentions, but not the status it might in turn reference.
pub fn populate_status(conn: &Connection, status: &mut Status) -> rusqlite::Result<()> {
    populate_own_fields(conn, status)?;

    if status.boost_of.is_none() {
        if let Some(boost_of_id) = &status.boost_of_id {
            if let Some(mut original) = get_status_by_id(conn, boost_of_id)? {
                populate_own_fields(conn, &mut original)?;
                status.boost_of = Some(Box::new(original));
            }
        }
    }
    Ok(())
}

fn populate_own_fields(conn: &Connection, status: &mut Status) -> rusqlite::Result<()> {
    if status.account.is_none() {
        status.account = get_account_by_id(conn, &status.account_id)?.map(Box::new);
    }
    if status.in_reply_to_account.is_none() {
        if let Some(id) = &status.in_reply_to_account_id {
            status.in_reply_to_account = get_account_by_id(conn, id)?.map(Box::new);
        }
    }
    if status.mentions.is_empty() {
        status.mentions = get_status_mentions(conn, &status.id)?;
    }
    for mention in &mut status.mentions {
        if mention.target_account.is_none() {
            mention.target_account =
                get_account_by_id(conn, &mention.target_account_id)?.map(Box::new);
        }
    }
    if status.tags.is_empty() {
        status.tags = get_status_tags(conn, &status.id)?;
    }
    if status.poll.is_none() {
        if let Some(poll_id) = &status.poll_id {
            status.poll = get_poll(conn, poll_id)?;
        }
    }
    Ok(())
}

pub fn get_status_mentions(conn: &Connection, status_id: &str) -> rusqlite::Result<Vec<Mention>> {
    let mut stmt = conn.prepare(
        "SELECT id, status_id, origin_account_id, target_account_id
         FROM mentions WHERE status_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map([status_id], |row| {
        Ok(Mention {
            id: row.get(0)?,
            status_id: row.get(1)?,
            origin_account_id: row.get(2)?,
            target_account_id: row.get(3)?,
            target_account: None,
        })
    })?;
    columns::collect(rows)
}

pub fn get_status_tags(conn: &Connection, status_id: &str) -> rusqlite::Result<Vec<Tag>> {
    let mut stmt = conn.prepare(
        "SELECT t.id, t.name, t.useable
         FROM tags t JOIN status_tags st ON st.tag_id = t.id
         WHERE st.status_id = ?1 ORDER BY t.name",
    )?;
    let rows = stmt.query_map([status_id], |row| {
        Ok(Tag {
            id: row.get(0)?,
            name: row.get(1)?,
            useable: row.get(2)?,
        })
    })?;
    columns::collect(rows)
}

/// Statuses that boost `status_id`.
pub fn get_status_boosts(conn: &Connection, status_id: &str) -> rusqlite::Result<Vec<Status>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {STATUS_COLUMNS} FROM statuses WHERE boost_of_id = ?1 ORDER BY created_at"
    ))?;
    let rows = stmt.query_map([status_id], map_status)?;
    columns::collect(rows)
}

pub fn get_account_status_ids(
    conn: &Connection,
    account_id: &str,
) -> rusqlite::Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT id FROM statuses WHERE account_id = ?1 ORDER BY created_at")?;
    let rows = stmt.query_map([account_id], |row| row.get(0))?;
    columns::collect(rows)
}

/// Deletes a status row along with its tags, poll and poll votes.
pub fn delete_status(conn: &Connection, status_id: &str) -> rusqlite::Result<bool> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM status_tags WHERE status_id = ?1", [status_id])?;
    tx.execute(
        "DELETE FROM poll_votes WHERE poll_id IN (SELECT id FROM polls WHERE status_id = ?1)",
        [status_id],
    )?;
    tx.execute("DELETE FROM polls WHERE status_id = ?1", [status_id])?;
    let deleted = tx.execute("DELETE FROM statuses WHERE id = ?1", [status_id])?;
    tx.commit()?;
    Ok(deleted > 0)
}

pub fn delete_mentions_for_status(conn: &Connection, status_id: &str) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM mentions WHERE status_id = ?1", [status_id])
}

pub fn put_bookmark(
    conn: &Connection,
    id: &str,
    account_id: &str,
    status_id: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO status_bookmarks (id, account_id, status_id) VALUES (?1, ?2, ?3)",
        params![id, account_id, status_id],
    )?;
    Ok(())
}

pub fn delete_bookmarks_for_status(conn: &Connection, status_id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM status_bookmarks WHERE status_id = ?1",
        [status_id],
    )
}

pub fn count_bookmarks_for_status(conn: &Connection, status_id: &str) -> rusqlite::Result<u64> {
    conn.query_row(
        "SELECT COUNT(*) FROM status_bookmarks WHERE status_id = ?1",
        [status_id],
        |row| row.get(0),
    )
}

pub fn mute_thread(conn: &Connection, thread_id: &str, account_id: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO thread_mutes (thread_id, account_id) VALUES (?1, ?2)",
        params![thread_id, account_id],
    )?;
    Ok(())
}

pub fn is_thread_muted(
    conn: &Connection,
    thread_id: &str,
    account_id: &str,
) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM thread_mutes WHERE thread_id = ?1 AND account_id = ?2)",
        params![thread_id, account_id],
        |row| row.get(0),
    )
}

pub fn get_poll(conn: &Connection, poll_id: &str) -> rusqlite::Result<Option<Poll>> {
    conn.query_row(
        "SELECT id, status_id, options_json, expires_at, closed_at FROM polls WHERE id = ?1",
        [poll_id],
        map_poll,
    )
    .optional()
}

/// Sets `closed_at` on an open poll. Returns false if it was already closed.
pub fn close_poll(conn: &Connection, poll_id: &str, at: DateTime<Utc>) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE polls SET closed_at = ?2 WHERE id = ?1 AND closed_at IS NULL",
        params![poll_id, at],
    )?;
    Ok(changed > 0)
}

/// Records a vote. A second vote by the same account replaces the first.
pub fn put_poll_vote(conn: &Connection, vote: &PollVote) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO poll_votes (id, poll_id, account_id, choices_json, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(poll_id, account_id) DO UPDATE SET
            choices_json = excluded.choices_json",
        params![
            vote.id,
            vote.poll_id,
            vote.account_id,
            columns::to_json(&vote.choices)?,
            vote.created_at,
        ],
    )?;
    Ok(())
}

pub fn get_poll_votes(conn: &Connection, poll_id: &str) -> rusqlite::Result<Vec<PollVote>> {
    let mut stmt = conn.prepare(
        "SELECT id, poll_id, account_id, choices_json, created_at
         FROM poll_votes WHERE poll_id = ?1 ORDER BY created_at",
    )?;
    let rows = stmt.query_map([poll_id], map_poll_vote)?;
    columns::collect(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::upsert_account;
    use crate::test_support::{local_account, open, remote_account, status};

    #[test]
    fn populate_fills_author_mentions_tags_and_boost() {
        let conn = open();
        upsert_account(&conn, &local_account("a1", "alice")).expect("insert should succeed");
        upsert_account(&conn, &remote_account("b1", "remote.example"))
            .expect("insert should succeed");

        let mut original = status("s1", "b1");
        original.local = false;
        original.mentions = vec![Mention {
            id: "m1".to_string(),
            status_id: "s1".to_string(),
            origin_account_id: "b1".to_string(),
            target_account_id: "a1".to_string(),
            target_account: None,
        }];
        original.tags = vec![Tag {
            id: "t1".to_string(),
            name: "rust".to_string(),
            useable: true,
        }];
        insert_status(&conn, &original).expect("insert should succeed");

        let mut boost = status("s2", "a1");
        boost.boost_of_id = Some("s1".to_string());
        boost.boost_of_account_id = Some("b1".to_string());
        insert_status(&conn, &boost).expect("insert should succeed");

        let mut fetched = get_status_by_id(&conn, "s2")
            .expect("query should succeed")
            .expect("status should exist");
        populate_status(&conn, &mut fetched).expect("populate should succeed");

        assert_eq!(fetched.account.as_ref().map(|a| a.id.as_str()), Some("a1"));
        let boosted = fetched.boost_of.expect("boost_of should be populated");
        assert_eq!(boosted.account.as_ref().map(|a| a.id.as_str()), Some("b1"));
        assert_eq!(boosted.tags.len(), 1);
        assert_eq!(
            boosted.mentions[0]
                .target_account
                .as_ref()
                .map(|a| a.id.as_str()),
            Some("a1")
        );

        let boosts = get_status_boosts(&conn, "s1").expect("query should succeed");
        assert_eq!(boosts.len(), 1);
        assert_eq!(boosts[0].id, "s2");
    }

    #[test]
    fn delete_status_removes_poll_and_votes() {
        let conn = open();
        let mut s = status("s1", "a1");
        s.poll_id = Some("p1".to_string());
        s.poll = Some(Poll {
            id: "p1".to_string(),
            status_id: "s1".to_string(),
            options: vec!["yes".to_string(), "no".to_string()],
            expires_at: None,
            closed_at: None,
            closing: false,
        });
        insert_status(&conn, &s).expect("insert should succeed");
        put_poll_vote(
            &conn,
            &PollVote {
                id: "v1".to_string(),
                poll_id: "p1".to_string(),
                account_id: "a2".to_string(),
                choices: vec![0],
                created_at: Utc::now(),
                account: None,
                poll: None,
            },
        )
        .expect("vote should succeed");
        assert_eq!(get_poll_votes(&conn, "p1").expect("query should succeed").len(), 1);

        assert!(close_poll(&conn, "p1", Utc::now()).expect("close should succeed"));
        assert!(!close_poll(&conn, "p1", Utc::now()).expect("close should succeed"));

        assert!(delete_status(&conn, "s1").expect("delete should succeed"));
        assert!(get_poll(&conn, "p1").expect("query should succeed").is_none());
        assert!(get_poll_votes(&conn, "p1").expect("query should succeed").is_empty());
        assert!(!delete_status(&conn, "s1").expect("delete should succeed"));
    }

    #[test]
    fn thread_mutes() {
        let conn = open();
        assert!(!is_thread_muted(&conn, "th1", "a1").expect("query should succeed"));
        mute_thread(&conn, "th1", "a1").expect("mute should succeed");
        assert!(is_thread_muted(&conn, "th1", "a1").expect("query should succeed"));
    }
}
