//! Lists, list membership and followed tags.

use kestrel_types::List;
use rusqlite::{params, Connection, Row};

use crate::columns;

fn map_list(row: &Row) -> rusqlite::Result<List> {
    Ok(List {
        id: row.get(0)?,
        account_id: row.get(1)?,
        title: row.get(2)?,
        replies_policy: columns::parsed(row, 3)?,
        exclusive: row.get(4)?,
    })
}

pub fn put_list(conn: &Connection, list: &List) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO lists (id, account_id, title, replies_policy, exclusive)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            replies_policy = excluded.replies_policy,
            exclusive = excluded.exclusive",
        params![
            list.id,
            list.account_id,
            list.title,
            list.replies_policy.as_str(),
            list.exclusive,
        ],
    )?;
    Ok(())
}

/// Adds the followed account behind `follow_id` to a list.
pub fn add_list_entry(
    conn: &Connection,
    entry_id: &str,
    list_id: &str,
    follow_id: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO list_entries (id, list_id, follow_id) VALUES (?1, ?2, ?3)",
        params![entry_id, list_id, follow_id],
    )?;
    Ok(())
}

/// Lists that contain the given follow as an entry.
pub fn get_lists_containing_follow(
    conn: &Connection,
    follow_id: &str,
) -> rusqlite::Result<Vec<List>> {
    let mut stmt = conn.prepare(
        "SELECT l.id, l.account_id, l.title, l.replies_policy, l.exclusive
         FROM lists l JOIN list_entries e ON e.list_id = l.id
         WHERE e.follow_id = ?1 ORDER BY l.id",
    )?;
    let rows = stmt.query_map([follow_id], map_list)?;
    columns::collect(rows)
}

/// Returns true when `account_id` is followed through an entry of the list.
pub fn list_includes_account(
    conn: &Connection,
    list_id: &str,
    account_id: &str,
) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM list_entries e JOIN follows f ON f.id = e.follow_id
            WHERE e.list_id = ?1 AND f.target_account_id = ?2)",
        params![list_id, account_id],
        |row| row.get(0),
    )
}

pub fn delete_list_entries_for_follow(
    conn: &Connection,
    follow_id: &str,
) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM list_entries WHERE follow_id = ?1", [follow_id])
}

pub fn follow_tag(conn: &Connection, account_id: &str, tag_id: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO tag_follows (account_id, tag_id) VALUES (?1, ?2)",
        params![account_id, tag_id],
    )?;
    Ok(())
}

/// Distinct accounts following any of `tag_ids`.
pub fn get_account_ids_following_tags(
    conn: &Connection,
    tag_ids: &[String],
) -> rusqlite::Result<Vec<String>> {
    if tag_ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = (1..=tag_ids.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let mut stmt = conn.prepare(&format!(
        "SELECT DISTINCT account_id FROM tag_follows WHERE tag_id IN ({placeholders})
         ORDER BY account_id"
    ))?;
    let rows = stmt.query_map(rusqlite::params_from_iter(tag_ids.iter()), |row| row.get(0))?;
    columns::collect(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::follows::put_follow;
    use crate::test_support::{follow, open};
    use kestrel_types::RepliesPolicy;

    #[test]
    fn list_membership_goes_through_follows() {
        let conn = open();
        put_follow(&conn, &follow("f1", "owner", "member")).expect("follow should succeed");
        put_list(
            &conn,
            &List {
                id: "l1".to_string(),
                account_id: "owner".to_string(),
                title: "friends".to_string(),
                replies_policy: RepliesPolicy::List,
                exclusive: true,
            },
        )
        .expect("list should succeed");
        add_list_entry(&conn, "e1", "l1", "f1").expect("entry should succeed");

        let lists = get_lists_containing_follow(&conn, "f1").expect("query should succeed");
        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0].replies_policy, RepliesPolicy::List);
        assert!(lists[0].exclusive);

        assert!(list_includes_account(&conn, "l1", "member").expect("query should succeed"));
        assert!(!list_includes_account(&conn, "l1", "owner").expect("query should succeed"));
    }

    #[test]
    fn tag_followers_are_distinct() {
        let conn = open();
        follow_tag(&conn, "a1", "t1").expect("follow should succeed");
        follow_tag(&conn, "a1", "t2").expect("follow should succeed");
        follow_tag(&conn, "a2", "t2").expect("follow should succeed");

        let ids = get_account_ids_following_tags(&conn, &["t1".to_string(), "t2".to_string()])
            .expect("query should succeed");
        assert_eq!(ids, vec!["a1".to_string(), "a2".to_string()]);
        assert!(get_account_ids_following_tags(&conn, &[])
            .expect("query should succeed")
            .is_empty());
    }
}
