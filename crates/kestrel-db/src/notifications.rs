//! Notifications, conversations and keyword filters.

use kestrel_types::{Conversation, Filter, FilterAction, Notification, NotificationType};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::columns;

fn map_notification(row: &Row) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: row.get(0)?,
        notification_type: columns::parsed(row, 1)?,
        target_account_id: row.get(2)?,
        origin_account_id: row.get(3)?,
        status_id: row.get(4)?,
        read: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn map_conversation(row: &Row) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        account_id: row.get(1)?,
        thread_id: row.get(2)?,
        last_status_id: row.get(3)?,
        participant_ids: columns::json(row, 4)?,
        read: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

pub fn notification_exists(
    conn: &Connection,
    notification_type: NotificationType,
    target_account_id: &str,
    origin_account_id: &str,
    status_id: &str,
) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM notifications
         WHERE notification_type = ?1 AND target_account_id = ?2
           AND origin_account_id = ?3 AND status_id = ?4)",
        params![
            notification_type.as_str(),
            target_account_id,
            origin_account_id,
            status_id
        ],
        |row| row.get(0),
    )
}

/// Inserts a notification unless one with the same key exists.
///
/// Returns true when this call created the row. Concurrent callers racing
/// on the same key see exactly one `true`.
pub fn put_notification(conn: &Connection, notification: &Notification) -> rusqlite::Result<bool> {
    let inserted = conn.execute(
        "INSERT INTO notifications (
            id, notification_type, target_account_id, origin_account_id, status_id, read, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(notification_type, target_account_id, origin_account_id, status_id) DO NOTHING",
        params![
            notification.id,
            notification.notification_type.as_str(),
            notification.target_account_id,
            notification.origin_account_id,
            notification.status_id,
            notification.read,
            notification.created_at,
        ],
    )?;
    Ok(inserted > 0)
}

pub fn delete_notification(
    conn: &Connection,
    notification_type: NotificationType,
    target_account_id: &str,
    origin_account_id: &str,
    status_id: &str,
) -> rusqlite::Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM notifications
         WHERE notification_type = ?1 AND target_account_id = ?2
           AND origin_account_id = ?3 AND status_id = ?4",
        params![
            notification_type.as_str(),
            target_account_id,
            origin_account_id,
            status_id
        ],
    )?;
    Ok(deleted > 0)
}

pub fn delete_notifications_for_status(
    conn: &Connection,
    status_id: &str,
) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM notifications WHERE status_id = ?1", [status_id])
}

/// Removes notifications sent by or addressed to `account_id`.
pub fn delete_account_notifications(
    conn: &Connection,
    account_id: &str,
) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM notifications WHERE target_account_id = ?1 OR origin_account_id = ?1",
        [account_id],
    )
}

/// Notifications addressed to `account_id`, newest first.
pub fn get_account_notifications(
    conn: &Connection,
    account_id: &str,
) -> rusqlite::Result<Vec<Notification>> {
    let mut stmt = conn.prepare(
        "SELECT id, notification_type, target_account_id, origin_account_id, status_id, read, created_at
         FROM notifications WHERE target_account_id = ?1
         ORDER BY created_at DESC, id DESC",
    )?;
    let rows = stmt.query_map([account_id], map_notification)?;
    columns::collect(rows)
}

pub fn put_filter(conn: &Connection, filter: &Filter) -> rusqlite::Result<()> {
    let action = match filter.action {
        FilterAction::Warn => "warn",
        FilterAction::Hide => "hide",
    };
    conn.execute(
        "INSERT INTO filters (id, account_id, phrase, action) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET phrase = excluded.phrase, action = excluded.action",
        params![filter.id, filter.account_id, filter.phrase, action],
    )?;
    Ok(())
}

pub fn get_account_filters(conn: &Connection, account_id: &str) -> rusqlite::Result<Vec<Filter>> {
    let mut stmt =
        conn.prepare("SELECT id, account_id, phrase, action FROM filters WHERE account_id = ?1")?;
    let rows = stmt.query_map([account_id], |row| {
        let action: String = row.get(3)?;
        Ok(Filter {
            id: row.get(0)?,
            account_id: row.get(1)?,
            phrase: row.get(2)?,
            action: if action == "hide" {
                FilterAction::Hide
            } else {
                FilterAction::Warn
            },
        })
    })?;
    columns::collect(rows)
}

/// Creates or advances the conversation for `(account_id, thread_id)`.
///
/// An existing row keeps its id; its last status, participants, read flag
/// and update time are overwritten.
pub fn upsert_conversation(
    conn: &Connection,
    conversation: &Conversation,
) -> rusqlite::Result<Conversation> {
    conn.execute(
        "INSERT INTO conversations (
            id, account_id, thread_id, last_status_id, participant_ids_json, read, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(account_id, thread_id) DO UPDATE SET
            last_status_id = excluded.last_status_id,
            participant_ids_json = excluded.participant_ids_json,
            read = excluded.read,
            updated_at = excluded.updated_at",
        params![
            conversation.id,
            conversation.account_id,
            conversation.thread_id,
            conversation.last_status_id,
            columns::to_json(&conversation.participant_ids)?,
            conversation.read,
            conversation.updated_at,
        ],
    )?;
    conn.query_row(
        "SELECT id, account_id, thread_id, last_status_id, participant_ids_json, read, updated_at
         FROM conversations WHERE account_id = ?1 AND thread_id = ?2",
        params![conversation.account_id, conversation.thread_id],
        map_conversation,
    )
}

pub fn get_conversation(
    conn: &Connection,
    account_id: &str,
    thread_id: &str,
) -> rusqlite::Result<Option<Conversation>> {
    conn.query_row(
        "SELECT id, account_id, thread_id, last_status_id, participant_ids_json, read, updated_at
         FROM conversations WHERE account_id = ?1 AND thread_id = ?2",
        params![account_id, thread_id],
        map_conversation,
    )
    .optional()
}

/// Drops conversations whose latest status is `status_id`.
pub fn delete_conversations_for_status(
    conn: &Connection,
    status_id: &str,
) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM conversations WHERE last_status_id = ?1",
        [status_id],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::test_support::open;

    fn notification(id: &str) -> Notification {
        Notification {
            id: id.to_string(),
            notification_type: NotificationType::Favourite,
            target_account_id: "a1".to_string(),
            origin_account_id: "r1".to_string(),
            status_id: "s1".to_string(),
            read: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn put_notification_is_insert_if_absent() {
        let conn = open();
        assert!(put_notification(&conn, &notification("n1")).expect("put should succeed"));
        assert!(!put_notification(&conn, &notification("n2")).expect("put should succeed"));
        assert_eq!(
            get_account_notifications(&conn, "a1")
                .expect("query should succeed")
                .len(),
            1
        );
        assert!(notification_exists(&conn, NotificationType::Favourite, "a1", "r1", "s1")
            .expect("query should succeed"));

        assert!(
            delete_notification(&conn, NotificationType::Favourite, "a1", "r1", "s1")
                .expect("delete should succeed")
        );
        assert!(put_notification(&conn, &notification("n3")).expect("put should succeed"));
    }

    #[test]
    fn empty_status_id_participates_in_the_key() {
        let conn = open();
        let mut follow = notification("n1");
        follow.notification_type = NotificationType::Follow;
        follow.status_id = String::new();
        assert!(put_notification(&conn, &follow).expect("put should succeed"));
        follow.id = "n2".to_string();
        assert!(!put_notification(&conn, &follow).expect("put should succeed"));
    }

    #[test]
    fn conversation_upsert_keeps_id() {
        let conn = open();
        let first = Conversation {
            id: "c1".to_string(),
            account_id: "a1".to_string(),
            thread_id: "th1".to_string(),
            last_status_id: "s1".to_string(),
            participant_ids: vec!["a2".to_string()],
            read: false,
            updated_at: Utc::now(),
        };
        upsert_conversation(&conn, &first).expect("upsert should succeed");

        let second = Conversation {
            id: "c2".to_string(),
            last_status_id: "s2".to_string(),
            ..first.clone()
        };
        let stored = upsert_conversation(&conn, &second).expect("upsert should succeed");
        assert_eq!(stored.id, "c1");
        assert_eq!(stored.last_status_id, "s2");

        assert_eq!(
            delete_conversations_for_status(&conn, "s2").expect("delete should succeed"),
            1
        );
        assert!(get_conversation(&conn, "a1", "th1")
            .expect("query should succeed")
            .is_none());
    }
}
