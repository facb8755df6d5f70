//! Outgoing activity queue.
//!
//! Activities handed to the federating actor are persisted here for the
//! delivery layer to pick up.

use rusqlite::{params, Connection};

/// A persisted outgoing activity.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingActivity {
    pub id: i64,
    pub outbox_uri: String,
    pub activity_type: String,
    pub activity_json: String,
}

pub fn enqueue_activity(
    conn: &Connection,
    outbox_uri: &str,
    activity_type: &str,
    activity_json: &str,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO outgoing_activities (outbox_uri, activity_type, activity_json)
         VALUES (?1, ?2, ?3)",
        params![outbox_uri, activity_type, activity_json],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_activities(conn: &Connection, limit: u32) -> rusqlite::Result<Vec<OutgoingActivity>> {
    let mut stmt = conn.prepare(
        "SELECT id, outbox_uri, activity_type, activity_json
         FROM outgoing_activities ORDER BY id LIMIT ?1",
    )?;
    let rows = stmt.query_map([limit], |row| {
        Ok(OutgoingActivity {
            id: row.get(0)?,
            outbox_uri: row.get(1)?,
            activity_type: row.get(2)?,
            activity_json: row.get(3)?,
        })
    })?;
    crate::columns::collect(rows)
}

pub fn count_activities(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM outgoing_activities", [], |row| {
        row.get(0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::open;

    #[test]
    fn enqueue_preserves_order() {
        let conn = open();
        enqueue_activity(&conn, "https://kestrel.test/users/a/outbox", "Create", "{}")
            .expect("enqueue should succeed");
        enqueue_activity(&conn, "https://kestrel.test/users/a/outbox", "Delete", "{}")
            .expect("enqueue should succeed");

        let activities = list_activities(&conn, 10).expect("query should succeed");
        assert_eq!(activities.len(), 2);
        assert_eq!(activities[0].activity_type, "Create");
        assert_eq!(count_activities(&conn).expect("count should succeed"), 2);
    }
}
