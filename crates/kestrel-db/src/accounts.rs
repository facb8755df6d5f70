//! Account and domain-block queries.

use chrono::{DateTime, Utc};
use kestrel_types::Account;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::columns;

const ACCOUNT_COLUMNS: &str = "id, uri, username, domain, inbox_uri, outbox_uri, followers_uri,
    locked, admin, also_known_as_json, moved_to_uri, move_id, suspended_at, created_at";

pub(crate) fn map_account(row: &Row) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        uri: row.get(1)?,
        username: row.get(2)?,
        domain: row.get(3)?,
        inbox_uri: row.get(4)?,
        outbox_uri: row.get(5)?,
        followers_uri: row.get(6)?,
        locked: row.get(7)?,
        admin: row.get(8)?,
        also_known_as: columns::json(row, 9)?,
        moved_to_uri: row.get(10)?,
        move_id: row.get(11)?,
        suspended_at: row.get(12)?,
        created_at: row.get(13)?,
    })
}

/// Inserts an account, or updates every mutable field if the id exists.
pub fn upsert_account(conn: &Connection, account: &Account) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO accounts (
            id, uri, username, domain, inbox_uri, outbox_uri, followers_uri,
            locked, admin, also_known_as_json, moved_to_uri, move_id, suspended_at, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        ON CONFLICT(id) DO UPDATE SET
            uri = excluded.uri,
            username = excluded.username,
            domain = excluded.domain,
            inbox_uri = excluded.inbox_uri,
            outbox_uri = excluded.outbox_uri,
            followers_uri = excluded.followers_uri,
            locked = excluded.locked,
            admin = excluded.admin,
            also_known_as_json = excluded.also_known_as_json,
            moved_to_uri = excluded.moved_to_uri,
            move_id = excluded.move_id,
            suspended_at = excluded.suspended_at",
        params![
            account.id,
            account.uri,
            account.username,
            account.domain,
            account.inbox_uri,
            account.outbox_uri,
            account.followers_uri,
            account.locked,
            account.admin,
            columns::to_json(&account.also_known_as)?,
            account.moved_to_uri,
            account.move_id,
            account.suspended_at,
            account.created_at,
        ],
    )?;
    Ok(())
}

pub fn get_account_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<Account>> {
    conn.query_row(
        &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
        [id],
        map_account,
    )
    .optional()
}

pub fn get_account_by_uri(conn: &Connection, uri: &str) -> rusqlite::Result<Option<Account>> {
    conn.query_row(
        &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE uri = ?1"),
        [uri],
        map_account,
    )
    .optional()
}

/// The instance actor: the local account named after the instance host.
pub fn get_instance_account(conn: &Connection, host: &str) -> rusqlite::Result<Option<Account>> {
    conn.query_row(
        &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE domain IS NULL AND username = ?1"),
        [host],
        map_account,
    )
    .optional()
}

/// Local accounts with moderation rights that are not suspended.
pub fn get_instance_moderators(conn: &Connection) -> rusqlite::Result<Vec<Account>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM accounts
         WHERE domain IS NULL AND admin = 1 AND suspended_at IS NULL
         ORDER BY created_at ASC"
    ))?;
    let rows = stmt.query_map([], map_account)?;
    columns::collect(rows)
}

pub fn set_account_move_id(
    conn: &Connection,
    account_id: &str,
    move_id: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE accounts SET move_id = ?2 WHERE id = ?1",
        params![account_id, move_id],
    )?;
    Ok(())
}

/// Marks an account suspended. Keeps the earliest suspension time.
pub fn suspend_account(
    conn: &Connection,
    account_id: &str,
    at: DateTime<Utc>,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE accounts SET suspended_at = COALESCE(suspended_at, ?2) WHERE id = ?1",
        params![account_id, at],
    )?;
    Ok(())
}

pub fn block_domain(conn: &Connection, domain: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO domain_blocks (domain) VALUES (?1)",
        [domain.to_lowercase()],
    )?;
    Ok(())
}

/// Returns true when `domain` or any parent domain is blocked.
pub fn is_domain_blocked(conn: &Connection, domain: &str) -> rusqlite::Result<bool> {
    let domain = domain.to_lowercase();
    let mut candidates = vec![domain.clone()];
    let mut rest = domain.as_str();
    while let Some((_, parent)) = rest.split_once('.') {
        if parent.contains('.') {
            candidates.push(parent.to_string());
        }
        rest = parent;
    }

    let mut stmt = conn.prepare("SELECT EXISTS(SELECT 1 FROM domain_blocks WHERE domain = ?1)")?;
    for candidate in candidates {
        let blocked: bool = stmt.query_row([candidate], |row| row.get(0))?;
        if blocked {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{local_account, open, remote_account};

    #[test]
    fn upsert_then_fetch_by_id_and_uri() {
        let conn = open();
        let mut account = remote_account("r1", "remote.example");
        account.also_known_as = vec!["https://old.example/users/r1".to_string()];
        upsert_account(&conn, &account).expect("insert should succeed");

        let by_id = get_account_by_id(&conn, "r1")
            .expect("query should succeed")
            .expect("account should exist");
        assert_eq!(by_id, account);

        account.locked = true;
        upsert_account(&conn, &account).expect("update should succeed");
        let by_uri = get_account_by_uri(&conn, &account.uri)
            .expect("query should succeed")
            .expect("account should exist");
        assert!(by_uri.locked);
    }

    #[test]
    fn instance_account_and_moderators() {
        let conn = open();
        let instance = local_account("inst", "kestrel.test");
        let mut admin = local_account("admin", "admin");
        admin.admin = true;
        upsert_account(&conn, &instance).expect("insert should succeed");
        upsert_account(&conn, &admin).expect("insert should succeed");

        let found = get_instance_account(&conn, "kestrel.test")
            .expect("query should succeed")
            .expect("instance account should exist");
        assert_eq!(found.id, "inst");

        let mods = get_instance_moderators(&conn).expect("query should succeed");
        assert_eq!(mods.len(), 1);
        assert_eq!(mods[0].id, "admin");
    }

    #[test]
    fn domain_blocks_cover_subdomains() {
        let conn = open();
        block_domain(&conn, "Blocked.Example").expect("block should succeed");
        assert!(is_domain_blocked(&conn, "blocked.example").expect("query should succeed"));
        assert!(is_domain_blocked(&conn, "social.blocked.example").expect("query should succeed"));
        assert!(!is_domain_blocked(&conn, "example").expect("query should succeed"));
        assert!(!is_domain_blocked(&conn, "fine.example").expect("query should succeed"));
    }
}
