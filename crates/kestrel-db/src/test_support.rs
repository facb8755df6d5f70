//! Fixtures shared by the query module tests.

use chrono::Utc;
use kestrel_types::{Account, Follow, Status, Visibility};
use rusqlite::Connection;

use crate::run_migrations;

pub(crate) fn open() -> Connection {
    let conn = Connection::open_in_memory().expect("should open in-memory db");
    run_migrations(&conn).expect("migrations should succeed");
    conn
}

pub(crate) fn local_account(id: &str, username: &str) -> Account {
    let uri = format!("https://kestrel.test/users/{username}");
    Account {
        id: id.to_string(),
        inbox_uri: format!("{uri}/inbox"),
        outbox_uri: format!("{uri}/outbox"),
        followers_uri: format!("{uri}/followers"),
        uri,
        username: username.to_string(),
        domain: None,
        locked: false,
        admin: false,
        also_known_as: Vec::new(),
        moved_to_uri: None,
        move_id: None,
        suspended_at: None,
        created_at: Utc::now(),
    }
}

pub(crate) fn remote_account(id: &str, domain: &str) -> Account {
    let uri = format!("https://{domain}/users/{id}");
    Account {
        id: id.to_string(),
        inbox_uri: format!("{uri}/inbox"),
        outbox_uri: format!("{uri}/outbox"),
        followers_uri: format!("{uri}/followers"),
        uri,
        username: id.to_string(),
        domain: Some(domain.to_string()),
        locked: false,
        admin: false,
        also_known_as: Vec::new(),
        moved_to_uri: None,
        move_id: None,
        suspended_at: None,
        created_at: Utc::now(),
    }
}

pub(crate) fn status(id: &str, account_id: &str) -> Status {
    Status {
        id: id.to_string(),
        uri: format!("https://kestrel.test/statuses/{id}"),
        account_id: account_id.to_string(),
        local: true,
        federated: true,
        visibility: Visibility::Public,
        content: format!("status {id}"),
        thread_id: format!("thread-{id}"),
        in_reply_to_id: None,
        in_reply_to_uri: None,
        in_reply_to_account_id: None,
        boost_of_id: None,
        boost_of_account_id: None,
        poll_id: None,
        created_at: Utc::now(),
        account: None,
        boost_of: None,
        in_reply_to_account: None,
        mentions: Vec::new(),
        tags: Vec::new(),
        poll: None,
    }
}

pub(crate) fn follow(id: &str, account_id: &str, target_account_id: &str) -> Follow {
    Follow {
        id: id.to_string(),
        uri: format!("https://kestrel.test/follows/{id}"),
        account_id: account_id.to_string(),
        target_account_id: target_account_id.to_string(),
        show_reblogs: true,
        notify: false,
        created_at: Utc::now(),
        account: None,
        target_account: None,
    }
}
