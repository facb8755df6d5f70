use kestrel_db::{create_pool, run_migrations, DbRuntimeSettings};

#[test]
fn db_initialization_creates_all_tables() {
    let pool = create_pool(
        ":memory:",
        DbRuntimeSettings {
            busy_timeout_ms: 5_000,
            pool_max_size: 1,
        },
    )
    .expect("failed to create pool");
    let conn = pool.get().expect("failed to get connection");
    let applied = run_migrations(&conn).expect("failed to run migrations");
    assert_eq!(applied, 8);

    let mut stmt = conn
        .prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )
        .expect("failed to prepare table query");
    let tables: Vec<String> = stmt
        .query_map([], |row| row.get(0))
        .expect("failed to execute table query")
        .map(|r| r.expect("failed to read table name"))
        .collect();

    for expected in [
        "_kestrel_migrations",
        "account_mutes",
        "accounts",
        "blocks",
        "conversations",
        "domain_blocks",
        "filters",
        "follow_requests",
        "follows",
        "home_timeline_items",
        "list_entries",
        "list_timeline_items",
        "lists",
        "mentions",
        "moves",
        "notifications",
        "outgoing_activities",
        "poll_votes",
        "polls",
        "reports",
        "status_bookmarks",
        "status_faves",
        "status_tags",
        "statuses",
        "tag_follows",
        "tags",
        "thread_mutes",
    ] {
        assert!(
            tables.iter().any(|t| t == expected),
            "missing table {expected}"
        );
    }
}
