//! Embedded SQL migration runner.
//!
//! Migrations are SQL files embedded at compile time, applied in order and
//! tracked by the `_kestrel_migrations` table. A migration and its tracking
//! row commit together or not at all.

use rusqlite::Connection;
use thiserror::Error;

/// One embedded SQL file.
struct Migration {
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. New migrations are appended here.
const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "000_init",
        sql: include_str!("migrations/000_init.sql"),
    },
    Migration {
        name: "001_accounts",
        sql: include_str!("migrations/001_accounts.sql"),
    },
    Migration {
        name: "002_statuses",
        sql: include_str!("migrations/002_statuses.sql"),
    },
    Migration {
        name: "003_relationships",
        sql: include_str!("migrations/003_relationships.sql"),
    },
    Migration {
        name: "004_notifications",
        sql: include_str!("migrations/004_notifications.sql"),
    },
    Migration {
        name: "005_timelines",
        sql: include_str!("migrations/005_timelines.sql"),
    },
    Migration {
        name: "006_moves",
        sql: include_str!("migrations/006_moves.sql"),
    },
    Migration {
        name: "007_outgoing_activities",
        sql: include_str!("migrations/007_outgoing_activities.sql"),
    },
];

/// Errors raised while bringing the schema up to date.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A migration's SQL or its tracking row failed; nothing of it was kept.
    #[error("migration '{name}' failed: {source}")]
    ExecutionFailed {
        /// Name of the migration, e.g. `004_notifications`.
        name: String,
        /// The SQLite error that aborted it.
        source: rusqlite::Error,
    },

    /// The `_kestrel_migrations` table could not be created or read.
    #[error("failed to check migration state: {0}")]
    StateQuery(rusqlite::Error),
}

/// Runs all pending migrations against the given connection.
///
/// Returns the number of migrations applied by this call.
///
/// # Errors
///
/// Returns `MigrationError` if any migration fails to execute or if the
/// tracking table cannot be queried.
pub fn run_migrations(conn: &Connection) -> Result<usize, MigrationError> {
    run_migrations_from_list(conn, MIGRATIONS)
}

fn run_migrations_from_list(
    conn: &Connection,
    migrations: &[Migration],
) -> Result<usize, MigrationError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _kestrel_migrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .map_err(|e| MigrationError::ExecutionFailed {
        name: "_kestrel_migrations_bootstrap".to_string(),
        source: e,
    })?;

    let mut applied = 0;

    for migration in migrations {
        let already_applied: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM _kestrel_migrations WHERE name = ?1",
                [migration.name],
                |row| row.get(0),
            )
            .map_err(MigrationError::StateQuery)?;

        if already_applied {
            tracing::debug!(
                migration = migration.name,
                "migration already applied, skipping"
            );
            continue;
        }

        tracing::info!(migration = migration.name, "applying migration");

        let failed = |e| MigrationError::ExecutionFailed {
            name: migration.name.to_string(),
            source: e,
        };

        let tx = conn.unchecked_transaction().map_err(failed)?;
        tx.execute_batch(migration.sql).map_err(failed)?;
        tx.execute(
            "INSERT INTO _kestrel_migrations (name) VALUES (?1)",
            [migration.name],
        )
        .map_err(failed)?;
        tx.commit().map_err(failed)?;

        applied += 1;
    }

    Ok(applied)
}
