//! Persistence layer for kestrel.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! embedded SQL migrations, the synchronous query helpers grouped by table,
//! and [`SqliteStore`], the async [`Database`] implementation the workers run
//! against.
//!
//! # Layout
//!
//! | Module          | Tables                                                    |
//! |-----------------|-----------------------------------------------------------|
//! | `accounts`      | `accounts`, `domain_blocks`                               |
//! | `statuses`      | `statuses`, `mentions`, `tags`, `polls`, `poll_votes`, ... |
//! | `follows`       | `follows`, `follow_requests`                              |
//! | `interactions`  | `blocks`, `account_mutes`, `status_faves`, `reports`      |
//! | `lists`         | `lists`, `list_entries`, `tag_follows`                    |
//! | `notifications` | `notifications`, `conversations`, `filters`               |
//! | `timelines`     | `home_timeline_items`, `list_timeline_items`              |
//! | `moves`         | `moves`                                                   |
//! | `outbox`        | `outgoing_activities`                                     |
//!
//! Query helpers take a `&Connection` and return `rusqlite::Result`. They
//! never open transactions on behalf of the caller except where an operation
//! must be atomic on its own (accepting a follow request, storing a status
//! with its mentions and tags).

pub mod accounts;
mod columns;
mod error;
pub mod follows;
pub mod interactions;
pub mod lists;
mod migrations;
pub mod moves;
pub mod notifications;
pub mod outbox;
mod pool;
pub mod statuses;
mod store;
pub mod timelines;

pub use error::DbError;
pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};
pub use store::{Database, SqliteStore};

#[cfg(test)]
mod test_support;
