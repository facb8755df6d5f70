use thiserror::Error;

/// Errors surfaced by the async store.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to get pooled connection: {0}")]
    Pool(#[from] r2d2::Error),

    /// The blocking task running the query panicked or was cancelled.
    #[error("database task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("json serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
