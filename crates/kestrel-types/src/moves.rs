//! Account migration record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An account migration from `origin_uri` to `target_uri`.
///
/// There is at most one record per origin/target pair. A retried Move
/// delivered under a new activity URI rewrites `uri` in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Move {
    pub id: String,
    pub uri: String,
    pub origin_uri: String,
    pub target_uri: String,
    /// Last time side effects were attempted.
    pub attempted_at: Option<DateTime<Utc>>,
    /// Set to `attempted_at` once every side effect succeeded.
    pub succeeded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Move {
    pub fn has_succeeded(&self) -> bool {
        self.succeeded_at.is_some()
    }
}
