//! Account model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A local or remote actor.
///
/// Local accounts have no `domain`. The instance actor is the local account
/// whose username equals the instance host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub uri: String,
    pub username: String,
    /// `None` for accounts hosted on this instance.
    pub domain: Option<String>,
    pub inbox_uri: String,
    pub outbox_uri: String,
    pub followers_uri: String,
    /// Locked accounts approve follow requests manually.
    pub locked: bool,
    /// Local moderator or admin.
    pub admin: bool,
    /// Alias URIs this account claims (ActivityPub `alsoKnownAs`).
    pub also_known_as: Vec<String>,
    pub moved_to_uri: Option<String>,
    pub move_id: Option<String>,
    pub suspended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Returns true when the account is hosted on this instance.
    pub fn is_local(&self) -> bool {
        self.domain.is_none()
    }

    /// Returns true when the account is hosted elsewhere.
    pub fn is_remote(&self) -> bool {
        self.domain.is_some()
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended_at.is_some()
    }

    /// Returns true when `uri` appears in this account's alias set.
    pub fn is_aliased_to(&self, uri: &str) -> bool {
        self.also_known_as.iter().any(|alias| alias == uri)
    }
}
