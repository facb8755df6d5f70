//! Relationship models between accounts and statuses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Account, Status};

/// An accepted follow from `account_id` to `target_account_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Follow {
    pub id: String,
    pub uri: String,
    pub account_id: String,
    pub target_account_id: String,
    /// Whether boosts by the target appear on the follower's timelines.
    pub show_reblogs: bool,
    /// Whether the follower is notified of new top-level posts.
    pub notify: bool,
    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub account: Option<Box<Account>>,
    #[serde(default)]
    pub target_account: Option<Box<Account>>,
}

/// A pending follow awaiting approval by the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowRequest {
    pub id: String,
    pub uri: String,
    pub account_id: String,
    pub target_account_id: String,
    pub show_reblogs: bool,
    pub notify: bool,
    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub account: Option<Box<Account>>,
    #[serde(default)]
    pub target_account: Option<Box<Account>>,
}

impl FollowRequest {
    /// The follow this request becomes once accepted.
    pub fn to_follow(&self) -> Follow {
        Follow {
            id: self.id.clone(),
            uri: self.uri.clone(),
            account_id: self.account_id.clone(),
            target_account_id: self.target_account_id.clone(),
            show_reblogs: self.show_reblogs,
            notify: self.notify,
            created_at: self.created_at,
            account: self.account.clone(),
            target_account: self.target_account.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    pub uri: String,
    pub account_id: String,
    pub target_account_id: String,
    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub account: Option<Box<Account>>,
    #[serde(default)]
    pub target_account: Option<Box<Account>>,
}

/// A like of a status. `target_account_id` is the status author.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusFave {
    pub id: String,
    pub uri: String,
    pub account_id: String,
    pub target_account_id: String,
    pub status_id: String,
    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub account: Option<Box<Account>>,
    #[serde(default)]
    pub target_account: Option<Box<Account>>,
    #[serde(default)]
    pub status: Option<Box<Status>>,
}

/// A moderation report filed by `account_id` about `target_account_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub uri: String,
    pub account_id: String,
    pub target_account_id: String,
    pub status_ids: Vec<String>,
    pub comment: String,
    /// The reporter asked for the report to reach the target's instance.
    pub forwarded: bool,
    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub account: Option<Box<Account>>,
    #[serde(default)]
    pub target_account: Option<Box<Account>>,
}

/// Which replies a list shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepliesPolicy {
    /// No replies at all.
    None,
    /// Replies to other members of the same list.
    List,
    /// Replies to accounts the list owner follows.
    Followed,
}

impl RepliesPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::List => "list",
            Self::Followed => "followed",
        }
    }
}

impl std::fmt::Display for RepliesPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RepliesPolicy {
    type Err = ParseRepliesPolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "list" => Ok(Self::List),
            "followed" => Ok(Self::Followed),
            _ => Err(ParseRepliesPolicyError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown replies policy string.
#[derive(Debug, Clone)]
pub struct ParseRepliesPolicyError(pub String);

impl std::fmt::Display for ParseRepliesPolicyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown replies policy: {}", self.0)
    }
}

impl std::error::Error for ParseRepliesPolicyError {}

/// A list of followed accounts owned by a local account.
///
/// Members are list entries pointing at the owner's follows. A status
/// eligible for an exclusive list is kept off the owner's home timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct List {
    pub id: String,
    pub account_id: String,
    pub title: String,
    pub replies_policy: RepliesPolicy,
    pub exclusive: bool,
}
