//! Status, poll, mention, and tag models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Account;

/// Audience of a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Visible to everyone and listed on public timelines.
    Public,
    /// Visible to everyone but not listed on public timelines.
    Unlisted,
    /// Visible to followers of the author.
    FollowersOnly,
    /// Visible to accounts that follow and are followed by the author.
    MutualsOnly,
    /// Visible only to mentioned accounts.
    Direct,
}

impl Visibility {
    /// Returns the canonical string label for this visibility.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Unlisted => "unlisted",
            Self::FollowersOnly => "followers_only",
            Self::MutualsOnly => "mutuals_only",
            Self::Direct => "direct",
        }
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Visibility {
    type Err = ParseVisibilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Self::Public),
            "unlisted" => Ok(Self::Unlisted),
            "followers_only" => Ok(Self::FollowersOnly),
            "mutuals_only" => Ok(Self::MutualsOnly),
            "direct" => Ok(Self::Direct),
            _ => Err(ParseVisibilityError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown visibility string.
#[derive(Debug, Clone)]
pub struct ParseVisibilityError(pub String);

impl std::fmt::Display for ParseVisibilityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown visibility: {}", self.0)
    }
}

impl std::error::Error for ParseVisibilityError {}

/// A post, reply, or boost wrapper.
///
/// A boost is a status with `boost_of_id` set and no content of its own.
/// The `account`, `boost_of`, `in_reply_to_account`, `mentions`, `tags`
/// and `poll` fields are filled by the store's populate operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub id: String,
    pub uri: String,
    pub account_id: String,
    pub local: bool,
    pub federated: bool,
    pub visibility: Visibility,
    pub content: String,
    pub thread_id: String,
    pub in_reply_to_id: Option<String>,
    pub in_reply_to_uri: Option<String>,
    pub in_reply_to_account_id: Option<String>,
    pub boost_of_id: Option<String>,
    pub boost_of_account_id: Option<String>,
    pub poll_id: Option<String>,
    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub account: Option<Box<Account>>,
    #[serde(default)]
    pub boost_of: Option<Box<Status>>,
    #[serde(default)]
    pub in_reply_to_account: Option<Box<Account>>,
    #[serde(default)]
    pub mentions: Vec<Mention>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub poll: Option<Poll>,
}

impl Status {
    pub fn is_boost(&self) -> bool {
        self.boost_of_id.is_some()
    }

    /// A status is a reply when it names a parent, known locally or not.
    pub fn is_reply(&self) -> bool {
        self.in_reply_to_uri.is_some()
    }
}

/// A poll attached to a status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poll {
    pub id: String,
    pub status_id: String,
    pub options: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    /// Set by the producer when an update closes the poll. Not persisted.
    #[serde(skip)]
    pub closing: bool,
}

/// A vote cast in a poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollVote {
    pub id: String,
    pub poll_id: String,
    pub account_id: String,
    pub choices: Vec<u32>,
    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub account: Option<Box<Account>>,
    #[serde(default)]
    pub poll: Option<Poll>,
}

/// An account mentioned by a status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mention {
    pub id: String,
    pub status_id: String,
    pub origin_account_id: String,
    pub target_account_id: String,

    #[serde(default)]
    pub target_account: Option<Box<Account>>,
}

/// A hashtag. Only `useable` tags participate in tag-follow fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub useable: bool,
}
