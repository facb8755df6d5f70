//! Notification, conversation, and filter models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kinds of notification delivered to local accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationType {
    #[serde(rename = "follow")]
    Follow,
    #[serde(rename = "follow_request")]
    FollowRequest,
    #[serde(rename = "mention")]
    Mention,
    #[serde(rename = "reblog")]
    Reblog,
    #[serde(rename = "favourite")]
    Favourite,
    #[serde(rename = "poll")]
    Poll,
    /// A followed account with notify enabled posted.
    #[serde(rename = "status")]
    Status,
    /// A report was filed with this instance.
    #[serde(rename = "admin.report")]
    AdminReport,
}

impl NotificationType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Follow => "follow",
            Self::FollowRequest => "follow_request",
            Self::Mention => "mention",
            Self::Reblog => "reblog",
            Self::Favourite => "favourite",
            Self::Poll => "poll",
            Self::Status => "status",
            Self::AdminReport => "admin.report",
        }
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NotificationType {
    type Err = ParseNotificationTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "follow" => Ok(Self::Follow),
            "follow_request" => Ok(Self::FollowRequest),
            "mention" => Ok(Self::Mention),
            "reblog" => Ok(Self::Reblog),
            "favourite" => Ok(Self::Favourite),
            "poll" => Ok(Self::Poll),
            "status" => Ok(Self::Status),
            "admin.report" => Ok(Self::AdminReport),
            _ => Err(ParseNotificationTypeError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown notification type string.
#[derive(Debug, Clone)]
pub struct ParseNotificationTypeError(pub String);

impl std::fmt::Display for ParseNotificationTypeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown notification type: {}", self.0)
    }
}

impl std::error::Error for ParseNotificationTypeError {}

/// A persisted notification.
///
/// `(notification_type, target_account_id, origin_account_id, status_id)`
/// is unique. `status_id` is empty when the notification is not about a
/// status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub notification_type: NotificationType,
    pub target_account_id: String,
    pub origin_account_id: String,
    pub status_id: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// A direct-message thread as seen by one local participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub account_id: String,
    pub thread_id: String,
    pub last_status_id: String,
    /// Other participants, sorted.
    pub participant_ids: Vec<String>,
    pub read: bool,
    pub updated_at: DateTime<Utc>,
}

/// What a keyword filter does to a matching status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterAction {
    /// Show the status behind a warning.
    Warn,
    /// Drop the status from the viewer's streams.
    Hide,
}

/// A keyword filter owned by a local account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub id: String,
    pub account_id: String,
    pub phrase: String,
    pub action: FilterAction,
}

impl Filter {
    /// Case-insensitive substring match against status content.
    pub fn matches(&self, content: &str) -> bool {
        !self.phrase.is_empty() && content.to_lowercase().contains(&self.phrase.to_lowercase())
    }
}
