//! Per-viewer API representations pushed to live streams.
//!
//! Conversion is where keyword filters and account mutes apply: a status
//! the viewer hides by filter, or whose author (or boosted author) the
//! viewer muted, converts to `None`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use kestrel_db::Database;
use kestrel_types::{Account, Conversation, Filter, FilterAction, Notification, Status};
use serde::Serialize;

use crate::WorkerError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiStatus {
    pub id: String,
    pub uri: String,
    pub account_id: String,
    pub content: String,
    pub visibility: String,
    pub in_reply_to_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub reblog: Option<Box<ApiStatus>>,
    /// Phrases of matching `warn` filters.
    pub filtered: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiNotification {
    pub id: String,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub account_id: String,
    pub status: Option<ApiStatus>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiConversation {
    pub id: String,
    pub account_ids: Vec<String>,
    pub last_status: Option<ApiStatus>,
    pub unread: bool,
}

/// Builds API views of statuses and notifications for one viewer.
#[derive(Clone)]
pub struct Converter {
    db: Arc<dyn Database>,
}

impl Converter {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Converts `status` for `viewer`. Returns `None` if the viewer hides it.
    pub async fn status_for_viewer(
        &self,
        status: &Status,
        viewer: &Account,
        filters: &[Filter],
    ) -> Result<Option<ApiStatus>, WorkerError> {
        if self.author_muted(status, viewer).await? {
            return Ok(None);
        }

        let mut filtered = Vec::new();
        let mut texts = vec![status.content.as_str()];
        if let Some(boosted) = status.boost_of.as_deref() {
            texts.push(boosted.content.as_str());
        }
        for filter in filters {
            if !texts.iter().any(|text| filter.matches(text)) {
                continue;
            }
            match filter.action {
                FilterAction::Hide => return Ok(None),
                FilterAction::Warn => filtered.push(filter.phrase.clone()),
            }
        }

        let reblog = status
            .boost_of
            .as_deref()
            .map(|boosted| Box::new(plain_status(boosted, Vec::new())));
        let mut api = plain_status(status, filtered);
        api.reblog = reblog;
        Ok(Some(api))
    }

    async fn author_muted(&self, status: &Status, viewer: &Account) -> Result<bool, WorkerError> {
        if status.account_id != viewer.id && self.db.is_muted(&viewer.id, &status.account_id).await? {
            return Ok(true);
        }
        if let Some(boosted_author) = status.boost_of_account_id.as_deref() {
            if boosted_author != viewer.id && self.db.is_muted(&viewer.id, boosted_author).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Converts a notification for its target. `None` when the attached
    /// status is hidden from the target.
    pub async fn notification(
        &self,
        notification: &Notification,
        target: &Account,
        status: Option<&Status>,
    ) -> Result<Option<ApiNotification>, WorkerError> {
        let status = match status {
            Some(status) => {
                let filters = self.db.get_account_filters(&target.id).await?;
                match self.status_for_viewer(status, target, &filters).await? {
                    Some(api) => Some(api),
                    None => return Ok(None),
                }
            }
            None => None,
        };

        Ok(Some(ApiNotification {
            id: notification.id.clone(),
            notification_type: notification.notification_type.as_str().to_string(),
            account_id: notification.origin_account_id.clone(),
            status,
            created_at: notification.created_at,
        }))
    }

    pub async fn conversation(
        &self,
        conversation: &Conversation,
        viewer: &Account,
        last_status: &Status,
    ) -> Result<ApiConversation, WorkerError> {
        let filters = self.db.get_account_filters(&viewer.id).await?;
        Ok(ApiConversation {
            id: conversation.id.clone(),
            account_ids: conversation.participant_ids.clone(),
            last_status: self
                .status_for_viewer(last_status, viewer, &filters)
                .await?,
            unread: !conversation.read,
        })
    }
}

fn plain_status(status: &Status, filtered: Vec<String>) -> ApiStatus {
    ApiStatus {
        id: status.id.clone(),
        uri: status.uri.clone(),
        account_id: status.account_id.clone(),
        content: status.content.clone(),
        visibility: status.visibility.as_str().to_string(),
        in_reply_to_id: status.in_reply_to_id.clone(),
        created_at: status.created_at,
        reblog: None,
        filtered,
    }
}
