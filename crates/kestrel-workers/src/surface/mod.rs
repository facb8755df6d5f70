//! Local side effects of processed messages: timelines, notifications,
//! conversations and wipes.

mod conversation;
mod notify;
mod timeline;
mod wipe;

use std::sync::Arc;

use chrono::Utc;
use kestrel_db::Database;
use kestrel_types::{Account, Follow, Status};

use crate::collab::{StreamPusher, VisibilityFilter};
use crate::convert::Converter;
use crate::{ProcessingConfig, WorkerError};

pub struct Surface {
    config: ProcessingConfig,
    db: Arc<dyn Database>,
    visibility: Arc<dyn VisibilityFilter>,
    stream: Arc<dyn StreamPusher>,
    converter: Converter,
}

impl Surface {
    pub fn new(
        config: ProcessingConfig,
        db: Arc<dyn Database>,
        visibility: Arc<dyn VisibilityFilter>,
        stream: Arc<dyn StreamPusher>,
    ) -> Self {
        Self {
            converter: Converter::new(db.clone()),
            config,
            db,
            visibility,
            stream,
        }
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    async fn account(&self, populated: Option<&Account>, id: &str) -> Result<Account, WorkerError> {
        if let Some(account) = populated {
            return Ok(account.clone());
        }
        self.db
            .get_account_by_id(id)
            .await?
            .ok_or_else(|| WorkerError::other(format!("account {id} not found")))
    }

    async fn populated_status(&self, status: &Status) -> Result<Status, WorkerError> {
        let status = self.db.populate_status(status.clone()).await?;
        if status.account.is_none() {
            return Err(WorkerError::other(format!(
                "author {} of status {} not found",
                status.account_id, status.id
            )));
        }
        Ok(status)
    }

    /// Local followers of the author, plus the author itself when local so
    /// that its own posts reach its home timeline.
    async fn followers_with_self(&self, status: &Status) -> Result<Vec<Follow>, WorkerError> {
        let mut follows = self.db.get_account_local_followers(&status.account_id).await?;
        if let Some(author) = status.account.as_deref().filter(|a| a.is_local()) {
            follows.push(Follow {
                id: String::new(),
                uri: String::new(),
                account_id: author.id.clone(),
                target_account_id: author.id.clone(),
                show_reblogs: true,
                notify: false,
                created_at: Utc::now(),
                account: Some(Box::new(author.clone())),
                target_account: Some(Box::new(author.clone())),
            });
        }
        Ok(follows)
    }
}
