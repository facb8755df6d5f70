//! Default visibility rules backed by the store.

use std::sync::Arc;

use async_trait::async_trait;
use kestrel_db::Database;
use kestrel_types::{Account, Status, Visibility};

use crate::collab::VisibilityFilter;
use crate::WorkerError;

/// Visibility decisions from blocks, mutes, follows and mentions.
#[derive(Clone)]
pub struct StandardVisibility {
    db: Arc<dyn Database>,
}

impl StandardVisibility {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    async fn author_suspended(&self, status: &Status) -> Result<bool, WorkerError> {
        let author = match status.account.as_deref() {
            Some(author) => Some(author.clone()),
            None => self.db.get_account_by_id(&status.account_id).await?,
        };
        Ok(author.map_or(true, |a| a.is_suspended()))
    }

    fn mentions(status: &Status, account_id: &str) -> bool {
        status
            .mentions
            .iter()
            .any(|m| m.target_account_id == account_id)
    }

    /// Visibility of a single status, ignoring what it boosts.
    async fn own_visibility(&self, viewer: Option<&Account>, status: &Status) -> Result<bool, WorkerError> {
        if self.author_suspended(status).await? {
            return Ok(false);
        }

        let Some(viewer) = viewer else {
            return Ok(matches!(
                status.visibility,
                Visibility::Public | Visibility::Unlisted
            ));
        };
        if viewer.id == status.account_id {
            return Ok(true);
        }
        if self.db.is_either_blocked(&viewer.id, &status.account_id).await? {
            return Ok(false);
        }

        let visible = match status.visibility {
            Visibility::Public | Visibility::Unlisted => true,
            Visibility::FollowersOnly => {
                self.db.is_following(&viewer.id, &status.account_id).await?
                    || Self::mentions(status, &viewer.id)
            }
            Visibility::MutualsOnly => {
                (self.db.is_following(&viewer.id, &status.account_id).await?
                    && self.db.is_following(&status.account_id, &viewer.id).await?)
                    || Self::mentions(status, &viewer.id)
            }
            Visibility::Direct => Self::mentions(status, &viewer.id),
        };
        Ok(visible)
    }

    /// Replies only reach a home timeline when the viewer has a stake in
    /// the conversation.
    async fn reply_timelineable(&self, viewer: &Account, status: &Status) -> Result<bool, WorkerError> {
        let Some(parent_author) = status.in_reply_to_account_id.as_deref() else {
            return Ok(false);
        };
        if parent_author == viewer.id || parent_author == status.account_id {
            return Ok(true);
        }
        if Self::mentions(status, &viewer.id) {
            return Ok(true);
        }
        Ok(self.db.is_following(&viewer.id, parent_author).await?)
    }
}

#[async_trait]
impl VisibilityFilter for StandardVisibility {
    async fn status_home_timelineable(
        &self,
        viewer: &Account,
        status: &Status,
    ) -> Result<bool, WorkerError> {
        if !self.status_visible(Some(viewer), status).await? {
            return Ok(false);
        }
        if viewer.id == status.account_id {
            return Ok(true);
        }
        if self.db.is_muted(&viewer.id, &status.account_id).await? {
            return Ok(false);
        }

        if status.is_reply() && !self.reply_timelineable(viewer, status).await? {
            return Ok(false);
        }

        if let Some(boosted_author) = status.boost_of_account_id.as_deref() {
            if boosted_author != viewer.id && self.db.is_muted(&viewer.id, boosted_author).await? {
                return Ok(false);
            }
            if let Some(follow) = self.db.get_follow(&viewer.id, &status.account_id).await? {
                if !follow.show_reblogs {
                    return Ok(false);
                }
            }
            if let Some(boosted) = status.boost_of.as_deref() {
                if boosted.is_reply() && !self.reply_timelineable(viewer, boosted).await? {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    async fn status_visible(
        &self,
        viewer: Option<&Account>,
        status: &Status,
    ) -> Result<bool, WorkerError> {
        if !self.own_visibility(viewer, status).await? {
            return Ok(false);
        }
        if status.is_boost() {
            let boosted = match status.boost_of.as_deref() {
                Some(boosted) => Some(boosted.clone()),
                None => match status.boost_of_id.as_deref() {
                    Some(id) => self.db.get_status_by_id(id).await?,
                    None => None,
                },
            };
            return match boosted {
                Some(boosted) => self.own_visibility(viewer, &boosted).await,
                None => Ok(false),
            };
        }
        Ok(true)
    }
}
