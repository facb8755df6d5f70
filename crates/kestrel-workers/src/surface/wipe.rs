use chrono::Utc;
use kestrel_types::{Account, Status};

use super::Surface;
use crate::{MultiError, WorkerError};

impl Surface {
    /// Removes a status and everything hanging off it: mentions,
    /// notifications, bookmarks, faves, boosts and timeline entries.
    /// Streams a delete for the status and for each boost of it.
    pub async fn wipe_status(&self, status: &Status) -> Result<(), WorkerError> {
        let mut errs = MultiError::new();
        let id = status.id.as_str();

        if let Err(err) = self.db.delete_status_mentions(id).await {
            errs.push_context("deleting mentions", err);
        }
        if let Err(err) = self.db.delete_status_notifications(id).await {
            errs.push_context("deleting notifications", err);
        }
        if let Err(err) = self.db.delete_status_bookmarks(id).await {
            errs.push_context("deleting bookmarks", err);
        }
        if let Err(err) = self.db.delete_status_faves(id).await {
            errs.push_context("deleting faves", err);
        }

        match self.db.get_status_boosts(id).await {
            Ok(boosts) => {
                for boost in boosts {
                    if let Err(err) = self.wipe_boost(&boost).await {
                        errs.push_context(format_args!("wiping boost {}", boost.id), err);
                    }
                }
            }
            Err(err) => errs.push_context("loading boosts", err),
        }

        match self.db.remove_status_from_timelines(id).await {
            Ok(_) => self.stream.delete(id),
            Err(err) => errs.push_context("removing from timelines", err),
        }
        if let Err(err) = self.db.delete_status_conversations(id).await {
            errs.push_context("deleting conversations", err);
        }
        if let Err(err) = self.db.delete_status(id).await {
            errs.push_context("deleting status", err);
        }

        errs.combine()
    }

    async fn wipe_boost(&self, boost: &Status) -> Result<(), WorkerError> {
        self.db.remove_status_from_timelines(&boost.id).await?;
        self.db.delete_status_notifications(&boost.id).await?;
        self.db.delete_status(&boost.id).await?;
        self.stream.delete(&boost.id);
        Ok(())
    }

    /// Clears each account's statuses from the other's timelines after a
    /// block.
    pub async fn wipe_timelines_between(&self, a: &str, b: &str) -> Result<(), WorkerError> {
        self.db.remove_author_from_owner_timelines(a, b).await?;
        self.db.remove_author_from_owner_timelines(b, a).await?;
        Ok(())
    }

    /// Deletes everything an account produced and suspends it.
    pub async fn wipe_account(&self, account: &Account) -> Result<(), WorkerError> {
        let mut errs = MultiError::new();

        for status_id in self.db.get_account_status_ids(&account.id).await? {
            match self.db.get_status_by_id(&status_id).await {
                Ok(Some(status)) => {
                    if let Err(err) = self.wipe_status(&status).await {
                        errs.push(err);
                    }
                }
                Ok(None) => {}
                Err(err) => errs.push_context(format_args!("loading status {status_id}"), err),
            }
        }

        if let Err(err) = self.db.delete_account_follows(&account.id).await {
            errs.push_context("deleting follows", err);
        }
        if let Err(err) = self.db.delete_account_follow_requests(&account.id).await {
            errs.push_context("deleting follow requests", err);
        }
        if let Err(err) = self.db.delete_account_blocks(&account.id).await {
            errs.push_context("deleting blocks", err);
        }
        if let Err(err) = self.db.delete_account_notifications(&account.id).await {
            errs.push_context("deleting notifications", err);
        }
        if let Err(err) = self.db.remove_account_from_timelines(&account.id).await {
            errs.push_context("removing from timelines", err);
        }
        if let Err(err) = self.db.suspend_account(&account.id, Utc::now()).await {
            errs.push_context("suspending", err);
        }

        tracing::info!(account = %account.uri, "account wiped");
        errs.combine()
    }
}
