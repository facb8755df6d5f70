use chrono::Utc;
use kestrel_types::{
    Account, Follow, FollowRequest, Notification, NotificationType, Report, Status, StatusFave,
};

use super::Surface;
use crate::{MultiError, WorkerError};

impl Surface {
    /// Creates a notification for a local `target` unless one with the
    /// same key exists, then streams it.
    ///
    /// The existence check only saves a write. The storage key makes the
    /// insert itself conditional, so concurrent callers persist one row
    /// and only the inserting caller streams it.
    pub async fn notify(
        &self,
        notification_type: NotificationType,
        target: &Account,
        origin_id: &str,
        status_id: &str,
    ) -> Result<(), WorkerError> {
        if target.is_remote() {
            return Ok(());
        }
        if self
            .db
            .notification_exists(notification_type, &target.id, origin_id, status_id)
            .await?
        {
            return Ok(());
        }

        let notification = Notification {
            id: uuid::Uuid::new_v4().to_string(),
            notification_type,
            target_account_id: target.id.clone(),
            origin_account_id: origin_id.to_string(),
            status_id: status_id.to_string(),
            read: false,
            created_at: Utc::now(),
        };
        if !self.db.put_notification(&notification).await? {
            tracing::debug!(
                notification_type = notification_type.as_str(),
                target = %target.id,
                origin = origin_id,
                "notification already exists"
            );
            return Ok(());
        }

        let status = match status_id {
            "" => None,
            id => match self.db.get_status_by_id(id).await? {
                Some(status) => Some(self.db.populate_status(status).await?),
                None => None,
            },
        };
        if let Some(api) = self
            .converter
            .notification(&notification, target, status.as_ref())
            .await?
        {
            self.stream.notify(target, api);
        }
        Ok(())
    }

    pub async fn notify_mentions(&self, status: &Status) -> Result<(), WorkerError> {
        let mut errs = MultiError::new();
        for mention in &status.mentions {
            let target = match self
                .account(mention.target_account.as_deref(), &mention.target_account_id)
                .await
            {
                Ok(target) => target,
                Err(err) => {
                    errs.push(err);
                    continue;
                }
            };
            if target.is_remote() || target.id == status.account_id {
                continue;
            }
            match self.db.is_thread_muted(&status.thread_id, &target.id).await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(err) => {
                    errs.push(err.into());
                    continue;
                }
            }
            if let Err(err) = self
                .notify(NotificationType::Mention, &target, &status.account_id, &status.id)
                .await
            {
                errs.push_context(format_args!("mention of {}", target.id), err);
            }
        }
        errs.combine()
    }

    pub async fn notify_follow_request(&self, request: &FollowRequest) -> Result<(), WorkerError> {
        let target = self
            .account(request.target_account.as_deref(), &request.target_account_id)
            .await?;
        self.notify(NotificationType::FollowRequest, &target, &request.account_id, "")
            .await
    }

    /// Notifies the target of a new follow, replacing any notification of
    /// the request it was accepted from.
    pub async fn notify_follow(&self, follow: &Follow) -> Result<(), WorkerError> {
        let target = self
            .account(follow.target_account.as_deref(), &follow.target_account_id)
            .await?;
        if target.is_remote() {
            return Ok(());
        }
        self.db
            .delete_notification(NotificationType::FollowRequest, &target.id, &follow.account_id, "")
            .await?;
        self.notify(NotificationType::Follow, &target, &follow.account_id, "")
            .await
    }

    /// Whether `target` wants to hear about an interaction by `origin_id`
    /// with `status`.
    async fn notifyable(
        &self,
        origin_id: &str,
        target: &Account,
        status: &Status,
    ) -> Result<bool, WorkerError> {
        if target.id == origin_id || target.is_remote() {
            return Ok(false);
        }
        Ok(!self.db.is_thread_muted(&status.thread_id, &target.id).await?)
    }

    pub async fn notify_fave(&self, fave: &StatusFave) -> Result<(), WorkerError> {
        let target = self
            .account(fave.target_account.as_deref(), &fave.target_account_id)
            .await?;
        let status = match fave.status.as_deref() {
            Some(status) => status.clone(),
            None => self
                .db
                .get_status_by_id(&fave.status_id)
                .await?
                .ok_or_else(|| WorkerError::other(format!("status {} not found", fave.status_id)))?,
        };
        if !self.notifyable(&fave.account_id, &target, &status).await? {
            return Ok(());
        }
        self.notify(NotificationType::Favourite, &target, &fave.account_id, &fave.status_id)
            .await
    }

    /// Notifies the author of a boosted status. The notification points at
    /// the boost.
    pub async fn notify_announce(&self, boost: &Status) -> Result<(), WorkerError> {
        let Some(boosted) = boost.boost_of.as_deref() else {
            return Err(WorkerError::other(format!(
                "boost {} has no populated original",
                boost.id
            )));
        };
        let target = self
            .account(boosted.account.as_deref(), &boosted.account_id)
            .await?;
        if !self.notifyable(&boost.account_id, &target, boosted).await? {
            return Ok(());
        }
        self.notify(NotificationType::Reblog, &target, &boost.account_id, &boost.id)
            .await
    }

    /// Tells the poll author and local voters that a poll closed.
    pub async fn notify_poll_close(&self, status: &Status) -> Result<(), WorkerError> {
        let status = self.populated_status(status).await?;
        let Some(poll_id) = status.poll_id.as_deref() else {
            return Ok(());
        };
        let author = self.account(status.account.as_deref(), &status.account_id).await?;

        let mut errs = MultiError::new();
        if author.is_local() {
            if let Err(err) = self
                .notify(NotificationType::Poll, &author, &author.id, &status.id)
                .await
            {
                errs.push_context("poll author", err);
            }
        }

        for vote in self.db.get_poll_votes(poll_id).await? {
            let voter = match self.account(vote.account.as_deref(), &vote.account_id).await {
                Ok(voter) => voter,
                Err(err) => {
                    errs.push(err);
                    continue;
                }
            };
            if voter.is_remote() {
                continue;
            }
            if let Err(err) = self
                .notify(NotificationType::Poll, &voter, &author.id, &status.id)
                .await
            {
                errs.push_context(format_args!("poll voter {}", voter.id), err);
            }
        }
        errs.combine()
    }

    /// Notifies every moderator of a new report. The report id takes the
    /// status slot of the key so separate reports are not deduplicated.
    pub async fn notify_report(&self, report: &Report) -> Result<(), WorkerError> {
        let moderators = self.db.get_instance_moderators().await?;
        let mut errs = MultiError::new();
        for moderator in moderators {
            if moderator.id == report.account_id {
                continue;
            }
            if let Err(err) = self
                .notify(NotificationType::AdminReport, &moderator, &report.account_id, &report.id)
                .await
            {
                errs.push_context(format_args!("moderator {}", moderator.id), err);
            }
        }
        errs.combine()
    }
}
