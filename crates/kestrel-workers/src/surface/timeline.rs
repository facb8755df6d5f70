use std::collections::HashSet;

use kestrel_types::{Account, Filter, Follow, List, NotificationType, RepliesPolicy, Status, Visibility};

use super::Surface;
use crate::stream::StreamKey;
use crate::{MultiError, WorkerError};

/// Which timeline a status is being placed on.
enum Placement<'a> {
    Home,
    List(&'a List),
}

impl Placement<'_> {
    fn stream_key(&self) -> StreamKey {
        match self {
            Self::Home => StreamKey::Home,
            Self::List(list) => StreamKey::List(list.id.clone()),
        }
    }
}

/// Whether the fan-out ingests and streams an update, or only streams an
/// edit of a status already placed.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Create,
    Update,
}

impl Surface {
    /// Places a new status on the timelines of everyone who should see it
    /// and sends the notifications that go with it.
    ///
    /// Failures for one follower are collected and do not stop the rest.
    pub async fn timeline_and_notify(&self, status: &Status) -> Result<(), WorkerError> {
        let status = self.populated_status(status).await?;
        let follows = self.followers_with_self(&status).await?;

        let mut errs = MultiError::new();
        let home_timelined = self
            .fan_out_to_followers(&status, follows, Mode::Create, &mut errs)
            .await;
        self.fan_out_to_tag_followers(&status, &home_timelined, Mode::Create, &mut errs)
            .await;

        if let Err(err) = self.notify_mentions(&status).await {
            errs.push_context(format_args!("notifying mentions of {}", status.id), err);
        }
        if let Err(err) = self.update_conversations(&status).await {
            errs.push_context(format_args!("updating conversations for {}", status.id), err);
        }
        errs.combine()
    }

    /// Streams an edited status to everyone whose timelines hold it.
    pub async fn timeline_status_update(&self, status: &Status) -> Result<(), WorkerError> {
        let status = self.populated_status(status).await?;
        let follows = self.followers_with_self(&status).await?;

        let mut errs = MultiError::new();
        let home_timelined = self
            .fan_out_to_followers(&status, follows, Mode::Update, &mut errs)
            .await;
        self.fan_out_to_tag_followers(&status, &home_timelined, Mode::Update, &mut errs)
            .await;
        errs.combine()
    }

    /// Returns the ids of followers whose home timeline received the status.
    async fn fan_out_to_followers(
        &self,
        status: &Status,
        follows: Vec<Follow>,
        mode: Mode,
        errs: &mut MultiError,
    ) -> HashSet<String> {
        let mut home_timelined = HashSet::new();

        for follow in follows {
            let follower = match self.account(follow.account.as_deref(), &follow.account_id).await {
                Ok(follower) => follower,
                Err(err) => {
                    errs.push_context(format_args!("follower {}", follow.account_id), err);
                    continue;
                }
            };

            match self.visibility.status_home_timelineable(&follower, status).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) => {
                    errs.push_context(
                        format_args!("checking home timelineability of {} for {}", status.id, follower.id),
                        err,
                    );
                    continue;
                }
            }

            let filters = match self.db.get_account_filters(&follower.id).await {
                Ok(filters) => filters,
                Err(err) => {
                    errs.push_context(format_args!("filters of {}", follower.id), err);
                    continue;
                }
            };

            let (exclusive, list_timelined) = self
                .list_timeline_for_follow(status, &follow, &follower, &filters, mode, errs)
                .await;

            let mut home = false;
            if !exclusive {
                match self
                    .place(Placement::Home, &follower, status, &filters, mode)
                    .await
                {
                    Ok(placed) => home = placed,
                    Err(err) => {
                        errs.push_context(format_args!("home timeline of {}", follower.id), err);
                        continue;
                    }
                }
                if home {
                    home_timelined.insert(follower.id.clone());
                }
            }

            if mode == Mode::Update || !(home || list_timelined) {
                continue;
            }
            if !follow.notify || status.is_boost() || status.is_reply() {
                continue;
            }
            if let Err(err) = self
                .notify(
                    NotificationType::Status,
                    &follower,
                    &follow.target_account_id,
                    &status.id,
                )
                .await
            {
                errs.push_context(format_args!("new status notification for {}", follower.id), err);
            }
        }
        home_timelined
    }

    /// Places the status on each eligible list holding `follow`. Returns
    /// whether any of those lists is exclusive and whether any list
    /// timeline received the status.
    async fn list_timeline_for_follow(
        &self,
        status: &Status,
        follow: &Follow,
        follower: &Account,
        filters: &[Filter],
        mode: Mode,
        errs: &mut MultiError,
    ) -> (bool, bool) {
        if follow.id.is_empty() {
            return (false, false);
        }
        let lists = match self.db.get_lists_containing_follow(&follow.id).await {
            Ok(lists) => lists,
            Err(err) => {
                errs.push_context(format_args!("lists for follow {}", follow.id), err);
                return (false, false);
            }
        };
        let exclusive = lists.iter().any(|list| list.exclusive);

        let mut list_timelined = false;
        for list in &lists {
            match self.list_eligible(list, status).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) => {
                    errs.push_context(format_args!("list {} eligibility", list.id), err);
                    continue;
                }
            }
            match self
                .place(Placement::List(list), follower, status, filters, mode)
                .await
            {
                Ok(placed) => list_timelined |= placed,
                Err(err) => errs.push_context(format_args!("list timeline {}", list.id), err),
            }
        }
        (exclusive, list_timelined)
    }

    async fn list_eligible(&self, list: &List, status: &Status) -> Result<bool, WorkerError> {
        if !status.is_reply() {
            return Ok(true);
        }
        // Parent not known locally.
        if status.in_reply_to_id.is_none() {
            return Ok(false);
        }
        let Some(parent_author) = status.in_reply_to_account_id.as_deref() else {
            return Ok(false);
        };

        let eligible = match list.replies_policy {
            RepliesPolicy::None => false,
            RepliesPolicy::List => self.db.list_includes_account(&list.id, parent_author).await?,
            RepliesPolicy::Followed => self.db.is_following(&list.account_id, parent_author).await?,
        };
        Ok(eligible)
    }

    /// Home-timelines a public tagged status for accounts following one of
    /// its tags and not reached through the follow graph.
    async fn fan_out_to_tag_followers(
        &self,
        status: &Status,
        skip: &HashSet<String>,
        mode: Mode,
        errs: &mut MultiError,
    ) {
        let tagged = status.boost_of.as_deref().unwrap_or(status);
        if tagged.visibility != Visibility::Public {
            return;
        }
        let tag_ids: Vec<String> = tagged
            .tags
            .iter()
            .filter(|tag| tag.useable)
            .map(|tag| tag.id.clone())
            .collect();
        if tag_ids.is_empty() {
            return;
        }

        let account_ids = match self.db.get_account_ids_following_tags(tag_ids).await {
            Ok(ids) => ids,
            Err(err) => {
                errs.push_context(format_args!("tag followers of {}", tagged.id), err);
                return;
            }
        };

        for account_id in account_ids.into_iter().filter(|id| !skip.contains(id)) {
            if let Err(err) = self.place_for_tag_follower(&account_id, status, tagged, mode).await {
                errs.push_context(format_args!("tag follower {account_id}"), err);
            }
        }
    }

    async fn place_for_tag_follower(
        &self,
        account_id: &str,
        status: &Status,
        tagged: &Status,
        mode: Mode,
    ) -> Result<(), WorkerError> {
        let Some(account) = self.db.get_account_by_id(account_id).await? else {
            return Ok(());
        };
        if !self.visibility.status_visible(Some(&account), status).await? {
            return Ok(());
        }
        let filters = self.db.get_account_filters(&account.id).await?;
        self.place(Placement::Home, &account, tagged, &filters, mode)
            .await?;
        Ok(())
    }

    /// Ingests (or, for edits, only streams) `status` on one timeline.
    ///
    /// Returns false when the timeline already held it or the viewer's
    /// filters hide it.
    async fn place(
        &self,
        placement: Placement<'_>,
        viewer: &Account,
        status: &Status,
        filters: &[Filter],
        mode: Mode,
    ) -> Result<bool, WorkerError> {
        if mode == Mode::Create {
            let inserted = match placement {
                Placement::Home => self.db.ingest_home(&viewer.id, status).await?,
                Placement::List(list) => self.db.ingest_list(&list.id, status).await?,
            };
            if !inserted {
                return Ok(false);
            }
        }

        let Some(api_status) = self
            .converter
            .status_for_viewer(status, viewer, filters)
            .await?
        else {
            tracing::debug!(status_id = %status.id, viewer = %viewer.id, "status hidden by filter");
            return Ok(false);
        };

        let key = placement.stream_key();
        match mode {
            Mode::Create => self.stream.update(viewer, api_status, &key),
            Mode::Update => self.stream.status_update(viewer, api_status, &key),
        }
        Ok(true)
    }
}
