//! Outbound federation decisions.
//!
//! Every method decides whether a local side effect has a remote audience
//! and, if so, rebuilds the activity from the domain model and hands it to
//! the [`FederatingActor`]. Skips are not errors.

use std::sync::Arc;

use chrono::Utc;
use kestrel_db::Database;
use kestrel_types::{
    Account, Block, Follow, Move, PollVote, Report, Status, StatusFave, PUBLIC_COLLECTION,
};
use url::Url;

use crate::activity::{self, Activity, ActivityKind, ActivityObject, Note};
use crate::collab::FederatingActor;
use crate::{ProcessingConfig, WorkerError};

pub struct Federate {
    actor: Arc<dyn FederatingActor>,
    db: Arc<dyn Database>,
    config: ProcessingConfig,
}

impl Federate {
    pub fn new(
        actor: Arc<dyn FederatingActor>,
        db: Arc<dyn Database>,
        config: ProcessingConfig,
    ) -> Self {
        Self { actor, db, config }
    }

    async fn send(&self, from: &Account, activity: Activity) -> Result<(), WorkerError> {
        let outbox = Url::parse(&from.outbox_uri)?;
        tracing::debug!(
            kind = activity.kind.as_str(),
            id = %activity.id,
            outbox = %outbox,
            "federating activity"
        );
        self.actor.send(&outbox, activity).await
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

    async fn status(&self, populated: Option<&Status>, id: &str) -> Result<Status, WorkerError> {
        if let Some(status) = populated {
            return Ok(status.clone());
        }
        self.db
            .get_status_by_id(id)
            .await?
            .ok_or_else(|| WorkerError::other(format!("status {id} not found")))
    }

    async fn follow_parties(&self, follow: &Follow) -> Result<(Account, Account), WorkerError> {
        let follower = self
            .account(follow.account.as_deref(), &follow.account_id)
            .await?;
        let target = self
            .account(follow.target_account.as_deref(), &follow.target_account_id)
            .await?;
        Ok((follower, target))
    }

    /// Only local, federated statuses leave this instance.
    async fn federating_author(&self, status: &Status) -> Result<Option<Account>, WorkerError> {
        if !status.local || !status.federated {
            tracing::debug!(status_id = %status.id, "status is local-only, not federating");
            return Ok(None);
        }
        let author = self
            .account(status.account.as_deref(), &status.account_id)
            .await?;
        Ok(author.is_local().then_some(author))
    }

    pub async fn create_status(&self, status: &Status) -> Result<(), WorkerError> {
        let Some(author) = self.federating_author(status).await? else {
            return Ok(());
        };
        let note = activity::note(status, &author);
        let create = Activity::new(
            ActivityKind::Create,
            format!("{}/activity", status.uri),
            author.uri.clone(),
            ActivityObject::Note(Box::new(note.clone())),
        )
        .to(note.to)
        .cc(note.cc)
        .published(status.created_at);
        self.send(&author, create).await
    }

    pub async fn update_status(&self, status: &Status) -> Result<(), WorkerError> {
        let Some(author) = self.federating_author(status).await? else {
            return Ok(());
        };
        let note = activity::note(status, &author);
        let update = Activity::new(
            ActivityKind::Update,
            format!("{}#updates/{}", status.uri, Utc::now().timestamp()),
            author.uri.clone(),
            ActivityObject::Note(Box::new(note.clone())),
        )
        .to(note.to)
        .cc(note.cc);
        self.send(&author, update).await
    }

    pub async fn delete_status(&self, status: &Status) -> Result<(), WorkerError> {
        let Some(author) = self.federating_author(status).await? else {
            return Ok(());
        };
        let (to, cc) = activity::status_addressing(status, &author);
        let delete = Activity::new(
            ActivityKind::Delete,
            format!("{}#delete", status.uri),
            author.uri.clone(),
            ActivityObject::Iri(status.uri.clone()),
        )
        .to(to)
        .cc(cc);
        self.send(&author, delete).await
    }

    /// Returns the parties when the follower is local and the target is not.
    async fn outgoing_follow(&self, follow: &Follow) -> Result<Option<(Account, Account)>, WorkerError> {
        let (follower, target) = self.follow_parties(follow).await?;
        if follower.is_remote() || target.is_local() {
            tracing::debug!(follow_id = %follow.id, "follow has no remote recipient");
            return Ok(None);
        }
        Ok(Some((follower, target)))
    }

    pub async fn follow(&self, follow: &Follow) -> Result<(), WorkerError> {
        let Some((follower, target)) = self.outgoing_follow(follow).await? else {
            return Ok(());
        };
        self.send(&follower, activity::follow(follow, &follower, &target))
            .await
    }

    pub async fn undo_follow(&self, follow: &Follow) -> Result<(), WorkerError> {
        let Some((follower, target)) = self.outgoing_follow(follow).await? else {
            return Ok(());
        };
        let undo = activity::wrap(
            ActivityKind::Undo,
            format!("{}#undo", follow.uri),
            &follower,
            activity::follow(follow, &follower, &target),
            vec![target.uri.clone()],
        );
        self.send(&follower, undo).await
    }

    /// Accept or Reject of a remote follow aimed at a local account.
    async fn answer_follow(&self, follow: &Follow, kind: ActivityKind) -> Result<(), WorkerError> {
        let (follower, target) = self.follow_parties(follow).await?;
        if follower.is_local() || target.is_remote() {
            tracing::debug!(follow_id = %follow.id, "follow answer has no remote recipient");
            return Ok(());
        }
        let verb = match kind {
            ActivityKind::Accept => "accept",
            _ => "reject",
        };
        let answer = activity::wrap(
            kind,
            format!(
                "{}/users/{}/{verb}/{}",
                self.config.base_url(),
                target.username,
                follow.id
            ),
            &target,
            activity::follow(follow, &follower, &target),
            vec![follower.uri.clone()],
        );
        self.send(&target, answer).await
    }

    pub async fn accept_follow(&self, follow: &Follow) -> Result<(), WorkerError> {
        self.answer_follow(follow, ActivityKind::Accept).await
    }

    pub async fn reject_follow(&self, follow: &Follow) -> Result<(), WorkerError> {
        self.answer_follow(follow, ActivityKind::Reject).await
    }

    async fn outgoing_like(
        &self,
        fave: &StatusFave,
    ) -> Result<Option<(Account, Status, Account)>, WorkerError> {
        let liker = self.account(fave.account.as_deref(), &fave.account_id).await?;
        let author = self
            .account(fave.target_account.as_deref(), &fave.target_account_id)
            .await?;
        if liker.is_remote() || author.is_local() {
            tracing::debug!(fave_id = %fave.id, "fave has no remote recipient");
            return Ok(None);
        }
        let status = self.status(fave.status.as_deref(), &fave.status_id).await?;
        Ok(Some((liker, status, author)))
    }

    pub async fn like(&self, fave: &StatusFave) -> Result<(), WorkerError> {
        let Some((liker, status, author)) = self.outgoing_like(fave).await? else {
            return Ok(());
        };
        self.send(&liker, activity::like(fave, &liker, &status, &author))
            .await
    }

    pub async fn undo_like(&self, fave: &StatusFave) -> Result<(), WorkerError> {
        let Some((liker, status, author)) = self.outgoing_like(fave).await? else {
            return Ok(());
        };
        let undo = activity::wrap(
            ActivityKind::Undo,
            format!("{}#undo", fave.uri),
            &liker,
            activity::like(fave, &liker, &status, &author),
            vec![author.uri.clone()],
        );
        self.send(&liker, undo).await
    }

    async fn outgoing_announce(
        &self,
        boost: &Status,
    ) -> Result<Option<(Account, Status, Account)>, WorkerError> {
        let Some(booster) = self.federating_author(boost).await? else {
            return Ok(None);
        };
        let Some(boost_of_id) = boost.boost_of_id.as_deref() else {
            return Err(WorkerError::other(format!("status {} is not a boost", boost.id)));
        };
        let boosted = self.status(boost.boost_of.as_deref(), boost_of_id).await?;
        let boosted_author = self
            .account(boosted.account.as_deref(), &boosted.account_id)
            .await?;
        Ok(Some((booster, boosted, boosted_author)))
    }

    pub async fn announce(&self, boost: &Status) -> Result<(), WorkerError> {
        let Some((booster, boosted, author)) = self.outgoing_announce(boost).await? else {
            return Ok(());
        };
        self.send(&booster, activity::announce(boost, &booster, &boosted, &author))
            .await
    }

    pub async fn undo_announce(&self, boost: &Status) -> Result<(), WorkerError> {
        let Some((booster, boosted, author)) = self.outgoing_announce(boost).await? else {
            return Ok(());
        };
        let announce = activity::announce(boost, &booster, &boosted, &author);
        let (to, cc) = (announce.to.clone(), announce.cc.clone());
        let undo = activity::wrap(
            ActivityKind::Undo,
            format!("{}#undo", boost.uri),
            &booster,
            announce,
            to,
        )
        .cc(cc);
        self.send(&booster, undo).await
    }

    async fn outgoing_block(&self, block: &Block) -> Result<Option<(Account, Account)>, WorkerError> {
        let blocker = self.account(block.account.as_deref(), &block.account_id).await?;
        let target = self
            .account(block.target_account.as_deref(), &block.target_account_id)
            .await?;
        if blocker.is_remote() || target.is_local() {
            tracing::debug!(block_id = %block.id, "block has no remote recipient");
            return Ok(None);
        }
        Ok(Some((blocker, target)))
    }

    pub async fn block(&self, block: &Block) -> Result<(), WorkerError> {
        let Some((blocker, target)) = self.outgoing_block(block).await? else {
            return Ok(());
        };
        self.send(&blocker, activity::block(block, &blocker, &target))
            .await
    }

    pub async fn undo_block(&self, block: &Block) -> Result<(), WorkerError> {
        let Some((blocker, target)) = self.outgoing_block(block).await? else {
            return Ok(());
        };
        let undo = activity::wrap(
            ActivityKind::Undo,
            format!("{}#undo", block.uri),
            &blocker,
            activity::block(block, &blocker, &target),
            vec![target.uri.clone()],
        );
        self.send(&blocker, undo).await
    }

    pub async fn update_account(&self, account: &Account) -> Result<(), WorkerError> {
        if account.is_remote() {
            return Ok(());
        }
        let update = Activity::new(
            ActivityKind::Update,
            format!("{}#updates/{}", account.uri, Utc::now().timestamp()),
            account.uri.clone(),
            ActivityObject::Person(Box::new(activity::person(account))),
        )
        .to(vec![account.followers_uri.clone()])
        .cc(vec![PUBLIC_COLLECTION.to_string()]);
        self.send(account, update).await
    }

    pub async fn delete_account(&self, account: &Account) -> Result<(), WorkerError> {
        if account.is_remote() {
            return Ok(());
        }
        let delete = Activity::new(
            ActivityKind::Delete,
            format!("{}#delete", account.uri),
            account.uri.clone(),
            ActivityObject::Iri(account.uri.clone()),
        )
        .to(vec![account.followers_uri.clone()])
        .cc(vec![PUBLIC_COLLECTION.to_string()]);
        self.send(account, delete).await
    }

    /// Forwards a report to the reported account's instance. The Flag is
    /// sent by the instance actor so the reporter stays anonymous.
    pub async fn flag(&self, report: &Report) -> Result<(), WorkerError> {
        if !report.forwarded {
            tracing::debug!(report_id = %report.id, "report not marked for forwarding");
            return Ok(());
        }
        let target = self
            .account(report.target_account.as_deref(), &report.target_account_id)
            .await?;
        if target.is_local() {
            return Ok(());
        }
        let instance = self
            .db
            .get_instance_account(&self.config.host)
            .await?
            .ok_or_else(|| WorkerError::other("instance account not found"))?;

        let mut status_uris = Vec::with_capacity(report.status_ids.len());
        for id in &report.status_ids {
            if let Some(status) = self.db.get_status_by_id(id).await? {
                status_uris.push(status.uri);
            }
        }
        self.send(&instance, activity::flag(report, &instance, &target, status_uris))
            .await
    }

    pub async fn move_account(&self, mv: &Move, origin: &Account) -> Result<(), WorkerError> {
        if origin.is_remote() {
            return Ok(());
        }
        self.send(origin, activity::move_account(mv, origin)).await
    }

    /// Sends a local account's vote to the remote poll author, one `Create`
    /// per chosen option.
    pub async fn poll_vote(&self, vote: &PollVote) -> Result<(), WorkerError> {
        let voter = self.account(vote.account.as_deref(), &vote.account_id).await?;
        if voter.is_remote() {
            return Ok(());
        }
        let poll = match vote.poll.clone() {
            Some(poll) => poll,
            None => self
                .db
                .get_poll(&vote.poll_id)
                .await?
                .ok_or_else(|| WorkerError::other(format!("poll {} not found", vote.poll_id)))?,
        };
        let status = self.status(None, &poll.status_id).await?;
        let author = self
            .account(status.account.as_deref(), &status.account_id)
            .await?;
        if author.is_local() {
            return Ok(());
        }

        for choice in &vote.choices {
            let Some(option) = poll.options.get(*choice as usize) else {
                return Err(WorkerError::other(format!(
                    "choice {choice} out of range for poll {}",
                    poll.id
                )));
            };
            let id = format!(
                "{}/users/{}/votes/{}/{choice}",
                self.config.base_url(),
                voter.username,
                vote.id
            );
            let note = Note {
                id: id.clone(),
                kind: "Note".to_string(),
                attributed_to: voter.uri.clone(),
                content: String::new(),
                name: Some(option.clone()),
                in_reply_to: Some(status.uri.clone()),
                one_of: Vec::new(),
                closed: None,
                to: vec![author.uri.clone()],
                cc: Vec::new(),
                published: vote.created_at,
            };
            let create = Activity::new(
                ActivityKind::Create,
                format!("{id}/activity"),
                voter.uri.clone(),
                ActivityObject::Note(Box::new(note)),
            )
            .to(vec![author.uri.clone()]);
            self.send(&voter, create).await?;
        }
        Ok(())
    }
}
