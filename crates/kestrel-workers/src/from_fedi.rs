//! Handlers for activities delivered by remote instances.
//!
//! Input is untrusted. An unknown verb/object pair is an error, and a
//! message must carry its model or an IRI that resolves to one.

use kestrel_types::{
    ActivityVerb as Verb, FediMessage, NotificationType, ObjectType as Object, Payload, PollVote,
    Status,
};
use url::Url;

use crate::processor::Processor;
use crate::{MultiError, WorkerError};

macro_rules! payload {
    ($msg:expr, $variant:ident) => {
        match &$msg.payload {
            Some(Payload::$variant(model)) => model,
            Some(other) => {
                return Err(WorkerError::UnexpectedPayload {
                    expected: stringify!($variant),
                    found: other.name(),
                    verb: $msg.verb,
                    object_type: $msg.object_type,
                })
            }
            None => {
                return Err(WorkerError::MissingModel {
                    verb: $msg.verb,
                    object_type: $msg.object_type,
                })
            }
        }
    };
}

impl Processor {
    pub async fn process_from_fedi(&self, msg: FediMessage) -> Result<(), WorkerError> {
        match (msg.verb, msg.object_type) {
            (Verb::Create, Object::Note) => {
                let status = self.resolve_status(&msg).await?;
                self.surface.timeline_and_notify(&status).await
            }
            (Verb::Create, Object::Question) => {
                self.fedi_create_poll_vote(payload!(msg, PollVote)).await
            }
            (Verb::Create, Object::Follow) => {
                let request = payload!(msg, FollowRequest);
                let target = self
                    .db
                    .get_account_by_id(&request.target_account_id)
                    .await?
                    .ok_or_else(|| {
                        WorkerError::other(format!(
                            "follow target {} not found",
                            request.target_account_id
                        ))
                    })?;
                if target.locked {
                    return self.surface.notify_follow_request(request).await;
                }
                let Some(mut follow) = self
                    .db
                    .accept_follow_request(&request.account_id, &target.id)
                    .await?
                else {
                    return Ok(());
                };
                follow.account = Some(Box::new(msg.origin.clone()));
                follow.target_account = Some(Box::new(target));

                let mut errs = MultiError::new();
                if let Err(err) = self.federate.accept_follow(&follow).await {
                    errs.push(err);
                }
                if let Err(err) = self.surface.notify_follow(&follow).await {
                    errs.push(err);
                }
                errs.combine()
            }
            (Verb::Create, Object::Like) => self.surface.notify_fave(payload!(msg, StatusFave)).await,
            (Verb::Create, Object::Announce) => {
                let boost = self.resolve_status(&msg).await?;
                self.timeline_and_notify_boost(&boost).await
            }
            (Verb::Create, Object::Block) => {
                let block = payload!(msg, Block);
                let (a, b) = (&block.account_id, &block.target_account_id);
                self.surface.wipe_timelines_between(a, b).await?;
                self.db.delete_follows_between(a, b).await?;
                self.db.delete_follow_requests_between(a, b).await?;
                Ok(())
            }
            (Verb::Create, Object::Flag) => self.surface.notify_report(payload!(msg, Report)).await,

            (Verb::Update, Object::Note | Object::Question) => {
                let status = self.resolve_status(&msg).await?;
                if status.poll.as_ref().is_some_and(|poll| poll.closing) {
                    self.surface.notify_poll_close(&status).await?;
                }
                self.surface.timeline_status_update(&status).await
            }
            (Verb::Update, Object::Profile) => {
                let account = payload!(msg, Account);
                if account.id != msg.origin.id {
                    return Err(WorkerError::other(format!(
                        "{} cannot update account {}",
                        msg.origin.uri, account.uri
                    )));
                }
                self.db.put_account(account).await?;
                Ok(())
            }

            (Verb::Accept, Object::Follow) => {
                let follow = payload!(msg, Follow);
                self.db
                    .accept_follow_request(&follow.account_id, &follow.target_account_id)
                    .await?;
                Ok(())
            }
            (Verb::Accept, Object::Like) => self.surface.notify_fave(payload!(msg, StatusFave)).await,
            (Verb::Accept, Object::Note) => {
                let reply = self.resolve_status(&msg).await?;
                self.surface.timeline_and_notify(&reply).await
            }
            (Verb::Accept, Object::Announce) => {
                let boost = self.resolve_status(&msg).await?;
                self.timeline_and_notify_boost(&boost).await
            }

            (Verb::Reject, Object::Follow) => {
                let request = payload!(msg, FollowRequest);
                let (account_id, target_id) = (&request.account_id, &request.target_account_id);
                self.db.delete_follow_request(account_id, target_id).await?;
                if let Some(follow) = self.db.delete_follow(account_id, target_id).await? {
                    self.db.delete_list_entries_for_follow(&follow.id).await?;
                }
                Ok(())
            }
            (Verb::Reject, Object::Like) => {
                let fave = payload!(msg, StatusFave);
                self.db.delete_fave_by_id(&fave.id).await?;
                self.db
                    .delete_notification(
                        NotificationType::Favourite,
                        &fave.target_account_id,
                        &fave.account_id,
                        &fave.status_id,
                    )
                    .await?;
                Ok(())
            }
            (Verb::Reject, Object::Note | Object::Announce) => {
                let status = self.resolve_status(&msg).await?;
                self.surface.wipe_status(&status).await
            }

            (Verb::Undo, Object::Follow) => {
                let follow = payload!(msg, Follow);
                let (account_id, target_id) = (&follow.account_id, &follow.target_account_id);
                if let Some(removed) = self.db.delete_follow(account_id, target_id).await? {
                    self.db.delete_list_entries_for_follow(&removed.id).await?;
                }
                self.db.delete_follow_request(account_id, target_id).await?;
                Ok(())
            }
            (Verb::Undo, Object::Like) => {
                let fave = payload!(msg, StatusFave);
                self.db.delete_fave_by_id(&fave.id).await?;
                self.db
                    .delete_notification(
                        NotificationType::Favourite,
                        &fave.target_account_id,
                        &fave.account_id,
                        &fave.status_id,
                    )
                    .await?;
                Ok(())
            }
            (Verb::Undo, Object::Block) => {
                self.db.delete_block_by_id(&payload!(msg, Block).id).await?;
                Ok(())
            }
            (Verb::Undo, Object::Announce) => {
                let boost = self.resolve_status(&msg).await?;
                self.surface.wipe_status(&boost).await
            }

            (Verb::Delete, Object::Note) => {
                let status = match self.try_resolve_status(&msg).await? {
                    Some(status) => status,
                    None => return Ok(()),
                };
                if status.account_id != msg.origin.id {
                    return Err(WorkerError::other(format!(
                        "{} cannot delete status {}",
                        msg.origin.uri, status.uri
                    )));
                }
                self.prune_object(&status.uri);
                self.surface.wipe_status(&status).await
            }
            (Verb::Delete, Object::Profile) => {
                let account = payload!(msg, Account);
                if account.id != msg.origin.id {
                    return Err(WorkerError::other(format!(
                        "{} cannot delete account {}",
                        msg.origin.uri, account.uri
                    )));
                }
                self.prune_account(&account.id);
                self.surface.wipe_account(account).await
            }

            (Verb::Move, Object::Profile) => {
                self.moves.process_move(payload!(msg, Move), &msg.origin).await
            }

            (verb, object_type) => Err(WorkerError::Unhandled { verb, object_type }),
        }
    }

    /// The status a message acts on, from its payload or its IRI. `None`
    /// when the IRI does not resolve.
    async fn try_resolve_status(&self, msg: &FediMessage) -> Result<Option<Status>, WorkerError> {
        match (&msg.payload, &msg.deref_iri) {
            (Some(Payload::Status(status)), _) => Ok(Some(status.clone())),
            (Some(other), _) => Err(WorkerError::UnexpectedPayload {
                expected: "Status",
                found: other.name(),
                verb: msg.verb,
                object_type: msg.object_type,
            }),
            (None, Some(iri)) => {
                let url = Url::parse(iri)?;
                Ok(self.dereferencer.status(&url).await?)
            }
            (None, None) => Err(WorkerError::MissingModel {
                verb: msg.verb,
                object_type: msg.object_type,
            }),
        }
    }

    /// Fans out a boost and notifies the boosted author. A fan-out failure
    /// does not skip the notification.
    async fn timeline_and_notify_boost(&self, boost: &Status) -> Result<(), WorkerError> {
        let mut errs = MultiError::new();
        if let Err(err) = self.surface.timeline_and_notify(boost).await {
            errs.push(err);
        }
        if let Err(err) = self.surface.notify_announce(boost).await {
            errs.push(err);
        }
        errs.combine()
    }

    async fn resolve_status(&self, msg: &FediMessage) -> Result<Status, WorkerError> {
        match self.try_resolve_status(msg).await? {
            Some(status) => Ok(self.db.populate_status(status).await?),
            None => Err(WorkerError::MissingModel {
                verb: msg.verb,
                object_type: msg.object_type,
            }),
        }
    }

    /// Stores a remote vote. A vote in a local poll federates the updated
    /// poll to everyone who received it.
    async fn fedi_create_poll_vote(&self, vote: &PollVote) -> Result<(), WorkerError> {
        self.db.put_poll_vote(vote).await?;

        let poll = match &vote.poll {
            Some(poll) => poll.clone(),
            None => self
                .db
                .get_poll(&vote.poll_id)
                .await?
                .ok_or_else(|| WorkerError::other(format!("poll {} not found", vote.poll_id)))?,
        };
        let Some(status) = self.db.get_status_by_id(&poll.status_id).await? else {
            return Ok(());
        };
        if !status.local {
            return Ok(());
        }
        let status = self.db.populate_status(status).await?;
        self.federate.update_status(&status).await
    }
}
