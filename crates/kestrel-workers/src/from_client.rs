//! Handlers for messages produced by local API actions.
//!
//! Producers are trusted: an unknown verb/object pair is ignored. Local
//! side effects that fail are logged and the federation step still runs,
//! so a timeline hiccup does not keep a post from leaving the instance.

use kestrel_types::{
    ActivityVerb as Verb, ClientMessage, FollowRequest, ObjectType as Object, Payload, PollVote,
    Status, StatusFave,
};

use crate::processor::Processor;
use crate::WorkerError;

macro_rules! payload {
    ($msg:expr, $variant:ident) => {
        match &$msg.payload {
            Payload::$variant(model) => model,
            other => {
                return Err(WorkerError::UnexpectedPayload {
                    expected: stringify!($variant),
                    found: other.name(),
                    verb: $msg.verb,
                    object_type: $msg.object_type,
                })
            }
        }
    };
}

/// Logs a failed local side effect and carries on.
fn log_local(result: Result<(), WorkerError>, what: &'static str) {
    if let Err(err) = result {
        tracing::error!(error = %err, "{what} failed");
    }
}

impl Processor {
    pub async fn process_from_client(&self, msg: ClientMessage) -> Result<(), WorkerError> {
        match (msg.verb, msg.object_type) {
            (Verb::Create, Object::Note) => self.client_create_status(payload!(msg, Status)).await,
            (Verb::Create, Object::Question) => {
                self.client_create_poll_vote(payload!(msg, PollVote)).await
            }
            (Verb::Create, Object::Follow) => {
                self.client_create_follow(payload!(msg, FollowRequest)).await
            }
            (Verb::Create, Object::Like) => self.client_create_fave(payload!(msg, StatusFave)).await,
            (Verb::Create, Object::Announce) => {
                self.client_create_announce(payload!(msg, Status)).await
            }
            (Verb::Create, Object::Block) => {
                let block = payload!(msg, Block);
                log_local(
                    self.surface
                        .wipe_timelines_between(&block.account_id, &block.target_account_id)
                        .await,
                    "wiping timelines after block",
                );
                self.federate.block(block).await
            }

            (Verb::Update, Object::Note) => self.client_update_status(payload!(msg, Status)).await,
            (Verb::Update, Object::Profile) => {
                self.federate.update_account(payload!(msg, Account)).await
            }

            (Verb::Accept, Object::Follow) => {
                let follow = payload!(msg, Follow);
                log_local(self.surface.notify_follow(follow).await, "follow notification");
                self.federate.accept_follow(follow).await
            }
            (Verb::Reject, Object::Follow) => {
                let request = payload!(msg, FollowRequest);
                self.federate.reject_follow(&request.to_follow()).await
            }

            (Verb::Undo, Object::Follow) => self.federate.undo_follow(payload!(msg, Follow)).await,
            (Verb::Undo, Object::Block) => self.federate.undo_block(payload!(msg, Block)).await,
            (Verb::Undo, Object::Like) => self.federate.undo_like(payload!(msg, StatusFave)).await,
            (Verb::Undo, Object::Announce) => {
                let boost = payload!(msg, Status);
                let boost = self.db.populate_status(boost.clone()).await?;
                log_local(self.surface.wipe_status(&boost).await, "wiping boost");
                self.federate.undo_announce(&boost).await
            }

            (Verb::Delete, Object::Note) => {
                let status = payload!(msg, Status);
                let status = self.db.populate_status(status.clone()).await?;
                self.prune_object(&status.uri);
                log_local(self.surface.wipe_status(&status).await, "wiping status");
                self.federate.delete_status(&status).await
            }
            (Verb::Delete, Object::Profile) => {
                let account = payload!(msg, Account);
                self.prune_account(&account.id);
                log_local(self.surface.wipe_account(account).await, "wiping account");
                self.federate.delete_account(account).await
            }

            (Verb::Flag, Object::Profile) => {
                let report = payload!(msg, Report);
                log_local(self.surface.notify_report(report).await, "report notification");
                self.federate.flag(report).await
            }

            (Verb::Move, Object::Profile) => {
                let mv = payload!(msg, Move);
                let stored = self.moves.apply_local_move(mv, &msg.origin).await?;
                self.federate.move_account(&stored, &msg.origin).await
            }

            (verb, object_type) => {
                tracing::debug!(
                    verb = verb.as_str(),
                    object_type = object_type.as_str(),
                    "ignoring client message"
                );
                Ok(())
            }
        }
    }

    async fn client_create_status(&self, status: &Status) -> Result<(), WorkerError> {
        log_local(
            self.surface.timeline_and_notify(status).await,
            "timelining new status",
        );
        self.federate.create_status(status).await
    }

    async fn client_update_status(&self, status: &Status) -> Result<(), WorkerError> {
        if status.poll.as_ref().is_some_and(|poll| poll.closing) {
            log_local(
                self.surface.notify_poll_close(status).await,
                "poll close notification",
            );
        }
        log_local(
            self.surface.timeline_status_update(status).await,
            "streaming status update",
        );
        self.federate.update_status(status).await
    }

    /// A vote in a local poll federates the refreshed poll; a vote in a
    /// remote poll goes to the poll author.
    async fn client_create_poll_vote(&self, vote: &PollVote) -> Result<(), WorkerError> {
        let poll = match &vote.poll {
            Some(poll) => poll.clone(),
            None => self
                .db
                .get_poll(&vote.poll_id)
                .await?
                .ok_or_else(|| WorkerError::other(format!("poll {} not found", vote.poll_id)))?,
        };
        let Some(status) = self.db.get_status_by_id(&poll.status_id).await? else {
            return Err(WorkerError::other(format!("status of poll {} not found", poll.id)));
        };
        if status.local {
            let status = self.db.populate_status(status).await?;
            self.federate.update_status(&status).await
        } else {
            self.federate.poll_vote(vote).await
        }
    }

    /// Local targets that do not review requests accept them immediately.
    async fn client_create_follow(&self, request: &FollowRequest) -> Result<(), WorkerError> {
        let target = match request.target_account.as_deref() {
            Some(target) => target.clone(),
            None => self
                .db
                .get_account_by_id(&request.target_account_id)
                .await?
                .ok_or_else(|| {
                    WorkerError::other(format!("account {} not found", request.target_account_id))
                })?,
        };

        if target.is_remote() {
            return self.federate.follow(&request.to_follow()).await;
        }
        if target.locked {
            return self.surface.notify_follow_request(request).await;
        }
        match self
            .db
            .accept_follow_request(&request.account_id, &request.target_account_id)
            .await?
        {
            Some(mut follow) => {
                follow.target_account = Some(Box::new(target));
                self.surface.notify_follow(&follow).await
            }
            None => Ok(()),
        }
    }

    async fn client_create_fave(&self, fave: &StatusFave) -> Result<(), WorkerError> {
        log_local(self.surface.notify_fave(fave).await, "fave notification");
        self.federate.like(fave).await
    }

    async fn client_create_announce(&self, boost: &Status) -> Result<(), WorkerError> {
        let boost = self.db.populate_status(boost.clone()).await?;
        log_local(
            self.surface.timeline_and_notify(&boost).await,
            "timelining boost",
        );
        log_local(
            self.surface.notify_announce(&boost).await,
            "boost notification",
        );
        self.federate.announce(&boost).await
    }
}
