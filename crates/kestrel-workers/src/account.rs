//! Default account collaborators: the store-backed dereferencer, follow
//! management for local accounts, and follower redirection.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use kestrel_db::Database;
use kestrel_types::{
    Account, ActivityVerb, ClientMessage, Follow, FollowRequest, ObjectType, Payload, Status,
};
use url::Url;

use crate::collab::{
    AccountProcessor, Dereferencer, FollowCreateRequest, FollowOutcome, FollowerRedirector,
};
use crate::queue::MessageQueue;
use crate::{ProcessingConfig, WorkerError};

/// Resolves objects that are already stored locally.
///
/// Remote fetching belongs to the federation transport; a refresh here
/// re-reads the stored copy.
#[derive(Clone)]
pub struct StoreDereferencer {
    db: Arc<dyn Database>,
}

impl StoreDereferencer {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Dereferencer for StoreDereferencer {
    async fn account(&self, uri: &Url, _refresh: bool) -> Result<Option<Account>, WorkerError> {
        Ok(self.db.get_account_by_uri(uri.as_str()).await?)
    }

    async fn status(&self, uri: &Url) -> Result<Option<Status>, WorkerError> {
        Ok(self.db.get_status_by_uri(uri.as_str()).await?)
    }
}

/// Creates and removes follows for local accounts, queueing the client
/// messages that notify and federate them.
pub struct LocalAccountProcessor {
    db: Arc<dyn Database>,
    config: ProcessingConfig,
    client_queue: Arc<MessageQueue<ClientMessage>>,
}

impl LocalAccountProcessor {
    pub fn new(
        db: Arc<dyn Database>,
        config: ProcessingConfig,
        client_queue: Arc<MessageQueue<ClientMessage>>,
    ) -> Self {
        Self {
            db,
            config,
            client_queue,
        }
    }

    fn follow_uri(&self, account: &Account, id: &str) -> String {
        format!("{}/users/{}/follow/{id}", self.config.base_url(), account.username)
    }

    async fn target(&self, target_id: &str) -> Result<Account, WorkerError> {
        self.db
            .get_account_by_id(target_id)
            .await?
            .ok_or_else(|| WorkerError::other(format!("account {target_id} not found")))
    }

    fn enqueue(&self, msg: ClientMessage) {
        if !self.client_queue.push(msg) {
            tracing::warn!("client queue closed, follow side effects dropped");
        }
    }
}

#[async_trait]
impl AccountProcessor for LocalAccountProcessor {
    async fn follow_create(
        &self,
        account: &Account,
        request: FollowCreateRequest,
    ) -> Result<FollowOutcome, WorkerError> {
        if account.id == request.target_account_id {
            return Err(WorkerError::other("account cannot follow itself"));
        }
        let target = self.target(&request.target_account_id).await?;
        if self.db.is_either_blocked(&account.id, &target.id).await? {
            return Err(WorkerError::other(format!(
                "block exists between {} and {}",
                account.id, target.id
            )));
        }

        if let Some(mut follow) = self.db.get_follow(&account.id, &target.id).await? {
            follow.show_reblogs = request.show_reblogs;
            follow.notify = request.notify;
            self.db.put_follow(&follow).await?;
            return Ok(FollowOutcome::Updated);
        }

        if let Some(mut pending) = self.db.get_follow_request(&account.id, &target.id).await? {
            pending.show_reblogs = request.show_reblogs;
            pending.notify = request.notify;
            self.db.put_follow_request(&pending).await?;
            return Ok(FollowOutcome::Requested);
        }

        let id = uuid::Uuid::new_v4().to_string();
        let follow_request = FollowRequest {
            uri: self.follow_uri(account, &id),
            id,
            account_id: account.id.clone(),
            target_account_id: target.id.clone(),
            show_reblogs: request.show_reblogs,
            notify: request.notify,
            created_at: Utc::now(),
            account: Some(Box::new(account.clone())),
            target_account: Some(Box::new(target.clone())),
        };
        self.db.put_follow_request(&follow_request).await?;

        self.enqueue(
            ClientMessage::new(
                ActivityVerb::Create,
                ObjectType::Follow,
                Payload::FollowRequest(follow_request),
                account.clone(),
            )
            .with_target(target),
        );
        Ok(FollowOutcome::Requested)
    }

    async fn follow_remove(
        &self,
        account: &Account,
        target_id: &str,
    ) -> Result<bool, WorkerError> {
        let target = self.target(target_id).await?;

        let mut undone: Vec<Follow> = Vec::new();
        if let Some(follow) = self.db.delete_follow(&account.id, target_id).await? {
            self.db.delete_list_entries_for_follow(&follow.id).await?;
            undone.push(follow);
        }
        if let Some(pending) = self.db.get_follow_request(&account.id, target_id).await? {
            if self.db.delete_follow_request(&account.id, target_id).await? {
                undone.push(pending.to_follow());
            }
        }

        let removed = !undone.is_empty();
        for mut follow in undone {
            follow.account = Some(Box::new(account.clone()));
            follow.target_account = Some(Box::new(target.clone()));
            self.enqueue(
                ClientMessage::new(
                    ActivityVerb::Undo,
                    ObjectType::Follow,
                    Payload::Follow(follow),
                    account.clone(),
                )
                .with_target(target.clone()),
            );
        }
        Ok(removed)
    }
}

/// Recreates each local follow of a moved account as a follow of its new
/// account.
pub struct AccountFollowerRedirector {
    db: Arc<dyn Database>,
    accounts: Arc<dyn AccountProcessor>,
}

impl AccountFollowerRedirector {
    pub fn new(db: Arc<dyn Database>, accounts: Arc<dyn AccountProcessor>) -> Self {
        Self { db, accounts }
    }
}

#[async_trait]
impl FollowerRedirector for AccountFollowerRedirector {
    async fn redirect_followers(&self, origin: &Account, target: &Account) -> bool {
        let followers = match self.db.get_account_local_followers(&origin.id).await {
            Ok(followers) => followers,
            Err(err) => {
                tracing::error!(origin = %origin.uri, error = %err, "fetching followers failed");
                return false;
            }
        };

        let mut all_ok = true;
        for follow in followers {
            let follower = match follow.account {
                Some(follower) => *follower,
                None => match self.db.get_account_by_id(&follow.account_id).await {
                    Ok(Some(follower)) => follower,
                    Ok(None) => continue,
                    Err(err) => {
                        tracing::error!(follow_id = %follow.id, error = %err, "loading follower failed");
                        all_ok = false;
                        continue;
                    }
                },
            };

            if follower.id != target.id {
                let request = FollowCreateRequest {
                    target_account_id: target.id.clone(),
                    show_reblogs: follow.show_reblogs,
                    notify: follow.notify,
                };
                if let Err(err) = self.accounts.follow_create(&follower, request).await {
                    tracing::error!(
                        follower = %follower.id,
                        target = %target.uri,
                        error = %err,
                        "creating redirected follow failed"
                    );
                    all_ok = false;
                    continue;
                }
            }

            if let Err(err) = self.accounts.follow_remove(&follower, &origin.id).await {
                tracing::error!(
                    follower = %follower.id,
                    origin = %origin.uri,
                    error = %err,
                    "removing old follow failed"
                );
                all_ok = false;
            }
        }
        all_ok
    }
}
