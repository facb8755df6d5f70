//! Wiring of collaborators, queues and worker pools.

use std::sync::Arc;

use kestrel_db::Database;
use kestrel_types::{ClientMessage, FediMessage};
use tokio::task::JoinHandle;

use crate::account::{AccountFollowerRedirector, LocalAccountProcessor, StoreDereferencer};
use crate::collab::{
    AccountProcessor, Dereferencer, FederatingActor, FollowerRedirector, StreamPusher,
    VisibilityFilter,
};
use crate::federate::Federate;
use crate::keyed_lock::KeyedLocks;
use crate::moves::MoveCoordinator;
use crate::queue::{spawn_workers, MessageQueue};
use crate::surface::Surface;
use crate::visibility::StandardVisibility;
use crate::ProcessingConfig;

/// External components the processor talks to. Unset optional
/// collaborators fall back to the crate's store-backed implementations.
pub struct Collaborators {
    pub db: Arc<dyn Database>,
    pub actor: Arc<dyn FederatingActor>,
    pub stream: Arc<dyn StreamPusher>,
    pub visibility: Option<Arc<dyn VisibilityFilter>>,
    pub dereferencer: Option<Arc<dyn Dereferencer>>,
    pub accounts: Option<Arc<dyn AccountProcessor>>,
    pub redirector: Option<Arc<dyn FollowerRedirector>>,
}

impl Collaborators {
    pub fn new(
        db: Arc<dyn Database>,
        actor: Arc<dyn FederatingActor>,
        stream: Arc<dyn StreamPusher>,
    ) -> Self {
        Self {
            db,
            actor,
            stream,
            visibility: None,
            dereferencer: None,
            accounts: None,
            redirector: None,
        }
    }
}

/// Owns the two message queues and everything their handlers need.
pub struct Processor {
    pub(crate) config: ProcessingConfig,
    pub(crate) db: Arc<dyn Database>,
    pub(crate) surface: Surface,
    pub(crate) federate: Federate,
    pub(crate) moves: MoveCoordinator,
    pub(crate) dereferencer: Arc<dyn Dereferencer>,
    client_queue: Arc<MessageQueue<ClientMessage>>,
    fedi_queue: Arc<MessageQueue<FediMessage>>,
}

impl Processor {
    pub fn new(config: ProcessingConfig, collab: Collaborators) -> Arc<Self> {
        let Collaborators {
            db,
            actor,
            stream,
            visibility,
            dereferencer,
            accounts,
            redirector,
        } = collab;

        let client_queue = Arc::new(MessageQueue::new("client"));
        let fedi_queue = Arc::new(MessageQueue::new("federator"));

        let visibility: Arc<dyn VisibilityFilter> = match visibility {
            Some(visibility) => visibility,
            None => Arc::new(StandardVisibility::new(db.clone())),
        };
        let dereferencer: Arc<dyn Dereferencer> = match dereferencer {
            Some(dereferencer) => dereferencer,
            None => Arc::new(StoreDereferencer::new(db.clone())),
        };
        let redirector: Arc<dyn FollowerRedirector> = match redirector {
            Some(redirector) => redirector,
            None => {
                let accounts: Arc<dyn AccountProcessor> = match accounts {
                    Some(accounts) => accounts,
                    None => Arc::new(LocalAccountProcessor::new(
                        db.clone(),
                        config.clone(),
                        client_queue.clone(),
                    )),
                };
                Arc::new(AccountFollowerRedirector::new(db.clone(), accounts))
            }
        };

        Arc::new(Self {
            surface: Surface::new(config.clone(), db.clone(), visibility, stream),
            federate: Federate::new(actor, db.clone(), config.clone()),
            moves: MoveCoordinator::new(
                config.clone(),
                db.clone(),
                dereferencer.clone(),
                redirector,
                KeyedLocks::new(),
            ),
            config,
            db,
            dereferencer,
            client_queue,
            fedi_queue,
        })
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn federate(&self) -> &Federate {
        &self.federate
    }

    pub fn moves(&self) -> &MoveCoordinator {
        &self.moves
    }

    pub fn client_queue(&self) -> &Arc<MessageQueue<ClientMessage>> {
        &self.client_queue
    }

    pub fn fedi_queue(&self) -> &Arc<MessageQueue<FediMessage>> {
        &self.fedi_queue
    }

    /// Queues a message from a local API handler. Never blocks.
    pub fn enqueue_client(&self, msg: ClientMessage) -> bool {
        self.client_queue.push(msg)
    }

    /// Queues a message from the federation inbox. Never blocks.
    pub fn enqueue_fedi(&self, msg: FediMessage) -> bool {
        self.fedi_queue.push(msg)
    }

    /// Drops queued messages about an object that no longer exists.
    pub(crate) fn prune_object(&self, uri: &str) {
        let removed = self
            .client_queue
            .delete_matching(|msg| msg.target_uri() == Some(uri))
            + self
                .fedi_queue
                .delete_matching(|msg| msg.target_uri() == Some(uri));
        if removed > 0 {
            tracing::debug!(uri, removed, "pruned queued messages");
        }
    }

    /// Drops queued messages sent by or aimed at a deleted account.
    pub(crate) fn prune_account(&self, account_id: &str) {
        let removed = self
            .client_queue
            .delete_matching(|msg| msg.involves_account(account_id))
            + self
                .fedi_queue
                .delete_matching(|msg| msg.involves_account(account_id));
        if removed > 0 {
            tracing::debug!(account_id, removed, "pruned queued messages");
        }
    }

    /// Starts both worker pools. Failed messages are logged and dropped.
    pub fn start_workers(
        self: &Arc<Self>,
        client_workers: usize,
        fedi_workers: usize,
    ) -> Vec<JoinHandle<()>> {
        let mut handles = spawn_workers(self.client_queue.clone(), client_workers, {
            let processor = self.clone();
            move |msg: ClientMessage| {
                let processor = processor.clone();
                async move {
                    let (verb, object_type) = (msg.verb, msg.object_type);
                    if let Err(err) = processor.process_from_client(msg).await {
                        tracing::error!(
                            verb = verb.as_str(),
                            object_type = object_type.as_str(),
                            error = %err,
                            "client message failed"
                        );
                    }
                }
            }
        });

        handles.extend(spawn_workers(self.fedi_queue.clone(), fedi_workers, {
            let processor = self.clone();
            move |msg: FediMessage| {
                let processor = processor.clone();
                async move {
                    let (verb, object_type) = (msg.verb, msg.object_type);
                    if let Err(err) = processor.process_from_fedi(msg).await {
                        tracing::error!(
                            verb = verb.as_str(),
                            object_type = object_type.as_str(),
                            error = %err,
                            "federated message failed"
                        );
                    }
                }
            }
        }));
        handles
    }

    /// Stops accepting messages. Workers exit once the queues drain.
    pub fn shutdown(&self) {
        self.client_queue.close();
        self.fedi_queue.close();
    }
}
