//! Event processing for kestrel.
//!
//! Two queues feed this crate: client messages produced by local user
//! actions and federation messages delivered by remote instances. A pool of
//! workers drains each queue and dispatches every message on its
//! (verb, object type) pair to a handler, which applies the side effects:
//! timeline fan-out, notifications, conversations, cleanup on delete,
//! outgoing federation and account moves.
//!
//! # Design decisions
//!
//! - **Collaborators behind traits**: visibility, federation transport,
//!   streaming, dereferencing, follow management and follower redirection
//!   are `Arc<dyn Trait>` seams. [`Processor::new`] fills in store-backed
//!   defaults for any left unset, so tests can swap in recorders.
//! - **Client messages are trusted**: an unknown pair is logged and
//!   ignored. Federation messages are not, and an unknown pair is
//!   [`WorkerError::Unhandled`].
//! - **Fan-out collects errors**: one bad follower never stops delivery to
//!   the rest; failures are combined into a [`MultiError`].

pub mod account;
pub mod activity;
pub mod collab;
mod config;
pub mod convert;
mod error;
pub mod federate;
mod from_client;
mod from_fedi;
mod keyed_lock;
pub mod moves;
mod processor;
mod queue;
pub mod stream;
pub mod surface;
pub mod visibility;

pub use activity::{Activity, ActivityKind, ActivityObject};
pub use collab::{
    AccountProcessor, Dereferencer, FederatingActor, FollowCreateRequest, FollowOutcome,
    FollowerRedirector, StreamPusher, VisibilityFilter,
};
pub use config::ProcessingConfig;
pub use error::{MultiError, WorkerError};
pub use keyed_lock::{KeyedGuard, KeyedLocks};
pub use moves::MoveCoordinator;
pub use processor::{Collaborators, Processor};
pub use queue::{spawn_workers, MessageQueue};
pub use stream::{StreamEvent, StreamHub, StreamKey};
