//! Collaborator contracts consumed by the handlers.
//!
//! Each trait is a seam to a component outside the processing core. The
//! crate ships a default implementation of each except the federating
//! actor, whose transport lives in the server binary.

use async_trait::async_trait;
use kestrel_types::{Account, Status};
use url::Url;

use crate::activity::Activity;
use crate::convert::{ApiConversation, ApiNotification, ApiStatus};
use crate::stream::StreamKey;
use crate::WorkerError;

/// Decides who may see a status.
#[async_trait]
pub trait VisibilityFilter: Send + Sync {
    /// Whether `status` belongs on `viewer`'s home timeline. Considers
    /// blocks, mutes, visibility level, reply targets and the viewer's
    /// boost preference for the booster.
    async fn status_home_timelineable(
        &self,
        viewer: &Account,
        status: &Status,
    ) -> Result<bool, WorkerError>;

    /// Whether `viewer` may see `status` at all. `None` is an anonymous
    /// viewer.
    async fn status_visible(
        &self,
        viewer: Option<&Account>,
        status: &Status,
    ) -> Result<bool, WorkerError>;
}

/// Sends an activity from a local actor's outbox.
#[async_trait]
pub trait FederatingActor: Send + Sync {
    async fn send(&self, outbox: &Url, activity: Activity) -> Result<(), WorkerError>;
}

/// Pushes events to open client streams. Never fails: a push to an
/// account with no open stream is dropped.
pub trait StreamPusher: Send + Sync {
    fn update(&self, account: &Account, status: ApiStatus, stream: &StreamKey);
    fn status_update(&self, account: &Account, status: ApiStatus, stream: &StreamKey);
    fn notify(&self, account: &Account, notification: ApiNotification);
    /// Broadcasts removal of a status to every open stream.
    fn delete(&self, status_id: &str);
    fn conversation(&self, account: &Account, conversation: ApiConversation);
}

/// Parameters of a follow created on behalf of a local account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowCreateRequest {
    pub target_account_id: String,
    pub show_reblogs: bool,
    pub notify: bool,
}

/// Result of [`AccountProcessor::follow_create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    /// The follow already existed; its options were updated.
    Updated,
    /// A follow request was stored and queued for processing.
    Requested,
}

/// Follow management on behalf of local accounts.
#[async_trait]
pub trait AccountProcessor: Send + Sync {
    async fn follow_create(
        &self,
        account: &Account,
        request: FollowCreateRequest,
    ) -> Result<FollowOutcome, WorkerError>;

    /// Removes a follow and any pending request. Returns true if anything
    /// was removed.
    async fn follow_remove(&self, account: &Account, target_id: &str)
        -> Result<bool, WorkerError>;
}

/// Resolves remote objects by IRI.
#[async_trait]
pub trait Dereferencer: Send + Sync {
    /// Fetches an account. `refresh` asks for the freshest copy available.
    async fn account(&self, uri: &Url, refresh: bool) -> Result<Option<Account>, WorkerError>;
    async fn status(&self, uri: &Url) -> Result<Option<Status>, WorkerError>;
}

/// Moves the local followers of one account onto another.
#[async_trait]
pub trait FollowerRedirector: Send + Sync {
    /// Returns true when every follower was redirected.
    async fn redirect_followers(&self, origin: &Account, target: &Account) -> bool;
}
