//! Async store used by the worker pipeline.
//!
//! [`Database`] is the seam between event processing and persistence.
//! [`SqliteStore`] implements it over an r2d2 pool, running each query on
//! the blocking thread pool with `spawn_blocking`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kestrel_types::{
    Account, Block, Conversation, Filter, Follow, FollowRequest, List, Move, Notification,
    NotificationType, Poll, PollVote, Report, Status, StatusFave,
};
use rusqlite::Connection;

use crate::{
    accounts, follows, interactions, lists, moves, notifications, statuses, timelines, DbError,
    DbPool,
};

/// Storage operations needed by the event handlers.
///
/// Lookups return `Ok(None)` for missing rows; only storage failures are
/// errors.
#[async_trait]
pub trait Database: Send + Sync {
    // Accounts.
    async fn get_account_by_id(&self, id: &str) -> Result<Option<Account>, DbError>;
    async fn get_account_by_uri(&self, uri: &str) -> Result<Option<Account>, DbError>;
    async fn put_account(&self, account: &Account) -> Result<(), DbError>;
    async fn get_instance_account(&self, host: &str) -> Result<Option<Account>, DbError>;
    async fn get_instance_moderators(&self) -> Result<Vec<Account>, DbError>;
    async fn set_account_move_id(&self, account_id: &str, move_id: &str) -> Result<(), DbError>;
    async fn suspend_account(&self, account_id: &str, at: DateTime<Utc>) -> Result<(), DbError>;
    async fn is_domain_blocked(&self, domain: &str) -> Result<bool, DbError>;

    // Statuses.
    async fn get_status_by_id(&self, id: &str) -> Result<Option<Status>, DbError>;
    async fn get_status_by_uri(&self, uri: &str) -> Result<Option<Status>, DbError>;
    async fn put_status(&self, status: &Status) -> Result<(), DbError>;
    async fn update_status(&self, status: &Status) -> Result<(), DbError>;
    async fn populate_status(&self, status: Status) -> Result<Status, DbError>;
    async fn get_status_boosts(&self, status_id: &str) -> Result<Vec<Status>, DbError>;
    async fn get_account_status_ids(&self, account_id: &str) -> Result<Vec<String>, DbError>;
    async fn delete_status(&self, status_id: &str) -> Result<bool, DbError>;
    async fn delete_status_mentions(&self, status_id: &str) -> Result<usize, DbError>;
    async fn delete_status_bookmarks(&self, status_id: &str) -> Result<usize, DbError>;
    async fn is_thread_muted(&self, thread_id: &str, account_id: &str) -> Result<bool, DbError>;
    async fn get_poll(&self, poll_id: &str) -> Result<Option<Poll>, DbError>;
    async fn close_poll(&self, poll_id: &str, at: DateTime<Utc>) -> Result<bool, DbError>;
    async fn put_poll_vote(&self, vote: &PollVote) -> Result<(), DbError>;
    async fn get_poll_votes(&self, poll_id: &str) -> Result<Vec<PollVote>, DbError>;

    // Follows and follow requests.
    async fn get_follow(&self, account_id: &str, target_id: &str)
        -> Result<Option<Follow>, DbError>;
    async fn is_following(&self, account_id: &str, target_id: &str) -> Result<bool, DbError>;
    async fn put_follow(&self, follow: &Follow) -> Result<(), DbError>;
    async fn get_account_local_followers(&self, account_id: &str)
        -> Result<Vec<Follow>, DbError>;
    async fn get_account_follows(&self, account_id: &str) -> Result<Vec<Follow>, DbError>;
    async fn populate_follow(&self, follow: Follow) -> Result<Follow, DbError>;
    async fn delete_follow(
        &self,
        account_id: &str,
        target_id: &str,
    ) -> Result<Option<Follow>, DbError>;
    async fn delete_follow_by_id(&self, follow_id: &str) -> Result<bool, DbError>;
    async fn delete_follows_between(&self, a: &str, b: &str) -> Result<usize, DbError>;
    async fn delete_account_follows(&self, account_id: &str) -> Result<usize, DbError>;
    async fn put_follow_request(&self, request: &FollowRequest) -> Result<(), DbError>;
    async fn get_follow_request(
        &self,
        account_id: &str,
        target_id: &str,
    ) -> Result<Option<FollowRequest>, DbError>;
    async fn accept_follow_request(
        &self,
        account_id: &str,
        target_id: &str,
    ) -> Result<Option<Follow>, DbError>;
    async fn delete_follow_request(&self, account_id: &str, target_id: &str)
        -> Result<bool, DbError>;
    async fn delete_follow_requests_between(&self, a: &str, b: &str) -> Result<usize, DbError>;
    async fn delete_account_follow_requests(&self, account_id: &str) -> Result<usize, DbError>;

    // Blocks, mutes, faves, reports.
    async fn put_block(&self, block: &Block) -> Result<(), DbError>;
    async fn get_block(&self, account_id: &str, target_id: &str)
        -> Result<Option<Block>, DbError>;
    async fn delete_block_by_id(&self, block_id: &str) -> Result<bool, DbError>;
    async fn is_either_blocked(&self, a: &str, b: &str) -> Result<bool, DbError>;
    async fn delete_account_blocks(&self, account_id: &str) -> Result<usize, DbError>;
    async fn is_muted(&self, account_id: &str, target_id: &str) -> Result<bool, DbError>;
    async fn put_fave(&self, fave: &StatusFave) -> Result<(), DbError>;
    async fn get_fave_by_uri(&self, uri: &str) -> Result<Option<StatusFave>, DbError>;
    async fn delete_fave_by_id(&self, fave_id: &str) -> Result<bool, DbError>;
    async fn delete_status_faves(&self, status_id: &str) -> Result<usize, DbError>;
    async fn put_report(&self, report: &Report) -> Result<(), DbError>;

    // Lists and tags.
    async fn get_lists_containing_follow(&self, follow_id: &str) -> Result<Vec<List>, DbError>;
    async fn list_includes_account(&self, list_id: &str, account_id: &str)
        -> Result<bool, DbError>;
    async fn delete_list_entries_for_follow(&self, follow_id: &str) -> Result<usize, DbError>;
    async fn get_account_ids_following_tags(
        &self,
        tag_ids: Vec<String>,
    ) -> Result<Vec<String>, DbError>;

    // Notifications, conversations, filters.
    async fn notification_exists(
        &self,
        notification_type: NotificationType,
        target_id: &str,
        origin_id: &str,
        status_id: &str,
    ) -> Result<bool, DbError>;
    /// Inserts unless the key exists. Returns true when this call inserted.
    async fn put_notification(&self, notification: &Notification) -> Result<bool, DbError>;
    async fn delete_notification(
        &self,
        notification_type: NotificationType,
        target_id: &str,
        origin_id: &str,
        status_id: &str,
    ) -> Result<bool, DbError>;
    async fn delete_status_notifications(&self, status_id: &str) -> Result<usize, DbError>;
    async fn delete_account_notifications(&self, account_id: &str) -> Result<usize, DbError>;
    async fn get_account_notifications(&self, account_id: &str)
        -> Result<Vec<Notification>, DbError>;
    async fn get_account_filters(&self, account_id: &str) -> Result<Vec<Filter>, DbError>;
    async fn upsert_conversation(&self, conversation: &Conversation)
        -> Result<Conversation, DbError>;
    async fn delete_status_conversations(&self, status_id: &str) -> Result<usize, DbError>;

    // Timelines.
    async fn ingest_home(&self, account_id: &str, status: &Status) -> Result<bool, DbError>;
    async fn ingest_list(&self, list_id: &str, status: &Status) -> Result<bool, DbError>;
    async fn remove_status_from_timelines(&self, status_id: &str) -> Result<usize, DbError>;
    async fn remove_author_from_owner_timelines(
        &self,
        owner_id: &str,
        author_id: &str,
    ) -> Result<usize, DbError>;
    async fn remove_account_from_timelines(&self, account_id: &str) -> Result<usize, DbError>;

    // Moves.
    async fn get_move_by_uri(&self, uri: &str) -> Result<Option<Move>, DbError>;
    async fn get_move_by_origin_target(
        &self,
        origin_uri: &str,
        target_uri: &str,
    ) -> Result<Option<Move>, DbError>;
    async fn insert_move(&self, mv: &Move) -> Result<(), DbError>;
    async fn update_move_uri(&self, move_id: &str, uri: &str) -> Result<(), DbError>;
    async fn update_move_attempt(&self, mv: &Move) -> Result<(), DbError>;
    async fn latest_move_attempt_involving(
        &self,
        uris: Vec<String>,
    ) -> Result<Option<DateTime<Utc>>, DbError>;
    async fn latest_move_success_involving(
        &self,
        uris: Vec<String>,
    ) -> Result<Option<DateTime<Utc>>, DbError>;
}

/// [`Database`] backed by a SQLite pool.
#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Runs `f` with a pooled connection on the blocking thread pool.
    pub async fn call<T, F>(&self, f: F) -> Result<T, DbError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<T, DbError> {
            let conn = pool.get()?;
            Ok(f(&*conn)?)
        })
        .await?
    }
}

#[async_trait]
impl Database for SqliteStore {
    async fn get_account_by_id(&self, id: &str) -> Result<Option<Account>, DbError> {
        let id = id.to_string();
        self.call(move |conn| accounts::get_account_by_id(conn, &id))
            .await
    }

    async fn get_account_by_uri(&self, uri: &str) -> Result<Option<Account>, DbError> {
        let uri = uri.to_string();
        self.call(move |conn| accounts::get_account_by_uri(conn, &uri))
            .await
    }

    async fn put_account(&self, account: &Account) -> Result<(), DbError> {
        let account = account.clone();
        self.call(move |conn| accounts::upsert_account(conn, &account))
            .await
    }

    async fn get_instance_account(&self, host: &str) -> Result<Option<Account>, DbError> {
        let host = host.to_string();
        self.call(move |conn| accounts::get_instance_account(conn, &host))
            .await
    }

    async fn get_instance_moderators(&self) -> Result<Vec<Account>, DbError> {
        self.call(accounts::get_instance_moderators).await
    }

    async fn set_account_move_id(&self, account_id: &str, move_id: &str) -> Result<(), DbError> {
        let (account_id, move_id) = (account_id.to_string(), move_id.to_string());
        self.call(move |conn| accounts::set_account_move_id(conn, &account_id, &move_id))
            .await
    }

    async fn suspend_account(&self, account_id: &str, at: DateTime<Utc>) -> Result<(), DbError> {
        let account_id = account_id.to_string();
        self.call(move |conn| accounts::suspend_account(conn, &account_id, at))
            .await
    }

    async fn is_domain_blocked(&self, domain: &str) -> Result<bool, DbError> {
        let domain = domain.to_string();
        self.call(move |conn| accounts::is_domain_blocked(conn, &domain))
            .await
    }

    async fn get_status_by_id(&self, id: &str) -> Result<Option<Status>, DbError> {
        let id = id.to_string();
        self.call(move |conn| statuses::get_status_by_id(conn, &id))
            .await
    }

    async fn get_status_by_uri(&self, uri: &str) -> Result<Option<Status>, DbError> {
        let uri = uri.to_string();
        self.call(move |conn| statuses::get_status_by_uri(conn, &uri))
            .await
    }

    async fn put_status(&self, status: &Status) -> Result<(), DbError> {
        let status = status.clone();
        self.call(move |conn| statuses::insert_status(conn, &status))
            .await
    }

    async fn update_status(&self, status: &Status) -> Result<(), DbError> {
        let status = status.clone();
        self.call(move |conn| statuses::update_status(conn, &status))
            .await
    }

    async fn populate_status(&self, mut status: Status) -> Result<Status, DbError> {
        self.call(move |conn| {
            statuses::populate_status(conn, &mut status)?;
            Ok(status)
        })
        .await
    }

    async fn get_status_boosts(&self, status_id: &str) -> Result<Vec<Status>, DbError> {
        let status_id = status_id.to_string();
        self.call(move |conn| statuses::get_status_boosts(conn, &status_id))
            .await
    }

    async fn get_account_status_ids(&self, account_id: &str) -> Result<Vec<String>, DbError> {
        let account_id = account_id.to_string();
        self.call(move |conn| statuses::get_account_status_ids(conn, &account_id))
            .await
    }

    async fn delete_status(&self, status_id: &str) -> Result<bool, DbError> {
        let status_id = status_id.to_string();
        self.call(move |conn| statuses::delete_status(conn, &status_id))
            .await
    }

    async fn delete_status_mentions(&self, status_id: &str) -> Result<usize, DbError> {
        let status_id = status_id.to_string();
        self.call(move |conn| statuses::delete_mentions_for_status(conn, &status_id))
            .await
    }

    async fn delete_status_bookmarks(&self, status_id: &str) -> Result<usize, DbError> {
        let status_id = status_id.to_string();
        self.call(move |conn| statuses::delete_bookmarks_for_status(conn, &status_id))
            .await
    }

    async fn is_thread_muted(&self, thread_id: &str, account_id: &str) -> Result<bool, DbError> {
        let (thread_id, account_id) = (thread_id.to_string(), account_id.to_string());
        self.call(move |conn| statuses::is_thread_muted(conn, &thread_id, &account_id))
            .await
    }

    async fn get_poll(&self, poll_id: &str) -> Result<Option<Poll>, DbError> {
        let poll_id = poll_id.to_string();
        self.call(move |conn| statuses::get_poll(conn, &poll_id))
            .await
    }

    async fn close_poll(&self, poll_id: &str, at: DateTime<Utc>) -> Result<bool, DbError> {
        let poll_id = poll_id.to_string();
        self.call(move |conn| statuses::close_poll(conn, &poll_id, at))
            .await
    }

    async fn put_poll_vote(&self, vote: &PollVote) -> Result<(), DbError> {
        let vote = vote.clone();
        self.call(move |conn| statuses::put_poll_vote(conn, &vote))
            .await
    }

    async fn get_poll_votes(&self, poll_id: &str) -> Result<Vec<PollVote>, DbError> {
        let poll_id = poll_id.to_string();
        self.call(move |conn| statuses::get_poll_votes(conn, &poll_id))
            .await
    }

    async fn get_follow(
        &self,
        account_id: &str,
        target_id: &str,
    ) -> Result<Option<Follow>, DbError> {
        let (account_id, target_id) = (account_id.to_string(), target_id.to_string());
        self.call(move |conn| follows::get_follow(conn, &account_id, &target_id))
            .await
    }

    async fn is_following(&self, account_id: &str, target_id: &str) -> Result<bool, DbError> {
        let (account_id, target_id) = (account_id.to_string(), target_id.to_string());
        self.call(move |conn| follows::is_following(conn, &account_id, &target_id))
            .await
    }

    async fn put_follow(&self, follow: &Follow) -> Result<(), DbError> {
        let follow = follow.clone();
        self.call(move |conn| follows::put_follow(conn, &follow))
            .await
    }

    async fn get_account_local_followers(
        &self,
        account_id: &str,
    ) -> Result<Vec<Follow>, DbError> {
        let account_id = account_id.to_string();
        self.call(move |conn| follows::get_account_local_followers(conn, &account_id))
            .await
    }

    async fn get_account_follows(&self, account_id: &str) -> Result<Vec<Follow>, DbError> {
        let account_id = account_id.to_string();
        self.call(move |conn| follows::get_account_follows(conn, &account_id))
            .await
    }

    async fn populate_follow(&self, mut follow: Follow) -> Result<Follow, DbError> {
        self.call(move |conn| {
            follows::populate_follow(conn, &mut follow)?;
            Ok(follow)
        })
        .await
    }

    async fn delete_follow(
        &self,
        account_id: &str,
        target_id: &str,
    ) -> Result<Option<Follow>, DbError> {
        let (account_id, target_id) = (account_id.to_string(), target_id.to_string());
        self.call(move |conn| follows::delete_follow(conn, &account_id, &target_id))
            .await
    }

    async fn delete_follow_by_id(&self, follow_id: &str) -> Result<bool, DbError> {
        let follow_id = follow_id.to_string();
        self.call(move |conn| follows::delete_follow_by_id(conn, &follow_id))
            .await
    }

    async fn delete_follows_between(&self, a: &str, b: &str) -> Result<usize, DbError> {
        let (a, b) = (a.to_string(), b.to_string());
        self.call(move |conn| follows::delete_follows_between(conn, &a, &b))
            .await
    }

    async fn delete_account_follows(&self, account_id: &str) -> Result<usize, DbError> {
        let account_id = account_id.to_string();
        self.call(move |conn| follows::delete_account_follows(conn, &account_id))
            .await
    }

    async fn put_follow_request(&self, request: &FollowRequest) -> Result<(), DbError> {
        let request = request.clone();
        self.call(move |conn| follows::put_follow_request(conn, &request))
            .await
    }

    async fn get_follow_request(
        &self,
        account_id: &str,
        target_id: &str,
    ) -> Result<Option<FollowRequest>, DbError> {
        let (account_id, target_id) = (account_id.to_string(), target_id.to_string());
        self.call(move |conn| follows::get_follow_request(conn, &account_id, &target_id))
            .await
    }

    async fn accept_follow_request(
        &self,
        account_id: &str,
        target_id: &str,
    ) -> Result<Option<Follow>, DbError> {
        let (account_id, target_id) = (account_id.to_string(), target_id.to_string());
        self.call(move |conn| follows::accept_follow_request(conn, &account_id, &target_id))
            .await
    }

    async fn delete_follow_request(
        &self,
        account_id: &str,
        target_id: &str,
    ) -> Result<bool, DbError> {
        let (account_id, target_id) = (account_id.to_string(), target_id.to_string());
        self.call(move |conn| follows::delete_follow_request(conn, &account_id, &target_id))
            .await
    }

    async fn delete_follow_requests_between(&self, a: &str, b: &str) -> Result<usize, DbError> {
        let (a, b) = (a.to_string(), b.to_string());
        self.call(move |conn| follows::delete_follow_requests_between(conn, &a, &b))
            .await
    }

    async fn delete_account_follow_requests(&self, account_id: &str) -> Result<usize, DbError> {
        let account_id = account_id.to_string();
        self.call(move |conn| follows::delete_account_follow_requests(conn, &account_id))
            .await
    }

    async fn put_block(&self, block: &Block) -> Result<(), DbError> {
        let block = block.clone();
        self.call(move |conn| interactions::put_block(conn, &block))
            .await
    }

    async fn get_block(
        &self,
        account_id: &str,
        target_id: &str,
    ) -> Result<Option<Block>, DbError> {
        let (account_id, target_id) = (account_id.to_string(), target_id.to_string());
        self.call(move |conn| interactions::get_block(conn, &account_id, &target_id))
            .await
    }

    async fn delete_block_by_id(&self, block_id: &str) -> Result<bool, DbError> {
        let block_id = block_id.to_string();
        self.call(move |conn| interactions::delete_block_by_id(conn, &block_id))
            .await
    }

    async fn is_either_blocked(&self, a: &str, b: &str) -> Result<bool, DbError> {
        let (a, b) = (a.to_string(), b.to_string());
        self.call(move |conn| interactions::is_either_blocked(conn, &a, &b))
            .await
    }

    async fn delete_account_blocks(&self, account_id: &str) -> Result<usize, DbError> {
        let account_id = account_id.to_string();
        self.call(move |conn| interactions::delete_account_blocks(conn, &account_id))
            .await
    }

    async fn is_muted(&self, account_id: &str, target_id: &str) -> Result<bool, DbError> {
        let (account_id, target_id) = (account_id.to_string(), target_id.to_string());
        self.call(move |conn| interactions::is_muted(conn, &account_id, &target_id))
            .await
    }

    async fn put_fave(&self, fave: &StatusFave) -> Result<(), DbError> {
        let fave = fave.clone();
        self.call(move |conn| interactions::put_fave(conn, &fave))
            .await
    }

    async fn get_fave_by_uri(&self, uri: &str) -> Result<Option<StatusFave>, DbError> {
        let uri = uri.to_string();
        self.call(move |conn| interactions::get_fave_by_uri(conn, &uri))
            .await
    }

    async fn delete_fave_by_id(&self, fave_id: &str) -> Result<bool, DbError> {
        let fave_id = fave_id.to_string();
        self.call(move |conn| interactions::delete_fave_by_id(conn, &fave_id))
            .await
    }

    async fn delete_status_faves(&self, status_id: &str) -> Result<usize, DbError> {
        let status_id = status_id.to_string();
        self.call(move |conn| interactions::delete_faves_for_status(conn, &status_id))
            .await
    }

    async fn put_report(&self, report: &Report) -> Result<(), DbError> {
        let report = report.clone();
        self.call(move |conn| interactions::put_report(conn, &report))
            .await
    }

    async fn get_lists_containing_follow(&self, follow_id: &str) -> Result<Vec<List>, DbError> {
        let follow_id = follow_id.to_string();
        self.call(move |conn| lists::get_lists_containing_follow(conn, &follow_id))
            .await
    }

    async fn list_includes_account(
        &self,
        list_id: &str,
        account_id: &str,
    ) -> Result<bool, DbError> {
        let (list_id, account_id) = (list_id.to_string(), account_id.to_string());
        self.call(move |conn| lists::list_includes_account(conn, &list_id, &account_id))
            .await
    }

    async fn delete_list_entries_for_follow(&self, follow_id: &str) -> Result<usize, DbError> {
        let follow_id = follow_id.to_string();
        self.call(move |conn| lists::delete_list_entries_for_follow(conn, &follow_id))
            .await
    }

    async fn get_account_ids_following_tags(
        &self,
        tag_ids: Vec<String>,
    ) -> Result<Vec<String>, DbError> {
        self.call(move |conn| lists::get_account_ids_following_tags(conn, &tag_ids))
            .await
    }

    async fn notification_exists(
        &self,
        notification_type: NotificationType,
        target_id: &str,
        origin_id: &str,
        status_id: &str,
    ) -> Result<bool, DbError> {
        let (target_id, origin_id, status_id) = (
            target_id.to_string(),
            origin_id.to_string(),
            status_id.to_string(),
        );
        self.call(move |conn| {
            notifications::notification_exists(
                conn,
                notification_type,
                &target_id,
                &origin_id,
                &status_id,
            )
        })
        .await
    }

    async fn put_notification(&self, notification: &Notification) -> Result<bool, DbError> {
        let notification = notification.clone();
        self.call(move |conn| notifications::put_notification(conn, &notification))
            .await
    }

    async fn delete_notification(
        &self,
        notification_type: NotificationType,
        target_id: &str,
        origin_id: &str,
        status_id: &str,
    ) -> Result<bool, DbError> {
        let (target_id, origin_id, status_id) = (
            target_id.to_string(),
            origin_id.to_string(),
            status_id.to_string(),
        );
        self.call(move |conn| {
            notifications::delete_notification(
                conn,
                notification_type,
                &target_id,
                &origin_id,
                &status_id,
            )
        })
        .await
    }

    async fn delete_status_notifications(&self, status_id: &str) -> Result<usize, DbError> {
        let status_id = status_id.to_string();
        self.call(move |conn| notifications::delete_notifications_for_status(conn, &status_id))
            .await
    }

    async fn delete_account_notifications(&self, account_id: &str) -> Result<usize, DbError> {
        let account_id = account_id.to_string();
        self.call(move |conn| notifications::delete_account_notifications(conn, &account_id))
            .await
    }

    async fn get_account_notifications(
        &self,
        account_id: &str,
    ) -> Result<Vec<Notification>, DbError> {
        let account_id = account_id.to_string();
        self.call(move |conn| notifications::get_account_notifications(conn, &account_id))
            .await
    }

    async fn get_account_filters(&self, account_id: &str) -> Result<Vec<Filter>, DbError> {
        let account_id = account_id.to_string();
        self.call(move |conn| notifications::get_account_filters(conn, &account_id))
            .await
    }

    async fn upsert_conversation(
        &self,
        conversation: &Conversation,
    ) -> Result<Conversation, DbError> {
        let conversation = conversation.clone();
        self.call(move |conn| notifications::upsert_conversation(conn, &conversation))
            .await
    }

    async fn delete_status_conversations(&self, status_id: &str) -> Result<usize, DbError> {
        let status_id = status_id.to_string();
        self.call(move |conn| notifications::delete_conversations_for_status(conn, &status_id))
            .await
    }

    async fn ingest_home(&self, account_id: &str, status: &Status) -> Result<bool, DbError> {
        let (account_id, status) = (account_id.to_string(), status.clone());
        self.call(move |conn| timelines::ingest_home(conn, &account_id, &status))
            .await
    }

    async fn ingest_list(&self, list_id: &str, status: &Status) -> Result<bool, DbError> {
        let (list_id, status) = (list_id.to_string(), status.clone());
        self.call(move |conn| timelines::ingest_list(conn, &list_id, &status))
            .await
    }

    async fn remove_status_from_timelines(&self, status_id: &str) -> Result<usize, DbError> {
        let status_id = status_id.to_string();
        self.call(move |conn| timelines::remove_status_from_timelines(conn, &status_id))
            .await
    }

    async fn remove_author_from_owner_timelines(
        &self,
        owner_id: &str,
        author_id: &str,
    ) -> Result<usize, DbError> {
        let (owner_id, author_id) = (owner_id.to_string(), author_id.to_string());
        self.call(move |conn| {
            timelines::remove_author_from_owner_timelines(conn, &owner_id, &author_id)
        })
        .await
    }

    async fn remove_account_from_timelines(&self, account_id: &str) -> Result<usize, DbError> {
        let account_id = account_id.to_string();
        self.call(move |conn| timelines::remove_account_from_timelines(conn, &account_id))
            .await
    }

    async fn get_move_by_uri(&self, uri: &str) -> Result<Option<Move>, DbError> {
        let uri = uri.to_string();
        self.call(move |conn| moves::get_move_by_uri(conn, &uri))
            .await
    }

    async fn get_move_by_origin_target(
        &self,
        origin_uri: &str,
        target_uri: &str,
    ) -> Result<Option<Move>, DbError> {
        let (origin_uri, target_uri) = (origin_uri.to_string(), target_uri.to_string());
        self.call(move |conn| moves::get_move_by_origin_target(conn, &origin_uri, &target_uri))
            .await
    }

    async fn insert_move(&self, mv: &Move) -> Result<(), DbError> {
        let mv = mv.clone();
        self.call(move |conn| moves::insert_move(conn, &mv)).await
    }

    async fn update_move_uri(&self, move_id: &str, uri: &str) -> Result<(), DbError> {
        let (move_id, uri) = (move_id.to_string(), uri.to_string());
        self.call(move |conn| moves::update_move_uri(conn, &move_id, &uri))
            .await
    }

    async fn update_move_attempt(&self, mv: &Move) -> Result<(), DbError> {
        let (move_id, attempted_at, succeeded_at) = (mv.id.clone(), mv.attempted_at, mv.succeeded_at);
        self.call(move |conn| moves::update_move_attempt(conn, &move_id, attempted_at, succeeded_at))
            .await
    }

    async fn latest_move_attempt_involving(
        &self,
        uris: Vec<String>,
    ) -> Result<Option<DateTime<Utc>>, DbError> {
        self.call(move |conn| {
            let uris: Vec<&str> = uris.iter().map(String::as_str).collect();
            moves::latest_move_attempt_involving(conn, &uris)
        })
        .await
    }

    async fn latest_move_success_involving(
        &self,
        uris: Vec<String>,
    ) -> Result<Option<DateTime<Utc>>, DbError> {
        self.call(move |conn| {
            let uris: Vec<&str> = uris.iter().map(String::as_str).collect();
            moves::latest_move_success_involving(conn, &uris)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations, DbRuntimeSettings};
    use crate::test_support::{local_account, status};

    fn store() -> SqliteStore {
        let pool = create_pool(
            ":memory:",
            DbRuntimeSettings {
                busy_timeout_ms: 5_000,
                pool_max_size: 1,
            },
        )
        .expect("pool creation should succeed");
        {
            let conn = pool.get().expect("should get a connection");
            run_migrations(&conn).expect("migrations should succeed");
        }
        SqliteStore::new(pool)
    }

    #[tokio::test]
    async fn populate_status_through_store() {
        let store = store();
        store
            .put_account(&local_account("a1", "alice"))
            .await
            .expect("put should succeed");
        store
            .put_status(&status("s1", "a1"))
            .await
            .expect("put should succeed");

        let fetched = store
            .get_status_by_id("s1")
            .await
            .expect("query should succeed")
            .expect("status should exist");
        let populated = store
            .populate_status(fetched)
            .await
            .expect("populate should succeed");
        assert_eq!(
            populated.account.map(|a| a.username),
            Some("alice".to_string())
        );
    }

    #[tokio::test]
    async fn concurrent_notification_inserts_create_one_row() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let path = dir.path().join("notify.db");
        let pool = create_pool(
            path.to_str().expect("temp path should be utf-8"),
            DbRuntimeSettings::default(),
        )
        .expect("pool creation should succeed");
        {
            let conn = pool.get().expect("should get a connection");
            run_migrations(&conn).expect("migrations should succeed");
        }
        let store = SqliteStore::new(pool);

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .put_notification(&Notification {
                        id: format!("n{i}"),
                        notification_type: NotificationType::Reblog,
                        target_account_id: "a1".to_string(),
                        origin_account_id: "r1".to_string(),
                        status_id: "s1".to_string(),
                        read: false,
                        created_at: Utc::now(),
                    })
                    .await
                    .expect("put should succeed")
            }));
        }

        let mut inserted = 0;
        for handle in handles {
            if handle.await.expect("task should not panic") {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);
        assert_eq!(
            store
                .get_account_notifications("a1")
                .await
                .expect("query should succeed")
                .len(),
            1
        );
    }
}
