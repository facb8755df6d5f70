//! Account migration.
//!
//! A Move is processed at most once per cooldown window, under a lock on
//! its origin and target so concurrent or retried deliveries of the same
//! migration run one at a time. Validation failures are logged and
//! return `Ok`; only storage and lookup failures are errors.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use kestrel_db::Database;
use kestrel_types::{Account, Move};
use url::Url;

use crate::collab::{Dereferencer, FollowerRedirector};
use crate::keyed_lock::KeyedLocks;
use crate::{ProcessingConfig, WorkerError};

pub struct MoveCoordinator {
    config: ProcessingConfig,
    db: Arc<dyn Database>,
    dereferencer: Arc<dyn Dereferencer>,
    redirector: Arc<dyn FollowerRedirector>,
    locks: KeyedLocks,
}

impl MoveCoordinator {
    pub fn new(
        config: ProcessingConfig,
        db: Arc<dyn Database>,
        dereferencer: Arc<dyn Dereferencer>,
        redirector: Arc<dyn FollowerRedirector>,
        locks: KeyedLocks,
    ) -> Self {
        Self {
            config,
            db,
            dereferencer,
            redirector,
            locks,
        }
    }

    /// False when a Move involving either account was attempted within the
    /// attempt cooldown, or succeeded within the success cooldown.
    pub async fn should_process_move(
        &self,
        origin_uri: &str,
        target_uri: &str,
    ) -> Result<bool, WorkerError> {
        self.should_process_move_at(origin_uri, target_uri, Utc::now())
            .await
    }

    async fn should_process_move_at(
        &self,
        origin_uri: &str,
        target_uri: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, WorkerError> {
        let uris = vec![origin_uri.to_string(), target_uri.to_string()];

        if let Some(attempted) = self.db.latest_move_attempt_involving(uris.clone()).await? {
            if now - attempted < self.config.move_attempt_cooldown {
                tracing::info!(
                    origin = origin_uri,
                    target = target_uri,
                    %attempted,
                    "move attempted recently, not processing"
                );
                return Ok(false);
            }
        }
        if let Some(succeeded) = self.db.latest_move_success_involving(uris).await? {
            if now - succeeded < self.config.move_success_cooldown {
                tracing::info!(
                    origin = origin_uri,
                    target = target_uri,
                    %succeeded,
                    "move succeeded recently, not processing"
                );
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Returns the stored Move for this migration, creating it if needed.
    ///
    /// A retry delivered under a new activity URI reuses the record for
    /// the same origin and target and takes over the new URI. The origin's
    /// `move_id` is pointed at the record.
    pub async fn get_or_create_move(
        &self,
        uri: &str,
        origin: &Account,
        target_uri: &str,
    ) -> Result<Move, WorkerError> {
        let mv = match self.db.get_move_by_uri(uri).await? {
            Some(existing) => {
                if existing.origin_uri != origin.uri || existing.target_uri != target_uri {
                    return Err(WorkerError::other(format!(
                        "move {uri} is stored with a different origin or target"
                    )));
                }
                existing
            }
            None => match self.db.get_move_by_origin_target(&origin.uri, target_uri).await? {
                Some(mut existing) => {
                    self.db.update_move_uri(&existing.id, uri).await?;
                    existing.uri = uri.to_string();
                    existing
                }
                None => {
                    let now = Utc::now();
                    let created = Move {
                        id: uuid::Uuid::new_v4().to_string(),
                        uri: uri.to_string(),
                        origin_uri: origin.uri.clone(),
                        target_uri: target_uri.to_string(),
                        attempted_at: Some(now),
                        succeeded_at: None,
                        created_at: now,
                    };
                    self.db.insert_move(&created).await?;
                    created
                }
            },
        };

        if origin.move_id.as_deref() != Some(mv.id.as_str()) {
            self.db.set_account_move_id(&origin.id, &mv.id).await?;
        }
        Ok(mv)
    }

    /// Processes a Move delivered by `origin`'s instance.
    pub async fn process_move(&self, mv: &Move, origin: &Account) -> Result<(), WorkerError> {
        if mv.origin_uri != origin.uri {
            return Err(WorkerError::other(format!(
                "move {} was sent by {} but moves {}",
                mv.uri, origin.uri, mv.origin_uri
            )));
        }
        if mv.target_uri == origin.uri {
            return Err(WorkerError::other(format!(
                "move {} has the same origin and target",
                mv.uri
            )));
        }

        if !self.should_process_move(&origin.uri, &mv.target_uri).await? {
            return Ok(());
        }

        let _guard = self
            .locks
            .lock(format!("move:{}:{}", origin.uri, mv.target_uri))
            .await;

        // A delivery that waited on the lock sees the attempt made by the
        // delivery that held it.
        if !self.should_process_move(&origin.uri, &mv.target_uri).await? {
            return Ok(());
        }

        let mut stored = self.get_or_create_move(&mv.uri, origin, &mv.target_uri).await?;

        let Some(target) = self.validated_target(origin, &mv.target_uri).await? else {
            return Ok(());
        };

        let redirected = self.redirector.redirect_followers(origin, &target).await;
        let removed = self.remove_account_following(origin).await;

        let attempted = Utc::now();
        stored.attempted_at = Some(attempted);
        if redirected && removed {
            stored.succeeded_at = Some(attempted);
        } else {
            tracing::info!(
                origin = %origin.uri,
                target = %target.uri,
                redirected,
                removed,
                "move side effects incomplete"
            );
        }
        self.db.update_move_attempt(&stored).await?;
        Ok(())
    }

    /// Resolves the Move target and checks that it consents to the move.
    /// `None` means the Move must not be processed.
    async fn validated_target(
        &self,
        origin: &Account,
        target_uri: &str,
    ) -> Result<Option<Account>, WorkerError> {
        if let Some(moved_to) = origin.moved_to_uri.as_deref() {
            if moved_to != target_uri {
                tracing::info!(
                    origin = %origin.uri,
                    moved_to,
                    target = target_uri,
                    "origin moved_to differs from move target, not processing"
                );
                return Ok(None);
            }
        }

        let url = Url::parse(target_uri)?;
        let host = url
            .host_str()
            .ok_or_else(|| WorkerError::other(format!("move target {target_uri} has no host")))?;
        if self.db.is_domain_blocked(host).await? {
            tracing::info!(target = target_uri, "move target domain is blocked, not processing");
            return Ok(None);
        }

        let target = if self.config.is_local_host(host) {
            self.db.get_account_by_uri(target_uri).await?
        } else {
            match self.dereferencer.account(&url, false).await? {
                Some(target) if target.is_remote() && !target.is_suspended() => {
                    self.dereferencer.account(&url, true).await?
                }
                other => other,
            }
        };
        let Some(target) = target else {
            return Err(WorkerError::other(format!(
                "move target {target_uri} could not be resolved"
            )));
        };

        if target.is_suspended() {
            tracing::info!(target = target_uri, "move target is suspended, not processing");
            return Ok(None);
        }
        if let Some(moved_to) = target.moved_to_uri.as_deref() {
            tracing::info!(
                target = target_uri,
                moved_to,
                "move target has itself moved, not processing"
            );
            return Ok(None);
        }
        if !target.is_aliased_to(&origin.uri) {
            tracing::info!(
                origin = %origin.uri,
                target = target_uri,
                "move target is not aliased to origin, not processing"
            );
            return Ok(None);
        }
        Ok(Some(target))
    }

    /// Drops the follows `origin` holds on local accounts and every follow
    /// request involving it. Returns true when nothing failed.
    pub async fn remove_account_following(&self, origin: &Account) -> bool {
        let follows = match self.db.get_account_follows(&origin.id).await {
            Ok(follows) => follows,
            Err(err) => {
                tracing::error!(origin = %origin.uri, error = %err, "fetching follows failed");
                return false;
            }
        };

        let mut all_ok = true;
        for follow in follows {
            if !follow
                .target_account
                .as_deref()
                .is_some_and(Account::is_local)
            {
                continue;
            }
            let deleted = match self.db.delete_follow_by_id(&follow.id).await {
                Ok(_) => self.db.delete_list_entries_for_follow(&follow.id).await.map(|_| ()),
                Err(err) => Err(err),
            };
            if let Err(err) = deleted {
                tracing::error!(follow_id = %follow.id, error = %err, "removing follow failed");
                all_ok = false;
            }
        }

        if let Err(err) = self.db.delete_account_follow_requests(&origin.id).await {
            tracing::error!(origin = %origin.uri, error = %err, "removing follow requests failed");
            all_ok = false;
        }
        all_ok
    }

    /// Applies a Move made by a local account: its local followers are
    /// redirected to the target. Records the attempt, and the success when
    /// every follower was redirected.
    pub async fn apply_local_move(&self, mv: &Move, origin: &Account) -> Result<Move, WorkerError> {
        let _guard = self
            .locks
            .lock(format!("move:{}:{}", origin.uri, mv.target_uri))
            .await;

        let target = match self.db.get_account_by_uri(&mv.target_uri).await? {
            Some(target) => Some(target),
            None => {
                let url = Url::parse(&mv.target_uri)?;
                self.dereferencer.account(&url, false).await?
            }
        };
        let Some(target) = target else {
            return Err(WorkerError::other(format!(
                "move target {} could not be resolved",
                mv.target_uri
            )));
        };

        let mut stored = match self.db.get_move_by_uri(&mv.uri).await? {
            Some(stored) => stored,
            None => {
                self.db.insert_move(mv).await?;
                mv.clone()
            }
        };
        if origin.move_id.as_deref() != Some(stored.id.as_str()) {
            self.db.set_account_move_id(&origin.id, &stored.id).await?;
        }

        let attempted = Utc::now();
        stored.attempted_at = Some(attempted);
        if self.redirector.redirect_followers(origin, &target).await {
            stored.succeeded_at = Some(attempted);
        }
        self.db.update_move_attempt(&stored).await?;
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use kestrel_db::{create_pool, run_migrations, DbRuntimeSettings, SqliteStore};
    use kestrel_types::Status;

    struct NoDeref;

    #[async_trait]
    impl Dereferencer for NoDeref {
        async fn account(&self, _: &Url, _: bool) -> Result<Option<Account>, WorkerError> {
            Ok(None)
        }
        async fn status(&self, _: &Url) -> Result<Option<Status>, WorkerError> {
            Ok(None)
        }
    }

    struct AlwaysOk;

    #[async_trait]
    impl FollowerRedirector for AlwaysOk {
        async fn redirect_followers(&self, _: &Account, _: &Account) -> bool {
            true
        }
    }

    fn coordinator() -> MoveCoordinator {
        let pool = create_pool(
            ":memory:",
            DbRuntimeSettings {
                busy_timeout_ms: 5000,
                pool_max_size: 1,
            },
        )
        .expect("should create pool");
        {
            let conn = pool.get().expect("should get connection");
            run_migrations(&conn).expect("migrations should succeed");
        }
        MoveCoordinator::new(
            ProcessingConfig::new("kestrel.test"),
            Arc::new(SqliteStore::new(pool)),
            Arc::new(NoDeref),
            Arc::new(AlwaysOk),
            KeyedLocks::new(),
        )
    }

    fn record(id: &str, origin: &str, target: &str, attempted: DateTime<Utc>, succeeded: Option<DateTime<Utc>>) -> Move {
        Move {
            id: id.to_string(),
            uri: format!("https://remote.example/moves/{id}"),
            origin_uri: origin.to_string(),
            target_uri: target.to_string(),
            attempted_at: Some(attempted),
            succeeded_at: succeeded,
            created_at: attempted,
        }
    }

    #[tokio::test]
    async fn cooldown_windows() {
        let moves = coordinator();
        let now = Utc::now();
        let a = "https://remote.example/users/a";
        let b = "https://elsewhere.example/users/b";
        let c = "https://third.example/users/c";

        assert!(moves.should_process_move_at(a, b, now).await.expect("should check"));

        moves
            .db
            .insert_move(&record("m1", a, c, now - Duration::minutes(2), None))
            .await
            .expect("insert should succeed");
        assert!(!moves.should_process_move_at(a, b, now).await.expect("should check"));
        assert!(
            moves
                .should_process_move_at(a, b, now + Duration::minutes(4))
                .await
                .expect("should check"),
            "attempt cooldown should have passed"
        );

        let succeeded = now - Duration::days(6);
        moves
            .db
            .insert_move(&record("m2", c, b, succeeded, Some(succeeded)))
            .await
            .expect("insert should succeed");
        assert!(
            !moves
                .should_process_move_at(a, b, now + Duration::minutes(4))
                .await
                .expect("should check"),
            "target was part of a recent successful move"
        );
        assert!(moves
            .should_process_move_at(a, b, now + Duration::days(2))
            .await
            .expect("should check"));
    }
}
