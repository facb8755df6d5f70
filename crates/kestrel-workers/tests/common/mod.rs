//! Shared harness for the worker integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use kestrel_db::{
    accounts, create_pool, follows, lists, notifications, run_migrations, statuses, timelines,
    DbPool, DbRuntimeSettings, SqliteStore,
};
use kestrel_types::{Account, Follow, List, Notification, RepliesPolicy, Status, Visibility};
use kestrel_workers::{
    Activity, Collaborators, FederatingActor, Processor, ProcessingConfig, StreamHub, WorkerError,
};
use url::Url;

pub const HOST: &str = "kestrel.test";

/// Records every activity instead of delivering it.
#[derive(Default)]
pub struct RecordingActor {
    sent: Mutex<Vec<(Url, Activity)>>,
}

impl RecordingActor {
    pub fn sent(&self) -> Vec<(Url, Activity)> {
        self.sent.lock().expect("actor lock should not be poisoned").clone()
    }
}

#[async_trait]
impl FederatingActor for RecordingActor {
    async fn send(&self, outbox: &Url, activity: Activity) -> Result<(), WorkerError> {
        self.sent
            .lock()
            .expect("actor lock should not be poisoned")
            .push((outbox.clone(), activity));
        Ok(())
    }
}

pub struct Harness {
    // Keeps the database file alive for the pool.
    _file: tempfile::NamedTempFile,
    pub pool: DbPool,
    pub store: Arc<SqliteStore>,
    pub hub: Arc<StreamHub>,
    pub actor: Arc<RecordingActor>,
    pub processor: Arc<Processor>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(|collab| collab)
    }

    /// Builds a harness, letting the caller override collaborators.
    pub fn with(customize: impl FnOnce(Collaborators) -> Collaborators) -> Self {
        let file = tempfile::NamedTempFile::new().expect("should create temp db file");
        let path = file.path().to_str().expect("temp path should be utf-8").to_string();
        let pool = create_pool(&path, DbRuntimeSettings::default()).expect("should create pool");
        {
            let conn = pool.get().expect("should get connection");
            run_migrations(&conn).expect("migrations should succeed");
        }

        let store = Arc::new(SqliteStore::new(pool.clone()));
        let hub = Arc::new(StreamHub::new());
        let actor = Arc::new(RecordingActor::default());
        let collab = customize(Collaborators::new(store.clone(), actor.clone(), hub.clone()));
        let processor = Processor::new(ProcessingConfig::new(HOST), collab);

        Self {
            _file: file,
            pool,
            store,
            hub,
            actor,
            processor,
        }
    }

    pub fn put_account(&self, account: &Account) {
        let conn = self.pool.get().expect("should get connection");
        accounts::upsert_account(&conn, account).expect("account insert should succeed");
    }

    pub fn put_status(&self, status: &Status) {
        let conn = self.pool.get().expect("should get connection");
        statuses::insert_status(&conn, status).expect("status insert should succeed");
    }

    pub fn put_follow(&self, follow: &Follow) {
        let conn = self.pool.get().expect("should get connection");
        follows::put_follow(&conn, follow).expect("follow insert should succeed");
    }

    pub fn put_list(&self, list: &List, follow_id: &str) {
        let conn = self.pool.get().expect("should get connection");
        lists::put_list(&conn, list).expect("list insert should succeed");
        lists::add_list_entry(&conn, &format!("entry-{}-{follow_id}", list.id), &list.id, follow_id)
            .expect("list entry insert should succeed");
    }

    pub fn home_timeline(&self, account_id: &str) -> Vec<String> {
        let conn = self.pool.get().expect("should get connection");
        timelines::home_timeline_status_ids(&conn, account_id)
            .expect("home timeline query should succeed")
    }

    pub fn list_timeline(&self, list_id: &str) -> Vec<String> {
        let conn = self.pool.get().expect("should get connection");
        timelines::list_timeline_status_ids(&conn, list_id)
            .expect("list timeline query should succeed")
    }

    pub fn notifications(&self, account_id: &str) -> Vec<Notification> {
        let conn = self.pool.get().expect("should get connection");
        notifications::get_account_notifications(&conn, account_id)
            .expect("notification query should succeed")
    }
}

pub fn local_account(id: &str) -> Account {
    let uri = format!("https://{HOST}/users/{id}");
    Account {
        id: id.to_string(),
        inbox_uri: format!("{uri}/inbox"),
        outbox_uri: format!("{uri}/outbox"),
        followers_uri: format!("{uri}/followers"),
        uri,
        username: id.to_string(),
        domain: None,
        locked: false,
        admin: false,
        also_known_as: Vec::new(),
        moved_to_uri: None,
        move_id: None,
        suspended_at: None,
        created_at: Utc::now(),
    }
}

pub fn remote_account(id: &str, domain: &str) -> Account {
    let uri = format!("https://{domain}/users/{id}");
    Account {
        id: id.to_string(),
        inbox_uri: format!("{uri}/inbox"),
        outbox_uri: format!("{uri}/outbox"),
        followers_uri: format!("{uri}/followers"),
        uri,
        username: id.to_string(),
        domain: Some(domain.to_string()),
        locked: false,
        admin: false,
        also_known_as: Vec::new(),
        moved_to_uri: None,
        move_id: None,
        suspended_at: None,
        created_at: Utc::now(),
    }
}

pub fn status(id: &str, author: &Account) -> Status {
    Status {
        id: id.to_string(),
        uri: format!("{}/statuses/{id}", author.uri),
        account_id: author.id.clone(),
        local: author.is_local(),
        federated: true,
        visibility: Visibility::Public,
        content: format!("status {id}"),
        thread_id: format!("thread-{id}"),
        in_reply_to_id: None,
        in_reply_to_uri: None,
        in_reply_to_account_id: None,
        boost_of_id: None,
        boost_of_account_id: None,
        poll_id: None,
        created_at: Utc::now(),
        account: None,
        boost_of: None,
        in_reply_to_account: None,
        mentions: Vec::new(),
        tags: Vec::new(),
        poll: None,
    }
}

pub fn boost(id: &str, booster: &Account, original: &Status) -> Status {
    Status {
        boost_of_id: Some(original.id.clone()),
        boost_of_account_id: Some(original.account_id.clone()),
        content: String::new(),
        ..status(id, booster)
    }
}

pub fn follow(id: &str, follower: &Account, target: &Account) -> Follow {
    Follow {
        id: id.to_string(),
        uri: format!("{}/follow/{id}", follower.uri),
        account_id: follower.id.clone(),
        target_account_id: target.id.clone(),
        show_reblogs: true,
        notify: false,
        created_at: Utc::now(),
        account: None,
        target_account: None,
    }
}

pub fn list(id: &str, owner: &Account, exclusive: bool) -> List {
    List {
        id: id.to_string(),
        account_id: owner.id.clone(),
        title: format!("list {id}"),
        replies_policy: RepliesPolicy::Followed,
        exclusive,
    }
}
