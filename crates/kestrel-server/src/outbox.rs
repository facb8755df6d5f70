//! Federating actor that hands activities to the delivery layer through
//! the `outgoing_activities` table.

use async_trait::async_trait;
use kestrel_db::{outbox, SqliteStore};
use kestrel_workers::{Activity, FederatingActor, WorkerError};
use url::Url;

pub struct StoringActor {
    store: SqliteStore,
}

impl StoringActor {
    pub fn new(store: SqliteStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl FederatingActor for StoringActor {
    async fn send(&self, outbox_uri: &Url, activity: Activity) -> Result<(), WorkerError> {
        let body = serde_json::to_string(&activity)?;
        let kind = activity.kind.as_str();
        let outbox_uri = outbox_uri.to_string();

        let row_id = self
            .store
            .call({
                let outbox_uri = outbox_uri.clone();
                move |conn| outbox::enqueue_activity(conn, &outbox_uri, kind, &body)
            })
            .await?;
        tracing::debug!(row_id, kind, outbox = %outbox_uri, "stored outgoing activity");
        Ok(())
    }
}
