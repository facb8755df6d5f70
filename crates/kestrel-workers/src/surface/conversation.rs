use chrono::Utc;
use kestrel_types::{Account, Conversation, Status, Visibility};

use super::Surface;
use crate::{MultiError, WorkerError};

impl Surface {
    /// Records a direct status in the conversation of each local
    /// participant and streams the updated conversation.
    pub async fn update_conversations(&self, status: &Status) -> Result<(), WorkerError> {
        if status.visibility != Visibility::Direct || status.is_boost() {
            return Ok(());
        }
        let author = self
            .account(status.account.as_deref(), &status.account_id)
            .await?;

        let mut participants: Vec<Account> = vec![author.clone()];
        for mention in &status.mentions {
            let account = self
                .account(mention.target_account.as_deref(), &mention.target_account_id)
                .await?;
            if !participants.iter().any(|p| p.id == account.id) {
                participants.push(account);
            }
        }

        let mut errs = MultiError::new();
        for participant in participants.iter().filter(|p| p.is_local()) {
            if let Err(err) = self.update_conversation_for(participant, &participants, status).await {
                errs.push_context(format_args!("conversation of {}", participant.id), err);
            }
        }
        errs.combine()
    }

    async fn update_conversation_for(
        &self,
        viewer: &Account,
        participants: &[Account],
        status: &Status,
    ) -> Result<(), WorkerError> {
        if self.db.is_thread_muted(&status.thread_id, &viewer.id).await? {
            return Ok(());
        }
        let mut others: Vec<String> = participants
            .iter()
            .filter(|p| p.id != viewer.id)
            .map(|p| p.id.clone())
            .collect();
        others.sort();

        let conversation = self
            .db
            .upsert_conversation(&Conversation {
                id: uuid::Uuid::new_v4().to_string(),
                account_id: viewer.id.clone(),
                thread_id: status.thread_id.clone(),
                last_status_id: status.id.clone(),
                participant_ids: others,
                read: viewer.id == status.account_id,
                updated_at: Utc::now(),
            })
            .await?;

        let api = self.converter.conversation(&conversation, viewer, status).await?;
        self.stream.conversation(viewer, api);
        Ok(())
    }
}
