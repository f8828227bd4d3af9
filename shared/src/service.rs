//! Chat operations scoped to the requesting user.
//!
//! The service keeps no state of its own; every call goes to the store.

use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::{title_from, AppendOutcome, Chat, ChatSummary, Turn};
use crate::store::ChatStore;
use crate::{Error, Result};

#[derive(Clone)]
pub struct ChatService {
    store: Arc<dyn ChatStore>,
}

impl ChatService {
    pub fn new(store: Arc<dyn ChatStore>) -> Self {
        Self { store }
    }

    /// Create a chat holding one user turn and record it in the user's index.
    ///
    /// The chat insert and the index update are separate writes. If the
    /// index update fails the chat stays and the error is returned;
    /// `rebuild_index` repairs the index from the user's chats.
    pub async fn create_chat(&self, user_id: &str, text: &str) -> Result<Uuid> {
        if text.is_empty() {
            return Err(Error::Validation("text cannot be empty".to_string()));
        }

        let chat = self
            .store
            .insert_chat(user_id, vec![Turn::user(text, None)])
            .await?;

        let summary = ChatSummary {
            chat_id: chat.id,
            title: title_from(text),
            created_at: chat.created_at,
        };

        if let Err(e) = self.record_summary(user_id, summary).await {
            error!(
                chat_id = %chat.id,
                user_id,
                "chat saved but index update failed: {}",
                e
            );
            return Err(e);
        }

        info!(chat_id = %chat.id, user_id, "created chat");
        Ok(chat.id)
    }

    async fn record_summary(&self, user_id: &str, summary: ChatSummary) -> Result<()> {
        if self.store.find_index(user_id).await?.is_none() {
            return self.store.insert_index(user_id, summary).await;
        }

        if self.store.push_summary(user_id, summary.clone()).await? == 0 {
            // Index vanished between lookup and push.
            warn!(user_id, "chat index missing on push, recreating");
            self.store.insert_index(user_id, summary).await?;
        }
        Ok(())
    }

    /// The user's chat summaries in creation order; empty when the user has
    /// never created a chat.
    pub async fn list_chat_summaries(&self, user_id: &str) -> Result<Vec<ChatSummary>> {
        Ok(self
            .store
            .find_index(user_id)
            .await?
            .map(|index| index.chats)
            .unwrap_or_default())
    }

    /// Fetch a chat the user owns.
    pub async fn get_chat(&self, chat_id: Uuid, user_id: &str) -> Result<Chat> {
        self.store
            .find_chat(chat_id, user_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("chat {}", chat_id)))
    }

    /// Append an optional user turn followed by a model turn.
    ///
    /// An empty `question` adds no user turn, and an empty `img` is
    /// treated as absent.
    pub async fn append_turn(
        &self,
        chat_id: Uuid,
        user_id: &str,
        question: Option<&str>,
        answer: &str,
        img: Option<&str>,
    ) -> Result<AppendOutcome> {
        let img = img.filter(|i| !i.is_empty()).map(String::from);

        let mut turns = Vec::with_capacity(2);
        if let Some(question) = question.filter(|q| !q.is_empty()) {
            turns.push(Turn::user(question, img));
        }
        turns.push(Turn::model(answer));

        let outcome = self.store.append_turns(chat_id, user_id, turns).await?;
        if outcome.matched == 0 {
            return Err(Error::NotFound(format!("chat {}", chat_id)));
        }

        info!(%chat_id, user_id, "chat updated");
        Ok(outcome)
    }

    /// Rebuild a user's index from the chats they own. Returns the number
    /// of summaries written.
    pub async fn rebuild_index(&self, user_id: &str) -> Result<usize> {
        let summaries: Vec<ChatSummary> = self
            .store
            .list_chats_by_owner(user_id)
            .await?
            .iter()
            .map(Chat::summary)
            .collect();

        let count = summaries.len();
        self.store.replace_index(user_id, summaries).await?;

        info!(user_id, count, "rebuilt chat index");
        Ok(count)
    }
}
