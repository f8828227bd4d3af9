//! In-process store for tests and local runs.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::ChatStore;
use crate::models::{AppendOutcome, Chat, ChatSummary, Turn, UserChatIndex};
use crate::Result;

#[derive(Debug, Default)]
struct State {
    /// Insertion order doubles as creation order.
    chats: Vec<Chat>,
    indexes: Vec<UserChatIndex>,
}

/// Chat store holding everything behind one lock, so each operation is
/// atomic the same way a single-row UPDATE is.
#[derive(Debug, Default)]
pub struct MemoryChatStore {
    state: RwLock<State>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of index documents held for `user_id`.
    pub async fn index_count(&self, user_id: &str) -> usize {
        let state = self.state.read().await;
        state.indexes.iter().filter(|i| i.user_id == user_id).count()
    }
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn insert_chat(&self, user_id: &str, history: Vec<Turn>) -> Result<Chat> {
        let now = Utc::now();
        let chat = Chat {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            history,
            created_at: now,
            updated_at: now,
        };

        self.state.write().await.chats.push(chat.clone());
        Ok(chat)
    }

    async fn find_chat(&self, chat_id: Uuid, user_id: &str) -> Result<Option<Chat>> {
        let state = self.state.read().await;
        Ok(state
            .chats
            .iter()
            .find(|c| c.id == chat_id && c.user_id == user_id)
            .cloned())
    }

    async fn append_turns(
        &self,
        chat_id: Uuid,
        user_id: &str,
        turns: Vec<Turn>,
    ) -> Result<AppendOutcome> {
        let mut state = self.state.write().await;
        let Some(chat) = state
            .chats
            .iter_mut()
            .find(|c| c.id == chat_id && c.user_id == user_id)
        else {
            return Ok(AppendOutcome::default());
        };

        let modified = u64::from(!turns.is_empty());
        chat.history.extend(turns);
        chat.updated_at = Utc::now();

        Ok(AppendOutcome { matched: 1, modified })
    }

    async fn find_index(&self, user_id: &str) -> Result<Option<UserChatIndex>> {
        let state = self.state.read().await;
        Ok(state.indexes.iter().find(|i| i.user_id == user_id).cloned())
    }

    async fn insert_index(&self, user_id: &str, summary: ChatSummary) -> Result<()> {
        let mut state = self.state.write().await;
        match state.indexes.iter_mut().find(|i| i.user_id == user_id) {
            Some(index) => index.chats.push(summary),
            None => state.indexes.push(UserChatIndex {
                user_id: user_id.to_string(),
                chats: vec![summary],
            }),
        }
        Ok(())
    }

    async fn push_summary(&self, user_id: &str, summary: ChatSummary) -> Result<u64> {
        let mut state = self.state.write().await;
        match state.indexes.iter_mut().find(|i| i.user_id == user_id) {
            Some(index) => {
                index.chats.push(summary);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn list_chats_by_owner(&self, user_id: &str) -> Result<Vec<Chat>> {
        let state = self.state.read().await;
        Ok(state
            .chats
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn replace_index(&self, user_id: &str, chats: Vec<ChatSummary>) -> Result<()> {
        let mut state = self.state.write().await;
        match state.indexes.iter_mut().find(|i| i.user_id == user_id) {
            Some(index) => index.chats = chats,
            None => state.indexes.push(UserChatIndex {
                user_id: user_id.to_string(),
                chats,
            }),
        }
        Ok(())
    }
}
