//! Document storage for chats and per-user chat indexes.
//!
//! Every array mutation goes through the store's own atomic append so
//! concurrent writers on the same chat or index never drop each other's
//! items. Lookups are always scoped by owner.

mod memory;
mod postgres;

pub use memory::MemoryChatStore;
pub use postgres::PgChatStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{AppendOutcome, Chat, ChatSummary, Turn, UserChatIndex};
use crate::Result;

#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Insert a new chat; the store assigns its id and timestamps.
    async fn insert_chat(&self, user_id: &str, history: Vec<Turn>) -> Result<Chat>;

    /// Fetch a chat only if `user_id` owns it.
    async fn find_chat(&self, chat_id: Uuid, user_id: &str) -> Result<Option<Chat>>;

    /// Atomically append turns to an owned chat's history.
    async fn append_turns(
        &self,
        chat_id: Uuid,
        user_id: &str,
        turns: Vec<Turn>,
    ) -> Result<AppendOutcome>;

    /// Fetch a user's chat index.
    async fn find_index(&self, user_id: &str) -> Result<Option<UserChatIndex>>;

    /// Create a user's index seeded with one summary. If an index already
    /// exists for the user, the summary is appended to it instead.
    async fn insert_index(&self, user_id: &str, summary: ChatSummary) -> Result<()>;

    /// Atomically append a summary to an existing index. Returns the number
    /// of index documents matched.
    async fn push_summary(&self, user_id: &str, summary: ChatSummary) -> Result<u64>;

    /// All chats owned by `user_id`, oldest first.
    async fn list_chats_by_owner(&self, user_id: &str) -> Result<Vec<Chat>>;

    /// Overwrite a user's index, creating it if needed.
    async fn replace_index(&self, user_id: &str, chats: Vec<ChatSummary>) -> Result<()>;
}
