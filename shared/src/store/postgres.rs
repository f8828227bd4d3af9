//! PostgreSQL-backed store. Histories and index entries live in JSONB
//! arrays and are appended with `||` inside a single UPDATE.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::ChatStore;
use crate::models::{AppendOutcome, Chat, ChatSummary, Turn, UserChatIndex};
use crate::Result;

const CHAT_COLUMNS: &str = "id, user_id, history, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct ChatRow {
    id: Uuid,
    user_id: String,
    history: Json<Vec<Turn>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ChatRow> for Chat {
    fn from(row: ChatRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            history: row.history.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct IndexRow {
    user_id: String,
    chats: Json<Vec<ChatSummary>>,
}

/// Chat store over a shared connection pool.
#[derive(Debug, Clone)]
pub struct PgChatStore {
    pool: PgPool,
}

impl PgChatStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl ChatStore for PgChatStore {
    async fn insert_chat(&self, user_id: &str, history: Vec<Turn>) -> Result<Chat> {
        let row: ChatRow = sqlx::query_as(&format!(
            "INSERT INTO chats (user_id, history) VALUES ($1, $2) RETURNING {}",
            CHAT_COLUMNS
        ))
        .bind(user_id)
        .bind(Json(history))
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn find_chat(&self, chat_id: Uuid, user_id: &str) -> Result<Option<Chat>> {
        let row: Option<ChatRow> = sqlx::query_as(&format!(
            "SELECT {} FROM chats WHERE id = $1 AND user_id = $2",
            CHAT_COLUMNS
        ))
        .bind(chat_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Chat::from))
    }

    async fn append_turns(
        &self,
        chat_id: Uuid,
        user_id: &str,
        turns: Vec<Turn>,
    ) -> Result<AppendOutcome> {
        let added = !turns.is_empty();
        let result = sqlx::query(
            r#"
            UPDATE chats
            SET history = history || $3, updated_at = now()
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(chat_id)
        .bind(user_id)
        .bind(Json(turns))
        .execute(&self.pool)
        .await?;

        let matched = result.rows_affected();
        Ok(AppendOutcome {
            matched,
            modified: if added { matched } else { 0 },
        })
    }

    async fn find_index(&self, user_id: &str) -> Result<Option<UserChatIndex>> {
        let row: Option<IndexRow> =
            sqlx::query_as("SELECT user_id, chats FROM user_chats WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|row| UserChatIndex {
            user_id: row.user_id,
            chats: row.chats.0,
        }))
    }

    async fn insert_index(&self, user_id: &str, summary: ChatSummary) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_chats (user_id, chats)
            VALUES ($1, $2)
            ON CONFLICT (user_id)
            DO UPDATE SET chats = user_chats.chats || EXCLUDED.chats, updated_at = now()
            "#,
        )
        .bind(user_id)
        .bind(Json(vec![summary]))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn push_summary(&self, user_id: &str, summary: ChatSummary) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE user_chats SET chats = chats || $2, updated_at = now() WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(Json(vec![summary]))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn list_chats_by_owner(&self, user_id: &str) -> Result<Vec<Chat>> {
        let rows: Vec<ChatRow> = sqlx::query_as(&format!(
            "SELECT {} FROM chats WHERE user_id = $1 ORDER BY created_at, id",
            CHAT_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Chat::from).collect())
    }

    async fn replace_index(&self, user_id: &str, chats: Vec<ChatSummary>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_chats (user_id, chats)
            VALUES ($1, $2)
            ON CONFLICT (user_id)
            DO UPDATE SET chats = EXCLUDED.chats, updated_at = now()
            "#,
        )
        .bind(user_id)
        .bind(Json(chats))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
