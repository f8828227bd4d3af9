//! Reindex Lambda - Rebuilds a user's chat index from their chats.
//!
//! Creating a chat writes the chat and the index entry separately, so an
//! index update can fail after the chat is saved. Invoke this with the
//! affected user to bring the index back in line.

use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde::{Deserialize, Serialize};
use shared::{db, ChatService, Config, PgChatStore};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReindexEvent {
    user_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReindexResponse {
    user_id: String,
    chats: usize,
}

async fn handler(
    service: Arc<ChatService>,
    event: LambdaEvent<ReindexEvent>,
) -> Result<ReindexResponse, Error> {
    let user_id = event.payload.user_id;
    if user_id.trim().is_empty() {
        return Err("userId is required".into());
    }

    info!(user_id = %user_id, "Rebuilding chat index");
    let chats = service.rebuild_index(&user_id).await?;

    Ok(ReindexResponse { user_id, chats })
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let config = Config::from_env();
    let store = PgChatStore::new(db::connect(&config).await?);
    let service = Arc::new(ChatService::new(Arc::new(store.clone())));

    let result = run(service_fn(move |event| {
        let service = Arc::clone(&service);
        async move { handler(service, event).await }
    }))
    .await;

    store.close().await;
    result
}
