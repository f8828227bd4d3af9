//! Shared library for the chat backend Lambda functions.
//!
//! This crate provides the chat domain types, storage, the chat service and
//! the auth/upload/HTTP plumbing used across all Lambda functions.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod models;
pub mod service;
pub mod store;
pub mod upload;

pub use auth::{extract_user_from_context, AuthenticatedUser, IdentityVerifier, JwtVerifier};
pub use config::Config;
pub use error::{Error, Result};
pub use models::{
    AppendAck, AppendOutcome, AppendTurnRequest, Chat, ChatSummary, CreateChatRequest, Role,
    Turn, UserChatIndex,
};
pub use service::ChatService;
pub use store::{ChatStore, MemoryChatStore, PgChatStore};
pub use upload::{ImageKitSigner, UploadAuth, UploadSigner};
