//! SQLite persistence for conversation metadata.
//!
//! The assistant is stateless per request; everything that must survive a
//! turn (pending actions, caches) lives in one metadata table keyed by
//! conversation id. `store` wraps the raw repository with the typed
//! pending-action contract the agents actually use.

pub mod connection;
pub mod migrations;
pub mod repositories;
pub mod store;

pub use connection::{connect, connect_with_settings, DbPool};
pub use repositories::{
    InMemoryMetadataRepository, MetadataRepository, RepositoryError, SqlMetadataRepository,
};
pub use store::{ConversationLocks, PendingStore, StoreError};
