//! chat_store - Durable conversation storage and context reconstruction
//!
//! Persists the message forest (id -> role, content, parent id) and rebuilds
//! the ordered context a model call expects by walking parent pointers from
//! a leaf message back to the conversation root.

pub mod config;
pub mod error;
pub mod resolver;
pub mod store;

// Re-exports
pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use resolver::{oldest_first, ContextResolver};
pub use store::{ConversationStorage, SqliteConversationStore};
