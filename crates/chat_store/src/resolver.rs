//! Context resolver
//!
//! Projects the leaf-first chain returned by the store into the oldest-first
//! list a model call expects. Pure projection; all I/O happens in the store.

use chat_core::Message;

use crate::error::Result;
use crate::store::ConversationStorage;

/// Reverse a leaf-first chain into creation order.
pub fn oldest_first(mut chain: Vec<Message>) -> Vec<Message> {
    chain.reverse();
    chain
}

pub struct ContextResolver<S> {
    store: S,
}

impl<S: ConversationStorage> ContextResolver<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Materialize the conversation history ending at `leaf_id`,
    /// oldest message first.
    pub async fn resolve(&self, leaf_id: &str) -> Result<Vec<Message>> {
        let chain = self.store.get_context_chain(leaf_id).await?;
        Ok(oldest_first(chain))
    }
}
