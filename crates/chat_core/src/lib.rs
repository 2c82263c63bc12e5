//! chat_core - Core types shared by the chat streaming and storage crates
//!
//! This crate provides the foundational types used on both sides of a chat
//! turn:
//! - `message` - Role and Message, the unit persisted per turn

pub mod message;

// Re-export commonly used types
pub use message::{Message, Role};
