//! Wire types for the streaming chat-completion protocol
//!
//! One outer data line carries a [`StreamEnvelope`] whose `data` field packs
//! several independently JSON-encoded [`ChunkFrame`] sub-frames, separated by
//! blank lines and each carrying its own `data: ` prefix. The decoder merges
//! them into one caller-facing [`CompletionChunk`].

use serde::{Deserialize, Serialize};

/// Outer envelope decoded from a single data line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEnvelope {
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub code: i64,
}

/// One sub-frame packed inside an envelope payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkFrame {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub delta: ChunkDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: String,
}

/// Decoded unit of output: metadata of the last successfully parsed
/// sub-frame plus the concatenated incremental text of all of them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CompletionChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub delta: String,
    pub finish_reason: Option<String>,
}
