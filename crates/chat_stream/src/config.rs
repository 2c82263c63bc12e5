//! Decoder configuration
//!
//! Every knob the decoder consumes lives here, passed explicitly into
//! constructors instead of ambient global state. Invalid values are rejected
//! at construction so a misconfigured decoder is never used.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default cap on consecutive non-data lines before the stream is abandoned.
pub const DEFAULT_EMPTY_MESSAGES_LIMIT: u32 = 300;

/// Prefix marking a data line.
pub const DATA_PREFIX: &str = "data: ";

/// Prefix marking the start of a structured error payload.
pub const ERROR_PREFIX: &str = "data: {\"error\":";

/// Literal end-of-stream sentinel, after data-prefix removal.
pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("empty_messages_limit must be greater than zero")]
    ZeroEmptyMessagesLimit,

    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("error_prefix must extend data_prefix so error lines are also data lines")]
    ErrorPrefixMismatch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Maximum tolerated count of non-data lines before decoding fails with
    /// `TooManyEmptyMessages`. Bounds resource consumption against an
    /// upstream that stalls or emits noise instead of terminating.
    pub empty_messages_limit: u32,

    /// Marker prefix classifying a line as a data line.
    pub data_prefix: String,

    /// Marker pattern that switches the decoder into error-accumulation mode.
    pub error_prefix: String,

    /// End-of-stream sentinel compared after data-prefix removal.
    pub done_sentinel: String,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            empty_messages_limit: DEFAULT_EMPTY_MESSAGES_LIMIT,
            data_prefix: DATA_PREFIX.to_string(),
            error_prefix: ERROR_PREFIX.to_string(),
            done_sentinel: DONE_SENTINEL.to_string(),
        }
    }
}

impl DecoderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.empty_messages_limit == 0 {
            return Err(ConfigError::ZeroEmptyMessagesLimit);
        }
        if self.data_prefix.is_empty() {
            return Err(ConfigError::EmptyField("data_prefix"));
        }
        if self.error_prefix.is_empty() {
            return Err(ConfigError::EmptyField("error_prefix"));
        }
        if self.done_sentinel.is_empty() {
            return Err(ConfigError::EmptyField("done_sentinel"));
        }
        if !self.error_prefix.starts_with(&self.data_prefix) {
            return Err(ConfigError::ErrorPrefixMismatch);
        }
        Ok(())
    }
}
