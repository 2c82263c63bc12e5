//! chat_stream - Streaming chat-completion decode
//!
//! Turns a line-delimited streaming response body into a sequence of
//! [`CompletionChunk`] events. The upstream fragments one logical token
//! across several encoded sub-frames packed inside a single outer data
//! frame; [`StreamDecoder`] reassembles them before handing a chunk to the
//! caller, tolerating isolated malformed sub-frames without aborting the
//! stream.

pub mod accumulator;
pub mod chunk;
pub mod client;
pub mod config;
pub mod decoder;
pub mod error;

pub use accumulator::ErrorAccumulator;
pub use chunk::{ChunkChoice, ChunkDelta, ChunkFrame, CompletionChunk, StreamEnvelope};
pub use client::{ChatClient, ChatCompletionRequest, WireMessage};
pub use config::{ConfigError, DecoderConfig};
pub use decoder::{ResponseReader, StreamDecoder};
pub use error::{ApiError, Result, RetryAdvice, StreamError};
