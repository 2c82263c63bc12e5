//! Line-oriented stream decoder
//!
//! Consumes the streaming response body line by line and emits decoded
//! [`CompletionChunk`] events until the end-of-stream sentinel. Single
//! consumer; one decoder is owned by exactly one task. Cancellation comes
//! from dropping the `recv()` future.

use std::io;

use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::io::StreamReader;
use tracing::{debug, warn};

use crate::accumulator::ErrorAccumulator;
use crate::chunk::{ChunkFrame, CompletionChunk, StreamEnvelope};
use crate::config::DecoderConfig;
use crate::error::{ApiError, ErrorEnvelope, Result, StreamError};

/// Reader over a `reqwest` response body.
pub type ResponseReader = StreamReader<BoxStream<'static, io::Result<Bytes>>, Bytes>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    Active,
    Finished,
    Failed,
}

pub struct StreamDecoder<R> {
    reader: Option<R>,
    config: DecoderConfig,
    state: DecoderState,
    err_accumulator: ErrorAccumulator,
}

impl<R> std::fmt::Debug for StreamDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamDecoder")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("err_accumulator", &self.err_accumulator)
            .finish_non_exhaustive()
    }
}

impl StreamDecoder<ResponseReader> {
    /// Wrap a streaming HTTP response body.
    pub fn from_response(response: reqwest::Response, config: DecoderConfig) -> Result<Self> {
        let stream = response
            .bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
            .boxed();
        Self::new(StreamReader::new(stream), config)
    }
}

impl<R: AsyncBufRead + Unpin> StreamDecoder<R> {
    pub fn new(reader: R, config: DecoderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            reader: Some(reader),
            config,
            state: DecoderState::Active,
            err_accumulator: ErrorAccumulator::new(),
        })
    }

    /// Pull the next chunk. `Ok(None)` signals end-of-stream; both terminal
    /// states are sticky, so calling again after the end (or after a fatal
    /// error) is harmless.
    pub async fn recv(&mut self) -> Result<Option<CompletionChunk>> {
        match self.state {
            DecoderState::Finished => return Ok(None),
            DecoderState::Failed => return Err(StreamError::Terminated),
            DecoderState::Active => {}
        }

        match self.process_lines().await {
            Ok(Some(chunk)) => Ok(Some(chunk)),
            Ok(None) => {
                self.state = DecoderState::Finished;
                Ok(None)
            }
            Err(err) => {
                self.state = DecoderState::Failed;
                Err(err)
            }
        }
    }

    /// Release the underlying reader. Safe to call more than once.
    pub fn close(&mut self) {
        if self.reader.take().is_some() {
            debug!("stream decoder closed");
        }
        if self.state == DecoderState::Active {
            self.state = DecoderState::Finished;
        }
    }

    async fn process_lines(&mut self) -> Result<Option<CompletionChunk>> {
        let Self {
            reader,
            config,
            err_accumulator,
            ..
        } = self;
        let Some(reader) = reader.as_mut() else {
            return Ok(None);
        };

        let mut empty_messages_count: u32 = 0;
        let mut has_error_prefix = false;
        let mut line = String::new();

        loop {
            line.clear();
            let read = match reader.read_line(&mut line).await {
                Ok(n) => n,
                Err(err) => {
                    // Prefer the structured upstream error if one was being
                    // accumulated; otherwise surface the raw read failure.
                    if let Some(api_err) = unmarshal_error(err_accumulator) {
                        return Err(StreamError::Api(api_err));
                    }
                    return Err(StreamError::Transport(err));
                }
            };

            if read == 0 {
                if let Some(api_err) = unmarshal_error(err_accumulator) {
                    return Err(StreamError::Api(api_err));
                }
                if has_error_prefix {
                    // An error payload started but never became parseable.
                    return Err(StreamError::Transport(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "stream ended inside an error payload",
                    )));
                }
                // Connection close without [DONE] is a legitimate end.
                return Ok(None);
            }

            let trimmed = line.trim();
            if trimmed.starts_with(&config.error_prefix) {
                has_error_prefix = true;
            }

            if !trimmed.starts_with(&config.data_prefix) || has_error_prefix {
                let raw = if has_error_prefix {
                    trimmed.strip_prefix(&config.data_prefix).unwrap_or(trimmed)
                } else {
                    trimmed
                };
                err_accumulator.write(raw.as_bytes());

                empty_messages_count += 1;
                if empty_messages_count > config.empty_messages_limit {
                    return Err(StreamError::TooManyEmptyMessages);
                }

                continue;
            }

            let payload = trimmed.strip_prefix(&config.data_prefix).unwrap_or(trimmed);
            if payload == config.done_sentinel {
                return Ok(None);
            }

            let envelope: StreamEnvelope = serde_json::from_str(payload)?;
            debug!(origin = %envelope.origin, "decoded stream envelope");
            return Ok(Some(merge_sub_frames(config, &envelope)));
        }
    }
}

/// Reassemble the sub-frames packed inside one envelope payload into a
/// single chunk. A sub-frame that fails to decode is skipped, not fatal.
fn merge_sub_frames(config: &DecoderConfig, envelope: &StreamEnvelope) -> CompletionChunk {
    let mut chunk = CompletionChunk::default();

    for part in envelope.data.split("\n\n") {
        if part.is_empty() {
            continue;
        }
        let raw = part.strip_prefix(&config.data_prefix).unwrap_or(part);
        let frame: ChunkFrame = match serde_json::from_str(raw) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, "skipping malformed sub-frame");
                continue;
            }
        };

        chunk.id = frame.id;
        chunk.object = frame.object;
        chunk.created = frame.created;
        chunk.model = frame.model;

        for choice in &frame.choices {
            chunk.delta.push_str(&choice.delta.content);
            if choice.finish_reason.is_some() {
                chunk.finish_reason = choice.finish_reason.clone();
            }
        }
    }

    chunk
}

fn unmarshal_error(acc: &ErrorAccumulator) -> Option<ApiError> {
    if acc.is_empty() {
        return None;
    }
    match serde_json::from_slice::<ErrorEnvelope>(acc.bytes()) {
        Ok(envelope) => Some(envelope.error),
        Err(_) => None,
    }
}
