//! Stream error taxonomy
//!
//! Decode errors are never silently swallowed; everything propagates to the
//! immediate caller as a typed result. The one intentionally tolerated
//! failure is a malformed sub-frame inside an otherwise healthy chunk, which
//! the decoder skips locally (see `decoder`).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum StreamError {
    /// Underlying read failed (network / I-O). Not retried by the core.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Top-level envelope failed to unmarshal. Fatal for the stream.
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] serde_json::Error),

    /// Non-data-line backpressure threshold exceeded.
    #[error("stream has sent too many empty messages")]
    TooManyEmptyMessages,

    /// Structured error payload decoded from the accumulated error bytes.
    #[error("upstream API error: {0}")]
    Api(ApiError),

    /// The decoder previously failed; the original error already surfaced.
    #[error("decoder is in a failed state")]
    Terminated,

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, StreamError>;

/// Caller-driven retry classification for upstream API errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAdvice {
    /// Credential problem; retrying cannot help.
    Never,
    /// Rate-limited or overloaded; retry after backing off.
    Backoff,
    /// Transient server-side failure; retry.
    Retry,
    /// Unknown classification; policy is up to the caller.
    Unspecified,
}

/// Structured upstream error decoded out of the error-accumulation buffer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiError {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
}

impl ApiError {
    pub fn retry_advice(&self) -> RetryAdvice {
        match self.code {
            Some(401) | Some(403) => RetryAdvice::Never,
            Some(429) | Some(503) => RetryAdvice::Backoff,
            Some(code) if (500..600).contains(&code) => RetryAdvice::Retry,
            _ => RetryAdvice::Unspecified,
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "status {}, {}", code, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Wire shape of the accumulated error payload: `{"error": {...}}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ApiError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_is_never_retried() {
        let err = ApiError {
            code: Some(401),
            message: "invalid token".to_string(),
            error_type: None,
        };
        assert_eq!(err.retry_advice(), RetryAdvice::Never);
    }

    #[test]
    fn rate_limit_and_overload_back_off() {
        for code in [429, 503] {
            let err = ApiError {
                code: Some(code),
                message: String::new(),
                error_type: None,
            };
            assert_eq!(err.retry_advice(), RetryAdvice::Backoff);
        }
    }

    #[test]
    fn server_errors_retry() {
        let err = ApiError {
            code: Some(500),
            message: "internal".to_string(),
            error_type: None,
        };
        assert_eq!(err.retry_advice(), RetryAdvice::Retry);
    }

    #[test]
    fn unknown_code_is_unspecified() {
        let err = ApiError {
            code: None,
            message: "?".to_string(),
            error_type: None,
        };
        assert_eq!(err.retry_advice(), RetryAdvice::Unspecified);
        let err = ApiError {
            code: Some(404),
            ..err
        };
        assert_eq!(err.retry_advice(), RetryAdvice::Unspecified);
    }

    #[test]
    fn error_envelope_deserializes() {
        let payload = r#"{"error":{"code":429,"message":"slow down","type":"rate_limit"}}"#;
        let envelope: ErrorEnvelope = serde_json::from_str(payload).unwrap();
        assert_eq!(envelope.error.code, Some(429));
        assert_eq!(envelope.error.message, "slow down");
        assert_eq!(envelope.error.error_type.as_deref(), Some("rate_limit"));
    }
}
