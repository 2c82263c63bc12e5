//! Store configuration

use std::time::Duration;

use crate::error::{Result, StoreError};

/// Reserved parent id marking a conversation root.
pub const ROOT_PARENT_ID: &str = "chatcmpl-start";

/// Default bound on parent-chain traversal.
pub const DEFAULT_MAX_CHAIN_DEPTH: usize = 512;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Sentinel parent id that terminates context traversal.
    pub root_parent_id: String,

    /// Maximum number of messages collected while walking parent pointers.
    /// Guards against unbounded traversal over malformed data.
    pub max_chain_depth: usize,

    /// Deadline applied to each storage operation. `None` means unbounded.
    pub op_timeout: Option<Duration>,

    /// SQLite busy timeout for contended row operations.
    pub busy_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root_parent_id: ROOT_PARENT_ID.to_string(),
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
            op_timeout: None,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<()> {
        if self.root_parent_id.is_empty() {
            return Err(StoreError::Config(
                "root_parent_id must not be empty".to_string(),
            ));
        }
        if self.max_chain_depth == 0 {
            return Err(StoreError::Config(
                "max_chain_depth must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(StoreConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_root_sentinel_rejected() {
        let config = StoreConfig {
            root_parent_id: String::new(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(StoreError::Config(_))));
    }

    #[test]
    fn zero_depth_rejected() {
        let config = StoreConfig {
            max_chain_depth: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(StoreError::Config(_))));
    }
}
