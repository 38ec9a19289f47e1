//! Processor configuration.
//!
//! Configuration is plain JSON; every field is optional and falls back to
//! the default wire constants.
//!
//! # Example
//!
//! ```
//! use cdo_stream::config::ProcessorConfig;
//!
//! let config = ProcessorConfig::from_json(r#"{ "payload_dump_words": 4 }"#).unwrap();
//! assert_eq!(config.payload_dump_words, 4);
//! assert_eq!(config.stitch_threshold, 8);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CdoError, Result};
use crate::protocol::{LONG_CMD_HDR_LEN, MAX_LONG_CMD_LEN, CMD_END, SCRATCH_CAPACITY};

/// Default number of payload words dumped when a command fails.
pub const DEFAULT_PAYLOAD_DUMP_WORDS: usize = 8;

/// Tunables of the stream processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Cap applied to long-form payload lengths.
    pub max_long_cmd_len: u32,
    /// Command word denoting END.
    pub end_command: u32,
    /// Views shorter than this that do not hold a whole command are stitched.
    pub stitch_threshold: usize,
    /// Payload words logged when a command fails.
    pub payload_dump_words: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_long_cmd_len: MAX_LONG_CMD_LEN,
            end_command: CMD_END,
            stitch_threshold: SCRATCH_CAPACITY,
            payload_dump_words: DEFAULT_PAYLOAD_DUMP_WORDS,
        }
    }
}

impl ProcessorConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check the configuration for consistency.
    pub fn validate(&self) -> Result<()> {
        if !(LONG_CMD_HDR_LEN..=SCRATCH_CAPACITY).contains(&self.stitch_threshold) {
            return Err(CdoError::Config(format!(
                "stitch_threshold {} outside {}..={}",
                self.stitch_threshold, LONG_CMD_HDR_LEN, SCRATCH_CAPACITY
            )));
        }

        if self.max_long_cmd_len == 0 || self.max_long_cmd_len > MAX_LONG_CMD_LEN {
            return Err(CdoError::Config(format!(
                "max_long_cmd_len {:#x} outside 1..={:#x}",
                self.max_long_cmd_len, MAX_LONG_CMD_LEN
            )));
        }

        Ok(())
    }
}
