//! Error types for cdo-stream.

use thiserror::Error;

/// Main error type for all CDO processing operations.
#[derive(Debug, Error)]
pub enum CdoError {
    /// Header identification word did not match.
    #[error("CDO header identification failed: found {found:#010x}")]
    HeaderIdentification { found: u32 },

    /// Fewer header words than the fixed header length.
    #[error("CDO header truncated: {len} words")]
    TruncatedHeader { len: usize },

    /// Header checksum did not match the inverted sum of the header words.
    #[error("CDO header checksum failed: expected {expected:#010x}, found {found:#010x}")]
    Checksum { expected: u32, found: u32 },

    /// Straddling command words could not be copied into the scratch region.
    #[error("Cannot stitch {needed} words into a {capacity}-word scratch region")]
    StitchCopy { needed: usize, capacity: usize },

    /// A break target points behind the current processed length.
    #[error("Invalid break length {target:#x}, already processed {processed:#x}")]
    InvalidBreakLength { target: u32, processed: u32 },

    /// A command handler rejected an execute or resume request.
    #[error("CMD {cmd_id:#010x} failed with status {status:#x} at byte offset {offset:#x}")]
    HandlerFailure { cmd_id: u32, status: u32, offset: u32 },

    /// A byte chunk whose length is not a whole number of words.
    #[error("Chunk length {0} is not a multiple of the word size")]
    UnalignedChunk(usize),

    /// Invalid processor configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error (configuration only).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// State snapshot encode error.
    #[error("Snapshot encode error: {0}")]
    SnapshotEncode(#[from] rmp_serde::encode::Error),

    /// State snapshot decode error.
    #[error("Snapshot decode error: {0}")]
    SnapshotDecode(#[from] rmp_serde::decode::Error),
}

impl CdoError {
    /// Whether the error leaves the stream itself unreadable.
    ///
    /// Only handler failures may be tolerated, and only while a secure
    /// lockdown procedure is running.
    pub fn is_stream_fatal(&self) -> bool {
        !matches!(self, CdoError::HandlerFailure { .. })
    }
}

/// Result type alias using CdoError.
pub type Result<T> = std::result::Result<T, CdoError>;
