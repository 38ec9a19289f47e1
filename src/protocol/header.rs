//! Object header encoding and verification.
//!
//! Every configuration object starts with a fixed 5-word header:
//! ```text
//! ┌──────────┬────────────────┬─────────┬────────────┬──────────┐
//! │ Hdr words│ Identification │ Version │ Length     │ Checksum │
//! │ word 0   │ word 1 ("XLNX")│ word 2  │ word 3     │ word 4   │
//! └──────────┴────────────────┴─────────┴────────────┴──────────┘
//! ```
//!
//! The checksum is the bitwise-NOT of the wrapping sum of words 0..=3.
//! The length field counts the command words that follow the header.

use serde::{Deserialize, Serialize};

use crate::error::{CdoError, Result};

/// Header size in words (fixed, exactly 5).
pub const HEADER_LEN: usize = 5;

/// Identification word expected at header word 1 (ASCII "XLNX").
pub const IDENTIFICATION_WORD: u32 = 0x584C_4E58;

/// Value of header word 0: number of header words following it.
pub const HEADER_REMAINING_WORDS: u32 = (HEADER_LEN as u32) - 1;

/// Object format version written by [`ObjectHeader::new`].
pub const DEFAULT_VERSION: u32 = 0x0000_0200;

/// Index of the declared object length within the header.
const LENGTH_INDEX: usize = 3;

/// Decoded object header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectHeader {
    /// Remaining header words after word 0.
    pub remaining_words: u32,
    /// Identification magic.
    pub identification: u32,
    /// Format version.
    pub version: u32,
    /// Declared object length in words, header excluded.
    pub length: u32,
    /// Inverted sum of the preceding header words.
    pub checksum: u32,
}

impl ObjectHeader {
    /// Create a well-formed header for an object of `length` words.
    pub fn new(version: u32, length: u32) -> Self {
        let mut header = Self {
            remaining_words: HEADER_REMAINING_WORDS,
            identification: IDENTIFICATION_WORD,
            version,
            length,
            checksum: 0,
        };
        let words = header.encode();
        header.checksum = checksum(&words[..HEADER_LEN - 1]);
        header
    }

    /// Encode the header to words.
    pub fn encode(&self) -> [u32; HEADER_LEN] {
        [
            self.remaining_words,
            self.identification,
            self.version,
            self.length,
            self.checksum,
        ]
    }

    /// Decode a header from words.
    ///
    /// Returns `None` if the buffer is too short.
    pub fn decode(buf: &[u32]) -> Option<Self> {
        if buf.len() < HEADER_LEN {
            return None;
        }
        Some(Self {
            remaining_words: buf[0],
            identification: buf[1],
            version: buf[2],
            length: buf[LENGTH_INDEX],
            checksum: buf[HEADER_LEN - 1],
        })
    }

    /// Verify identification and checksum.
    pub fn verify(&self) -> Result<()> {
        if self.identification != IDENTIFICATION_WORD {
            tracing::error!("CDO header identification failed");
            return Err(CdoError::HeaderIdentification {
                found: self.identification,
            });
        }

        let words = self.encode();
        let expected = checksum(&words[..HEADER_LEN - 1]);
        if expected != self.checksum {
            tracing::error!("Config object checksum failed");
            return Err(CdoError::Checksum {
                expected,
                found: self.checksum,
            });
        }

        tracing::info!("Config object version {:#010x}", self.version);
        tracing::info!("Length {:#010x}", self.length);
        Ok(())
    }
}

/// Inverted wrapping sum of `words`.
#[inline]
pub fn checksum(words: &[u32]) -> u32 {
    !words.iter().fold(0u32, |sum, w| sum.wrapping_add(*w))
}

/// Decode and verify a header, returning it on success.
///
/// The buffer must hold at least [`HEADER_LEN`] words.
pub fn verify_header(buf: &[u32]) -> Result<ObjectHeader> {
    let header =
        ObjectHeader::decode(buf).ok_or(CdoError::TruncatedHeader { len: buf.len() })?;
    header.verify()?;
    Ok(header)
}

/// Collects header words when the first chunk is shorter than the header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderAccumulator {
    words: [u32; HEADER_LEN],
    filled: usize,
}

impl HeaderAccumulator {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy as many header words as still missing from `data`.
    ///
    /// Returns the number of words taken.
    pub fn fill(&mut self, data: &[u32]) -> usize {
        let take = (HEADER_LEN - self.filled).min(data.len());
        self.words[self.filled..self.filled + take].copy_from_slice(&data[..take]);
        self.filled += take;
        take
    }

    /// Check if all header words have arrived.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.filled == HEADER_LEN
    }

    /// Number of header words received so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.filled
    }

    /// Check if no header word has arrived yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// The header words received so far.
    #[inline]
    pub fn words(&self) -> &[u32] {
        &self.words[..self.filled]
    }

    /// Discard collected words.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
