//! Word codec - little-endian bytes to 32-bit object words.
//!
//! Loaders that move objects as byte buffers hand them to
//! [`CdoProcessor::process_byte_chunk`](crate::CdoProcessor::process_byte_chunk),
//! which converts each chunk with this codec.
//!
//! # Example
//!
//! ```
//! use cdo_stream::codec::WordCodec;
//!
//! let bytes = WordCodec::encode(&[0x584C_4E58, 1]);
//! assert_eq!(&bytes[..4], b"XNLX");
//! assert_eq!(WordCodec::decode(&bytes).unwrap(), vec![0x584C_4E58, 1]);
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{CdoError, Result};
use crate::protocol::WORD_LEN;

/// Codec between little-endian byte buffers and word slices.
pub struct WordCodec;

impl WordCodec {
    /// Decode little-endian bytes into words.
    ///
    /// # Errors
    ///
    /// Returns `UnalignedChunk` if the length is not a multiple of 4.
    pub fn decode(mut data: &[u8]) -> Result<Vec<u32>> {
        if data.len() % WORD_LEN as usize != 0 {
            return Err(CdoError::UnalignedChunk(data.len()));
        }

        let mut words = Vec::with_capacity(data.len() / WORD_LEN as usize);
        while data.has_remaining() {
            words.push(data.get_u32_le());
        }
        Ok(words)
    }

    /// Encode words as little-endian bytes.
    pub fn encode(words: &[u32]) -> Bytes {
        let mut buf = BytesMut::with_capacity(words.len() * WORD_LEN as usize);
        for word in words {
            buf.put_u32_le(*word);
        }
        buf.freeze()
    }
}
