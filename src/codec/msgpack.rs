//! MsgPack codec using `rmp-serde`.
//!
//! Used for stream state snapshots. Always `to_vec_named`: structs are
//! written as maps keyed by field name, so a snapshot taken before a
//! firmware update still decodes after fields are reordered.
//!
//! # Example
//!
//! ```
//! use cdo_stream::codec::MsgPackCodec;
//! use cdo_stream::StreamState;
//!
//! let state = StreamState::new(0x1C00_0001);
//! let encoded = MsgPackCodec::encode(&state).unwrap();
//! let decoded: StreamState = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, state);
//! ```

use crate::error::Result;

/// MessagePack codec for structured data.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MsgPack bytes (struct-as-map format).
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode MsgPack bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes cannot be deserialized to type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}
