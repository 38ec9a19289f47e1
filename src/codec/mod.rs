//! Codec module - word and snapshot encodings.
//!
//! - [`WordCodec`] - little-endian byte chunks to object words (`bytes`)
//! - [`MsgPackCodec`] - stream state snapshots using `rmp-serde` (`to_vec_named`)
//!
//! # Design
//!
//! Codecs are marker structs with static methods rather than trait objects.

mod msgpack;
mod words;

pub use msgpack::MsgPackCodec;
pub use words::WordCodec;
