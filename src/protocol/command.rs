//! Command word encoding and size decoding.
//!
//! Each command starts with a command word:
//! ```text
//! ┌──────────┬──────────────┬───────────┬─────────┐
//! │ Reserved │ Short length │ Module ID │ API ID  │
//! │ [31:24]  │ [23:16]      │ [15:8]    │ [7:0]   │
//! └──────────┴──────────────┴───────────┴─────────┘
//! ```
//!
//! A short length of 0..=254 is the payload length in words and the payload
//! follows immediately. The sentinel 255 selects the long form: the next
//! word holds the payload length, capped at [`MAX_LONG_CMD_LEN`].

use super::header::HEADER_LEN;

/// Shift of the short length field.
pub const SHORT_LEN_SHIFT: u32 = 16;

/// Mask of the short length field (after shifting).
pub const SHORT_LEN_MASK: u32 = 0xFF;

/// Short length value that selects the long form.
pub const MAX_SHORT_CMD_LEN: u32 = 0xFF;

/// Header words of a short-form command.
pub const SHORT_CMD_HDR_LEN: usize = 1;

/// Header words of a long-form command.
pub const LONG_CMD_HDR_LEN: usize = 2;

/// Maximum payload length of a long-form command.
pub const MAX_LONG_CMD_LEN: u32 = 0x3FFF_FFFD;

/// Command word reserved for the END directive.
pub const CMD_END: u32 = 0x0000_01FF;

/// Bytes per word.
pub const WORD_LEN: u32 = 4;

/// Total size in words of the command at the start of `buf`.
///
/// Uses the default long-form cap. Returns `None` for an empty buffer.
#[inline]
pub fn command_size(buf: &[u32]) -> Option<usize> {
    command_size_capped(buf, MAX_LONG_CMD_LEN)
}

/// Total size in words of the command at the start of `buf`.
///
/// If the long-form length word is not yet available the sentinel value is
/// used as the payload length, which always exceeds the available words.
pub fn command_size_capped(buf: &[u32], max_long_len: u32) -> Option<usize> {
    let cmd_word = *buf.first()?;
    let short_len = (cmd_word >> SHORT_LEN_SHIFT) & SHORT_LEN_MASK;
    if short_len != MAX_SHORT_CMD_LEN {
        return Some(SHORT_CMD_HDR_LEN + short_len as usize);
    }

    let payload_len = buf.get(1).copied().unwrap_or(MAX_SHORT_CMD_LEN);
    Some(LONG_CMD_HDR_LEN + payload_len.min(max_long_len) as usize)
}

/// Decoded command header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandHeader {
    /// Full command word as it appears on the wire.
    pub cmd_id: u32,
    /// Words occupied by the header (1 or 2).
    pub header_len: usize,
    /// Declared payload length in words, after capping.
    pub payload_len: u32,
}

impl CommandHeader {
    /// Create a header for a command with the given identity and payload.
    ///
    /// Selects the long form when the payload does not fit the short field.
    pub fn new(module_id: u8, api_id: u8, payload_len: u32) -> Self {
        let identity = ((module_id as u32) << 8) | api_id as u32;
        if payload_len < MAX_SHORT_CMD_LEN {
            Self {
                cmd_id: identity | (payload_len << SHORT_LEN_SHIFT),
                header_len: SHORT_CMD_HDR_LEN,
                payload_len,
            }
        } else {
            Self {
                cmd_id: identity | (MAX_SHORT_CMD_LEN << SHORT_LEN_SHIFT),
                header_len: LONG_CMD_HDR_LEN,
                payload_len,
            }
        }
    }

    /// Decode the header at the start of `buf`.
    ///
    /// Returns `None` if the buffer does not hold the whole header.
    pub fn decode(buf: &[u32], max_long_len: u32) -> Option<Self> {
        let cmd_id = *buf.first()?;
        let short_len = (cmd_id >> SHORT_LEN_SHIFT) & SHORT_LEN_MASK;
        if short_len != MAX_SHORT_CMD_LEN {
            return Some(Self {
                cmd_id,
                header_len: SHORT_CMD_HDR_LEN,
                payload_len: short_len,
            });
        }
        Some(Self {
            cmd_id,
            header_len: LONG_CMD_HDR_LEN,
            payload_len: (*buf.get(1)?).min(max_long_len),
        })
    }

    /// Encode the header words.
    pub fn encode(&self) -> Vec<u32> {
        match self.header_len {
            SHORT_CMD_HDR_LEN => vec![self.cmd_id],
            _ => vec![self.cmd_id, self.payload_len],
        }
    }

    /// Total command size in words.
    #[inline]
    pub fn total_len(&self) -> usize {
        self.header_len + self.payload_len as usize
    }

    /// Module id (command family).
    #[inline]
    pub fn module_id(&self) -> u8 {
        module_id(self.cmd_id)
    }

    /// API id within the module.
    #[inline]
    pub fn api_id(&self) -> u8 {
        api_id(self.cmd_id)
    }
}

/// Module id of a command word.
#[inline]
pub fn module_id(cmd_id: u32) -> u8 {
    ((cmd_id >> 8) & 0xFF) as u8
}

/// API id of a command word.
#[inline]
pub fn api_id(cmd_id: u32) -> u8 {
    (cmd_id & 0xFF) as u8
}

/// Build a complete command as a word vector.
///
/// # Example
///
/// ```
/// use cdo_stream::protocol::{build_command, command_size};
///
/// let words = build_command(1, 2, &[0xAA, 0xBB]);
/// assert_eq!(words.len(), 3);
/// assert_eq!(command_size(&words), Some(3));
/// ```
pub fn build_command(module_id: u8, api_id: u8, payload: &[u32]) -> Vec<u32> {
    let header = CommandHeader::new(module_id, api_id, payload.len() as u32);
    let mut words = header.encode();
    words.extend_from_slice(payload);
    words
}

/// Byte offset of a command within the object, header included.
#[inline]
pub fn byte_offset(processed_words: u32) -> u32 {
    (processed_words + HEADER_LEN as u32) * WORD_LEN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_form_size() {
        for n in [0u32, 1, 17, 254] {
            let word = (n << SHORT_LEN_SHIFT) | 0x0102;
            assert_eq!(command_size(&[word]), Some(1 + n as usize));
        }
    }

    #[test]
    fn test_long_form_size() {
        let word = (MAX_SHORT_CMD_LEN << SHORT_LEN_SHIFT) | 0x0102;
        assert_eq!(command_size(&[word, 300]), Some(302));
        assert_eq!(command_size(&[word, 0]), Some(2));
    }

    #[test]
    fn test_long_form_length_is_capped() {
        let word = MAX_SHORT_CMD_LEN << SHORT_LEN_SHIFT;
        assert_eq!(
            command_size(&[word, u32::MAX]),
            Some(2 + MAX_LONG_CMD_LEN as usize)
        );
        assert_eq!(command_size_capped(&[word, 1000], 64), Some(66));
    }

    #[test]
    fn test_long_form_without_length_word() {
        let word = MAX_SHORT_CMD_LEN << SHORT_LEN_SHIFT;
        assert_eq!(command_size(&[word]), Some(2 + 255));
        assert!(CommandHeader::decode(&[word], MAX_LONG_CMD_LEN).is_none());
    }

    #[test]
    fn test_empty_buffer() {
        assert_eq!(command_size(&[]), None);
        assert!(CommandHeader::decode(&[], MAX_LONG_CMD_LEN).is_none());
    }

    #[test]
    fn test_header_identity_fields() {
        let header = CommandHeader::new(0x0C, 0x21, 3);
        assert_eq!(header.module_id(), 0x0C);
        assert_eq!(header.api_id(), 0x21);
        assert_eq!(header.cmd_id, 0x0003_0C21);
        assert_eq!(header.total_len(), 4);
    }

    #[test]
    fn test_build_command_selects_long_form() {
        let payload = vec![7u32; 255];
        let words = build_command(1, 4, &payload);
        assert_eq!(words.len(), 2 + 255);
        assert_eq!(words[1], 255);

        let decoded = CommandHeader::decode(&words, MAX_LONG_CMD_LEN).unwrap();
        assert_eq!(decoded.header_len, LONG_CMD_HDR_LEN);
        assert_eq!(decoded.payload_len, 255);
        assert_eq!(command_size(&words), Some(words.len()));
    }

    #[test]
    fn test_build_command_short_form() {
        let words = build_command(2, 1, &[1, 2, 3]);
        assert_eq!(words, vec![0x0003_0201, 1, 2, 3]);
    }

    #[test]
    fn test_byte_offset_includes_header() {
        assert_eq!(byte_offset(0), 20);
        assert_eq!(byte_offset(3), 32);
    }
}
