//! Protocol module - object header, command framing, and stitching.
//!
//! This module implements the word-level wire format of a configuration
//! object:
//! - 5-word object header with identification and checksum
//! - Self-describing command lengths (short form and long form)
//! - Scratch region for commands straddling chunk boundaries

mod command;
mod header;
mod stitch;

pub use command::{
    api_id, build_command, byte_offset, command_size, command_size_capped, module_id,
    CommandHeader, CMD_END, LONG_CMD_HDR_LEN, MAX_LONG_CMD_LEN, MAX_SHORT_CMD_LEN,
    SHORT_CMD_HDR_LEN, SHORT_LEN_MASK, SHORT_LEN_SHIFT, WORD_LEN,
};
pub use header::{
    checksum, verify_header, HeaderAccumulator, ObjectHeader, DEFAULT_VERSION, HEADER_LEN,
    HEADER_REMAINING_WORDS, IDENTIFICATION_WORD,
};
pub use stitch::{ScratchBuffer, SCRATCH_CAPACITY};
