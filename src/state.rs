//! Per-object stream state.
//!
//! [`StreamState`] is the continuation of one configuration object load. It
//! is created when the load starts, threaded through every chunk call, and
//! dropped or reset once the object is complete. Nothing in it points into
//! caller memory, so it can be snapshotted and restored across a firmware
//! update.

use serde::{Deserialize, Serialize};

use crate::codec::MsgPackCodec;
use crate::error::Result;
use crate::protocol::{HeaderAccumulator, ScratchBuffer};

/// A command whose execution continues in later chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InFlight {
    /// Command word.
    pub cmd_id: u32,
    /// Declared payload length in words.
    pub declared_len: u32,
    /// Payload words consumed so far.
    pub processed_len: u32,
    /// Extra words reported so far, folded in on completion.
    pub extra_consumed: u32,
    /// Object processed length when the command started.
    pub cdo_offset: u32,
}

impl InFlight {
    /// Payload words still to come.
    #[inline]
    pub fn remaining(&self) -> u32 {
        self.declared_len - self.processed_len
    }
}

/// Whether a command execution is in flight across a chunk boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DispatchState {
    /// Next word starts a fresh command.
    #[default]
    Idle,
    /// Next words continue the in-flight command.
    Resuming(InFlight),
}

impl DispatchState {
    /// Check if a command is in flight.
    #[inline]
    pub fn is_resuming(&self) -> bool {
        matches!(self, DispatchState::Resuming(_))
    }
}

/// State of one configuration object being loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamState {
    pub(crate) header: HeaderAccumulator,
    pub(crate) object_total_length: u32,
    pub(crate) processed_length: u32,
    pub(crate) scratch: ScratchBuffer,
    pub(crate) dispatch: DispatchState,
    pub(crate) pending_break: Option<u32>,
    pub(crate) end_detected: bool,
    pub(crate) is_first_chunk: bool,
    pub(crate) deferred_error: bool,
    pub(crate) deferred_reported: bool,
    pub(crate) subsystem_id: u32,
    pub(crate) next_chunk_address: u64,
}

impl StreamState {
    /// Create the state for a new object owned by `subsystem_id`.
    pub fn new(subsystem_id: u32) -> Self {
        Self {
            header: HeaderAccumulator::new(),
            object_total_length: 0,
            processed_length: 0,
            scratch: ScratchBuffer::new(),
            dispatch: DispatchState::Idle,
            pending_break: None,
            end_detected: false,
            is_first_chunk: true,
            deferred_error: false,
            deferred_reported: false,
            subsystem_id,
            next_chunk_address: 0,
        }
    }

    /// Reset for the next object, keeping the subsystem id.
    pub fn reset(&mut self) {
        *self = Self::new(self.subsystem_id);
    }

    /// Declared object length in words, header excluded.
    #[inline]
    pub fn object_total_length(&self) -> u32 {
        self.object_total_length
    }

    /// Words of the object consumed so far.
    #[inline]
    pub fn processed_length(&self) -> u32 {
        self.processed_length
    }

    /// Words parked in the scratch region.
    #[inline]
    pub fn stitched_length(&self) -> usize {
        self.scratch.len()
    }

    /// Dispatch state of the current command.
    #[inline]
    pub fn dispatch_state(&self) -> DispatchState {
        self.dispatch
    }

    /// Pending break target, if any.
    #[inline]
    pub fn pending_break_target(&self) -> Option<u32> {
        self.pending_break
    }

    /// Check if END was seen.
    #[inline]
    pub fn end_detected(&self) -> bool {
        self.end_detected
    }

    /// Check if the header is still to be verified.
    #[inline]
    pub fn is_first_chunk(&self) -> bool {
        self.is_first_chunk
    }

    /// Sticky non-fatal failure flag.
    #[inline]
    pub fn deferred_error(&self) -> bool {
        self.deferred_error
    }

    /// Owning subsystem id.
    #[inline]
    pub fn subsystem_id(&self) -> u32 {
        self.subsystem_id
    }

    /// Address the next chunk will occupy, as last announced by the loader.
    #[inline]
    pub fn next_chunk_address(&self) -> u64 {
        self.next_chunk_address
    }

    /// Check if the object needs no further chunks.
    pub fn is_complete(&self) -> bool {
        self.end_detected
            || (!self.is_first_chunk
                && self.processed_length >= self.object_total_length
                && self.scratch.is_empty())
    }

    /// Serialize the state to MsgPack bytes.
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        MsgPackCodec::encode(self)
    }

    /// Restore a state from MsgPack bytes.
    pub fn restore(bytes: &[u8]) -> Result<Self> {
        MsgPackCodec::decode(bytes)
    }
}

impl Default for StreamState {
    fn default() -> Self {
        Self::new(0)
    }
}
