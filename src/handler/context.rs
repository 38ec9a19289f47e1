//! Command view passed to handlers.
//!
//! A [`CommandView`] borrows the payload words of one dispatch. Commands
//! larger than the available words are dispatched in parts: the first part
//! through `execute`, the rest through `resume`. Handlers report back
//! through the view:
//! - `request_break` - skip forward to an absolute processed length
//! - `add_extra_consumed` - words taken from the stream out of band
//! - `set_deferred_error` - non-fatal failure reported after the call
//!
//! # Example
//!
//! ```ignore
//! fn execute(&mut self, cmd: &mut CommandView<'_>) -> HandlerResult {
//!     for word in cmd.payload() {
//!         self.write(*word);
//!     }
//!     Ok(())
//! }
//! ```

use crate::protocol::{api_id, module_id};

/// View of one command dispatch.
///
/// Never owns the payload; it borrows from the current chunk or from the
/// staged scratch words.
#[derive(Debug)]
pub struct CommandView<'a> {
    /// Command word as it appears on the wire.
    cmd_id: u32,
    /// Payload words present in this dispatch.
    payload: &'a [u32],
    /// Declared payload length in words.
    declared_len: u32,
    /// Payload words consumed by earlier dispatches of this command.
    processed_len: u32,
    /// Owning subsystem of the object.
    subsystem_id: u32,
    /// Object processed length when the command started.
    cdo_offset: u32,
    /// Requested absolute break target.
    break_request: Option<u32>,
    /// Words consumed beyond the payload.
    extra_consumed: u32,
    /// Non-fatal failure flag.
    deferred_error: bool,
}

impl<'a> CommandView<'a> {
    /// Create a view for a dispatch.
    pub fn new(
        cmd_id: u32,
        payload: &'a [u32],
        declared_len: u32,
        processed_len: u32,
        subsystem_id: u32,
        cdo_offset: u32,
    ) -> Self {
        Self {
            cmd_id,
            payload,
            declared_len,
            processed_len,
            subsystem_id,
            cdo_offset,
            break_request: None,
            extra_consumed: 0,
            deferred_error: false,
        }
    }

    /// Get the command word.
    #[inline]
    pub fn cmd_id(&self) -> u32 {
        self.cmd_id
    }

    /// Get the module id (command family).
    #[inline]
    pub fn module_id(&self) -> u8 {
        module_id(self.cmd_id)
    }

    /// Get the API id within the module.
    #[inline]
    pub fn api_id(&self) -> u8 {
        api_id(self.cmd_id)
    }

    /// Get the payload words of this dispatch.
    #[inline]
    pub fn payload(&self) -> &'a [u32] {
        self.payload
    }

    /// Number of payload words present in this dispatch.
    #[inline]
    pub fn available_len(&self) -> u32 {
        self.payload.len() as u32
    }

    /// Declared payload length of the whole command.
    #[inline]
    pub fn declared_len(&self) -> u32 {
        self.declared_len
    }

    /// Payload words consumed before this dispatch.
    #[inline]
    pub fn processed_len(&self) -> u32 {
        self.processed_len
    }

    /// Check if this dispatch continues an earlier partial one.
    #[inline]
    pub fn is_resumption(&self) -> bool {
        self.processed_len > 0
    }

    /// Check if this dispatch completes the command.
    #[inline]
    pub fn is_final(&self) -> bool {
        self.processed_len + self.available_len() == self.declared_len
    }

    /// Get the owning subsystem id.
    #[inline]
    pub fn subsystem_id(&self) -> u32 {
        self.subsystem_id
    }

    /// Object processed length (words) at which this command starts.
    #[inline]
    pub fn cdo_offset(&self) -> u32 {
        self.cdo_offset
    }

    /// Ask the processor to skip forward to `target` words of the object.
    ///
    /// A target of 0 means no break and withdraws an earlier request.
    pub fn request_break(&mut self, target: u32) {
        self.break_request = (target != 0).then_some(target);
    }

    /// Get the requested break target.
    #[inline]
    pub fn break_request(&self) -> Option<u32> {
        self.break_request
    }

    /// Report words consumed from the stream beyond the payload.
    pub fn add_extra_consumed(&mut self, words: u32) {
        self.extra_consumed += words;
    }

    /// Get the extra consumed word count.
    #[inline]
    pub fn extra_consumed(&self) -> u32 {
        self.extra_consumed
    }

    /// Flag a non-fatal failure.
    pub fn set_deferred_error(&mut self) {
        self.deferred_error = true;
    }

    /// Check the non-fatal failure flag.
    #[inline]
    pub fn deferred_error(&self) -> bool {
        self.deferred_error
    }
}
