//! Processor builder and chunk loop.
//!
//! The [`CdoProcessorBuilder`] registers command handlers, installs the
//! platform collaborators and validates the configuration. The
//! [`CdoProcessor`] then consumes one chunk per call:
//! 1. Verify the object header (first chunk only)
//! 2. Clamp the chunk to the declared object length
//! 3. Apply pending breaks, then dispatch fresh, resumed or stitched commands
//! 4. Report a deferred error once the object completes
//! 5. Refresh the live status, whatever the outcome
//!
//! ```text
//!             ┌────────────┐   scratch non-empty   ┌──────────────────┐
//!  chunk ───► │ apply_break│ ────────────────────► │ dispatch_stitched│
//!             └─────┬──────┘                       └──────────────────┘
//!                   │ Resuming                     ┌──────────────────┐
//!                   ├────────────────────────────► │ dispatch_resume  │
//!                   │ Idle                         └──────────────────┘
//!                   │                              ┌──────────────────┐
//!                   └────────────────────────────► │ dispatch_fresh   │
//!                                                  └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use cdo_stream::protocol::{build_command, ObjectHeader, DEFAULT_VERSION};
//! use cdo_stream::{CdoProcessor, Chunk, ChunkStatus, StreamState};
//!
//! let mut processor = CdoProcessor::builder()
//!     .handler_fn(1, "generic", |cmd| {
//!         let _ = cmd.payload();
//!         Ok(())
//!     })
//!     .build()
//!     .unwrap();
//!
//! let body = build_command(1, 2, &[0xAA, 0xBB]);
//! let mut object = ObjectHeader::new(DEFAULT_VERSION, body.len() as u32).encode().to_vec();
//! object.extend(&body);
//!
//! let mut state = StreamState::new(0x1C00_0001);
//! let status = processor.process_chunk(&mut state, Chunk::new(&object, 0)).unwrap();
//! assert_eq!(status, ChunkStatus::Success);
//! assert!(state.is_complete());
//! ```

use crate::codec::WordCodec;
use crate::config::ProcessorConfig;
use crate::control::{self, BreakAction};
use crate::error::{CdoError, Result};
use crate::handler::{CommandHandler, CommandView, HandlerRegistry, HandlerResult};
use crate::policy::{ErrorMode, NoopPlatform, Platform};
use crate::protocol::{
    byte_offset, command_size_capped, verify_header, CommandHeader, HEADER_LEN, SCRATCH_CAPACITY,
};
use crate::state::{DispatchState, InFlight, StreamState};

/// One window of object words handed over by the loader.
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a> {
    words: &'a [u32],
    next_chunk_address: u64,
}

impl<'a> Chunk<'a> {
    /// Create a chunk and announce where the next one will be placed.
    pub fn new(words: &'a [u32], next_chunk_address: u64) -> Self {
        Self {
            words,
            next_chunk_address,
        }
    }

    /// Get the chunk words.
    #[inline]
    pub fn words(&self) -> &'a [u32] {
        self.words
    }

    /// Get the address of the next chunk.
    #[inline]
    pub fn next_chunk_address(&self) -> u64 {
        self.next_chunk_address
    }
}

/// Outcome of a successful chunk call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStatus {
    /// Chunk consumed, no failure recorded.
    Success,
    /// Chunk consumed, but a non-fatal failure is pending for this object.
    DeferredErrorPending,
}

/// Builder for configuring and creating a [`CdoProcessor`].
pub struct CdoProcessorBuilder {
    registry: HandlerRegistry,
    config: ProcessorConfig,
    platform: Box<dyn Platform>,
}

impl CdoProcessorBuilder {
    /// Create a new builder with default configuration and no platform.
    pub fn new() -> Self {
        Self {
            registry: HandlerRegistry::new(),
            config: ProcessorConfig::default(),
            platform: Box::new(NoopPlatform),
        }
    }

    /// Register the handler of a command family.
    pub fn handler<H: CommandHandler>(mut self, module_id: u8, name: &str, handler: H) -> Self {
        self.registry.register(module_id, name, handler);
        self
    }

    /// Register a closure serving both execute and resume of a family.
    pub fn handler_fn<F>(mut self, module_id: u8, name: &str, handler: F) -> Self
    where
        F: FnMut(&mut CommandView<'_>) -> HandlerResult + 'static,
    {
        self.registry.register_fn(module_id, name, handler);
        self
    }

    /// Set the processor configuration.
    pub fn config(mut self, config: ProcessorConfig) -> Self {
        self.config = config;
        self
    }

    /// Install the lockdown predicate, error manager and live status.
    ///
    /// Default: [`NoopPlatform`]
    pub fn platform<P: Platform + 'static>(mut self, platform: P) -> Self {
        self.platform = Box::new(platform);
        self
    }

    /// Validate the configuration and build the processor.
    pub fn build(self) -> Result<CdoProcessor> {
        self.config.validate()?;
        Ok(CdoProcessor {
            registry: self.registry,
            config: self.config,
            platform: self.platform,
        })
    }
}

impl Default for CdoProcessorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Resumable command stream processor.
///
/// Holds the handlers and collaborators; all per-object progress lives in
/// the [`StreamState`] passed to each call, so one processor can serve
/// many objects one after another.
pub struct CdoProcessor {
    /// Handlers by module id.
    registry: HandlerRegistry,
    /// Validated configuration.
    config: ProcessorConfig,
    /// Lockdown predicate, error manager and live status.
    platform: Box<dyn Platform>,
}

impl CdoProcessor {
    /// Create a new processor builder.
    pub fn builder() -> CdoProcessorBuilder {
        CdoProcessorBuilder::new()
    }

    /// Get the handler registry.
    pub fn registry_mut(&mut self) -> &mut HandlerRegistry {
        &mut self.registry
    }

    /// Get the configuration.
    #[inline]
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Get the platform collaborators.
    #[inline]
    pub fn platform(&self) -> &dyn Platform {
        self.platform.as_ref()
    }

    /// Process one chunk of the object tracked by `state`.
    ///
    /// The chunk may end anywhere, including inside the header or inside a
    /// command. The live status is refreshed on every call.
    ///
    /// # Errors
    ///
    /// Header, checksum, stitch and break errors abort the call. Handler
    /// failures abort it too unless secure lockdown is active.
    pub fn process_chunk(
        &mut self,
        state: &mut StreamState,
        chunk: Chunk<'_>,
    ) -> Result<ChunkStatus> {
        let mode = ErrorMode::select(self.platform.as_ref());
        let result = self.run(state, chunk, mode);

        if result.is_ok() && state.is_complete() && state.deferred_error && !state.deferred_reported
        {
            tracing::warn!(
                "CDO for subsystem {:#010x} completed with deferred error",
                state.subsystem_id
            );
            self.platform.report_deferred_error(state.subsystem_id);
            state.deferred_reported = true;
        }

        self.platform.update_live_status();

        result.map(|()| {
            if state.deferred_error {
                ChunkStatus::DeferredErrorPending
            } else {
                ChunkStatus::Success
            }
        })
    }

    /// Process one chunk given as little-endian bytes.
    ///
    /// # Errors
    ///
    /// Returns `UnalignedChunk` if the length is not a whole number of
    /// words, otherwise as [`process_chunk`](Self::process_chunk).
    pub fn process_byte_chunk(
        &mut self,
        state: &mut StreamState,
        bytes: &[u8],
        next_chunk_address: u64,
    ) -> Result<ChunkStatus> {
        let words = match WordCodec::decode(bytes) {
            Ok(words) => words,
            Err(e) => {
                tracing::error!("Rejecting chunk: {}", e);
                self.platform.update_live_status();
                return Err(e);
            }
        };
        self.process_chunk(state, Chunk::new(&words, next_chunk_address))
    }

    /// Chunk loop.
    fn run(&mut self, state: &mut StreamState, chunk: Chunk<'_>, mode: ErrorMode) -> Result<()> {
        state.next_chunk_address = chunk.next_chunk_address;

        if state.end_detected {
            tracing::debug!("CMD END already detected, ignoring {} words", chunk.words.len());
            return Ok(());
        }

        let mut view = chunk.words;

        if state.is_first_chunk {
            let taken = state.header.fill(view);
            view = &view[taken..];
            if !state.header.is_complete() {
                tracing::debug!(
                    "CDO header incomplete, {} of {} words",
                    state.header.len(),
                    HEADER_LEN
                );
                return Ok(());
            }

            let header = verify_header(state.header.words())?;
            state.object_total_length = header.length;
            state.is_first_chunk = false;
        }

        // Trailing words past the declared object length are padding.
        let limit = state
            .object_total_length
            .saturating_sub(state.processed_length)
            .saturating_sub(state.scratch.len() as u32) as usize;
        if view.len() > limit {
            tracing::debug!("Clamping chunk from {} to {} words", view.len(), limit);
            view = &view[..limit];
        }

        tracing::debug!("Processing CDO, chunk length {:#x}", view.len());

        while !view.is_empty() && !state.end_detected {
            match control::apply_break(state, view.len())? {
                BreakAction::Proceed => {}
                BreakAction::Jump(skip) => {
                    view = &view[skip..];
                    continue;
                }
                BreakAction::SkipRest => break,
            }

            let consumed = if !state.scratch.is_empty() {
                self.dispatch_stitched(state, view, mode)?
            } else if let DispatchState::Resuming(inflight) = state.dispatch {
                self.dispatch_resume(state, inflight, view, mode)?
            } else {
                self.dispatch_fresh(state, view, mode)?
            };
            view = &view[consumed..];
        }

        Ok(())
    }

    /// Frame and execute the command at the start of `view`.
    ///
    /// Returns the number of view words consumed.
    fn dispatch_fresh(
        &mut self,
        state: &mut StreamState,
        view: &[u32],
        mode: ErrorMode,
    ) -> Result<usize> {
        if control::detect_end(state, view, self.config.end_command) {
            return Ok(0);
        }

        let max_long_len = self.config.max_long_cmd_len;
        let size = command_size_capped(view, max_long_len).unwrap_or(0);
        let must_stitch = size > view.len() && view.len() < self.config.stitch_threshold;
        let header = match CommandHeader::decode(view, max_long_len) {
            Some(header) if !must_stitch => header,
            _ => {
                state.scratch.stitch(view)?;
                tracing::debug!(
                    "Stitching {} words, command needs {} words",
                    view.len(),
                    size
                );
                return Ok(view.len());
            }
        };

        let partial = header.total_len() > view.len();
        let avail = if partial {
            view.len()
        } else {
            header.total_len()
        };
        let payload = &view[header.header_len..avail];
        let cdo_offset = state.processed_length;

        let mut cmd = CommandView::new(
            header.cmd_id,
            payload,
            header.payload_len,
            0,
            state.subsystem_id,
            cdo_offset,
        );
        let result = self.registry.execute(&mut cmd);
        let failed = self.check_result(&cmd, cdo_offset, result, mode)?;

        state.processed_length += avail as u32;
        if partial {
            tracing::debug!(
                "CMD {:#010x} partially executed, {} of {} words",
                header.cmd_id,
                payload.len(),
                header.payload_len
            );
            state.dispatch = DispatchState::Resuming(InFlight {
                cmd_id: header.cmd_id,
                declared_len: header.payload_len,
                processed_len: payload.len() as u32,
                extra_consumed: cmd.extra_consumed(),
                cdo_offset,
            });
        } else {
            state.processed_length = state.processed_length.saturating_add(cmd.extra_consumed());
            state.dispatch = DispatchState::Idle;
        }

        self.finish_dispatch(state, &cmd, failed)?;
        Ok(avail)
    }

    /// Continue the in-flight command with the head of `view`.
    fn dispatch_resume(
        &mut self,
        state: &mut StreamState,
        mut inflight: InFlight,
        view: &[u32],
        mode: ErrorMode,
    ) -> Result<usize> {
        let remaining = inflight.remaining() as usize;
        if remaining == 0 {
            state.dispatch = DispatchState::Idle;
            return Ok(0);
        }

        let available = remaining.min(view.len());
        let mut cmd = CommandView::new(
            inflight.cmd_id,
            &view[..available],
            inflight.declared_len,
            inflight.processed_len,
            state.subsystem_id,
            inflight.cdo_offset,
        );
        let result = self.registry.resume(&mut cmd);
        let failed = self.check_result(&cmd, state.processed_length, result, mode)?;

        inflight.processed_len += available as u32;
        inflight.extra_consumed = inflight.extra_consumed.saturating_add(cmd.extra_consumed());
        state.processed_length += available as u32;

        tracing::debug!(
            "CMD {:#010x} resumed, {} of {} words",
            inflight.cmd_id,
            inflight.processed_len,
            inflight.declared_len
        );

        if inflight.remaining() == 0 {
            state.processed_length = state
                .processed_length
                .saturating_add(inflight.extra_consumed);
            state.dispatch = DispatchState::Idle;
        } else {
            state.dispatch = DispatchState::Resuming(inflight);
        }

        self.finish_dispatch(state, &cmd, failed)?;
        Ok(available)
    }

    /// Rebuild a contiguous view from the parked words and the new chunk.
    ///
    /// Returns the number of words consumed from `view`.
    fn dispatch_stitched(
        &mut self,
        state: &mut StreamState,
        view: &[u32],
        mode: ErrorMode,
    ) -> Result<usize> {
        let parked = state.scratch.len();
        let mut staged = [0u32; SCRATCH_CAPACITY];
        let (len, taken) = state.scratch.stage(view, &mut staged);

        tracing::debug!(
            "Resuming stitched command, {} parked and {} new words",
            parked,
            taken
        );

        let consumed = self.dispatch_fresh(state, &staged[..len], mode)?;
        Ok(consumed.saturating_sub(parked))
    }

    /// Apply the error policy to a handler result.
    ///
    /// `offset` is the processed length (words) the failing part starts at.
    /// Returns whether the handler failed and processing may go on.
    fn check_result(
        &self,
        cmd: &CommandView<'_>,
        offset: u32,
        result: HandlerResult,
        mode: ErrorMode,
    ) -> Result<bool> {
        let Err(e) = result else {
            return Ok(false);
        };

        let offset = byte_offset(offset);
        tracing::error!(
            "CMD {:#010x} failed at offset {:#x}, status {:#x}",
            cmd.cmd_id(),
            offset,
            e.status
        );
        let payload = cmd.payload();
        let dump = &payload[..payload.len().min(self.config.payload_dump_words)];
        if !dump.is_empty() {
            tracing::error!("CMD payload: {:#010x?}", dump);
        }

        mode.handle(
            CdoError::HandlerFailure {
                cmd_id: cmd.cmd_id(),
                status: e.status,
                offset,
            },
            self.platform.as_ref(),
        )?;
        Ok(true)
    }

    /// Collect handler side channels once the consumed words are accounted.
    fn finish_dispatch(
        &self,
        state: &mut StreamState,
        cmd: &CommandView<'_>,
        failed: bool,
    ) -> Result<()> {
        if cmd.deferred_error() || failed {
            state.deferred_error = true;
        }

        if let Some(target) = cmd.break_request() {
            tracing::debug!("CMD {:#010x} requested break to {:#x}", cmd.cmd_id(), target);
            control::request_break(state, target)?;
        }

        // The rest of a failed partial command is skipped, never reframed.
        if let DispatchState::Resuming(inflight) = state.dispatch {
            if failed && state.pending_break.is_none() {
                state.pending_break = Some(state.processed_length + inflight.remaining());
            }
        }

        Ok(())
    }
}
