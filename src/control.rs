//! Break and END control directives.
//!
//! A handler may request a break: skip every command up to an absolute
//! processed length. The target may lie many chunks ahead, so the skip is
//! kept in the stream state. A target behind the processed length is
//! rejected as soon as it is requested. Otherwise it is applied at each
//! iteration boundary:
//! - target inside the current view: jump to it and keep dispatching
//! - target beyond the view: consume the whole view and wait for more
//!
//! END stops dispatch for the rest of the object.

use crate::error::{CdoError, Result};
use crate::state::{DispatchState, StreamState};

/// What the processor does with the current view after a break check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakAction {
    /// No break pending.
    Proceed,
    /// Break target reached after skipping this many view words.
    Jump(usize),
    /// Break target lies beyond the view; the view is consumed.
    SkipRest,
}

/// Record a break requested by the command that was just dispatched.
///
/// # Errors
///
/// Returns `InvalidBreakLength` if `target` lies behind the processed
/// length, whether or not more words follow in this chunk or object.
pub fn request_break(state: &mut StreamState, target: u32) -> Result<()> {
    check_target(state, target)?;
    state.pending_break = Some(target);
    Ok(())
}

/// Apply a pending break against a view of `remaining` words.
pub fn apply_break(state: &mut StreamState, remaining: usize) -> Result<BreakAction> {
    let Some(target) = state.pending_break else {
        return Ok(BreakAction::Proceed);
    };

    // A restored snapshot may carry a target that was never checked.
    check_target(state, target)?;

    // Skipped words are never executed, so an in-flight command is abandoned.
    state.dispatch = DispatchState::Idle;

    let distance = (target - state.processed_length) as usize;
    if distance < remaining {
        tracing::debug!("Break target {:#x} reached, skipping {} words", target, distance);
        state.processed_length = target;
        state.pending_break = None;
        Ok(BreakAction::Jump(distance))
    } else {
        tracing::debug!(
            "Break target {:#x} beyond chunk, skipping {} words",
            target,
            remaining
        );
        state.processed_length += remaining as u32;
        Ok(BreakAction::SkipRest)
    }
}

fn check_target(state: &StreamState, target: u32) -> Result<()> {
    if target < state.processed_length {
        tracing::error!(
            "Invalid break length {:#x}, processed {:#x}",
            target,
            state.processed_length
        );
        return Err(CdoError::InvalidBreakLength {
            target,
            processed: state.processed_length,
        });
    }
    Ok(())
}

/// Check for END at the start of `view` and latch it.
pub fn detect_end(state: &mut StreamState, view: &[u32], end_command: u32) -> bool {
    if view.first() == Some(&end_command) {
        tracing::debug!("CMD END detected");
        state.end_detected = true;
    }
    state.end_detected
}
