//! Error and secure-lockdown policy.
//!
//! The processor consults a [`Platform`] for three things it does not own:
//! - whether a secure-lockdown recovery procedure is running
//! - the error manager that receives tolerated failures
//! - the live-status signal refreshed at the end of every call
//!
//! # Modes
//!
//! - [`ErrorMode::Normal`]: every error aborts the call.
//! - [`ErrorMode::Lockdown`]: handler failures are reported and processing
//!   continues. Header, checksum, break and stitch errors stay fatal.
//!
//! [`SharedPlatform`] is a ready-made implementation backed by atomics that
//! can be cloned and inspected from outside the processor.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{CdoError, Result};

/// Collaborators the processor reports to.
pub trait Platform {
    /// Check if a secure-lockdown recovery procedure is running.
    fn is_secure_lockdown_active(&self) -> bool {
        false
    }

    /// Receive a failure tolerated under secure lockdown.
    fn report_error(&self, err: &CdoError) {
        let _ = err;
    }

    /// Receive the deferred-error flag of a completed object.
    fn report_deferred_error(&self, subsystem_id: u32) {
        let _ = subsystem_id;
    }

    /// Refresh the live-status signal.
    fn update_live_status(&self) {}
}

/// Platform with no lockdown and no reporting.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPlatform;

impl Platform for NoopPlatform {}

/// Error handling mode, selected once per processed chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorMode {
    /// Any error aborts the call.
    Normal,
    /// Handler failures are reported and skipped.
    Lockdown,
}

impl ErrorMode {
    /// Select the mode from the platform's lockdown predicate.
    pub fn select(platform: &dyn Platform) -> Self {
        if platform.is_secure_lockdown_active() {
            ErrorMode::Lockdown
        } else {
            ErrorMode::Normal
        }
    }

    /// Decide whether `err` aborts the call.
    ///
    /// Returns `Ok(())` when the error was reported and processing may
    /// continue, or the error itself when it is fatal.
    pub fn handle(self, err: CdoError, platform: &dyn Platform) -> Result<()> {
        match self {
            ErrorMode::Lockdown if !err.is_stream_fatal() => {
                tracing::warn!("Secure lockdown active, continuing after: {}", err);
                platform.report_error(&err);
                Ok(())
            }
            _ => Err(err),
        }
    }
}

/// Platform backed by shared atomics.
///
/// Cloning yields a handle to the same counters.
#[derive(Debug, Clone, Default)]
pub struct SharedPlatform {
    /// Lockdown predicate.
    lockdown: Arc<AtomicBool>,
    /// Live-status heartbeat, incremented on every call.
    live_status: Arc<AtomicU32>,
    /// Number of tolerated failures reported.
    reported_errors: Arc<AtomicUsize>,
    /// Status code of the last tolerated handler failure.
    last_status: Arc<AtomicU32>,
    /// Number of deferred-error reports.
    deferred_reports: Arc<AtomicUsize>,
}

impl SharedPlatform {
    /// Create a platform with lockdown inactive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Turn the secure-lockdown predicate on or off.
    pub fn set_lockdown(&self, active: bool) {
        self.lockdown.store(active, Ordering::Release);
    }

    /// Get the live-status heartbeat.
    #[inline]
    pub fn live_status(&self) -> u32 {
        self.live_status.load(Ordering::Acquire)
    }

    /// Get the number of tolerated failures reported.
    #[inline]
    pub fn reported_errors(&self) -> usize {
        self.reported_errors.load(Ordering::Acquire)
    }

    /// Get the status code of the last tolerated handler failure.
    #[inline]
    pub fn last_status(&self) -> u32 {
        self.last_status.load(Ordering::Acquire)
    }

    /// Get the number of deferred-error reports.
    #[inline]
    pub fn deferred_reports(&self) -> usize {
        self.deferred_reports.load(Ordering::Acquire)
    }
}

impl Platform for SharedPlatform {
    fn is_secure_lockdown_active(&self) -> bool {
        self.lockdown.load(Ordering::Acquire)
    }

    fn report_error(&self, err: &CdoError) {
        if let CdoError::HandlerFailure { status, .. } = err {
            self.last_status.store(*status, Ordering::Release);
        }
        self.reported_errors.fetch_add(1, Ordering::AcqRel);
    }

    fn report_deferred_error(&self, _subsystem_id: u32) {
        self.deferred_reports.fetch_add(1, Ordering::AcqRel);
    }

    fn update_live_status(&self) {
        self.live_status.fetch_add(1, Ordering::AcqRel);
    }
}
