//! Handler module - command views and dispatch.
//!
//! Provides:
//! - [`CommandView`] - one dispatch of a command, with handler side channels
//! - [`CommandHandler`] - execute/resume entry points of a command family
//! - [`HandlerRegistry`] - maps module ids to handlers
//!
//! # Example
//!
//! ```
//! use cdo_stream::handler::{CommandHandler, CommandView, HandlerRegistry, HandlerResult};
//!
//! struct Generic;
//!
//! impl CommandHandler for Generic {
//!     fn execute(&mut self, cmd: &mut CommandView<'_>) -> HandlerResult {
//!         let _ = cmd.payload();
//!         Ok(())
//!     }
//! }
//!
//! let mut registry = HandlerRegistry::new();
//! registry.register(1, "generic", Generic);
//! assert!(registry.contains(1));
//! ```

mod context;
mod registry;

pub use context::CommandView;
pub use registry::{
    status, CommandHandler, FnHandler, HandlerError, HandlerRegistry, HandlerResult,
};
