//! Handler registry for dispatching commands by module id.
//!
//! Each command family (module) registers one handler that serves every
//! API id of that module. A handler provides two entry points:
//! - `execute` - first dispatch of a command
//! - `resume` - continuation of a command that did not fit one chunk
//!
//! # Example
//!
//! ```
//! use cdo_stream::handler::{HandlerRegistry, CommandView};
//!
//! let mut registry = HandlerRegistry::new();
//!
//! registry.register_fn(1, "generic", |cmd: &mut CommandView<'_>| {
//!     let _ = cmd.payload();
//!     Ok(())
//! });
//!
//! assert_eq!(registry.get_module_name(1), Some("generic"));
//! ```

use std::collections::HashMap;

use thiserror::Error;

use super::CommandView;

/// Handler status codes produced by the registry itself.
pub mod status {
    /// No handler is registered for the command's module.
    pub const INVALID_MODULE: u32 = 0x0000_0002;
    /// The handler cannot continue a partially executed command.
    pub const RESUME_UNSUPPORTED: u32 = 0x0000_0003;
}

/// Failure reported by a command handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("handler status {status:#x}")]
pub struct HandlerError {
    /// Handler-specific status code.
    pub status: u32,
}

impl HandlerError {
    /// Create an error with the given status code.
    pub fn new(status: u32) -> Self {
        Self { status }
    }
}

/// Result type for handler entry points.
pub type HandlerResult = std::result::Result<(), HandlerError>;

/// Trait for command family handlers.
pub trait CommandHandler: 'static {
    /// Execute the first (possibly only) part of a command.
    fn execute(&mut self, cmd: &mut CommandView<'_>) -> HandlerResult;

    /// Continue a command whose payload spans several chunks.
    ///
    /// Handlers that never see commands larger than one chunk may keep the
    /// default, which rejects the resumption.
    fn resume(&mut self, cmd: &mut CommandView<'_>) -> HandlerResult {
        let _ = cmd;
        Err(HandlerError::new(status::RESUME_UNSUPPORTED))
    }
}

/// Wrapper that serves both entry points with one closure.
///
/// The closure tells the parts apart with [`CommandView::is_resumption`].
pub struct FnHandler<F>
where
    F: FnMut(&mut CommandView<'_>) -> HandlerResult + 'static,
{
    handler: F,
}

impl<F> FnHandler<F>
where
    F: FnMut(&mut CommandView<'_>) -> HandlerResult + 'static,
{
    /// Create a new closure handler.
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<F> CommandHandler for FnHandler<F>
where
    F: FnMut(&mut CommandView<'_>) -> HandlerResult + 'static,
{
    fn execute(&mut self, cmd: &mut CommandView<'_>) -> HandlerResult {
        (self.handler)(cmd)
    }

    fn resume(&mut self, cmd: &mut CommandView<'_>) -> HandlerResult {
        (self.handler)(cmd)
    }
}

/// Entry for a registered module.
struct ModuleEntry {
    /// The handler.
    handler: Box<dyn CommandHandler>,
    /// Module name for diagnostics.
    name: String,
}

/// Registry mapping module ids to handlers.
pub struct HandlerRegistry {
    modules: HashMap<u8, ModuleEntry>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            modules: HashMap::new(),
        }
    }

    /// Register a handler for a module, replacing any previous one.
    pub fn register<H: CommandHandler>(&mut self, module_id: u8, name: &str, handler: H) {
        if self.modules.contains_key(&module_id) {
            tracing::warn!("Replacing handler for module {:#04x}", module_id);
        }
        self.modules.insert(
            module_id,
            ModuleEntry {
                handler: Box::new(handler),
                name: name.to_string(),
            },
        );
    }

    /// Register a closure serving both execute and resume.
    pub fn register_fn<F>(&mut self, module_id: u8, name: &str, handler: F)
    where
        F: FnMut(&mut CommandView<'_>) -> HandlerResult + 'static,
    {
        self.register(module_id, name, FnHandler::new(handler));
    }

    /// Check if a module has a handler.
    pub fn contains(&self, module_id: u8) -> bool {
        self.modules.contains_key(&module_id)
    }

    /// Get module name by id.
    pub fn get_module_name(&self, module_id: u8) -> Option<&str> {
        self.modules.get(&module_id).map(|e| e.name.as_str())
    }

    /// Number of registered modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if no module is registered.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Dispatch the first part of a command.
    pub fn execute(&mut self, cmd: &mut CommandView<'_>) -> HandlerResult {
        self.handler_for(cmd)?.execute(cmd)
    }

    /// Dispatch a continuation of a command.
    pub fn resume(&mut self, cmd: &mut CommandView<'_>) -> HandlerResult {
        self.handler_for(cmd)?.resume(cmd)
    }

    fn handler_for(
        &mut self,
        cmd: &CommandView<'_>,
    ) -> std::result::Result<&mut (dyn CommandHandler + 'static), HandlerError> {
        let module_id = cmd.module_id();
        match self.modules.get_mut(&module_id) {
            Some(entry) => Ok(entry.handler.as_mut()),
            None => {
                tracing::warn!(
                    "No handler for module {:#04x}, CMD {:#010x}",
                    module_id,
                    cmd.cmd_id()
                );
                Err(HandlerError::new(status::INVALID_MODULE))
            }
        }
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
