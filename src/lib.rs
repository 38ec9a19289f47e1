//! # cdo-stream
//!
//! Resumable processor for Configuration Data Objects (CDOs).
//!
//! A CDO is a word stream of commands that configures an SoC subsystem at
//! boot. The loader hands the object over in chunks whose boundaries may
//! fall anywhere; this crate verifies the header once, frames and dispatches
//! each command to the handler of its module, and keeps everything needed to
//! continue with the next chunk in a [`StreamState`].
//!
//! ## Architecture
//!
//! - **Protocol**: object header, command framing, scratch region
//! - **Handlers**: per-module `execute`/`resume` entry points
//! - **Processor**: chunk loop, break/END control, lockdown policy
//!
//! ## Example
//!
//! ```
//! use cdo_stream::protocol::{build_command, ObjectHeader, DEFAULT_VERSION};
//! use cdo_stream::{CdoProcessor, Chunk, StreamState};
//!
//! let mut processor = CdoProcessor::builder()
//!     .handler_fn(1, "generic", |cmd| {
//!         let _ = cmd.payload();
//!         Ok(())
//!     })
//!     .build()
//!     .unwrap();
//!
//! let body = build_command(1, 2, &[0xAA; 16]);
//! let mut object = ObjectHeader::new(DEFAULT_VERSION, body.len() as u32).encode().to_vec();
//! object.extend(&body);
//!
//! let mut state = StreamState::new(0x1C00_0001);
//! for chunk in object.chunks(4) {
//!     processor.process_chunk(&mut state, Chunk::new(chunk, 0)).unwrap();
//! }
//! assert!(state.is_complete());
//! ```

pub mod codec;
pub mod config;
pub mod control;
pub mod error;
pub mod handler;
pub mod policy;
pub mod protocol;
pub mod state;

mod processor;

pub use config::ProcessorConfig;
pub use error::CdoError;
pub use processor::{CdoProcessor, CdoProcessorBuilder, Chunk, ChunkStatus};
pub use state::StreamState;
