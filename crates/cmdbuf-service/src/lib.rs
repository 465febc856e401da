//! Service side of the GPU command buffer.
//!
//! A [`CommandParser`] walks the ring the client fills and hands each command to a
//! [`Decoder`]. The decoder resolves shared memory through a [`CommandBufferEngine`], keeps the
//! cross-command GL state in [`ContextState`], latches GL errors in an [`ErrorState`], and issues
//! validated calls to a [`GlBackend`] with client ids translated to service ids.

#![deny(unsafe_code)]

pub mod backend;
pub mod buckets;
pub mod config;
pub mod decoder;
pub mod error_state;
pub mod parser;
pub mod resources;
pub mod shared_memory;
pub mod state;

pub use backend::{
    ActiveVariable, GlBackend, NativeCall, RecordedCall, RecordingBackend, VariableKind,
};
pub use buckets::{Bucket, BucketMap};
pub use config::{ConfigError, DecoderConfig};
pub use decoder::Decoder;
pub use error_state::{ErrorState, GlErrors};
pub use parser::CommandParser;
pub use resources::{ObjectEntry, ResourceTables};
pub use shared_memory::{CommandBufferEngine, ShmError, TransferBufferManager};
pub use state::{ContextState, StateValue};
