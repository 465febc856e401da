//! Wire format of the GPU command buffer.
//!
//! A command stream is a sequence of 4-byte entries. Every command starts with a
//! one-entry [`CommandHeader`] (command id + total size in entries), followed by one entry per
//! declared argument, optionally followed by an immediate payload padded to entry granularity.
//!
//! Instead of one hand-written struct per command, every command layout is described by a
//! [`CommandInfo`] row in a static table (see [`table`]). A single generic encoder
//! ([`Command`], [`CommandWriter`]) and decoder ([`decode_command`], [`CommandIter`]) work from
//! that table.

#![deny(unsafe_code)]

pub mod command;
pub mod error;
pub mod gl;
pub mod header;
pub mod ids;
pub mod result;
pub mod ring;
pub mod shm;
pub mod table;
pub mod validators;
pub mod view;
pub mod writer;

pub use command::{Command, EncodeError, Word};
pub use error::{ParseError, ParseResult};
pub use header::{CommandHeader, ENTRY_SIZE};
pub use ids::IdNamespace;
pub use result::{ActiveInfoResult, QuerySync, ReadPixelsResult, SizedResult};
pub use ring::{CommandRing, RingError};
pub use shm::{DataSource, ShmRange, ShmRef};
pub use table::{
    command_info, commands, ArgFlags, CommandId, CommandInfo, Field, FieldKind, Immediate,
};
pub use view::{decode_command, decode_header, le_u32s, CommandIter, CommandView};
pub use writer::CommandWriter;
