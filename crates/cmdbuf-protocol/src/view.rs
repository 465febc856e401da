//! Zero-copy decoding of commands out of a little-endian entry buffer.

use crate::error::{ParseError, ParseResult};
use crate::header::{CommandHeader, ENTRY_SIZE};
use crate::table::{command_info, ArgFlags, CommandId, CommandInfo, Immediate};

/// Upper bound on argument slots of any command in the table.
pub const MAX_ARGS: usize = 12;

/// Iterates `bytes` as little-endian `u32` values, ignoring a trailing partial entry.
pub fn le_u32s(bytes: &[u8]) -> impl Iterator<Item = u32> + '_ {
    bytes
        .chunks_exact(ENTRY_SIZE)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
}

/// Reads the header at the front of `buf` and checks that the command fits.
pub fn decode_header(buf: &[u8]) -> ParseResult<CommandHeader> {
    let header = CommandHeader::decode_le(buf).ok_or(ParseError::OutOfBounds)?;
    if header.size == 0 {
        return Err(ParseError::InvalidSize);
    }
    if header.size_bytes() > buf.len() {
        return Err(ParseError::OutOfBounds);
    }
    Ok(header)
}

/// A framed, table-matched command borrowed from a command buffer.
#[derive(Clone, Copy, Debug)]
pub struct CommandView<'a> {
    info: &'static CommandInfo,
    header: CommandHeader,
    args: [u32; MAX_ARGS],
    data: &'a [u8],
}

/// Decodes the command at the front of `buf`.
///
/// Only framing and the argument count are checked here. The immediate payload is checked
/// lazily by [`CommandView::immediate`] so that callers can reject a command for other
/// reasons first.
pub fn decode_command(buf: &[u8]) -> ParseResult<CommandView<'_>> {
    let header = decode_header(buf)?;
    let info = command_info(header.command).ok_or(ParseError::UnknownCommand)?;

    let body = &buf[ENTRY_SIZE..header.size_bytes()];
    let fixed = info.fields.len() * ENTRY_SIZE;
    let arg_count_ok = match info.arg_flags {
        ArgFlags::Fixed => body.len() == fixed,
        ArgFlags::AtLeastN => body.len() >= fixed,
    };
    if !arg_count_ok {
        return Err(ParseError::InvalidArguments);
    }

    let mut args = [0u32; MAX_ARGS];
    for (idx, value) in le_u32s(&body[..fixed]).enumerate() {
        args[idx] = value;
    }

    Ok(CommandView {
        info,
        header,
        args,
        data: &body[fixed..],
    })
}

impl<'a> CommandView<'a> {
    pub fn id(&self) -> CommandId {
        self.info.id
    }

    pub fn info(&self) -> &'static CommandInfo {
        self.info
    }

    pub fn header(&self) -> CommandHeader {
        self.header
    }

    /// Total size of the command in bytes.
    pub fn size_bytes(&self) -> usize {
        self.header.size_bytes()
    }

    pub fn args(&self) -> &[u32] {
        &self.args[..self.info.fields.len()]
    }

    /// Raw bits of argument slot `idx`; slots past the layout read as zero.
    pub fn arg(&self, idx: usize) -> u32 {
        self.args().get(idx).copied().unwrap_or(0)
    }

    pub fn i32_arg(&self, idx: usize) -> i32 {
        self.arg(idx) as i32
    }

    pub fn f32_arg(&self, idx: usize) -> f32 {
        f32::from_bits(self.arg(idx))
    }

    pub fn bool_arg(&self, idx: usize) -> bool {
        self.arg(idx) != 0
    }

    pub fn named(&self, name: &str) -> Option<u32> {
        self.info.field_index(name).map(|idx| self.arg(idx))
    }

    /// Everything after the argument slots, padding included.
    pub fn trailing(&self) -> &'a [u8] {
        self.data
    }

    /// The immediate payload as declared by the arguments.
    ///
    /// Fails with [`ParseError::OutOfBounds`] if the declared size overflows or does not fit
    /// inside the command.
    pub fn immediate(&self) -> ParseResult<&'a [u8]> {
        match self.info.immediate {
            Immediate::None => Ok(&[]),
            Immediate::Skip => Ok(self.data),
            _ => {
                let len = self
                    .info
                    .compute_data_size(self.args())
                    .ok_or(ParseError::OutOfBounds)?;
                self.data.get(..len).ok_or(ParseError::OutOfBounds)
            }
        }
    }

    /// The meaningful prefix of the immediate payload.
    ///
    /// `Ok(None)` means the payload is contained but its selector enum is invalid.
    pub fn effective_data(&self) -> ParseResult<Option<&'a [u8]>> {
        let data = self.immediate()?;
        Ok(self
            .info
            .effective_data_size(self.args())
            .and_then(|len| data.get(..len)))
    }
}

/// Walks a buffer command by command.
///
/// Commands with valid framing but an unknown id or a bad argument count are reported and
/// skipped. A framing error ends the iteration.
pub struct CommandIter<'a> {
    buf: &'a [u8],
    offset: usize,
    done: bool,
}

impl<'a> CommandIter<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            offset: 0,
            done: false,
        }
    }

    /// Byte offset of the next command.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl<'a> Iterator for CommandIter<'a> {
    type Item = (usize, ParseResult<CommandView<'a>>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset >= self.buf.len() {
            return None;
        }

        let offset = self.offset;
        let rest = &self.buf[offset..];
        let header = match decode_header(rest) {
            Ok(header) => header,
            Err(err) => {
                self.done = true;
                return Some((offset, Err(err)));
            }
        };

        self.offset = offset + header.size_bytes();
        Some((offset, decode_command(rest)))
    }
}
