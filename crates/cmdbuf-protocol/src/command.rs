//! Owned, table-checked command values and their encoder.

use thiserror::Error;

use crate::header::{CommandHeader, ENTRY_SIZE, MAX_SIZE_ENTRIES};
use crate::table::{CommandId, CommandInfo, Immediate};

/// One 4-byte argument slot, stored as its raw little-endian bits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Word(pub u32);

impl Word {
    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub fn as_i32(self) -> i32 {
        self.0 as i32
    }

    pub fn as_f32(self) -> f32 {
        f32::from_bits(self.0)
    }
}

impl From<u32> for Word {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

impl From<i32> for Word {
    fn from(v: i32) -> Self {
        Self(v as u32)
    }
}

impl From<f32> for Word {
    fn from(v: f32) -> Self {
        Self(v.to_bits())
    }
}

impl From<bool> for Word {
    fn from(v: bool) -> Self {
        Self(u32::from(v))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("{command:?} takes {expected} arguments, got {actual}")]
    ArgCountMismatch {
        command: CommandId,
        expected: usize,
        actual: usize,
    },
    #[error("{command:?} carries {expected} bytes of immediate data, got {actual}")]
    PayloadSizeMismatch {
        command: CommandId,
        expected: usize,
        actual: usize,
    },
    #[error("size computation for {0:?} overflowed")]
    Overflow(CommandId),
    #[error("{command:?} needs {entries} entries, more than a header can describe")]
    TooLarge { command: CommandId, entries: usize },
    #[error("command needs {needed} bytes but only {available} are available")]
    InsufficientSpace { needed: usize, available: usize },
}

/// A command with its argument slots and immediate payload.
///
/// The payload holds the meaningful bytes only; padding up to the next entry boundary (and,
/// for selected payloads, up to the full element count) is added when encoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command {
    pub id: CommandId,
    pub args: Vec<u32>,
    pub data: Vec<u8>,
}

impl Command {
    pub fn new(id: CommandId) -> Self {
        Self {
            id,
            args: Vec::with_capacity(id.info().fields.len()),
            data: Vec::new(),
        }
    }

    /// Appends the next argument slot.
    pub fn arg(mut self, value: impl Into<Word>) -> Self {
        self.args.push(value.into().0);
        self
    }

    pub fn with_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.data = data.into();
        self
    }

    /// Appends each `u32` of `values` to the payload in little-endian order.
    pub fn with_u32_data(mut self, values: &[u32]) -> Self {
        self.data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self
    }

    pub fn with_f32_data(self, values: &[f32]) -> Self {
        let bits: Vec<u32> = values.iter().map(|v| v.to_bits()).collect();
        self.with_u32_data(&bits)
    }

    pub fn info(&self) -> &'static CommandInfo {
        self.id.info()
    }

    /// Checks the command against its descriptor and returns its header.
    pub fn header(&self) -> Result<CommandHeader, EncodeError> {
        let info = self.info();
        if self.args.len() != info.fields.len() {
            return Err(EncodeError::ArgCountMismatch {
                command: self.id,
                expected: info.fields.len(),
                actual: self.args.len(),
            });
        }

        let wire_data = match info.immediate {
            Immediate::Skip => self.data.len(),
            _ => {
                let expected = info
                    .compute_data_size(&self.args)
                    .ok_or(EncodeError::Overflow(self.id))?;
                let acceptable = match info.immediate {
                    // A valid selector fixes the meaningful prefix, which padding must not fill.
                    Immediate::Selected { .. } => {
                        let needed = info.effective_data_size(&self.args).unwrap_or(0);
                        (needed..=expected).contains(&self.data.len())
                    }
                    _ => self.data.len() == expected,
                };
                if !acceptable {
                    return Err(EncodeError::PayloadSizeMismatch {
                        command: self.id,
                        expected,
                        actual: self.data.len(),
                    });
                }
                expected
            }
        };

        let total = info
            .fixed_size()
            .checked_add(wire_data)
            .and_then(|t| t.checked_add(ENTRY_SIZE - 1))
            .ok_or(EncodeError::Overflow(self.id))?;
        let entries = total / ENTRY_SIZE;
        if entries > MAX_SIZE_ENTRIES as usize {
            return Err(EncodeError::TooLarge {
                command: self.id,
                entries,
            });
        }
        CommandHeader::new(self.id as u16, entries as u32).ok_or(EncodeError::TooLarge {
            command: self.id,
            entries,
        })
    }

    /// Total encoded size in bytes.
    pub fn encoded_len(&self) -> Result<usize, EncodeError> {
        Ok(self.header()?.size_bytes())
    }

    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let mut out = vec![0u8; self.encoded_len()?];
        self.encode_into(&mut out)?;
        Ok(out)
    }

    /// Encodes into the front of `out`, zeroing all padding, and returns the bytes written.
    pub fn encode_into(&self, out: &mut [u8]) -> Result<usize, EncodeError> {
        let header = self.header()?;
        let len = header.size_bytes();
        let available = out.len();
        let out = out.get_mut(..len).ok_or(EncodeError::InsufficientSpace {
            needed: len,
            available,
        })?;

        out.fill(0);
        out[..ENTRY_SIZE].copy_from_slice(&header.encode_le());
        let mut offset = ENTRY_SIZE;
        for arg in &self.args {
            out[offset..offset + ENTRY_SIZE].copy_from_slice(&arg.to_le_bytes());
            offset += ENTRY_SIZE;
        }
        out[offset..offset + self.data.len()].copy_from_slice(&self.data);
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl;

    #[test]
    fn arg_count_is_checked() {
        let err = Command::new(CommandId::BindBuffer)
            .arg(gl::ARRAY_BUFFER)
            .encode()
            .unwrap_err();
        assert_eq!(
            err,
            EncodeError::ArgCountMismatch {
                command: CommandId::BindBuffer,
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn payload_must_match_count() {
        let err = Command::new(CommandId::GenBuffersImmediate)
            .arg(2u32)
            .with_u32_data(&[1])
            .encode()
            .unwrap_err();
        assert!(matches!(err, EncodeError::PayloadSizeMismatch { expected: 8, actual: 4, .. }));
    }

    #[test]
    fn selected_payload_is_zero_padded() {
        let bytes = Command::new(CommandId::ClearBufferfvImmediate)
            .arg(gl::DEPTH)
            .arg(0i32)
            .with_f32_data(&[0.5])
            .encode()
            .unwrap();
        assert_eq!(bytes.len(), 4 + 8 + 16);
        assert_eq!(&bytes[12..16], &0.5f32.to_bits().to_le_bytes());
        assert!(bytes[16..].iter().all(|&b| b == 0));
    }

    #[test]
    fn selected_payload_must_cover_the_selector() {
        let err = Command::new(CommandId::ClearBufferfvImmediate)
            .arg(gl::COLOR)
            .arg(0i32)
            .with_f32_data(&[0.5])
            .encode()
            .unwrap_err();
        assert!(matches!(err, EncodeError::PayloadSizeMismatch { expected: 16, actual: 4, .. }));

        let unknown_selector = Command::new(CommandId::ClearBufferfvImmediate)
            .arg(gl::STENCIL)
            .arg(0i32)
            .with_f32_data(&[0.5]);
        assert!(unknown_selector.encode().is_ok());
    }

    #[test]
    fn encode_into_reports_short_buffers() {
        let cmd = Command::new(CommandId::Flush);
        let mut out = [0u8; 2];
        assert_eq!(
            cmd.encode_into(&mut out),
            Err(EncodeError::InsufficientSpace {
                needed: 4,
                available: 2
            })
        );
    }
}
