//! Client-side command ring.
//!
//! The producer owns `put`, the consumer owns `get`; both count entries. One entry is always
//! left free so that `put == get` means empty. A command never wraps around the end of the
//! ring: when the tail is too short it is filled with a `Noop` and writing restarts at entry 0.

use thiserror::Error;

use crate::command::{Command, EncodeError};
use crate::header::{CommandHeader, ENTRY_SIZE};
use crate::table::CommandId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RingError {
    #[error("ring full: need {needed} entries, {available} free")]
    Full { needed: usize, available: usize },
    #[error("command of {entries} entries can never fit a ring of {capacity} entries")]
    TooLarge { entries: usize, capacity: usize },
    #[error("get offset {get} outside ring of {capacity} entries")]
    InvalidGet { get: usize, capacity: usize },
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

#[derive(Debug, Clone)]
pub struct CommandRing {
    buf: Vec<u8>,
    capacity: usize,
    put: usize,
    get: usize,
    token: i32,
}

impl CommandRing {
    /// Creates a ring of `capacity` entries. Rings of fewer than two entries never accept a
    /// command.
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity * ENTRY_SIZE],
            capacity,
            put: 0,
            get: 0,
            token: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn put(&self) -> usize {
        self.put
    }

    pub fn get(&self) -> usize {
        self.get
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Most recent token issued by [`insert_token`](Self::insert_token).
    pub fn last_token(&self) -> i32 {
        self.token
    }

    /// Records how far the consumer has read.
    pub fn set_get(&mut self, get: usize) -> Result<(), RingError> {
        if get >= self.capacity {
            return Err(RingError::InvalidGet {
                get,
                capacity: self.capacity,
            });
        }
        self.get = get;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.put == self.get
    }

    /// Entries that can still be written before the producer catches up with `get`.
    pub fn free_entries(&self) -> usize {
        if self.get > self.put {
            self.get - self.put - 1
        } else {
            (self.capacity - self.put + self.get).saturating_sub(1)
        }
    }

    fn contiguous_entries(&self) -> usize {
        if self.get > self.put {
            self.get - self.put - 1
        } else if self.get == 0 {
            (self.capacity - self.put).saturating_sub(1)
        } else {
            self.capacity - self.put
        }
    }

    /// Makes `entries` contiguous entries available at `put`, wrapping with a `Noop` if needed.
    fn reserve(&mut self, entries: usize) -> Result<(), RingError> {
        if entries >= self.capacity {
            return Err(RingError::TooLarge {
                entries,
                capacity: self.capacity,
            });
        }
        if self.contiguous_entries() >= entries {
            return Ok(());
        }
        if self.get <= self.put && self.get > 0 && self.get - 1 >= entries {
            let tail = self.capacity - self.put;
            let header = CommandHeader {
                command: CommandId::Noop as u16,
                size: tail as u32,
            };
            let start = self.put * ENTRY_SIZE;
            self.buf[start..].fill(0);
            self.buf[start..start + ENTRY_SIZE].copy_from_slice(&header.encode_le());
            self.put = 0;
            return Ok(());
        }
        Err(RingError::Full {
            needed: entries,
            available: self.free_entries(),
        })
    }

    /// Writes `cmd` at `put` and returns the new `put`.
    pub fn append(&mut self, cmd: &Command) -> Result<usize, RingError> {
        let entries = cmd.encoded_len()? / ENTRY_SIZE;
        self.reserve(entries)?;

        let start = self.put * ENTRY_SIZE;
        cmd.encode_into(&mut self.buf[start..])?;
        self.put += entries;
        if self.put == self.capacity {
            self.put = 0;
        }
        Ok(self.put)
    }

    /// Emits `SetToken` with the next token value and returns it.
    ///
    /// Tokens increase monotonically and wrap within the positive `i32` range.
    pub fn insert_token(&mut self) -> Result<i32, RingError> {
        let token = (self.token.wrapping_add(1)) & 0x7fff_ffff;
        self.append(&Command::new(CommandId::SetToken).arg(token))?;
        self.token = token;
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::decode_command;

    #[test]
    fn wraps_with_noop_padding() {
        let mut ring = CommandRing::new(8);
        // Three 2-entry SetTokens leave put at 6.
        for _ in 0..3 {
            ring.insert_token().unwrap();
        }
        assert_eq!(ring.put(), 6);
        ring.set_get(6).unwrap();

        // A 3-entry command does not fit in the last two entries.
        let cmd = Command::new(CommandId::BindBuffer).arg(0x8892u32).arg(1u32);
        assert_eq!(ring.append(&cmd).unwrap(), 3);

        let pad = decode_command(&ring.as_bytes()[6 * ENTRY_SIZE..]).unwrap();
        assert_eq!(pad.id(), CommandId::Noop);
        assert_eq!(pad.header().size, 2);
        let bind = decode_command(ring.as_bytes()).unwrap();
        assert_eq!(bind.id(), CommandId::BindBuffer);
    }

    #[test]
    fn degenerate_rings_reject_everything() {
        for capacity in [0, 1] {
            let mut ring = CommandRing::new(capacity);
            assert_eq!(ring.free_entries(), 0);
            assert_eq!(
                ring.append(&Command::new(CommandId::Flush)),
                Err(RingError::TooLarge {
                    entries: 1,
                    capacity
                })
            );
            assert!(ring.is_empty());
        }
    }

    #[test]
    fn full_ring_is_reported() {
        let mut ring = CommandRing::new(4);
        ring.insert_token().unwrap();
        assert_eq!(
            ring.insert_token(),
            Err(RingError::Full {
                needed: 2,
                available: 1
            })
        );
        assert_eq!(ring.last_token(), 1);
    }

    #[test]
    fn oversized_command_is_rejected() {
        let mut ring = CommandRing::new(2);
        let err = ring
            .append(&Command::new(CommandId::BindBuffer).arg(0u32).arg(0u32))
            .unwrap_err();
        assert_eq!(
            err,
            RingError::TooLarge {
                entries: 3,
                capacity: 2
            }
        );
    }
}
