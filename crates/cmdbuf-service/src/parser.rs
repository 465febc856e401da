//! Consumer side of the command ring.
//!
//! [`CommandParser`] owns the `get` offset and feeds commands between `get` and `put` to a
//! [`Decoder`]. Offsets count 4-byte entries. A command never straddles the end of the ring, so
//! the parser hands the decoder either `get..put` or, once `put` has wrapped, `get..end`.

use cmdbuf_protocol::{ParseError, ParseResult, ENTRY_SIZE};
use tracing::{debug, warn};

use crate::backend::GlBackend;
use crate::decoder::Decoder;
use crate::shared_memory::CommandBufferEngine;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandParser {
    get: usize,
    put: usize,
    entry_count: usize,
}

impl CommandParser {
    pub fn new(entry_count: usize) -> Self {
        Self {
            get: 0,
            put: 0,
            entry_count,
        }
    }

    pub fn get(&self) -> usize {
        self.get
    }

    pub fn put(&self) -> usize {
        self.put
    }

    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    pub fn is_empty(&self) -> bool {
        self.get == self.put
    }

    /// Publishes how far the producer has written. Offsets past the ring are rejected.
    pub fn set_put(&mut self, put: usize) -> ParseResult {
        if put >= self.entry_count {
            return Err(ParseError::OutOfBounds);
        }
        self.put = put;
        Ok(())
    }

    pub fn set_get(&mut self, get: usize) -> ParseResult {
        if get >= self.entry_count {
            return Err(ParseError::OutOfBounds);
        }
        self.get = get;
        Ok(())
    }

    /// Executes up to `max_commands` commands from `buffer`.
    ///
    /// A command that fails is still consumed, and processing stops right after it with its
    /// error. A command whose header cannot be framed is not consumed; `get` stays on it.
    pub fn process_commands<E, B>(
        &mut self,
        decoder: &mut Decoder<E, B>,
        buffer: &[u8],
        max_commands: usize,
    ) -> ParseResult
    where
        E: CommandBufferEngine,
        B: GlBackend,
    {
        let ring_len = self
            .entry_count
            .checked_mul(ENTRY_SIZE)
            .ok_or(ParseError::OutOfBounds)?;
        let ring = buffer.get(..ring_len).ok_or(ParseError::OutOfBounds)?;

        let mut processed = 0;
        while self.get != self.put && processed < max_commands {
            let end = if self.put > self.get {
                self.put
            } else {
                self.entry_count
            };
            let window = &ring[self.get * ENTRY_SIZE..end * ENTRY_SIZE];
            let (entries, result) = decoder.execute(window);
            if entries == 0 {
                let err = result.err().unwrap_or(ParseError::InvalidSize);
                warn!(get = self.get, put = self.put, %err, "unframeable command, parser stalled");
                return Err(err);
            }

            self.get += entries;
            if self.get >= self.entry_count {
                self.get = 0;
            }
            processed += 1;
            result?;
        }
        debug!(processed, get = self.get, put = self.put, "processed commands");
        Ok(())
    }
}
