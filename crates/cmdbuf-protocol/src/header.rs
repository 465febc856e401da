//! Command header packing.
//!
//! The header is a single little-endian `u32`:
//!
//! ```text
//!  31            21 20                    0
//! +----------------+-----------------------+
//! |   command id   |   size (in entries)   |
//! +----------------+-----------------------+
//! ```
//!
//! `size` counts the header entry itself, so a command with no arguments has size 1.

/// Size in bytes of one command buffer entry. Every command size is a multiple of this.
pub const ENTRY_SIZE: usize = 4;

const SIZE_BITS: u32 = 21;
const SIZE_MASK: u32 = (1 << SIZE_BITS) - 1;

/// Largest size (in entries) a single command may declare.
pub const MAX_SIZE_ENTRIES: u32 = SIZE_MASK;

/// Largest command id that fits in the header.
pub const MAX_COMMAND_ID: u16 = (1 << (32 - SIZE_BITS)) - 1;

/// Rounds `bytes` up to whole entries.
pub const fn entries_for(bytes: usize) -> usize {
    bytes.div_ceil(ENTRY_SIZE)
}

/// Rounds `bytes` up to the next entry boundary.
pub const fn align_to_entry(bytes: usize) -> usize {
    entries_for(bytes) * ENTRY_SIZE
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommandHeader {
    pub command: u16,
    /// Total size of the command, header included, in entries.
    pub size: u32,
}

impl CommandHeader {
    pub const SIZE_BYTES: usize = ENTRY_SIZE;

    /// Builds a header; returns `None` if either field does not fit its bit range.
    pub fn new(command: u16, size: u32) -> Option<Self> {
        if command > MAX_COMMAND_ID || size > MAX_SIZE_ENTRIES {
            return None;
        }
        Some(Self { command, size })
    }

    /// Header for a fixed-size command whose layout (header included) is `fixed_bytes` long.
    pub fn set_fixed(command: u16, fixed_bytes: usize) -> Option<Self> {
        debug_assert_eq!(fixed_bytes % ENTRY_SIZE, 0);
        Self::new(command, u32::try_from(fixed_bytes / ENTRY_SIZE).ok()?)
    }

    /// Header for a variable-size command: `fixed_bytes` of layout plus `data_bytes` of
    /// immediate payload, rounded up to whole entries.
    pub fn set_immediate(command: u16, fixed_bytes: usize, data_bytes: usize) -> Option<Self> {
        let total = fixed_bytes.checked_add(data_bytes)?;
        let entries = total.checked_add(ENTRY_SIZE - 1)? / ENTRY_SIZE;
        Self::new(command, u32::try_from(entries).ok()?)
    }

    pub fn from_word(word: u32) -> Self {
        Self {
            command: (word >> SIZE_BITS) as u16,
            size: word & SIZE_MASK,
        }
    }

    pub fn to_word(self) -> u32 {
        (u32::from(self.command) << SIZE_BITS) | (self.size & SIZE_MASK)
    }

    pub fn size_bytes(self) -> usize {
        self.size as usize * ENTRY_SIZE
    }

    pub fn decode_le(buf: &[u8]) -> Option<Self> {
        let word = buf.get(..ENTRY_SIZE)?;
        Some(Self::from_word(u32::from_le_bytes(word.try_into().ok()?)))
    }

    pub fn encode_le(self) -> [u8; ENTRY_SIZE] {
        self.to_word().to_le_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_command_into_high_bits() {
        let hdr = CommandHeader::new(0x123, 7).unwrap();
        assert_eq!(hdr.to_word(), (0x123 << 21) | 7);
        assert_eq!(CommandHeader::from_word(hdr.to_word()), hdr);
    }

    #[test]
    fn rejects_out_of_range_fields() {
        assert!(CommandHeader::new(MAX_COMMAND_ID + 1, 1).is_none());
        assert!(CommandHeader::new(1, MAX_SIZE_ENTRIES + 1).is_none());
        assert!(CommandHeader::new(MAX_COMMAND_ID, MAX_SIZE_ENTRIES).is_some());
    }

    #[test]
    fn immediate_size_rounds_up_to_entries() {
        let hdr = CommandHeader::set_immediate(4, 16, 5).unwrap();
        assert_eq!(hdr.size, 6);
        assert_eq!(hdr.size_bytes(), 24);
    }
}
