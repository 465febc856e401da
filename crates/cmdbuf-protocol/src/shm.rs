//! References into client-shared memory segments.

use crate::view::CommandView;

/// A `(shm_id, shm_offset)` argument pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ShmRef {
    pub id: i32,
    pub offset: u32,
}

impl ShmRef {
    pub const NULL: ShmRef = ShmRef { id: 0, offset: 0 };

    pub fn new(id: i32, offset: u32) -> Self {
        Self { id, offset }
    }

    /// `(0, 0)` marks an absent optional input, e.g. `BufferData` without initial contents.
    pub fn is_null(self) -> bool {
        self == Self::NULL
    }

    pub fn with_len(self, len: u32) -> ShmRange {
        ShmRange { shm: self, len }
    }
}

/// A byte range inside a shared memory segment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ShmRange {
    pub shm: ShmRef,
    pub len: u32,
}

impl ShmRange {
    /// Exclusive end offset, or `None` if it does not fit in 32 bits.
    pub fn end(self) -> Option<u32> {
        self.shm.offset.checked_add(self.len)
    }
}

/// Input bytes that arrive either inline in the command or through shared memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataSource<'a> {
    Inline(&'a [u8]),
    Shm(ShmRange),
}

impl DataSource<'_> {
    pub fn len(&self) -> usize {
        match self {
            DataSource::Inline(bytes) => bytes.len(),
            DataSource::Shm(range) => range.len as usize,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CommandView<'_> {
    /// Reads the shared-memory pair starting at argument slot `idx`.
    pub fn shm_arg(&self, idx: usize) -> ShmRef {
        ShmRef::new(self.i32_arg(idx), self.arg(idx + 1))
    }
}
