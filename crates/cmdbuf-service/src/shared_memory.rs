//! Shared memory segments addressed by `(shm_id, shm_offset)` pairs.

use std::collections::HashMap;

use cmdbuf_protocol::{ParseError, ShmRef};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShmError {
    #[error("unknown shared memory id {0}")]
    UnknownId(i32),
    #[error("shared memory range {offset}+{len} outside segment {id} ({size} bytes)")]
    OutOfRange {
        id: i32,
        offset: u32,
        len: u32,
        size: usize,
    },
    #[error("shared memory id {0} is not a valid segment id")]
    InvalidId(i32),
    #[error("shared memory id {0} already registered")]
    DuplicateId(i32),
}

impl From<ShmError> for ParseError {
    fn from(_: ShmError) -> Self {
        ParseError::OutOfBounds
    }
}

/// The service's view of client-shared memory and the command buffer token.
pub trait CommandBufferEngine {
    /// Bounds-checked read access to `len` bytes at `shm`.
    fn resolve(&self, shm: ShmRef, len: u32) -> Result<&[u8], ShmError>;

    /// Bounds-checked write access to `len` bytes at `shm`.
    fn resolve_mut(&mut self, shm: ShmRef, len: u32) -> Result<&mut [u8], ShmError>;

    /// Records the last token the decoder passed (`SetToken`).
    fn set_token(&mut self, token: i32);

    fn token(&self) -> i32;

    /// Checks that `len` bytes at `shm` are addressable without touching them.
    fn check(&self, shm: ShmRef, len: u32) -> Result<(), ShmError> {
        self.resolve(shm, len).map(|_| ())
    }
}

/// In-process [`CommandBufferEngine`] backed by registered byte segments.
#[derive(Debug, Default, Clone)]
pub struct TransferBufferManager {
    segments: HashMap<i32, Vec<u8>>,
    token: i32,
}

impl TransferBufferManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a zeroed segment of `size` bytes under `id`. Ids must be positive.
    pub fn register(&mut self, id: i32, size: usize) -> Result<(), ShmError> {
        self.register_with(id, vec![0; size])
    }

    pub fn register_with(&mut self, id: i32, data: Vec<u8>) -> Result<(), ShmError> {
        if id <= 0 {
            return Err(ShmError::InvalidId(id));
        }
        if self.segments.contains_key(&id) {
            return Err(ShmError::DuplicateId(id));
        }
        self.segments.insert(id, data);
        Ok(())
    }

    pub fn destroy(&mut self, id: i32) -> bool {
        self.segments.remove(&id).is_some()
    }

    pub fn segment(&self, id: i32) -> Option<&[u8]> {
        self.segments.get(&id).map(Vec::as_slice)
    }

    pub fn segment_mut(&mut self, id: i32) -> Option<&mut [u8]> {
        self.segments.get_mut(&id).map(Vec::as_mut_slice)
    }

    /// Copies `data` into the segment at `shm`.
    pub fn write(&mut self, shm: ShmRef, data: &[u8]) -> Result<(), ShmError> {
        let len = u32::try_from(data.len()).map_err(|_| ShmError::OutOfRange {
            id: shm.id,
            offset: shm.offset,
            len: u32::MAX,
            size: self.segments.get(&shm.id).map_or(0, Vec::len),
        })?;
        self.resolve_mut(shm, len)?.copy_from_slice(data);
        Ok(())
    }

    pub fn read_u32(&self, shm: ShmRef) -> Result<u32, ShmError> {
        let bytes = self.resolve(shm, 4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn write_u32(&mut self, shm: ShmRef, value: u32) -> Result<(), ShmError> {
        self.write(shm, &value.to_le_bytes())
    }

    fn range(&self, shm: ShmRef, len: u32) -> Result<core::ops::Range<usize>, ShmError> {
        let segment = self
            .segments
            .get(&shm.id)
            .ok_or(ShmError::UnknownId(shm.id))?;
        let out_of_range = ShmError::OutOfRange {
            id: shm.id,
            offset: shm.offset,
            len,
            size: segment.len(),
        };
        let start = shm.offset as usize;
        let end = start.checked_add(len as usize).ok_or(out_of_range.clone())?;
        if end > segment.len() {
            return Err(out_of_range);
        }
        Ok(start..end)
    }
}

impl CommandBufferEngine for TransferBufferManager {
    fn resolve(&self, shm: ShmRef, len: u32) -> Result<&[u8], ShmError> {
        let range = self.range(shm, len)?;
        Ok(&self.segments[&shm.id][range])
    }

    fn resolve_mut(&mut self, shm: ShmRef, len: u32) -> Result<&mut [u8], ShmError> {
        let range = self.range(shm, len)?;
        let segment = self
            .segments
            .get_mut(&shm.id)
            .ok_or(ShmError::UnknownId(shm.id))?;
        Ok(&mut segment[range])
    }

    fn set_token(&mut self, token: i32) {
        self.token = token;
    }

    fn token(&self) -> i32 {
        self.token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_ids_and_overruns() {
        let mut mgr = TransferBufferManager::new();
        mgr.register(1, 16).unwrap();
        assert_eq!(mgr.register(1, 4), Err(ShmError::DuplicateId(1)));
        assert_eq!(mgr.register(0, 4), Err(ShmError::InvalidId(0)));

        assert_eq!(mgr.resolve(ShmRef::new(2, 0), 0), Err(ShmError::UnknownId(2)));
        assert!(mgr.resolve(ShmRef::new(1, 12), 4).is_ok());
        assert!(mgr.resolve(ShmRef::new(1, 16), 0).is_ok());
        assert!(matches!(
            mgr.resolve(ShmRef::new(1, 13), 4),
            Err(ShmError::OutOfRange { size: 16, .. })
        ));
        assert!(mgr.resolve(ShmRef::new(1, u32::MAX), u32::MAX).is_err());
    }

    #[test]
    fn writes_land_at_offset() {
        let mut mgr = TransferBufferManager::new();
        mgr.register(3, 8).unwrap();
        mgr.write_u32(ShmRef::new(3, 4), 0xAABB_CCDD).unwrap();
        assert_eq!(mgr.read_u32(ShmRef::new(3, 4)), Ok(0xAABB_CCDD));
        assert_eq!(&mgr.segment(3).unwrap()[..4], &[0; 4]);
    }
}
