//! Bucket commands shared by every API.

use cmdbuf_protocol::{CommandView, ParseError, ParseResult};

use crate::backend::GlBackend;
use crate::shared_memory::CommandBufferEngine;

use super::Decoder;

impl<E: CommandBufferEngine, B: GlBackend> Decoder<E, B> {
    pub(super) fn set_bucket_size(&mut self, view: &CommandView<'_>) -> ParseResult {
        let (bucket_id, size) = (view.arg(0), view.arg(1));
        if size > self.config.max_bucket_size {
            return Err(ParseError::InvalidArguments);
        }
        self.buckets.create(bucket_id).set_size(size as usize);
        Ok(())
    }

    pub(super) fn set_bucket_data(&mut self, view: &CommandView<'_>) -> ParseResult {
        let (bucket_id, offset, size) = (view.arg(0), view.arg(1), view.arg(2));
        let data = self.engine.resolve(view.shm_arg(3), size)?;
        let bucket = self
            .buckets
            .get_mut(bucket_id)
            .ok_or(ParseError::InvalidArguments)?;
        if !bucket.set_data(offset as usize, data) {
            return Err(ParseError::InvalidArguments);
        }
        Ok(())
    }

    pub(super) fn set_bucket_data_immediate(
        &mut self,
        view: &CommandView<'_>,
        data: &[u8],
    ) -> ParseResult {
        let (bucket_id, offset) = (view.arg(0), view.arg(1));
        let bucket = self
            .buckets
            .get_mut(bucket_id)
            .ok_or(ParseError::InvalidArguments)?;
        if !bucket.set_data(offset as usize, data) {
            return Err(ParseError::InvalidArguments);
        }
        Ok(())
    }

    /// Writes the bucket size to the result and copies as much of the bucket as fits into the
    /// data memory. The result must arrive zeroed.
    pub(super) fn get_bucket_start(&mut self, view: &CommandView<'_>) -> ParseResult {
        let bucket_id = view.arg(0);
        let result = view.shm_arg(1);
        let data_memory_size = view.arg(3);
        let data_memory = view.shm_arg(4);

        if self.engine.resolve(result, 4)? != [0; 4] {
            return Err(ParseError::InvalidArguments);
        }
        let bucket = self
            .buckets
            .get(bucket_id)
            .ok_or(ParseError::InvalidArguments)?;
        let size = bucket.size();
        let copy = size.min(data_memory_size as usize);

        if copy > 0 {
            self.engine
                .resolve_mut(data_memory, copy as u32)?
                .copy_from_slice(&bucket.data()[..copy]);
        }
        self.engine
            .resolve_mut(result, 4)?
            .copy_from_slice(&(size as u32).to_le_bytes());
        Ok(())
    }

    pub(super) fn get_bucket_data(&mut self, view: &CommandView<'_>) -> ParseResult {
        let (bucket_id, offset, size) = (view.arg(0), view.arg(1), view.arg(2));
        let src = self
            .buckets
            .get(bucket_id)
            .and_then(|bucket| bucket.get_data(offset as usize, size as usize))
            .ok_or(ParseError::InvalidArguments)?;
        self.engine
            .resolve_mut(view.shm_arg(3), size)?
            .copy_from_slice(src);
        Ok(())
    }

    /// Reads a bucket holding a string. Missing, empty and non-UTF-8 buckets are
    /// `InvalidArguments`.
    pub(super) fn bucket_string(&self, bucket_id: u32) -> ParseResult<String> {
        self.buckets
            .get(bucket_id)
            .filter(|bucket| bucket.size() != 0)
            .and_then(|bucket| bucket.get_as_string())
            .ok_or(ParseError::InvalidArguments)
    }
}
