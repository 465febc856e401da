//! How many bytes each shared-memory reference covers.

use bytemuck::Pod;
use cmdbuf_protocol::gl;
use cmdbuf_protocol::{
    ActiveInfoResult, CommandId, CommandView, ParseError, ParseResult, QuerySync,
    ReadPixelsResult, ShmRef, SizedResult,
};

use crate::backend::GlBackend;
use crate::shared_memory::CommandBufferEngine;
use crate::state::{state_value_count, ContextState};

use super::Decoder;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum ShmNeed {
    /// The pair must name `len` addressable bytes.
    Required(u32),
    /// Like `Required`, but `(0, 0)` means "absent".
    Optional(u32),
    /// The pair is ignored for these arguments.
    Unused,
}

/// Requirement for the shared-memory pair starting at argument slot `slot`.
///
/// Sizes that depend on arguments use the raw argument values; negative sizes count as zero
/// here and are rejected later by field validation. A size computation that overflows is
/// [`ParseError::OutOfBounds`].
pub(super) fn shm_need(
    view: &CommandView<'_>,
    slot: usize,
    state: &ContextState,
) -> ParseResult<ShmNeed> {
    use CommandId::*;
    use ShmNeed::*;

    let field = view.info().fields[slot].name;
    let size_arg = |name: &str| view.named(name).map_or(0, |v| (v as i32).max(0) as u32);

    let need = match (view.id(), field) {
        (SetBucketData | GetBucketData, _) => Required(view.named("size").unwrap_or(0)),
        (GetBucketStart, "result_memory_id") => Required(4),
        (GetBucketStart, _) => match view.named("data_memory_size").unwrap_or(0) {
            0 => Unused,
            len => Required(len),
        },

        (BufferData, _) => Optional(size_arg("size")),
        (BufferSubData, _) => Required(size_arg("size")),
        (Uniform4fv, _) => Required(
            size_arg("count")
                .checked_mul(16)
                .ok_or(ParseError::OutOfBounds)?,
        ),
        (TexImage2D, _) => Optional(image_size(view, state.unpack_alignment)?),
        (TexSubImage2D, _) => Required(image_size(view, state.unpack_alignment)?),
        (ReadPixels, "pixels_shm_id") => Required(image_size(view, state.pack_alignment)?),
        (ReadPixels, _) => Optional(ReadPixelsResult::SIZE_BYTES as u32),

        (GetActiveAttrib | GetActiveUniform, _) => Required(ActiveInfoResult::SIZE_BYTES as u32),
        (BeginQueryEXT, _) => Required(QuerySync::SIZE_BYTES as u32),

        (GetBooleanv, _) => Required(sized::<u8>(state_value_count(view.arg(0)))?),
        (GetFloatv | GetIntegerv, _) => Required(sized::<i32>(state_value_count(view.arg(0)))?),
        (GetBufferParameteriv | GetProgramiv | GetShaderiv, _) => Required(sized::<i32>(1)?),

        // Scalar results: GetError, Is*, CheckFramebufferStatus, ClientWaitSync and the
        // location queries.
        _ => Required(4),
    };
    Ok(need)
}

fn sized<T: Pod>(count: u32) -> ParseResult<u32> {
    SizedResult::<T>::compute_size(count as usize)
        .and_then(|len| u32::try_from(len).ok())
        .ok_or(ParseError::OutOfBounds)
}

/// Pixel bytes for the `width`/`height`/`format`/`type` arguments of an image command.
///
/// An invalid format/type pair needs no memory; the handler reports it as a GL error.
fn image_size(view: &CommandView<'_>, alignment: i32) -> ParseResult<u32> {
    let width = view.named("width").unwrap_or(0) as i32;
    let height = view.named("height").unwrap_or(0) as i32;
    let format = view.named("format").unwrap_or(0);
    let ty = view.named("type").unwrap_or(0);
    if width < 0 || height < 0 || gl::bytes_per_group(format, ty).is_none() {
        return Ok(0);
    }
    gl::compute_image_data_size(width as u32, height as u32, format, ty, alignment as u32)
        .ok_or(ParseError::OutOfBounds)
}

impl<E: CommandBufferEngine, B: GlBackend> Decoder<E, B> {
    pub(super) fn write_result(&mut self, shm: ShmRef, bytes: &[u8]) -> ParseResult {
        let len = u32::try_from(bytes.len()).map_err(|_| ParseError::OutOfBounds)?;
        self.engine.resolve_mut(shm, len)?.copy_from_slice(bytes);
        Ok(())
    }

    pub(super) fn write_u32_result(&mut self, shm: ShmRef, value: u32) -> ParseResult {
        self.write_result(shm, &value.to_le_bytes())
    }

    pub(super) fn read_u32_result(&self, shm: ShmRef) -> ParseResult<u32> {
        let bytes = self.engine.resolve(shm, 4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// `Get*` commands with a [`SizedResult`] expect the client to zero its `size` first.
    pub(super) fn sized_result_is_empty<T: Pod>(&self, shm: ShmRef) -> ParseResult<bool> {
        let header = self.engine.resolve(shm, SizedResult::<T>::HEADER_BYTES as u32)?;
        Ok(SizedResult::<T>::size(header) == Some(0))
    }

    pub(super) fn write_sized<T: Pod>(&mut self, shm: ShmRef, values: &[T]) -> ParseResult {
        let len = sized::<T>(u32::try_from(values.len()).map_err(|_| ParseError::OutOfBounds)?)?;
        let buf = self.engine.resolve_mut(shm, len)?;
        if !SizedResult::<T>::write(buf, values) {
            return Err(ParseError::OutOfBounds);
        }
        Ok(())
    }
}
