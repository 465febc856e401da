//! Buffers, textures, framebuffers, uniforms, vertex attributes and draws.

use cmdbuf_protocol::gl::{self, GLenum};
use cmdbuf_protocol::validators::bind_target_for_image_target;
use cmdbuf_protocol::{
    le_u32s, CommandId, CommandView, DataSource, IdNamespace, ParseError, ParseResult,
    ReadPixelsResult,
};

use crate::backend::{GlBackend, NativeCall};
use crate::shared_memory::CommandBufferEngine;
use crate::state::{Attachment, BufferInfo, LevelInfo, RenderbufferInfo};

use super::{native_args, Decoder};

/// Largest stride `VertexAttribPointer` accepts.
const MAX_VERTEX_ATTRIB_STRIDE: i32 = 255;

impl<E: CommandBufferEngine, B: GlBackend> Decoder<E, B> {
    pub(super) fn buffer_data(&mut self, view: &CommandView<'_>) -> ParseResult {
        let (target, size, data, usage) =
            (view.arg(0), view.i32_arg(1), view.shm_arg(2), view.arg(4));
        let buffer = self.state.bound_buffer(target);
        if buffer == 0 {
            self.set_error(view, gl::INVALID_OPERATION, "no buffer bound");
            return Ok(());
        }
        self.forward_shm(view, data, size as u32)?;
        self.state.buffers.insert(buffer, BufferInfo { size, usage });
        Ok(())
    }

    pub(super) fn buffer_sub_data(&mut self, view: &CommandView<'_>) -> ParseResult {
        let (target, offset, size, data) =
            (view.arg(0), view.i32_arg(1), view.i32_arg(2), view.shm_arg(3));
        let Some(info) = self.bound_buffer_info(target) else {
            self.set_error(view, gl::INVALID_OPERATION, "no buffer bound");
            return Ok(());
        };
        if !range_fits(offset, size, info.size) {
            self.set_error(view, gl::INVALID_VALUE, "out of range");
            return Ok(());
        }
        self.forward_shm(view, data, size as u32)?;
        Ok(())
    }

    pub(super) fn copy_buffer_sub_data(&mut self, view: &CommandView<'_>) -> ParseResult {
        let (read_target, write_target) = (view.arg(0), view.arg(1));
        let (read_offset, write_offset, size) = (view.i32_arg(2), view.i32_arg(3), view.i32_arg(4));
        let (Some(read), Some(write)) = (
            self.bound_buffer_info(read_target),
            self.bound_buffer_info(write_target),
        ) else {
            self.set_error(view, gl::INVALID_OPERATION, "no buffer bound");
            return Ok(());
        };
        if !range_fits(read_offset, size, read.size)
            || !range_fits(write_offset, size, write.size)
        {
            self.set_error(view, gl::INVALID_VALUE, "out of range");
            return Ok(());
        }
        let same_buffer =
            self.state.bound_buffer(read_target) == self.state.bound_buffer(write_target);
        let (read_offset, write_offset, size) =
            (i64::from(read_offset), i64::from(write_offset), i64::from(size));
        if same_buffer && read_offset < write_offset + size && write_offset < read_offset + size {
            self.set_error(view, gl::INVALID_VALUE, "overlapping ranges");
            return Ok(());
        }
        self.forward(view, &[]);
        Ok(())
    }

    pub(super) fn get_buffer_parameteriv(&mut self, view: &CommandView<'_>) -> ParseResult {
        let (target, pname, params) = (view.arg(0), view.arg(1), view.shm_arg(2));
        if !self.sized_result_is_empty::<i32>(params)? {
            return Err(ParseError::InvalidArguments);
        }
        if self.state.bound_buffer(target) == 0 {
            self.set_error(view, gl::INVALID_OPERATION, "no buffer bound");
            return Ok(());
        }
        let info = self.bound_buffer_info(target).unwrap_or(BufferInfo {
            size: 0,
            usage: gl::STATIC_DRAW,
        });
        let value = match pname {
            gl::BUFFER_SIZE => info.size,
            _ => info.usage as i32,
        };
        self.write_sized(params, &[value])
    }

    fn bound_buffer_info(&self, target: GLenum) -> Option<BufferInfo> {
        match self.state.bound_buffer(target) {
            0 => None,
            buffer => Some(self.state.buffers.get(&buffer).copied().unwrap_or_default()),
        }
    }

    pub(super) fn tex_image_2d(&mut self, view: &CommandView<'_>) -> ParseResult {
        let target = view.arg(0);
        let level = view.i32_arg(1);
        let internal_format = view.arg(2);
        let (width, height) = (view.i32_arg(3), view.i32_arg(4));
        let (format, ty) = (view.arg(5), view.arg(6));
        let pixels = view.shm_arg(7);

        let max_size = (self.config.max_texture_size as i32)
            .checked_shr(level.max(0) as u32)
            .unwrap_or(0);
        if level < 0 || width > max_size || height > max_size {
            self.set_error(view, gl::INVALID_VALUE, "dimensions out of range");
            return Ok(());
        }
        if target != gl::TEXTURE_2D && width != height {
            self.set_error(view, gl::INVALID_VALUE, "cube map faces must be square");
            return Ok(());
        }
        if internal_format != format || gl::bytes_per_group(format, ty).is_none() {
            self.set_error(view, gl::INVALID_OPERATION, "format and type combination");
            return Ok(());
        }
        let texture = self.state.bound_texture(bind_target_for_image_target(target));
        if texture == 0 {
            self.set_error(view, gl::INVALID_OPERATION, "no texture bound");
            return Ok(());
        }

        let len = gl::compute_image_data_size(
            width as u32,
            height as u32,
            format,
            ty,
            self.state.unpack_alignment as u32,
        )
        .ok_or(ParseError::OutOfBounds)?;
        self.forward_shm(view, pixels, len)?;
        self.state.textures.entry(texture).or_default().levels.insert(
            (target, level),
            LevelInfo {
                width,
                height,
                format,
                ty,
            },
        );
        Ok(())
    }

    pub(super) fn tex_sub_image_2d(&mut self, view: &CommandView<'_>) -> ParseResult {
        let (target, level) = (view.arg(0), view.i32_arg(1));
        let (xoffset, yoffset) = (view.i32_arg(2), view.i32_arg(3));
        let (width, height) = (view.i32_arg(4), view.i32_arg(5));
        let (format, ty) = (view.arg(6), view.arg(7));
        let pixels = view.shm_arg(8);

        let texture = self.state.bound_texture(bind_target_for_image_target(target));
        let Some(defined) = self
            .state
            .textures
            .get(&texture)
            .and_then(|info| info.levels.get(&(target, level)))
            .copied()
        else {
            self.set_error(view, gl::INVALID_OPERATION, "level not defined");
            return Ok(());
        };
        if !range_fits(xoffset, width, defined.width)
            || !range_fits(yoffset, height, defined.height)
        {
            self.set_error(view, gl::INVALID_VALUE, "region out of range");
            return Ok(());
        }
        if format != defined.format || ty != defined.ty {
            self.set_error(view, gl::INVALID_OPERATION, "format does not match level");
            return Ok(());
        }

        let len = gl::compute_image_data_size(
            width as u32,
            height as u32,
            format,
            ty,
            self.state.unpack_alignment as u32,
        )
        .ok_or(ParseError::OutOfBounds)?;
        self.forward_shm(view, pixels, len)?;
        Ok(())
    }

    /// `TexParameter*` and `GenerateMipmap`: both act on the texture bound to `target`.
    pub(super) fn tex_parameter(&mut self, view: &CommandView<'_>, data: &[u8]) -> ParseResult {
        let target = view.arg(0);
        let texture = self.state.bound_texture(target);
        if texture == 0 {
            self.set_error(view, gl::INVALID_OPERATION, "no texture bound");
            return Ok(());
        }
        if view.id() == CommandId::GenerateMipmap {
            let has_base_level = self
                .state
                .textures
                .get(&texture)
                .is_some_and(|info| info.levels.keys().any(|&(_, level)| level == 0));
            if !has_base_level {
                self.set_error(view, gl::INVALID_OPERATION, "base level not defined");
                return Ok(());
            }
        }
        self.forward(view, data);
        Ok(())
    }

    /// Reads into the pixel memory, then fills the optional [`ReadPixelsResult`].
    pub(super) fn read_pixels(&mut self, view: &CommandView<'_>) -> ParseResult {
        let (width, height) = (view.i32_arg(2), view.i32_arg(3));
        let (format, ty) = (view.arg(4), view.arg(5));
        let (pixels, result) = (view.shm_arg(6), view.shm_arg(8));

        if !result.is_null() {
            let bytes = self.engine.resolve(result, ReadPixelsResult::SIZE_BYTES as u32)?;
            if ReadPixelsResult::read_from(bytes).map_or(true, |r| r.success != 0) {
                return Err(ParseError::InvalidArguments);
            }
        }
        if gl::bytes_per_group(format, ty).is_none() {
            self.set_error(view, gl::INVALID_OPERATION, "format and type combination");
            return Ok(());
        }

        let len = gl::compute_image_data_size(
            width as u32,
            height as u32,
            format,
            ty,
            self.state.pack_alignment as u32,
        )
        .ok_or(ParseError::OutOfBounds)?;
        let args = native_args(view, &self.resources);
        let out = self.engine.resolve_mut(pixels, len)?;
        self.backend.call(
            &NativeCall {
                command: view.id(),
                args: &args,
                data: &[],
            },
            out,
        );

        if !result.is_null() {
            let done = ReadPixelsResult {
                success: 1,
                row_length: width,
                num_rows: height,
            };
            self.write_result(result, done.as_bytes())?;
        }
        Ok(())
    }

    pub(super) fn renderbuffer_storage(&mut self, view: &CommandView<'_>) -> ParseResult {
        let (format, width, height) = (view.arg(1), view.i32_arg(2), view.i32_arg(3));
        let max = self.config.max_renderbuffer_size as i32;
        if width > max || height > max {
            self.set_error(view, gl::INVALID_VALUE, "dimensions out of range");
            return Ok(());
        }
        let renderbuffer = self.state.renderbuffer;
        if renderbuffer == 0 {
            self.set_error(view, gl::INVALID_OPERATION, "no renderbuffer bound");
            return Ok(());
        }
        self.forward(view, &[]);
        self.state.renderbuffers.insert(
            renderbuffer,
            RenderbufferInfo {
                format,
                width,
                height,
            },
        );
        Ok(())
    }

    pub(super) fn framebuffer_renderbuffer(&mut self, view: &CommandView<'_>) -> ParseResult {
        let (target, attachment, renderbuffer) = (view.arg(0), view.arg(1), view.arg(3));
        let framebuffer = self.state.bound_framebuffer(target);
        if framebuffer == 0 {
            self.set_error(view, gl::INVALID_OPERATION, "default framebuffer bound");
            return Ok(());
        }
        if renderbuffer != 0 && !self.resources.contains(IdNamespace::Renderbuffers, renderbuffer) {
            self.set_error(view, gl::INVALID_OPERATION, "unknown renderbuffer");
            return Ok(());
        }
        self.forward(view, &[]);
        let attachments = self.state.framebuffer_attachments.entry(framebuffer).or_default();
        if renderbuffer == 0 {
            attachments.remove(&attachment);
        } else {
            attachments.insert(attachment, Attachment::Renderbuffer { client_id: renderbuffer });
        }
        Ok(())
    }

    pub(super) fn framebuffer_texture_2d(&mut self, view: &CommandView<'_>) -> ParseResult {
        let (target, attachment, textarget) = (view.arg(0), view.arg(1), view.arg(2));
        let (texture, level) = (view.arg(3), view.i32_arg(4));
        let framebuffer = self.state.bound_framebuffer(target);
        if framebuffer == 0 {
            self.set_error(view, gl::INVALID_OPERATION, "default framebuffer bound");
            return Ok(());
        }
        if level != 0 {
            self.set_error(view, gl::INVALID_VALUE, "level must be 0");
            return Ok(());
        }
        if texture != 0 && !self.resources.contains(IdNamespace::Textures, texture) {
            self.set_error(view, gl::INVALID_OPERATION, "unknown texture");
            return Ok(());
        }
        self.forward(view, &[]);
        let attachments = self.state.framebuffer_attachments.entry(framebuffer).or_default();
        if texture == 0 {
            attachments.remove(&attachment);
        } else {
            attachments.insert(
                attachment,
                Attachment::Texture {
                    client_id: texture,
                    target: textarget,
                    level,
                },
            );
        }
        Ok(())
    }

    pub(super) fn check_framebuffer_status(&mut self, view: &CommandView<'_>) -> ParseResult {
        let (target, result) = (view.arg(0), view.shm_arg(1));
        let framebuffer = self.state.bound_framebuffer(target);
        let status = if framebuffer == 0 {
            gl::FRAMEBUFFER_COMPLETE
        } else if self
            .state
            .framebuffer_attachments
            .get(&framebuffer)
            .map_or(true, |attachments| attachments.is_empty())
        {
            gl::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT
        } else {
            self.forward(view, &[])
        };
        self.write_u32_result(result, status)
    }

    pub(super) fn invalidate_framebuffer(
        &mut self,
        view: &CommandView<'_>,
        data: &[u8],
    ) -> ParseResult {
        let framebuffer = self.state.bound_framebuffer(view.arg(0));
        let max_color = gl::COLOR_ATTACHMENT0 + self.config.max_draw_buffers;
        let valid = |attachment: GLenum| {
            if framebuffer == 0 {
                matches!(attachment, gl::COLOR | gl::DEPTH | gl::STENCIL)
            } else {
                (gl::COLOR_ATTACHMENT0..max_color).contains(&attachment)
                    || matches!(
                        attachment,
                        gl::DEPTH_ATTACHMENT | gl::STENCIL_ATTACHMENT | gl::DEPTH_STENCIL_ATTACHMENT
                    )
            }
        };
        if !le_u32s(data).all(valid) {
            self.set_error(view, gl::INVALID_ENUM, "attachment");
            return Ok(());
        }
        self.forward(view, data);
        Ok(())
    }

    pub(super) fn draw_buffers(&mut self, view: &CommandView<'_>, data: &[u8]) -> ParseResult {
        let count = view.arg(0);
        if count > self.config.max_draw_buffers {
            self.set_error(view, gl::INVALID_VALUE, "too many draw buffers");
            return Ok(());
        }
        let buffers: Vec<GLenum> = le_u32s(data).collect();
        let valid = if self.state.draw_framebuffer == 0 {
            matches!(buffers.as_slice(), [gl::BACK] | [gl::NONE])
        } else {
            buffers
                .iter()
                .zip(0u32..)
                .all(|(&buffer, idx)| buffer == gl::NONE || buffer == gl::COLOR_ATTACHMENT0 + idx)
        };
        if !valid {
            self.set_error(view, gl::INVALID_OPERATION, "invalid draw buffer");
            return Ok(());
        }
        for (slot, idx) in self.state.draw_buffers.iter_mut().zip(0usize..) {
            *slot = buffers.get(idx).copied().unwrap_or(gl::NONE);
        }
        self.forward(view, data);
        Ok(())
    }

    pub(super) fn clear_buffer(&mut self, view: &CommandView<'_>) -> ParseResult {
        let (buffer, draw_buffer) = (view.arg(0), view.i32_arg(1));
        let Some(values) = view.effective_data()? else {
            self.set_error(view, gl::INVALID_ENUM, "buffer");
            return Ok(());
        };
        let in_range = match buffer {
            gl::COLOR => (0..self.config.max_draw_buffers as i32).contains(&draw_buffer),
            _ => draw_buffer == 0,
        };
        if !in_range {
            self.set_error(view, gl::INVALID_VALUE, "drawbuffer out of range");
            return Ok(());
        }
        self.forward(view, values);
        Ok(())
    }

    pub(super) fn uniform(&mut self, view: &CommandView<'_>, data: &[u8]) -> ParseResult {
        let location = view.i32_arg(0);
        if self.state.current_program == 0 {
            self.set_error(view, gl::INVALID_OPERATION, "no program in use");
            return Ok(());
        }
        match location {
            -1 => return Ok(()),
            loc if loc < -1 => {
                self.set_error(view, gl::INVALID_OPERATION, "invalid location");
                return Ok(());
            }
            _ => {}
        }
        let source = if view.id() == CommandId::Uniform4fv {
            let len = view.arg(1).checked_mul(16).ok_or(ParseError::OutOfBounds)?;
            DataSource::Shm(view.shm_arg(2).with_len(len))
        } else {
            DataSource::Inline(data)
        };
        self.forward_source(view, source)?;
        Ok(())
    }

    /// `VertexAttrib*`: updates the generic value of an attribute. Missing components default
    /// to `(0, 0, 0, 1)`.
    pub(super) fn vertex_attrib(&mut self, view: &CommandView<'_>, data: &[u8]) -> ParseResult {
        let index = view.arg(0) as usize;
        let Some(attrib) = self.state.vertex_attribs.get_mut(index) else {
            self.set_error(view, gl::INVALID_VALUE, "index out of range");
            return Ok(());
        };
        let components: Vec<u32> = if data.is_empty() {
            view.args()[1..].to_vec()
        } else {
            le_u32s(data).collect()
        };
        let mut value = match view.id() {
            CommandId::VertexAttribI4i
            | CommandId::VertexAttribI4ivImmediate
            | CommandId::VertexAttribI4ui
            | CommandId::VertexAttribI4uivImmediate => [0, 0, 0, 1],
            _ => [0, 0, 0, 1.0f32.to_bits()],
        };
        for (slot, component) in value.iter_mut().zip(components) {
            *slot = component;
        }
        attrib.value = value;
        self.forward(view, data);
        Ok(())
    }

    pub(super) fn enable_attrib_array(&mut self, view: &CommandView<'_>) -> ParseResult {
        let enable = view.id() == CommandId::EnableVertexAttribArray;
        let Some(attrib) = self.state.vertex_attribs.get_mut(view.arg(0) as usize) else {
            self.set_error(view, gl::INVALID_VALUE, "index out of range");
            return Ok(());
        };
        attrib.enabled = enable;
        self.forward(view, &[]);
        Ok(())
    }

    pub(super) fn vertex_attrib_pointer(&mut self, view: &CommandView<'_>) -> ParseResult {
        let index = view.arg(0) as usize;
        let (size, ty, normalized) = (view.i32_arg(1), view.arg(2), view.bool_arg(3));
        let (stride, offset) = (view.i32_arg(4), view.arg(5));

        if index >= self.state.vertex_attribs.len() {
            self.set_error(view, gl::INVALID_VALUE, "index out of range");
            return Ok(());
        }
        if !(1..=4).contains(&size) {
            self.set_error(view, gl::INVALID_VALUE, "size must be 1 to 4");
            return Ok(());
        }
        if stride > MAX_VERTEX_ATTRIB_STRIDE {
            self.set_error(view, gl::INVALID_VALUE, "stride too large");
            return Ok(());
        }
        let buffer = self.state.bound_buffer(gl::ARRAY_BUFFER);
        if buffer == 0 && offset != 0 {
            self.set_error(view, gl::INVALID_OPERATION, "offset without array buffer");
            return Ok(());
        }
        let Some(type_size) = gl::attrib_type_size(ty) else {
            self.set_error(view, gl::INVALID_ENUM, "type");
            return Ok(());
        };
        if offset % type_size != 0 || stride as u32 % type_size != 0 {
            self.set_error(view, gl::INVALID_OPERATION, "offset or stride not aligned to type");
            return Ok(());
        }

        self.forward(view, &[]);
        let attrib = &mut self.state.vertex_attribs[index];
        attrib.buffer = buffer;
        attrib.size = size;
        attrib.ty = ty;
        attrib.normalized = normalized;
        attrib.stride = stride;
        attrib.offset = offset;
        Ok(())
    }

    pub(super) fn draw_arrays(&mut self, view: &CommandView<'_>) -> ParseResult {
        let (mode, first, count) = (view.arg(0), view.i32_arg(1), view.i32_arg(2));
        if first < 0 {
            self.set_error(view, gl::INVALID_VALUE, "first must be non-negative");
            return Ok(());
        }
        if self.state.transform_feedback_active.is_some_and(|tf_mode| tf_mode != mode) {
            self.set_error(view, gl::INVALID_OPERATION, "mode differs from transform feedback");
            return Ok(());
        }
        if count > 0 {
            self.forward(view, &[]);
        }
        Ok(())
    }

    pub(super) fn draw_elements(&mut self, view: &CommandView<'_>) -> ParseResult {
        let (count, ty, offset) = (view.i32_arg(1), view.arg(2), view.arg(3));
        if self.state.transform_feedback_active.is_some() {
            self.set_error(view, gl::INVALID_OPERATION, "transform feedback active");
            return Ok(());
        }
        let Some(buffer) = self.bound_buffer_info(gl::ELEMENT_ARRAY_BUFFER) else {
            self.set_error(view, gl::INVALID_OPERATION, "no element array buffer bound");
            return Ok(());
        };
        let Some(index_size) = gl::index_type_size(ty) else {
            self.set_error(view, gl::INVALID_ENUM, "type");
            return Ok(());
        };
        if offset % index_size != 0 {
            self.set_error(view, gl::INVALID_OPERATION, "offset not aligned to type");
            return Ok(());
        }
        let end = (count as u64) * u64::from(index_size) + u64::from(offset);
        if end > buffer.size.max(0) as u64 {
            self.set_error(view, gl::INVALID_OPERATION, "indices out of range");
            return Ok(());
        }
        if count > 0 {
            self.forward(view, &[]);
        }
        Ok(())
    }
}

/// `offset..offset + len` lies within `0..limit`. Arguments are non-negative after field
/// validation.
fn range_fits(offset: i32, len: i32, limit: i32) -> bool {
    offset >= 0 && len >= 0 && i64::from(offset) + i64::from(len) <= i64::from(limit)
}

#[cfg(test)]
mod tests {
    use cmdbuf_protocol::gl;
    use cmdbuf_protocol::{
        Command, CommandId, CommandWriter, ParseError, ParseResult, ReadPixelsResult, ShmRef,
    };

    use crate::backend::RecordingBackend;
    use crate::config::DecoderConfig;
    use crate::decoder::Decoder;
    use crate::shared_memory::{CommandBufferEngine, TransferBufferManager};

    type TestDecoder = Decoder<TransferBufferManager, RecordingBackend>;

    fn decoder() -> TestDecoder {
        let mut engine = TransferBufferManager::new();
        engine.register(1, 256).unwrap();
        Decoder::new(engine, RecordingBackend::new(), DecoderConfig::default())
    }

    fn run(d: &mut TestDecoder, cmd: Command) -> ParseResult {
        d.execute(&cmd.encode().unwrap()).1
    }

    fn run_writer(d: &mut TestDecoder, w: &CommandWriter) {
        let bytes = w.as_bytes();
        let mut offset = 0;
        while offset < bytes.len() {
            let (entries, result) = d.execute(&bytes[offset..]);
            result.unwrap();
            offset += entries * 4;
        }
    }

    fn with_buffer(d: &mut TestDecoder, target: u32, size: i32) {
        let mut w = CommandWriter::new();
        w.gen_or_delete(CommandId::GenBuffersImmediate, &[1]).unwrap();
        w.bind_buffer(target, 1);
        w.buffer_data(target, size, ShmRef::NULL, gl::STATIC_DRAW);
        run_writer(d, &w);
    }

    fn with_texture(d: &mut TestDecoder) {
        let mut w = CommandWriter::new();
        w.gen_or_delete(CommandId::GenTexturesImmediate, &[4]).unwrap();
        w.bind_texture(gl::TEXTURE_2D, 4);
        run_writer(d, &w);
    }

    fn tex_image(width: i32, height: i32, pixels: ShmRef) -> Command {
        Command::new(CommandId::TexImage2D)
            .arg(gl::TEXTURE_2D)
            .arg(0i32)
            .arg(gl::RGBA)
            .arg(width)
            .arg(height)
            .arg(gl::RGBA)
            .arg(gl::UNSIGNED_BYTE)
            .arg(pixels.id)
            .arg(pixels.offset)
    }

    #[test]
    fn buffer_data_needs_a_bound_buffer() {
        let mut d = decoder();
        let mut w = CommandWriter::new();
        w.buffer_data(gl::ARRAY_BUFFER, 4, ShmRef::NULL, gl::STATIC_DRAW);
        run_writer(&mut d, &w);
        assert!(d.backend().calls().is_empty());
        assert_eq!(d.take_error(), gl::INVALID_OPERATION);
    }

    #[test]
    fn buffer_data_uploads_shared_memory_and_records_size() {
        let mut d = decoder();
        d.engine_mut().write(ShmRef::new(1, 16), &[1, 2, 3, 4]).unwrap();
        let mut w = CommandWriter::new();
        w.gen_or_delete(CommandId::GenBuffersImmediate, &[1]).unwrap();
        w.bind_buffer(gl::ARRAY_BUFFER, 1);
        w.buffer_data(gl::ARRAY_BUFFER, 4, ShmRef::new(1, 16), gl::DYNAMIC_DRAW);
        run_writer(&mut d, &w);

        assert_eq!(d.backend().last_call().unwrap().data, vec![1, 2, 3, 4]);
        assert_eq!(d.state().buffers[&1].size, 4);

        let sub = Command::new(CommandId::BufferSubData)
            .arg(gl::ARRAY_BUFFER)
            .arg(2i32)
            .arg(4i32)
            .arg(1i32)
            .arg(16u32);
        assert_eq!(run(&mut d, sub), Ok(()));
        assert_eq!(d.take_error(), gl::INVALID_VALUE);
    }

    #[test]
    fn sub_image_must_fit_the_defined_level() {
        let mut d = decoder();
        with_texture(&mut d);
        assert_eq!(run(&mut d, tex_image(4, 4, ShmRef::NULL)), Ok(()));
        assert_eq!(d.take_error(), gl::NO_ERROR);

        let sub = |x: i32| {
            Command::new(CommandId::TexSubImage2D)
                .arg(gl::TEXTURE_2D)
                .arg(0i32)
                .arg(x)
                .arg(0i32)
                .arg(2i32)
                .arg(2i32)
                .arg(gl::RGBA)
                .arg(gl::UNSIGNED_BYTE)
                .arg(1i32)
                .arg(0u32)
                .arg(0u32)
        };
        assert_eq!(run(&mut d, sub(2)), Ok(()));
        assert_eq!(d.take_error(), gl::NO_ERROR);
        assert_eq!(run(&mut d, sub(3)), Ok(()));
        assert_eq!(d.take_error(), gl::INVALID_VALUE);
    }

    #[test]
    fn tex_image_requires_matching_formats() {
        let mut d = decoder();
        with_texture(&mut d);
        let cmd = Command::new(CommandId::TexImage2D)
            .arg(gl::TEXTURE_2D)
            .arg(0i32)
            .arg(gl::RGB)
            .arg(1i32)
            .arg(1i32)
            .arg(gl::RGBA)
            .arg(gl::UNSIGNED_BYTE)
            .arg(0u32)
            .arg(0u32);
        assert_eq!(run(&mut d, cmd), Ok(()));
        assert_eq!(d.take_error(), gl::INVALID_OPERATION);
        assert!(d.state().textures.get(&4).map_or(true, |t| t.levels.is_empty()));
    }

    #[test]
    fn read_pixels_reports_dimensions() {
        let mut d = decoder();
        let read = Command::new(CommandId::ReadPixels)
            .arg(0i32)
            .arg(0i32)
            .arg(2i32)
            .arg(3i32)
            .arg(gl::RGBA)
            .arg(gl::UNSIGNED_BYTE)
            .arg(1i32)
            .arg(0u32)
            .arg(1i32)
            .arg(128u32);
        assert_eq!(run(&mut d, read.clone()), Ok(()));
        let bytes = d.engine().resolve(ShmRef::new(1, 128), 12).unwrap();
        assert_eq!(
            ReadPixelsResult::read_from(bytes),
            Some(ReadPixelsResult {
                success: 1,
                row_length: 2,
                num_rows: 3
            })
        );
        assert_eq!(run(&mut d, read), Err(ParseError::InvalidArguments));
    }

    #[test]
    fn default_framebuffer_takes_a_single_back_buffer() {
        let mut d = decoder();
        let draw = |buffers: &[u32]| {
            Command::new(CommandId::DrawBuffersEXTImmediate)
                .arg(buffers.len() as u32)
                .with_u32_data(buffers)
        };
        assert_eq!(run(&mut d, draw(&[gl::NONE])), Ok(()));
        assert_eq!(d.state().draw_buffers[0], gl::NONE);
        assert_eq!(run(&mut d, draw(&[gl::COLOR_ATTACHMENT0])), Ok(()));
        assert_eq!(d.take_error(), gl::INVALID_OPERATION);
        assert_eq!(run(&mut d, draw(&[gl::BACK])), Ok(()));
        assert_eq!(d.state().draw_buffers[0], gl::BACK);
    }

    #[test]
    fn attrib_pointer_offset_needs_an_array_buffer() {
        let mut d = decoder();
        let pointer = |offset: u32| {
            Command::new(CommandId::VertexAttribPointer)
                .arg(0u32)
                .arg(3i32)
                .arg(gl::FLOAT)
                .arg(0u32)
                .arg(12i32)
                .arg(offset)
        };
        assert_eq!(run(&mut d, pointer(4)), Ok(()));
        assert_eq!(d.take_error(), gl::INVALID_OPERATION);

        with_buffer(&mut d, gl::ARRAY_BUFFER, 64);
        assert_eq!(run(&mut d, pointer(2)), Ok(()));
        assert_eq!(d.take_error(), gl::INVALID_OPERATION);
        assert_eq!(run(&mut d, pointer(4)), Ok(()));
        assert_eq!(d.state().vertex_attribs[0].buffer, 1);
        assert_eq!(d.state().vertex_attribs[0].offset, 4);
    }

    #[test]
    fn uniform_location_minus_one_is_ignored() {
        let mut d = decoder();
        let uniform = |location: i32| Command::new(CommandId::Uniform1f).arg(location).arg(1.0f32);
        assert_eq!(run(&mut d, uniform(0)), Ok(()));
        assert_eq!(d.take_error(), gl::INVALID_OPERATION);

        d.state.current_program = 1;
        let calls = d.backend().calls().len();
        assert_eq!(run(&mut d, uniform(-1)), Ok(()));
        assert_eq!(d.backend().calls().len(), calls);
        assert_eq!(d.take_error(), gl::NO_ERROR);
        assert_eq!(run(&mut d, uniform(-2)), Ok(()));
        assert_eq!(d.take_error(), gl::INVALID_OPERATION);
    }

    #[test]
    fn draw_elements_checks_the_index_range() {
        let mut d = decoder();
        with_buffer(&mut d, gl::ELEMENT_ARRAY_BUFFER, 12);
        let draw = |count: i32, offset: u32| {
            Command::new(CommandId::DrawElements)
                .arg(gl::TRIANGLES)
                .arg(count)
                .arg(gl::UNSIGNED_SHORT)
                .arg(offset)
        };
        assert_eq!(run(&mut d, draw(6, 0)), Ok(()));
        assert_eq!(d.backend().last_call().unwrap().command, CommandId::DrawElements);
        assert_eq!(d.take_error(), gl::NO_ERROR);
        assert_eq!(run(&mut d, draw(6, 2)), Ok(()));
        assert_eq!(d.take_error(), gl::INVALID_OPERATION);
        assert_eq!(run(&mut d, draw(1, 1)), Ok(()));
        assert_eq!(d.take_error(), gl::INVALID_OPERATION);
    }

    #[test]
    fn framebuffer_without_attachments_is_incomplete() {
        let mut d = decoder();
        let status = Command::new(CommandId::CheckFramebufferStatus)
            .arg(gl::FRAMEBUFFER)
            .arg(1i32)
            .arg(0u32);
        assert_eq!(run(&mut d, status.clone()), Ok(()));
        assert_eq!(d.engine().read_u32(ShmRef::new(1, 0)), Ok(gl::FRAMEBUFFER_COMPLETE));

        let mut w = CommandWriter::new();
        w.gen_or_delete(CommandId::GenFramebuffersImmediate, &[2]).unwrap();
        run_writer(&mut d, &w);
        let bind = Command::new(CommandId::BindFramebuffer).arg(gl::FRAMEBUFFER).arg(2u32);
        assert_eq!(run(&mut d, bind), Ok(()));
        assert_eq!(run(&mut d, status), Ok(()));
        assert_eq!(
            d.engine().read_u32(ShmRef::new(1, 0)),
            Ok(gl::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT)
        );
    }
}
