//! Service-side command decoder.
//!
//! [`Decoder::execute`] runs one command through a fixed sequence of checks:
//!
//! 1. framing and table lookup (unknown ids, argument counts),
//! 2. capability gating of ES3-only commands,
//! 3. containment of the immediate payload,
//! 4. resolution of every shared-memory reference,
//! 5. per-field validation (enum sets, negative sizes, bitfield masks),
//! 6. the command handler, which checks cross-command state and calls the backend.
//!
//! Steps 1-4 fail with a [`ParseError`] and never touch any state. Step 5 and the semantic checks
//! of step 6 queue a GL error and still return `Ok`.

mod common;
mod context;
mod data;
mod memory;
mod objects;
mod sync;

use cmdbuf_protocol::gl::{self, GLenum};
use cmdbuf_protocol::{
    decode_command, decode_header, CommandId, CommandView, DataSource, FieldKind, ParseError,
    ParseResult, ShmRef,
};
use tracing::{trace, warn};

use crate::backend::{GlBackend, NativeCall};
use crate::buckets::BucketMap;
use crate::config::DecoderConfig;
use crate::error_state::ErrorState;
use crate::resources::ResourceTables;
use crate::shared_memory::CommandBufferEngine;
use crate::state::ContextState;

use self::memory::ShmNeed;

pub struct Decoder<E, B> {
    engine: E,
    backend: B,
    config: DecoderConfig,
    state: ContextState,
    resources: ResourceTables,
    buckets: BucketMap,
    errors: ErrorState,
}

impl<E: CommandBufferEngine, B: GlBackend> Decoder<E, B> {
    pub fn new(engine: E, backend: B, config: DecoderConfig) -> Self {
        let state = ContextState::new(&config);
        Self {
            engine,
            backend,
            config,
            state,
            resources: ResourceTables::new(),
            buckets: BucketMap::default(),
            errors: ErrorState::default(),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn state(&self) -> &ContextState {
        &self.state
    }

    pub fn resources(&self) -> &ResourceTables {
        &self.resources
    }

    pub fn buckets(&self) -> &BucketMap {
        &self.buckets
    }

    pub fn errors(&self) -> &ErrorState {
        &self.errors
    }

    /// Drains one queued GL error the same way the `GetError` command does.
    pub fn take_error(&mut self) -> GLenum {
        self.errors.merge_native(self.backend.get_error());
        self.errors.take()
    }

    pub fn into_parts(self) -> (E, B) {
        (self.engine, self.backend)
    }

    /// Executes the command at the front of `buf`.
    ///
    /// Returns the number of entries the command occupies together with its result. A command
    /// whose header cannot be framed reports `0` entries; every other command reports its
    /// header size so the caller can skip it even when it was rejected.
    pub fn execute(&mut self, buf: &[u8]) -> (usize, ParseResult) {
        let header = match decode_header(buf) {
            Ok(header) => header,
            Err(err) => {
                warn!(%err, available = buf.len(), "malformed command header");
                return (0, Err(err));
            }
        };

        let result = decode_command(buf).and_then(|view| self.dispatch(&view));
        if let Err(err) = result {
            warn!(command = header.command, size = header.size, %err, "command rejected");
        }
        (header.size as usize, result)
    }

    fn dispatch(&mut self, view: &CommandView<'_>) -> ParseResult {
        let info = view.info();
        trace!(command = info.name, size = view.size_bytes(), "execute");

        if info.es3 && !self.config.unsafe_es3_apis_enabled {
            return Err(ParseError::UnknownCommand);
        }
        let data = view.immediate()?;
        self.check_shm_args(view)?;
        if !self.validate_fields(view) {
            return Ok(());
        }
        self.handle(view, data)
    }

    /// Resolves every shared-memory pair the command will touch, before anything is mutated.
    fn check_shm_args(&self, view: &CommandView<'_>) -> ParseResult {
        for idx in view.info().shm_fields() {
            let shm = view.shm_arg(idx);
            match memory::shm_need(view, idx, &self.state)? {
                ShmNeed::Unused => {}
                ShmNeed::Optional(_) if shm.is_null() => {}
                ShmNeed::Required(len) | ShmNeed::Optional(len) => self.engine.check(shm, len)?,
            }
        }
        Ok(())
    }

    /// Table-driven argument validation. Returns `false` after queuing a GL error.
    fn validate_fields(&mut self, view: &CommandView<'_>) -> bool {
        let info = view.info();
        for (idx, field) in info.fields.iter().enumerate() {
            let value = view.arg(idx);
            let error = match field.kind {
                FieldKind::Enum(validator)
                    if !validator.is_valid(value, self.config.unsafe_es3_apis_enabled) =>
                {
                    gl::INVALID_ENUM
                }
                FieldKind::Size | FieldKind::Offset if (value as i32) < 0 => gl::INVALID_VALUE,
                FieldKind::Bitfield(mask) if value & !mask != 0 => gl::INVALID_VALUE,
                _ => continue,
            };
            self.errors.set(error, info.name, field.name);
            return false;
        }
        true
    }

    fn handle(&mut self, view: &CommandView<'_>, data: &[u8]) -> ParseResult {
        use CommandId::*;

        match view.id() {
            Noop => Ok(()),
            SetToken => {
                self.engine.set_token(view.i32_arg(0));
                Ok(())
            }
            SetBucketSize => self.set_bucket_size(view),
            SetBucketData => self.set_bucket_data(view),
            SetBucketDataImmediate => self.set_bucket_data_immediate(view, data),
            GetBucketStart => self.get_bucket_start(view),
            GetBucketData => self.get_bucket_data(view),

            GenBuffersImmediate
            | GenFramebuffersImmediate
            | GenRenderbuffersImmediate
            | GenSamplersImmediate
            | GenTexturesImmediate
            | GenTransformFeedbacksImmediate
            | GenQueriesEXTImmediate
            | GenVertexArraysOESImmediate
            | GenValuebuffersCHROMIUMImmediate => self.gen_objects(view, data),
            DeleteBuffersImmediate
            | DeleteFramebuffersImmediate
            | DeleteRenderbuffersImmediate
            | DeleteSamplersImmediate
            | DeleteTexturesImmediate
            | DeleteTransformFeedbacksImmediate
            | DeleteQueriesEXTImmediate
            | DeleteVertexArraysOESImmediate
            | DeleteValuebuffersCHROMIUMImmediate => self.delete_objects(view, data),
            BindBuffer
            | BindFramebuffer
            | BindRenderbuffer
            | BindSampler
            | BindTexture
            | BindTransformFeedback
            | BindVertexArrayOES
            | BindValuebufferCHROMIUM => self.bind_object(view),
            IsBuffer | IsFramebuffer | IsProgram | IsRenderbuffer | IsShader | IsSync
            | IsTexture | IsVertexArrayOES | IsValuebufferCHROMIUM => self.is_object(view),
            CreateProgram | CreateShader => self.create_program_or_shader(view),
            DeleteProgram | DeleteShader => self.delete_program_or_shader(view),
            AttachShader => self.attach_shader(view),
            BindAttribLocationBucket => self.bind_attrib_location(view),
            ShaderSourceBucket => self.shader_source(view),
            CompileShader => self.compile_shader(view),
            LinkProgram => self.link_program(view),
            UseProgram => self.use_program(view),
            GetProgramiv => self.get_programiv(view),
            GetShaderiv => self.get_shaderiv(view),
            GetAttribLocation | GetUniformLocation => self.get_location(view),
            GetActiveAttrib | GetActiveUniform => self.get_active(view),

            ActiveTexture => self.active_texture(view),
            BlendColor | BlendEquation | BlendFunc | ClearColor | ClearDepthf | ClearStencil
            | ColorMask | CullFace | DepthFunc | DepthMask | FrontFace | Hint | LineWidth
            | StencilFunc | StencilMask | StencilOp | Scissor | Viewport => self.set_state(view),
            Enable | Disable => self.enable_cap(view),
            IsEnabled => self.is_enabled(view),
            PixelStorei => self.pixel_store(view),
            GetBooleanv | GetFloatv | GetIntegerv => self.get_state(view),
            GetString => self.get_string(view),
            GetError => self.get_error(view),
            Finish | Flush | ShallowFlushCHROMIUM | Clear => {
                self.forward(view, data);
                Ok(())
            }

            BufferData => self.buffer_data(view),
            BufferSubData => self.buffer_sub_data(view),
            CopyBufferSubData => self.copy_buffer_sub_data(view),
            GetBufferParameteriv => self.get_buffer_parameteriv(view),
            TexImage2D => self.tex_image_2d(view),
            TexSubImage2D => self.tex_sub_image_2d(view),
            TexParameterf | TexParameteri | TexParameterfvImmediate | TexParameterivImmediate
            | GenerateMipmap => self.tex_parameter(view, data),
            ReadPixels => self.read_pixels(view),
            RenderbufferStorage => self.renderbuffer_storage(view),
            FramebufferRenderbuffer => self.framebuffer_renderbuffer(view),
            FramebufferTexture2D => self.framebuffer_texture_2d(view),
            CheckFramebufferStatus => self.check_framebuffer_status(view),
            InvalidateFramebufferImmediate => self.invalidate_framebuffer(view, data),
            DrawBuffersEXTImmediate => self.draw_buffers(view, data),
            ClearBufferfvImmediate | ClearBufferivImmediate | ClearBufferuivImmediate => {
                self.clear_buffer(view)
            }
            Uniform1f | Uniform1fvImmediate | Uniform1i | Uniform1ivImmediate | Uniform2f
            | Uniform2fvImmediate | Uniform3f | Uniform3fvImmediate | Uniform4f
            | Uniform4fvImmediate | Uniform4i | Uniform4ivImmediate
            | UniformMatrix2fvImmediate | UniformMatrix3fvImmediate
            | UniformMatrix4fvImmediate | Uniform4fv => self.uniform(view, data),
            VertexAttrib1f | VertexAttrib1fvImmediate | VertexAttrib2f
            | VertexAttrib2fvImmediate | VertexAttrib3f | VertexAttrib3fvImmediate
            | VertexAttrib4f | VertexAttrib4fvImmediate | VertexAttribI4i
            | VertexAttribI4ivImmediate | VertexAttribI4ui | VertexAttribI4uivImmediate => {
                self.vertex_attrib(view, data)
            }
            EnableVertexAttribArray | DisableVertexAttribArray => self.enable_attrib_array(view),
            VertexAttribPointer => self.vertex_attrib_pointer(view),
            DrawArrays => self.draw_arrays(view),
            DrawElements => self.draw_elements(view),

            BeginQueryEXT => self.begin_query(view),
            EndQueryEXT => self.end_query(view),
            FenceSync => self.fence_sync(view),
            DeleteSync => self.delete_sync(view),
            ClientWaitSync => self.client_wait_sync(view),
            WaitSync => self.wait_sync(view),
            BeginTransformFeedback => self.begin_transform_feedback(view),
            EndTransformFeedback => self.end_transform_feedback(view),
            TraceBeginCHROMIUM => self.trace_begin(view),
            TraceEndCHROMIUM => self.trace_end(view),
            InsertEventMarkerEXT | PushGroupMarkerEXT => self.marker(view),
            PopGroupMarkerEXT => {
                self.state.group_markers.pop();
                Ok(())
            }
            ProduceTextureCHROMIUMImmediate => self.produce_texture(view, data),
            ConsumeTextureCHROMIUMImmediate => self.consume_texture(view, data),
        }
    }

    fn set_error(&mut self, view: &CommandView<'_>, error: GLenum, msg: &str) {
        self.errors.set(error, view.info().name, msg);
    }

    /// Calls the backend with the command's translated arguments and `data` as input.
    fn forward(&mut self, view: &CommandView<'_>, data: &[u8]) -> u32 {
        let args = native_args(view, &self.resources);
        self.backend.call(
            &NativeCall {
                command: view.id(),
                args: &args,
                data,
            },
            &mut [],
        )
    }

    /// Like [`forward`](Self::forward) but with the input bytes taken from shared memory.
    fn forward_shm(&mut self, view: &CommandView<'_>, shm: ShmRef, len: u32) -> ParseResult<u32> {
        self.forward_source(view, DataSource::Shm(shm.with_len(len)))
    }

    /// Forwards with input from either source. A null shared-memory reference is empty input.
    fn forward_source(
        &mut self,
        view: &CommandView<'_>,
        source: DataSource<'_>,
    ) -> ParseResult<u32> {
        let args = native_args(view, &self.resources);
        let data = match source {
            DataSource::Inline(bytes) => bytes,
            DataSource::Shm(range) if range.shm.is_null() => &[][..],
            DataSource::Shm(range) => self.engine.resolve(range.shm, range.len)?,
        };
        Ok(self.backend.call(
            &NativeCall {
                command: view.id(),
                args: &args,
                data,
            },
            &mut [],
        ))
    }
}

/// Scalar arguments with client ids mapped to service ids; shared-memory and bucket slots are
/// dropped.
fn native_args(view: &CommandView<'_>, resources: &ResourceTables) -> Vec<u32> {
    view.info()
        .fields
        .iter()
        .enumerate()
        .filter_map(|(idx, field)| {
            let value = view.arg(idx);
            match field.kind {
                FieldKind::ShmId | FieldKind::ShmOffset | FieldKind::Bucket => None,
                FieldKind::Id(ns) | FieldKind::BindId(ns) | FieldKind::NewId(ns) => {
                    Some(resources.service_id(ns, value).unwrap_or(0))
                }
                _ => Some(value),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RecordingBackend;
    use crate::shared_memory::TransferBufferManager;
    use cmdbuf_protocol::{Command, IdNamespace};

    fn decoder() -> Decoder<TransferBufferManager, RecordingBackend> {
        Decoder::new(
            TransferBufferManager::new(),
            RecordingBackend::new(),
            DecoderConfig::default(),
        )
    }

    fn run(
        decoder: &mut Decoder<TransferBufferManager, RecordingBackend>,
        cmd: Command,
    ) -> ParseResult {
        let bytes = cmd.encode().unwrap();
        let (entries, result) = decoder.execute(&bytes);
        assert_eq!(entries * 4, bytes.len());
        result
    }

    #[test]
    fn native_args_translate_ids_and_drop_shm_slots() {
        let mut d = decoder();
        let gen = Command::new(CommandId::GenBuffersImmediate)
            .arg(1u32)
            .with_u32_data(&[5]);
        run(&mut d, gen).unwrap();
        run(&mut d, Command::new(CommandId::BindBuffer).arg(gl::ARRAY_BUFFER).arg(5u32)).unwrap();
        let service = d.resources().service_id(IdNamespace::Buffers, 5).unwrap();
        let call = d.backend().last_call().unwrap();
        assert_eq!(call.command, CommandId::BindBuffer);
        assert_eq!(call.args, vec![gl::ARRAY_BUFFER, service]);
    }

    #[test]
    fn invalid_enum_is_a_gl_error_not_a_parse_error() {
        let mut d = decoder();
        run(&mut d, Command::new(CommandId::Enable).arg(0x1234u32)).unwrap();
        assert!(d.backend().calls().is_empty());
        assert_eq!(d.take_error(), gl::INVALID_ENUM);
        assert_eq!(d.take_error(), gl::NO_ERROR);
    }

    #[test]
    fn negative_size_is_invalid_value() {
        let mut d = decoder();
        let viewport = Command::new(CommandId::Viewport)
            .arg(0i32)
            .arg(0i32)
            .arg(-1i32)
            .arg(4i32);
        run(&mut d, viewport).unwrap();
        assert_eq!(d.take_error(), gl::INVALID_VALUE);
        assert_eq!(d.state().viewport, [0; 4]);
    }

    #[test]
    fn es3_enums_require_es3() {
        let mut d = decoder();
        run(&mut d, Command::new(CommandId::BindBuffer).arg(gl::UNIFORM_BUFFER).arg(0u32)).unwrap();
        assert_eq!(d.take_error(), gl::INVALID_ENUM);
    }

    #[test]
    fn truncated_header_reports_zero_entries() {
        let mut d = decoder();
        assert_eq!(d.execute(&[1, 2]), (0, Err(ParseError::OutOfBounds)));
    }
}
