//! Static command descriptor table.
//!
//! Every command is one [`CommandInfo`] row: its id, its argument slots in wire order, and how
//! the size of its immediate payload (if any) follows from those arguments. The encoder, the
//! decoder and the service-side validation all work from these rows.

use crate::gl;
use crate::header::{CommandHeader, ENTRY_SIZE};
use crate::ids::IdNamespace::{self, *};
use crate::validators::{self as v, Validator};

use self::FieldKind::*;

/// Whether a command's size is fully determined by its layout or depends on a runtime count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgFlags {
    Fixed,
    AtLeastN,
}

/// How a 4-byte argument slot is interpreted and validated.
#[derive(Clone, Copy, Debug)]
pub enum FieldKind {
    U32,
    I32,
    F32,
    /// Any non-zero value is `true`.
    Bool,
    /// Bits outside the mask are `GL_INVALID_VALUE`.
    Bitfield(u32),
    /// Values outside the validator set are `GL_INVALID_ENUM`.
    Enum(&'static Validator),
    /// `GLsizei`; negative values are `GL_INVALID_VALUE`.
    Size,
    /// `GLintptr`; negative values are `GL_INVALID_VALUE`.
    Offset,
    /// Uniform location; `-1` is a silently ignored location.
    Location,
    /// Client id of an existing object.
    Id(IdNamespace),
    /// Client id passed to a bind call; `0` unbinds.
    BindId(IdNamespace),
    /// Client id the command creates.
    NewId(IdNamespace),
    Bucket,
    /// Shared memory id; always immediately followed by its [`FieldKind::ShmOffset`].
    ShmId,
    ShmOffset,
}

#[derive(Clone, Copy, Debug)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
}

/// Size rule of the payload that trails the argument slots.
#[derive(Clone, Copy, Debug)]
pub enum Immediate {
    None,
    /// `args[count_field] * arity * element_size` bytes.
    Counted {
        count_field: usize,
        arity: u32,
        element_size: u32,
    },
    /// A fixed number of bytes.
    Fixed { bytes: u32 },
    /// The wire always carries `max_elements`; only the prefix selected by the enum in
    /// `args[field]` is meaningful, the rest is zero padding.
    Selected {
        field: usize,
        element_size: u32,
        max_elements: u32,
        elements: fn(u32) -> Option<u32>,
    },
    /// Any trailing entries are skipped unread.
    Skip,
}

#[derive(Debug)]
pub struct CommandInfo {
    pub id: CommandId,
    pub name: &'static str,
    pub arg_flags: ArgFlags,
    /// Instrumentation priority; has no effect on decoding.
    pub trace_level: u8,
    /// Only accepted when the decoder runs with ES3 APIs enabled.
    pub es3: bool,
    pub fields: &'static [Field],
    pub immediate: Immediate,
}

impl CommandInfo {
    /// Size of the header plus all argument slots.
    pub fn fixed_size(&self) -> usize {
        CommandHeader::SIZE_BYTES + self.fields.len() * ENTRY_SIZE
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Byte offset of the named field from the start of the command.
    pub fn field_offset(&self, name: &str) -> Option<usize> {
        self.field_index(name)
            .map(|idx| CommandHeader::SIZE_BYTES + idx * ENTRY_SIZE)
    }

    pub fn has_immediate(&self) -> bool {
        !matches!(self.immediate, Immediate::None)
    }

    /// Number of immediate payload bytes the wire carries for `args`.
    ///
    /// Returns `None` on overflow or when `args` is missing the count slot.
    pub fn compute_data_size(&self, args: &[u32]) -> Option<usize> {
        let bytes = match self.immediate {
            Immediate::None | Immediate::Skip => 0,
            Immediate::Counted {
                count_field,
                arity,
                element_size,
            } => args
                .get(count_field)?
                .checked_mul(arity)?
                .checked_mul(element_size)?,
            Immediate::Fixed { bytes } => bytes,
            Immediate::Selected {
                element_size,
                max_elements,
                ..
            } => element_size.checked_mul(max_elements)?,
        };
        usize::try_from(bytes).ok()
    }

    /// Number of payload bytes that carry meaning for `args`.
    ///
    /// Equal to [`compute_data_size`](Self::compute_data_size) except for
    /// [`Immediate::Selected`] payloads, where it is `None` if the selector is not a valid enum.
    pub fn effective_data_size(&self, args: &[u32]) -> Option<usize> {
        match self.immediate {
            Immediate::Selected {
                field,
                element_size,
                elements,
                ..
            } => {
                let count = elements(*args.get(field)?)?;
                usize::try_from(count.checked_mul(element_size)?).ok()
            }
            _ => self.compute_data_size(args),
        }
    }

    /// Total wire size of the command (header, arguments and padded payload).
    pub fn compute_size(&self, args: &[u32]) -> Option<usize> {
        let total = self.fixed_size().checked_add(self.compute_data_size(args)?)?;
        Some(total.checked_add(ENTRY_SIZE - 1)? / ENTRY_SIZE * ENTRY_SIZE)
    }

    /// Indices of every `ShmId` slot; the matching offset is the next slot.
    pub fn shm_fields(&self) -> impl Iterator<Item = usize> + '_ {
        self.fields
            .iter()
            .enumerate()
            .filter(|(_, f)| matches!(f.kind, ShmId))
            .map(|(idx, _)| idx)
    }
}

/// Number of common (API-independent) commands; they occupy ids `0..COMMON_COMMAND_COUNT`.
pub const COMMON_COMMAND_COUNT: u16 = 7;

/// First id of the GLES2 command range.
pub const COMMAND_START_POINT: u16 = 256;

const NO_DATA: Immediate = Immediate::None;
const SKIP: Immediate = Immediate::Skip;
const ES2: bool = false;
const ES3: bool = true;
const PS: IdNamespace = ProgramsAndShaders;

const fn counted(count_field: usize, arity: u32, element_size: u32) -> Immediate {
    Immediate::Counted {
        count_field,
        arity,
        element_size,
    }
}

const fn fixed(bytes: u32) -> Immediate {
    Immediate::Fixed { bytes }
}

const fn selected(elements: fn(u32) -> Option<u32>) -> Immediate {
    Immediate::Selected {
        field: 0,
        element_size: 4,
        max_elements: 4,
        elements,
    }
}

fn clear_bufferfv_elements(buffer: u32) -> Option<u32> {
    match buffer {
        gl::COLOR => Some(4),
        gl::DEPTH => Some(1),
        _ => None,
    }
}

fn clear_bufferiv_elements(buffer: u32) -> Option<u32> {
    match buffer {
        gl::COLOR => Some(4),
        gl::STENCIL => Some(1),
        _ => None,
    }
}

fn clear_bufferuiv_elements(buffer: u32) -> Option<u32> {
    match buffer {
        gl::COLOR => Some(4),
        _ => None,
    }
}

const CLEAR_MASK: u32 = gl::COLOR_BUFFER_BIT | gl::DEPTH_BUFFER_BIT | gl::STENCIL_BUFFER_BIT;

const MAILBOX_BYTES: u32 = 64;

macro_rules! command_table {
    (
        $(
            $name:ident $(= $value:literal)? : $flags:ident, $level:literal, $gate:expr,
                [ $( $field:literal : $kind:expr ),* $(,)? ] => $imm:expr;
        )*
    ) => {
        #[repr(u16)]
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum CommandId {
            $( $name $(= $value)?, )*
        }

        static COMMANDS: &[CommandInfo] = &[
            $(
                CommandInfo {
                    id: CommandId::$name,
                    name: stringify!($name),
                    arg_flags: ArgFlags::$flags,
                    trace_level: $level,
                    es3: $gate,
                    fields: &[ $( Field { name: $field, kind: $kind } ),* ],
                    immediate: $imm,
                },
            )*
        ];
    };
}

command_table! {
    // Common commands.
    Noop = 0: AtLeastN, 0, ES2, [] => SKIP;
    SetToken: Fixed, 0, ES2, ["token": I32] => NO_DATA;
    SetBucketSize: Fixed, 3, ES2, ["bucket_id": Bucket, "size": U32] => NO_DATA;
    SetBucketData: Fixed, 3, ES2, [
        "bucket_id": Bucket, "offset": U32, "size": U32,
        "shared_memory_id": ShmId, "shared_memory_offset": ShmOffset,
    ] => NO_DATA;
    SetBucketDataImmediate: AtLeastN, 3, ES2, ["bucket_id": Bucket, "offset": U32, "size": U32]
        => counted(2, 1, 1);
    GetBucketStart: Fixed, 3, ES2, [
        "bucket_id": Bucket, "result_memory_id": ShmId, "result_memory_offset": ShmOffset,
        "data_memory_size": U32, "data_memory_id": ShmId, "data_memory_offset": ShmOffset,
    ] => NO_DATA;
    GetBucketData: Fixed, 3, ES2, [
        "bucket_id": Bucket, "offset": U32, "size": U32,
        "shared_memory_id": ShmId, "shared_memory_offset": ShmOffset,
    ] => NO_DATA;

    // GLES2.
    ActiveTexture = 256: Fixed, 3, ES2, ["texture": U32] => NO_DATA;
    AttachShader: Fixed, 3, ES2, ["program": Id(PS), "shader": Id(PS)] => NO_DATA;
    BindAttribLocationBucket: Fixed, 3, ES2, [
        "program": Id(PS), "index": U32, "name_bucket_id": Bucket,
    ] => NO_DATA;
    BindBuffer: Fixed, 3, ES2, ["target": Enum(&v::BUFFER_TARGET), "buffer": BindId(Buffers)]
        => NO_DATA;
    BindFramebuffer: Fixed, 3, ES2, [
        "target": Enum(&v::FRAMEBUFFER_TARGET), "framebuffer": BindId(Framebuffers),
    ] => NO_DATA;
    BindRenderbuffer: Fixed, 3, ES2, [
        "target": Enum(&v::RENDERBUFFER_TARGET), "renderbuffer": BindId(Renderbuffers),
    ] => NO_DATA;
    BindSampler: Fixed, 3, ES3, ["unit": U32, "sampler": BindId(Samplers)] => NO_DATA;
    BindTexture: Fixed, 3, ES2, [
        "target": Enum(&v::TEXTURE_BIND_TARGET), "texture": BindId(Textures),
    ] => NO_DATA;
    BindTransformFeedback: Fixed, 3, ES3, [
        "target": Enum(&v::TRANSFORM_FEEDBACK_BIND_TARGET),
        "transformfeedback": BindId(TransformFeedbacks),
    ] => NO_DATA;
    BlendColor: Fixed, 3, ES2, ["red": F32, "green": F32, "blue": F32, "alpha": F32] => NO_DATA;
    BlendEquation: Fixed, 3, ES2, ["mode": Enum(&v::EQUATION)] => NO_DATA;
    BlendFunc: Fixed, 3, ES2, [
        "sfactor": Enum(&v::SRC_BLEND_FACTOR), "dfactor": Enum(&v::DST_BLEND_FACTOR),
    ] => NO_DATA;
    BufferData: Fixed, 3, ES2, [
        "target": Enum(&v::BUFFER_TARGET), "size": Size,
        "data_shm_id": ShmId, "data_shm_offset": ShmOffset, "usage": Enum(&v::BUFFER_USAGE),
    ] => NO_DATA;
    BufferSubData: Fixed, 3, ES2, [
        "target": Enum(&v::BUFFER_TARGET), "offset": Offset, "size": Size,
        "data_shm_id": ShmId, "data_shm_offset": ShmOffset,
    ] => NO_DATA;
    CheckFramebufferStatus: Fixed, 3, ES2, [
        "target": Enum(&v::FRAMEBUFFER_TARGET), "result_shm_id": ShmId, "result_shm_offset": ShmOffset,
    ] => NO_DATA;
    Clear: Fixed, 2, ES2, ["mask": Bitfield(CLEAR_MASK)] => NO_DATA;
    ClearBufferfvImmediate: AtLeastN, 3, ES3, ["buffer": Enum(&v::BUFFERFV), "drawbuffers": I32]
        => selected(clear_bufferfv_elements);
    ClearBufferivImmediate: AtLeastN, 3, ES3, ["buffer": Enum(&v::BUFFERIV), "drawbuffers": I32]
        => selected(clear_bufferiv_elements);
    ClearBufferuivImmediate: AtLeastN, 3, ES3, ["buffer": Enum(&v::BUFFERUIV), "drawbuffers": I32]
        => selected(clear_bufferuiv_elements);
    ClearColor: Fixed, 3, ES2, ["red": F32, "green": F32, "blue": F32, "alpha": F32] => NO_DATA;
    ClearDepthf: Fixed, 3, ES2, ["depth": F32] => NO_DATA;
    ClearStencil: Fixed, 3, ES2, ["s": I32] => NO_DATA;
    ClientWaitSync: Fixed, 2, ES3, [
        "sync": Id(Syncs), "flags": Bitfield(gl::SYNC_FLUSH_COMMANDS_BIT),
        "timeout_0": U32, "timeout_1": U32, "result_shm_id": ShmId, "result_shm_offset": ShmOffset,
    ] => NO_DATA;
    ColorMask: Fixed, 3, ES2, ["red": Bool, "green": Bool, "blue": Bool, "alpha": Bool] => NO_DATA;
    CompileShader: Fixed, 3, ES2, ["shader": Id(PS)] => NO_DATA;
    CopyBufferSubData: Fixed, 3, ES3, [
        "readtarget": Enum(&v::BUFFER_TARGET), "writetarget": Enum(&v::BUFFER_TARGET),
        "readoffset": Offset, "writeoffset": Offset, "size": Size,
    ] => NO_DATA;
    CreateProgram: Fixed, 3, ES2, ["client_id": NewId(PS)] => NO_DATA;
    CreateShader: Fixed, 3, ES2, ["type": Enum(&v::SHADER_TYPE), "client_id": NewId(PS)] => NO_DATA;
    CullFace: Fixed, 3, ES2, ["mode": Enum(&v::FACE_TYPE)] => NO_DATA;
    DeleteBuffersImmediate: AtLeastN, 3, ES2, ["n": Size] => counted(0, 1, 4);
    DeleteFramebuffersImmediate: AtLeastN, 3, ES2, ["n": Size] => counted(0, 1, 4);
    DeleteProgram: Fixed, 3, ES2, ["program": Id(PS)] => NO_DATA;
    DeleteRenderbuffersImmediate: AtLeastN, 3, ES2, ["n": Size] => counted(0, 1, 4);
    DeleteSamplersImmediate: AtLeastN, 3, ES3, ["n": Size] => counted(0, 1, 4);
    DeleteShader: Fixed, 3, ES2, ["shader": Id(PS)] => NO_DATA;
    DeleteSync: Fixed, 3, ES3, ["sync": Id(Syncs)] => NO_DATA;
    DeleteTexturesImmediate: AtLeastN, 3, ES2, ["n": Size] => counted(0, 1, 4);
    DeleteTransformFeedbacksImmediate: AtLeastN, 3, ES3, ["n": Size] => counted(0, 1, 4);
    DepthFunc: Fixed, 3, ES2, ["func": Enum(&v::CMP_FUNCTION)] => NO_DATA;
    DepthMask: Fixed, 3, ES2, ["flag": Bool] => NO_DATA;
    Disable: Fixed, 3, ES2, ["cap": Enum(&v::CAPABILITY)] => NO_DATA;
    DisableVertexAttribArray: Fixed, 3, ES2, ["index": U32] => NO_DATA;
    DrawArrays: Fixed, 2, ES2, ["mode": Enum(&v::DRAW_MODE), "first": I32, "count": Size] => NO_DATA;
    DrawElements: Fixed, 2, ES2, [
        "mode": Enum(&v::DRAW_MODE), "count": Size, "type": Enum(&v::INDEX_TYPE), "index_offset": U32,
    ] => NO_DATA;
    Enable: Fixed, 3, ES2, ["cap": Enum(&v::CAPABILITY)] => NO_DATA;
    EnableVertexAttribArray: Fixed, 3, ES2, ["index": U32] => NO_DATA;
    FenceSync: Fixed, 3, ES3, ["client_id": NewId(Syncs)] => NO_DATA;
    Finish: Fixed, 1, ES2, [] => NO_DATA;
    Flush: Fixed, 1, ES2, [] => NO_DATA;
    FramebufferRenderbuffer: Fixed, 3, ES2, [
        "target": Enum(&v::FRAMEBUFFER_TARGET), "attachment": Enum(&v::ATTACHMENT),
        "renderbuffertarget": Enum(&v::RENDERBUFFER_TARGET), "renderbuffer": Id(Renderbuffers),
    ] => NO_DATA;
    FramebufferTexture2D: Fixed, 3, ES2, [
        "target": Enum(&v::FRAMEBUFFER_TARGET), "attachment": Enum(&v::ATTACHMENT),
        "textarget": Enum(&v::TEXTURE_TARGET), "texture": Id(Textures), "level": I32,
    ] => NO_DATA;
    FrontFace: Fixed, 3, ES2, ["mode": Enum(&v::FACE_MODE)] => NO_DATA;
    GenBuffersImmediate: AtLeastN, 3, ES2, ["n": Size] => counted(0, 1, 4);
    GenerateMipmap: Fixed, 3, ES2, ["target": Enum(&v::TEXTURE_BIND_TARGET)] => NO_DATA;
    GenFramebuffersImmediate: AtLeastN, 3, ES2, ["n": Size] => counted(0, 1, 4);
    GenRenderbuffersImmediate: AtLeastN, 3, ES2, ["n": Size] => counted(0, 1, 4);
    GenSamplersImmediate: AtLeastN, 3, ES3, ["n": Size] => counted(0, 1, 4);
    GenTexturesImmediate: AtLeastN, 3, ES2, ["n": Size] => counted(0, 1, 4);
    GenTransformFeedbacksImmediate: AtLeastN, 3, ES3, ["n": Size] => counted(0, 1, 4);
    GetActiveAttrib: Fixed, 3, ES2, [
        "program": Id(PS), "index": U32, "name_bucket_id": Bucket,
        "result_shm_id": ShmId, "result_shm_offset": ShmOffset,
    ] => NO_DATA;
    GetActiveUniform: Fixed, 3, ES2, [
        "program": Id(PS), "index": U32, "name_bucket_id": Bucket,
        "result_shm_id": ShmId, "result_shm_offset": ShmOffset,
    ] => NO_DATA;
    GetAttribLocation: Fixed, 3, ES2, [
        "program": Id(PS), "name_bucket_id": Bucket,
        "location_shm_id": ShmId, "location_shm_offset": ShmOffset,
    ] => NO_DATA;
    GetBooleanv: Fixed, 3, ES2, [
        "pname": Enum(&v::G_L_STATE), "params_shm_id": ShmId, "params_shm_offset": ShmOffset,
    ] => NO_DATA;
    GetBufferParameteriv: Fixed, 3, ES2, [
        "target": Enum(&v::BUFFER_TARGET), "pname": Enum(&v::BUFFER_PARAMETER),
        "params_shm_id": ShmId, "params_shm_offset": ShmOffset,
    ] => NO_DATA;
    GetError: Fixed, 3, ES2, ["result_shm_id": ShmId, "result_shm_offset": ShmOffset] => NO_DATA;
    GetFloatv: Fixed, 3, ES2, [
        "pname": Enum(&v::G_L_STATE), "params_shm_id": ShmId, "params_shm_offset": ShmOffset,
    ] => NO_DATA;
    GetIntegerv: Fixed, 3, ES2, [
        "pname": Enum(&v::G_L_STATE), "params_shm_id": ShmId, "params_shm_offset": ShmOffset,
    ] => NO_DATA;
    GetProgramiv: Fixed, 3, ES2, [
        "program": Id(PS), "pname": Enum(&v::PROGRAM_PARAMETER),
        "params_shm_id": ShmId, "params_shm_offset": ShmOffset,
    ] => NO_DATA;
    GetShaderiv: Fixed, 3, ES2, [
        "shader": Id(PS), "pname": Enum(&v::SHADER_PARAMETER),
        "params_shm_id": ShmId, "params_shm_offset": ShmOffset,
    ] => NO_DATA;
    GetString: Fixed, 3, ES2, ["name": Enum(&v::STRING_TYPE), "bucket_id": Bucket] => NO_DATA;
    GetUniformLocation: Fixed, 3, ES2, [
        "program": Id(PS), "name_bucket_id": Bucket,
        "location_shm_id": ShmId, "location_shm_offset": ShmOffset,
    ] => NO_DATA;
    Hint: Fixed, 3, ES2, ["target": Enum(&v::HINT_TARGET), "mode": Enum(&v::HINT_MODE)] => NO_DATA;
    IsBuffer: Fixed, 3, ES2, ["buffer": U32, "result_shm_id": ShmId, "result_shm_offset": ShmOffset]
        => NO_DATA;
    IsEnabled: Fixed, 3, ES2, [
        "cap": Enum(&v::CAPABILITY), "result_shm_id": ShmId, "result_shm_offset": ShmOffset,
    ] => NO_DATA;
    IsFramebuffer: Fixed, 3, ES2, [
        "framebuffer": U32, "result_shm_id": ShmId, "result_shm_offset": ShmOffset,
    ] => NO_DATA;
    IsProgram: Fixed, 3, ES2, ["program": U32, "result_shm_id": ShmId, "result_shm_offset": ShmOffset]
        => NO_DATA;
    IsRenderbuffer: Fixed, 3, ES2, [
        "renderbuffer": U32, "result_shm_id": ShmId, "result_shm_offset": ShmOffset,
    ] => NO_DATA;
    IsShader: Fixed, 3, ES2, ["shader": U32, "result_shm_id": ShmId, "result_shm_offset": ShmOffset]
        => NO_DATA;
    IsSync: Fixed, 3, ES3, ["sync": U32, "result_shm_id": ShmId, "result_shm_offset": ShmOffset]
        => NO_DATA;
    IsTexture: Fixed, 3, ES2, ["texture": U32, "result_shm_id": ShmId, "result_shm_offset": ShmOffset]
        => NO_DATA;
    LineWidth: Fixed, 3, ES2, ["width": F32] => NO_DATA;
    LinkProgram: Fixed, 3, ES2, ["program": Id(PS)] => NO_DATA;
    PixelStorei: Fixed, 3, ES2, ["pname": Enum(&v::PIXEL_STORE), "param": I32] => NO_DATA;
    ReadPixels: Fixed, 2, ES2, [
        "x": I32, "y": I32, "width": Size, "height": Size,
        "format": Enum(&v::READ_PIXEL_FORMAT), "type": Enum(&v::READ_PIXEL_TYPE),
        "pixels_shm_id": ShmId, "pixels_shm_offset": ShmOffset,
        "result_shm_id": ShmId, "result_shm_offset": ShmOffset,
    ] => NO_DATA;
    RenderbufferStorage: Fixed, 3, ES2, [
        "target": Enum(&v::RENDERBUFFER_TARGET), "internalformat": Enum(&v::RENDERBUFFER_FORMAT),
        "width": Size, "height": Size,
    ] => NO_DATA;
    Scissor: Fixed, 3, ES2, ["x": I32, "y": I32, "width": Size, "height": Size] => NO_DATA;
    ShaderSourceBucket: Fixed, 3, ES2, ["shader": Id(PS), "str_bucket_id": Bucket] => NO_DATA;
    StencilFunc: Fixed, 3, ES2, ["func": Enum(&v::CMP_FUNCTION), "ref": I32, "mask": U32] => NO_DATA;
    StencilMask: Fixed, 3, ES2, ["mask": U32] => NO_DATA;
    StencilOp: Fixed, 3, ES2, [
        "fail": Enum(&v::STENCIL_OP), "zfail": Enum(&v::STENCIL_OP), "zpass": Enum(&v::STENCIL_OP),
    ] => NO_DATA;
    TexImage2D: Fixed, 2, ES2, [
        "target": Enum(&v::TEXTURE_TARGET), "level": I32, "internalformat": Enum(&v::TEXTURE_FORMAT),
        "width": Size, "height": Size, "format": Enum(&v::TEXTURE_FORMAT), "type": Enum(&v::PIXEL_TYPE),
        "pixels_shm_id": ShmId, "pixels_shm_offset": ShmOffset,
    ] => NO_DATA;
    TexParameterf: Fixed, 3, ES2, [
        "target": Enum(&v::TEXTURE_BIND_TARGET), "pname": Enum(&v::TEXTURE_PARAMETER), "param": F32,
    ] => NO_DATA;
    TexParameterfvImmediate: AtLeastN, 3, ES2, [
        "target": Enum(&v::TEXTURE_BIND_TARGET), "pname": Enum(&v::TEXTURE_PARAMETER),
    ] => fixed(4);
    TexParameteri: Fixed, 3, ES2, [
        "target": Enum(&v::TEXTURE_BIND_TARGET), "pname": Enum(&v::TEXTURE_PARAMETER), "param": I32,
    ] => NO_DATA;
    TexParameterivImmediate: AtLeastN, 3, ES2, [
        "target": Enum(&v::TEXTURE_BIND_TARGET), "pname": Enum(&v::TEXTURE_PARAMETER),
    ] => fixed(4);
    TexSubImage2D: Fixed, 2, ES2, [
        "target": Enum(&v::TEXTURE_TARGET), "level": I32, "xoffset": I32, "yoffset": I32,
        "width": Size, "height": Size, "format": Enum(&v::TEXTURE_FORMAT), "type": Enum(&v::PIXEL_TYPE),
        "pixels_shm_id": ShmId, "pixels_shm_offset": ShmOffset, "internal": Bool,
    ] => NO_DATA;
    Uniform1f: Fixed, 3, ES2, ["location": Location, "x": F32] => NO_DATA;
    Uniform1fvImmediate: AtLeastN, 3, ES2, ["location": Location, "count": Size] => counted(1, 1, 4);
    Uniform1i: Fixed, 3, ES2, ["location": Location, "x": I32] => NO_DATA;
    Uniform1ivImmediate: AtLeastN, 3, ES2, ["location": Location, "count": Size] => counted(1, 1, 4);
    Uniform2f: Fixed, 3, ES2, ["location": Location, "x": F32, "y": F32] => NO_DATA;
    Uniform2fvImmediate: AtLeastN, 3, ES2, ["location": Location, "count": Size] => counted(1, 2, 4);
    Uniform3f: Fixed, 3, ES2, ["location": Location, "x": F32, "y": F32, "z": F32] => NO_DATA;
    Uniform3fvImmediate: AtLeastN, 3, ES2, ["location": Location, "count": Size] => counted(1, 3, 4);
    Uniform4f: Fixed, 3, ES2, ["location": Location, "x": F32, "y": F32, "z": F32, "w": F32]
        => NO_DATA;
    Uniform4fv: Fixed, 3, ES2, [
        "location": Location, "count": Size, "v_shm_id": ShmId, "v_shm_offset": ShmOffset,
    ] => NO_DATA;
    Uniform4fvImmediate: AtLeastN, 3, ES2, ["location": Location, "count": Size] => counted(1, 4, 4);
    Uniform4i: Fixed, 3, ES2, ["location": Location, "x": I32, "y": I32, "z": I32, "w": I32]
        => NO_DATA;
    Uniform4ivImmediate: AtLeastN, 3, ES2, ["location": Location, "count": Size] => counted(1, 4, 4);
    UniformMatrix2fvImmediate: AtLeastN, 3, ES2, ["location": Location, "count": Size]
        => counted(1, 4, 4);
    UniformMatrix3fvImmediate: AtLeastN, 3, ES2, ["location": Location, "count": Size]
        => counted(1, 9, 4);
    UniformMatrix4fvImmediate: AtLeastN, 3, ES2, ["location": Location, "count": Size]
        => counted(1, 16, 4);
    UseProgram: Fixed, 3, ES2, ["program": Id(PS)] => NO_DATA;
    VertexAttrib1f: Fixed, 3, ES2, ["indx": U32, "x": F32] => NO_DATA;
    VertexAttrib1fvImmediate: AtLeastN, 3, ES2, ["indx": U32] => fixed(4);
    VertexAttrib2f: Fixed, 3, ES2, ["indx": U32, "x": F32, "y": F32] => NO_DATA;
    VertexAttrib2fvImmediate: AtLeastN, 3, ES2, ["indx": U32] => fixed(8);
    VertexAttrib3f: Fixed, 3, ES2, ["indx": U32, "x": F32, "y": F32, "z": F32] => NO_DATA;
    VertexAttrib3fvImmediate: AtLeastN, 3, ES2, ["indx": U32] => fixed(12);
    VertexAttrib4f: Fixed, 3, ES2, ["indx": U32, "x": F32, "y": F32, "z": F32, "w": F32] => NO_DATA;
    VertexAttrib4fvImmediate: AtLeastN, 3, ES2, ["indx": U32] => fixed(16);
    VertexAttribI4i: Fixed, 3, ES3, ["indx": U32, "x": I32, "y": I32, "z": I32, "w": I32] => NO_DATA;
    VertexAttribI4ivImmediate: AtLeastN, 3, ES3, ["indx": U32] => fixed(16);
    VertexAttribI4ui: Fixed, 3, ES3, ["indx": U32, "x": U32, "y": U32, "z": U32, "w": U32] => NO_DATA;
    VertexAttribI4uivImmediate: AtLeastN, 3, ES3, ["indx": U32] => fixed(16);
    VertexAttribPointer: Fixed, 3, ES2, [
        "indx": U32, "size": I32, "type": Enum(&v::VERTEX_ATTRIB_TYPE), "normalized": Bool,
        "stride": Size, "offset": U32,
    ] => NO_DATA;
    Viewport: Fixed, 3, ES2, ["x": I32, "y": I32, "width": Size, "height": Size] => NO_DATA;
    WaitSync: Fixed, 2, ES3, ["sync": Id(Syncs), "flags": U32, "timeout_0": U32, "timeout_1": U32]
        => NO_DATA;
    BeginTransformFeedback: Fixed, 3, ES3, [
        "primitivemode": Enum(&v::TRANSFORM_FEEDBACK_PRIMITIVE_MODE),
    ] => NO_DATA;
    EndTransformFeedback: Fixed, 3, ES3, [] => NO_DATA;
    InvalidateFramebufferImmediate: AtLeastN, 3, ES3, [
        "target": Enum(&v::FRAMEBUFFER_TARGET), "count": Size,
    ] => counted(1, 1, 4);

    // Extensions.
    GenQueriesEXTImmediate: AtLeastN, 3, ES2, ["n": Size] => counted(0, 1, 4);
    DeleteQueriesEXTImmediate: AtLeastN, 3, ES2, ["n": Size] => counted(0, 1, 4);
    BeginQueryEXT: Fixed, 3, ES2, [
        "target": Enum(&v::QUERY_TARGET), "id": U32,
        "sync_data_shm_id": ShmId, "sync_data_shm_offset": ShmOffset,
    ] => NO_DATA;
    EndQueryEXT: Fixed, 3, ES2, ["target": Enum(&v::QUERY_TARGET), "submit_count": U32] => NO_DATA;
    InsertEventMarkerEXT: Fixed, 3, ES2, ["bucket_id": Bucket] => NO_DATA;
    PushGroupMarkerEXT: Fixed, 3, ES2, ["bucket_id": Bucket] => NO_DATA;
    PopGroupMarkerEXT: Fixed, 3, ES2, [] => NO_DATA;
    GenVertexArraysOESImmediate: AtLeastN, 3, ES2, ["n": Size] => counted(0, 1, 4);
    DeleteVertexArraysOESImmediate: AtLeastN, 3, ES2, ["n": Size] => counted(0, 1, 4);
    IsVertexArrayOES: Fixed, 3, ES2, ["array": U32, "result_shm_id": ShmId, "result_shm_offset": ShmOffset]
        => NO_DATA;
    BindVertexArrayOES: Fixed, 3, ES2, ["array": BindId(VertexArrays)] => NO_DATA;
    DrawBuffersEXTImmediate: AtLeastN, 3, ES2, ["count": Size] => counted(0, 1, 4);
    GenValuebuffersCHROMIUMImmediate: AtLeastN, 3, ES2, ["n": Size] => counted(0, 1, 4);
    DeleteValuebuffersCHROMIUMImmediate: AtLeastN, 3, ES2, ["n": Size] => counted(0, 1, 4);
    IsValuebufferCHROMIUM: Fixed, 3, ES2, [
        "valuebuffer": U32, "result_shm_id": ShmId, "result_shm_offset": ShmOffset,
    ] => NO_DATA;
    BindValuebufferCHROMIUM: Fixed, 3, ES2, [
        "target": Enum(&v::VALUEBUFFER_TARGET), "valuebuffer": BindId(Valuebuffers),
    ] => NO_DATA;
    ProduceTextureCHROMIUMImmediate: AtLeastN, 3, ES2, ["target": Enum(&v::TEXTURE_BIND_TARGET)]
        => fixed(MAILBOX_BYTES);
    ConsumeTextureCHROMIUMImmediate: AtLeastN, 3, ES2, ["target": Enum(&v::TEXTURE_BIND_TARGET)]
        => fixed(MAILBOX_BYTES);
    ShallowFlushCHROMIUM: Fixed, 1, ES2, [] => NO_DATA;
    TraceBeginCHROMIUM: Fixed, 3, ES2, ["category_bucket_id": Bucket, "name_bucket_id": Bucket]
        => NO_DATA;
    TraceEndCHROMIUM: Fixed, 3, ES2, [] => NO_DATA;
}

fn table_index(id: u16) -> Option<usize> {
    if id < COMMON_COMMAND_COUNT {
        Some(usize::from(id))
    } else if id >= COMMAND_START_POINT {
        Some(usize::from(COMMON_COMMAND_COUNT) + usize::from(id - COMMAND_START_POINT))
    } else {
        None
    }
}

/// Looks up the descriptor for a raw command id.
pub fn command_info(id: u16) -> Option<&'static CommandInfo> {
    COMMANDS
        .get(table_index(id)?)
        .filter(|info| info.id as u16 == id)
}

/// Every command descriptor, common commands first.
pub fn commands() -> &'static [CommandInfo] {
    COMMANDS
}

impl CommandId {
    pub fn from_u16(id: u16) -> Option<Self> {
        command_info(id).map(|info| info.id)
    }

    pub fn info(self) -> &'static CommandInfo {
        // Ids are dense within each range, so every id indexes its own row.
        let index = table_index(self as u16).unwrap_or(usize::MAX);
        &COMMANDS[index]
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }
}
