//! GL scalar types and the enum values the command set refers to.

pub type GLenum = u32;
pub type GLbitfield = u32;
pub type GLint = i32;
pub type GLuint = u32;
pub type GLsizei = i32;
pub type GLfloat = f32;
pub type GLintptr = i32;
pub type GLsizeiptr = i32;
pub type GLuint64 = u64;

pub const NO_ERROR: GLenum = 0;
pub const INVALID_ENUM: GLenum = 0x0500;
pub const INVALID_VALUE: GLenum = 0x0501;
pub const INVALID_OPERATION: GLenum = 0x0502;
pub const OUT_OF_MEMORY: GLenum = 0x0505;
pub const INVALID_FRAMEBUFFER_OPERATION: GLenum = 0x0506;
pub const CONTEXT_LOST_KHR: GLenum = 0x0507;

pub const NONE: GLenum = 0;
pub const ZERO: GLenum = 0;
pub const ONE: GLenum = 1;

/* -------------------------------- Buffers --------------------------------- */

pub const ARRAY_BUFFER: GLenum = 0x8892;
pub const ELEMENT_ARRAY_BUFFER: GLenum = 0x8893;
pub const COPY_READ_BUFFER: GLenum = 0x8F36;
pub const COPY_WRITE_BUFFER: GLenum = 0x8F37;
pub const PIXEL_PACK_BUFFER: GLenum = 0x88EB;
pub const PIXEL_UNPACK_BUFFER: GLenum = 0x88EC;
pub const TRANSFORM_FEEDBACK_BUFFER: GLenum = 0x8C8E;
pub const UNIFORM_BUFFER: GLenum = 0x8A11;

pub const STREAM_DRAW: GLenum = 0x88E0;
pub const STREAM_READ: GLenum = 0x88E1;
pub const STREAM_COPY: GLenum = 0x88E2;
pub const STATIC_DRAW: GLenum = 0x88E4;
pub const STATIC_READ: GLenum = 0x88E5;
pub const STATIC_COPY: GLenum = 0x88E6;
pub const DYNAMIC_DRAW: GLenum = 0x88E8;
pub const DYNAMIC_READ: GLenum = 0x88E9;
pub const DYNAMIC_COPY: GLenum = 0x88EA;

pub const BUFFER_SIZE: GLenum = 0x8764;
pub const BUFFER_USAGE: GLenum = 0x8765;

/* ------------------------ Framebuffers / renderbuffers --------------------- */

pub const FRAMEBUFFER: GLenum = 0x8D40;
pub const RENDERBUFFER: GLenum = 0x8D41;
pub const READ_FRAMEBUFFER: GLenum = 0x8CA8;
pub const DRAW_FRAMEBUFFER: GLenum = 0x8CA9;
pub const FRAMEBUFFER_COMPLETE: GLenum = 0x8CD5;
pub const FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT: GLenum = 0x8CD7;

pub const COLOR_ATTACHMENT0: GLenum = 0x8CE0;
pub const DEPTH_ATTACHMENT: GLenum = 0x8D00;
pub const STENCIL_ATTACHMENT: GLenum = 0x8D20;
pub const DEPTH_STENCIL_ATTACHMENT: GLenum = 0x821A;

pub const RGBA4: GLenum = 0x8056;
pub const RGB5_A1: GLenum = 0x8057;
pub const RGB565: GLenum = 0x8D62;
pub const DEPTH_COMPONENT16: GLenum = 0x81A5;
pub const STENCIL_INDEX8: GLenum = 0x8D48;

/* -------------------------------- Textures -------------------------------- */

pub const TEXTURE_2D: GLenum = 0x0DE1;
pub const TEXTURE_CUBE_MAP: GLenum = 0x8513;
pub const TEXTURE_3D: GLenum = 0x806F;
pub const TEXTURE_2D_ARRAY: GLenum = 0x8C1A;
pub const TEXTURE_CUBE_MAP_POSITIVE_X: GLenum = 0x8515;
pub const TEXTURE_CUBE_MAP_NEGATIVE_X: GLenum = 0x8516;
pub const TEXTURE_CUBE_MAP_POSITIVE_Y: GLenum = 0x8517;
pub const TEXTURE_CUBE_MAP_NEGATIVE_Y: GLenum = 0x8518;
pub const TEXTURE_CUBE_MAP_POSITIVE_Z: GLenum = 0x8519;
pub const TEXTURE_CUBE_MAP_NEGATIVE_Z: GLenum = 0x851A;
pub const TEXTURE0: GLenum = 0x84C0;

pub const TEXTURE_MAG_FILTER: GLenum = 0x2800;
pub const TEXTURE_MIN_FILTER: GLenum = 0x2801;
pub const TEXTURE_WRAP_S: GLenum = 0x2802;
pub const TEXTURE_WRAP_T: GLenum = 0x2803;
pub const TEXTURE_WRAP_R: GLenum = 0x8072;

pub const ALPHA: GLenum = 0x1906;
pub const RGB: GLenum = 0x1907;
pub const RGBA: GLenum = 0x1908;
pub const LUMINANCE: GLenum = 0x1909;
pub const LUMINANCE_ALPHA: GLenum = 0x190A;

pub const BYTE: GLenum = 0x1400;
pub const UNSIGNED_BYTE: GLenum = 0x1401;
pub const SHORT: GLenum = 0x1402;
pub const UNSIGNED_SHORT: GLenum = 0x1403;
pub const INT: GLenum = 0x1404;
pub const UNSIGNED_INT: GLenum = 0x1405;
pub const FLOAT: GLenum = 0x1406;
pub const HALF_FLOAT: GLenum = 0x140B;
pub const UNSIGNED_SHORT_4_4_4_4: GLenum = 0x8033;
pub const UNSIGNED_SHORT_5_5_5_1: GLenum = 0x8034;
pub const UNSIGNED_SHORT_5_6_5: GLenum = 0x8363;

pub const PACK_ALIGNMENT: GLenum = 0x0D05;
pub const UNPACK_ALIGNMENT: GLenum = 0x0CF5;

/* ------------------------------ Fixed function ----------------------------- */

pub const FUNC_ADD: GLenum = 0x8006;
pub const MIN: GLenum = 0x8007;
pub const MAX: GLenum = 0x8008;
pub const FUNC_SUBTRACT: GLenum = 0x800A;
pub const FUNC_REVERSE_SUBTRACT: GLenum = 0x800B;

pub const SRC_COLOR: GLenum = 0x0300;
pub const ONE_MINUS_SRC_COLOR: GLenum = 0x0301;
pub const SRC_ALPHA: GLenum = 0x0302;
pub const ONE_MINUS_SRC_ALPHA: GLenum = 0x0303;
pub const DST_ALPHA: GLenum = 0x0304;
pub const ONE_MINUS_DST_ALPHA: GLenum = 0x0305;
pub const DST_COLOR: GLenum = 0x0306;
pub const ONE_MINUS_DST_COLOR: GLenum = 0x0307;
pub const SRC_ALPHA_SATURATE: GLenum = 0x0308;
pub const CONSTANT_COLOR: GLenum = 0x8001;
pub const ONE_MINUS_CONSTANT_COLOR: GLenum = 0x8002;
pub const CONSTANT_ALPHA: GLenum = 0x8003;
pub const ONE_MINUS_CONSTANT_ALPHA: GLenum = 0x8004;

pub const DEPTH_BUFFER_BIT: GLbitfield = 0x0000_0100;
pub const STENCIL_BUFFER_BIT: GLbitfield = 0x0000_0400;
pub const COLOR_BUFFER_BIT: GLbitfield = 0x0000_4000;

pub const COLOR: GLenum = 0x1800;
pub const DEPTH: GLenum = 0x1801;
pub const STENCIL: GLenum = 0x1802;
pub const DEPTH_STENCIL: GLenum = 0x84F9;

pub const FRONT: GLenum = 0x0404;
pub const BACK: GLenum = 0x0405;
pub const FRONT_AND_BACK: GLenum = 0x0408;
pub const CW: GLenum = 0x0900;
pub const CCW: GLenum = 0x0901;

pub const NEVER: GLenum = 0x0200;
pub const LESS: GLenum = 0x0201;
pub const EQUAL: GLenum = 0x0202;
pub const LEQUAL: GLenum = 0x0203;
pub const GREATER: GLenum = 0x0204;
pub const NOTEQUAL: GLenum = 0x0205;
pub const GEQUAL: GLenum = 0x0206;
pub const ALWAYS: GLenum = 0x0207;

pub const KEEP: GLenum = 0x1E00;
pub const REPLACE: GLenum = 0x1E01;
pub const INCR: GLenum = 0x1E02;
pub const DECR: GLenum = 0x1E03;
pub const INVERT: GLenum = 0x150A;
pub const INCR_WRAP: GLenum = 0x8507;
pub const DECR_WRAP: GLenum = 0x8508;

pub const BLEND: GLenum = 0x0BE2;
pub const CULL_FACE: GLenum = 0x0B44;
pub const DEPTH_TEST: GLenum = 0x0B71;
pub const DITHER: GLenum = 0x0BD0;
pub const POLYGON_OFFSET_FILL: GLenum = 0x8037;
pub const SAMPLE_ALPHA_TO_COVERAGE: GLenum = 0x809E;
pub const SAMPLE_COVERAGE: GLenum = 0x80A0;
pub const SCISSOR_TEST: GLenum = 0x0C11;
pub const STENCIL_TEST: GLenum = 0x0B90;
pub const RASTERIZER_DISCARD: GLenum = 0x8C89;
pub const PRIMITIVE_RESTART_FIXED_INDEX: GLenum = 0x8D69;

pub const GENERATE_MIPMAP_HINT: GLenum = 0x8192;
pub const DONT_CARE: GLenum = 0x1100;
pub const FASTEST: GLenum = 0x1101;
pub const NICEST: GLenum = 0x1102;

/* -------------------------------- Drawing --------------------------------- */

pub const POINTS: GLenum = 0x0000;
pub const LINES: GLenum = 0x0001;
pub const LINE_LOOP: GLenum = 0x0002;
pub const LINE_STRIP: GLenum = 0x0003;
pub const TRIANGLES: GLenum = 0x0004;
pub const TRIANGLE_STRIP: GLenum = 0x0005;
pub const TRIANGLE_FAN: GLenum = 0x0006;

pub const TRANSFORM_FEEDBACK: GLenum = 0x8E22;

/* ------------------------------ Programs ---------------------------------- */

pub const FRAGMENT_SHADER: GLenum = 0x8B30;
pub const VERTEX_SHADER: GLenum = 0x8B31;

pub const SHADER_TYPE: GLenum = 0x8B4F;
pub const DELETE_STATUS: GLenum = 0x8B80;
pub const COMPILE_STATUS: GLenum = 0x8B81;
pub const LINK_STATUS: GLenum = 0x8B82;
pub const VALIDATE_STATUS: GLenum = 0x8B83;
pub const INFO_LOG_LENGTH: GLenum = 0x8B84;
pub const ATTACHED_SHADERS: GLenum = 0x8B85;
pub const ACTIVE_UNIFORMS: GLenum = 0x8B86;
pub const SHADER_SOURCE_LENGTH: GLenum = 0x8B88;
pub const ACTIVE_ATTRIBUTES: GLenum = 0x8B89;

/* -------------------------------- Queries --------------------------------- */

pub const VENDOR: GLenum = 0x1F00;
pub const RENDERER: GLenum = 0x1F01;
pub const VERSION: GLenum = 0x1F02;
pub const EXTENSIONS: GLenum = 0x1F03;
pub const SHADING_LANGUAGE_VERSION: GLenum = 0x8B8C;

pub const ACTIVE_TEXTURE: GLenum = 0x84E0;
pub const ARRAY_BUFFER_BINDING: GLenum = 0x8894;
pub const ELEMENT_ARRAY_BUFFER_BINDING: GLenum = 0x8895;
pub const CURRENT_PROGRAM: GLenum = 0x8B8D;
pub const FRAMEBUFFER_BINDING: GLenum = 0x8CA6;
pub const RENDERBUFFER_BINDING: GLenum = 0x8CA7;
pub const TEXTURE_BINDING_2D: GLenum = 0x8069;
pub const TEXTURE_BINDING_CUBE_MAP: GLenum = 0x8514;
pub const VERTEX_ARRAY_BINDING_OES: GLenum = 0x85B5;
pub const VIEWPORT: GLenum = 0x0BA2;
pub const SCISSOR_BOX: GLenum = 0x0C10;
pub const COLOR_CLEAR_VALUE: GLenum = 0x0C22;
pub const COLOR_WRITEMASK: GLenum = 0x0C23;
pub const DEPTH_WRITEMASK: GLenum = 0x0B72;
pub const DEPTH_CLEAR_VALUE: GLenum = 0x0B73;
pub const STENCIL_CLEAR_VALUE: GLenum = 0x0B91;
pub const LINE_WIDTH: GLenum = 0x0B21;
pub const MAX_VERTEX_ATTRIBS: GLenum = 0x8869;
pub const MAX_TEXTURE_IMAGE_UNITS: GLenum = 0x8872;
pub const MAX_COMBINED_TEXTURE_IMAGE_UNITS: GLenum = 0x8B4D;
pub const MAX_TEXTURE_SIZE: GLenum = 0x0D33;
pub const MAX_RENDERBUFFER_SIZE: GLenum = 0x84E8;
pub const MAX_DRAW_BUFFERS: GLenum = 0x8824;

pub const ANY_SAMPLES_PASSED_EXT: GLenum = 0x8C2F;
pub const ANY_SAMPLES_PASSED_CONSERVATIVE_EXT: GLenum = 0x8D6A;
pub const TIME_ELAPSED_EXT: GLenum = 0x88BF;
pub const COMMANDS_ISSUED_CHROMIUM: GLenum = 0x6004;
pub const TRANSFORM_FEEDBACK_PRIMITIVES_WRITTEN: GLenum = 0x8C88;

/* ---------------------------------- Sync ---------------------------------- */

pub const SYNC_GPU_COMMANDS_COMPLETE: GLenum = 0x9117;
pub const SYNC_FLUSH_COMMANDS_BIT: GLbitfield = 0x0000_0001;
pub const ALREADY_SIGNALED: GLenum = 0x911A;
pub const TIMEOUT_EXPIRED: GLenum = 0x911B;
pub const CONDITION_SATISFIED: GLenum = 0x911C;
pub const WAIT_FAILED: GLenum = 0x911D;
pub const TIMEOUT_IGNORED: GLuint64 = u64::MAX;

/* ------------------------------- Extensions ------------------------------- */

pub const SUBSCRIBED_VALUES_BUFFER_CHROMIUM: GLenum = 0x924B;

/// Splits a 64-bit value into the two 32-bit halves used on the wire (`low`, `high`).
pub fn split_u64(value: u64) -> (u32, u32) {
    (value as u32, (value >> 32) as u32)
}

/// Joins the `_0` (low) and `_1` (high) halves of a 64-bit wire value.
pub fn join_u64(low: u32, high: u32) -> u64 {
    u64::from(low) | (u64::from(high) << 32)
}

/// Bytes per pixel group for a `format`/`type` pair, or `None` if the pair is not a valid
/// upload/readback combination.
pub fn bytes_per_group(format: GLenum, ty: GLenum) -> Option<u32> {
    let components = match format {
        ALPHA | LUMINANCE => 1,
        LUMINANCE_ALPHA => 2,
        RGB => 3,
        RGBA => 4,
        _ => return None,
    };
    match ty {
        UNSIGNED_BYTE => Some(components),
        FLOAT => Some(components * 4),
        HALF_FLOAT => Some(components * 2),
        UNSIGNED_SHORT_5_6_5 if format == RGB => Some(2),
        UNSIGNED_SHORT_4_4_4_4 | UNSIGNED_SHORT_5_5_5_1 if format == RGBA => Some(2),
        _ => None,
    }
}

/// Size in bytes of a `width` x `height` image with rows padded to `alignment`.
///
/// The last row is not padded. Returns `None` on overflow or an invalid format/type pair.
pub fn compute_image_data_size(
    width: u32,
    height: u32,
    format: GLenum,
    ty: GLenum,
    alignment: u32,
) -> Option<u32> {
    let bytes_per_group = bytes_per_group(format, ty)?;
    if width == 0 || height == 0 {
        return Some(0);
    }
    let unpadded_row = width.checked_mul(bytes_per_group)?;
    let padded_row = unpadded_row.checked_add(alignment - 1)? / alignment * alignment;
    padded_row.checked_mul(height - 1)?.checked_add(unpadded_row)
}

/// Size in bytes of one element of an index buffer of `ty`.
pub fn index_type_size(ty: GLenum) -> Option<u32> {
    match ty {
        UNSIGNED_BYTE => Some(1),
        UNSIGNED_SHORT => Some(2),
        UNSIGNED_INT => Some(4),
        _ => None,
    }
}

/// Size in bytes of one vertex attribute component of `ty`.
pub fn attrib_type_size(ty: GLenum) -> Option<u32> {
    match ty {
        BYTE | UNSIGNED_BYTE => Some(1),
        SHORT | UNSIGNED_SHORT | HALF_FLOAT => Some(2),
        INT | UNSIGNED_INT | FLOAT => Some(4),
        _ => None,
    }
}
