//! Enum validators referenced by [`FieldKind::Enum`](crate::FieldKind::Enum) fields.
//!
//! Each validator has a base value set plus values that only become legal once ES3 APIs are
//! enabled on the decoder.

use crate::gl;

#[derive(Debug)]
pub struct Validator {
    pub name: &'static str,
    base: &'static [u32],
    es3: &'static [u32],
}

impl Validator {
    pub const fn new(name: &'static str, base: &'static [u32], es3: &'static [u32]) -> Self {
        Self { name, base, es3 }
    }

    pub fn is_valid(&self, value: u32, es3_enabled: bool) -> bool {
        self.base.contains(&value) || (es3_enabled && self.es3.contains(&value))
    }

    pub fn values(&self, es3_enabled: bool) -> impl Iterator<Item = u32> + '_ {
        let es3: &[u32] = if es3_enabled { self.es3 } else { &[] };
        self.base.iter().chain(es3).copied()
    }
}

pub static ATTACHMENT: Validator = Validator::new(
    "attachment",
    &[gl::COLOR_ATTACHMENT0, gl::DEPTH_ATTACHMENT, gl::STENCIL_ATTACHMENT],
    &[gl::DEPTH_STENCIL_ATTACHMENT],
);

pub static BUFFER_PARAMETER: Validator =
    Validator::new("buffer_parameter", &[gl::BUFFER_SIZE, gl::BUFFER_USAGE], &[]);

pub static BUFFER_TARGET: Validator = Validator::new(
    "buffer_target",
    &[gl::ARRAY_BUFFER, gl::ELEMENT_ARRAY_BUFFER],
    &[
        gl::COPY_READ_BUFFER,
        gl::COPY_WRITE_BUFFER,
        gl::PIXEL_PACK_BUFFER,
        gl::PIXEL_UNPACK_BUFFER,
        gl::TRANSFORM_FEEDBACK_BUFFER,
        gl::UNIFORM_BUFFER,
    ],
);

pub static BUFFER_USAGE: Validator = Validator::new(
    "buffer_usage",
    &[gl::STREAM_DRAW, gl::STATIC_DRAW, gl::DYNAMIC_DRAW],
    &[
        gl::STREAM_READ,
        gl::STREAM_COPY,
        gl::STATIC_READ,
        gl::STATIC_COPY,
        gl::DYNAMIC_READ,
        gl::DYNAMIC_COPY,
    ],
);

pub static BUFFERFV: Validator = Validator::new("bufferfv", &[gl::COLOR, gl::DEPTH], &[]);
pub static BUFFERIV: Validator = Validator::new("bufferiv", &[gl::COLOR, gl::STENCIL], &[]);
pub static BUFFERUIV: Validator = Validator::new("bufferuiv", &[gl::COLOR], &[]);

pub static CAPABILITY: Validator = Validator::new(
    "capability",
    &[
        gl::BLEND,
        gl::CULL_FACE,
        gl::DEPTH_TEST,
        gl::DITHER,
        gl::POLYGON_OFFSET_FILL,
        gl::SAMPLE_ALPHA_TO_COVERAGE,
        gl::SAMPLE_COVERAGE,
        gl::SCISSOR_TEST,
        gl::STENCIL_TEST,
    ],
    &[gl::RASTERIZER_DISCARD, gl::PRIMITIVE_RESTART_FIXED_INDEX],
);

pub static CMP_FUNCTION: Validator = Validator::new(
    "cmp_function",
    &[
        gl::NEVER,
        gl::LESS,
        gl::EQUAL,
        gl::LEQUAL,
        gl::GREATER,
        gl::NOTEQUAL,
        gl::GEQUAL,
        gl::ALWAYS,
    ],
    &[],
);

pub static DRAW_MODE: Validator = Validator::new(
    "draw_mode",
    &[
        gl::POINTS,
        gl::LINES,
        gl::LINE_LOOP,
        gl::LINE_STRIP,
        gl::TRIANGLES,
        gl::TRIANGLE_STRIP,
        gl::TRIANGLE_FAN,
    ],
    &[],
);

pub static DST_BLEND_FACTOR: Validator = Validator::new(
    "dst_blend_factor",
    &[
        gl::ZERO,
        gl::ONE,
        gl::SRC_COLOR,
        gl::ONE_MINUS_SRC_COLOR,
        gl::SRC_ALPHA,
        gl::ONE_MINUS_SRC_ALPHA,
        gl::DST_ALPHA,
        gl::ONE_MINUS_DST_ALPHA,
        gl::DST_COLOR,
        gl::ONE_MINUS_DST_COLOR,
        gl::CONSTANT_COLOR,
        gl::ONE_MINUS_CONSTANT_COLOR,
        gl::CONSTANT_ALPHA,
        gl::ONE_MINUS_CONSTANT_ALPHA,
    ],
    &[],
);

pub static EQUATION: Validator = Validator::new(
    "equation",
    &[gl::FUNC_ADD, gl::FUNC_SUBTRACT, gl::FUNC_REVERSE_SUBTRACT],
    &[gl::MIN, gl::MAX],
);

pub static FACE_MODE: Validator = Validator::new("face_mode", &[gl::CW, gl::CCW], &[]);

pub static FACE_TYPE: Validator =
    Validator::new("face_type", &[gl::FRONT, gl::BACK, gl::FRONT_AND_BACK], &[]);

pub static FRAMEBUFFER_TARGET: Validator = Validator::new(
    "framebuffer_target",
    &[gl::FRAMEBUFFER],
    &[gl::READ_FRAMEBUFFER, gl::DRAW_FRAMEBUFFER],
);

/// Parameters accepted by `GetBooleanv`/`GetFloatv`/`GetIntegerv`.
pub static G_L_STATE: Validator = Validator::new(
    "g_l_state",
    &[
        gl::ACTIVE_TEXTURE,
        gl::ARRAY_BUFFER_BINDING,
        gl::BLEND,
        gl::COLOR_CLEAR_VALUE,
        gl::COLOR_WRITEMASK,
        gl::CULL_FACE,
        gl::CURRENT_PROGRAM,
        gl::DEPTH_CLEAR_VALUE,
        gl::DEPTH_TEST,
        gl::DEPTH_WRITEMASK,
        gl::DITHER,
        gl::ELEMENT_ARRAY_BUFFER_BINDING,
        gl::FRAMEBUFFER_BINDING,
        gl::LINE_WIDTH,
        gl::MAX_COMBINED_TEXTURE_IMAGE_UNITS,
        gl::MAX_DRAW_BUFFERS,
        gl::MAX_RENDERBUFFER_SIZE,
        gl::MAX_TEXTURE_IMAGE_UNITS,
        gl::MAX_TEXTURE_SIZE,
        gl::MAX_VERTEX_ATTRIBS,
        gl::PACK_ALIGNMENT,
        gl::POLYGON_OFFSET_FILL,
        gl::RENDERBUFFER_BINDING,
        gl::SAMPLE_ALPHA_TO_COVERAGE,
        gl::SAMPLE_COVERAGE,
        gl::SCISSOR_BOX,
        gl::SCISSOR_TEST,
        gl::STENCIL_CLEAR_VALUE,
        gl::STENCIL_TEST,
        gl::TEXTURE_BINDING_2D,
        gl::TEXTURE_BINDING_CUBE_MAP,
        gl::UNPACK_ALIGNMENT,
        gl::VERTEX_ARRAY_BINDING_OES,
        gl::VIEWPORT,
    ],
    &[gl::RASTERIZER_DISCARD, gl::PRIMITIVE_RESTART_FIXED_INDEX],
);

pub static HINT_MODE: Validator =
    Validator::new("hint_mode", &[gl::FASTEST, gl::NICEST, gl::DONT_CARE], &[]);

pub static HINT_TARGET: Validator = Validator::new("hint_target", &[gl::GENERATE_MIPMAP_HINT], &[]);

pub static INDEX_TYPE: Validator = Validator::new(
    "index_type",
    &[gl::UNSIGNED_BYTE, gl::UNSIGNED_SHORT],
    &[gl::UNSIGNED_INT],
);

pub static PIXEL_STORE: Validator =
    Validator::new("pixel_store", &[gl::PACK_ALIGNMENT, gl::UNPACK_ALIGNMENT], &[]);

pub static PIXEL_TYPE: Validator = Validator::new(
    "pixel_type",
    &[
        gl::UNSIGNED_BYTE,
        gl::UNSIGNED_SHORT_5_6_5,
        gl::UNSIGNED_SHORT_4_4_4_4,
        gl::UNSIGNED_SHORT_5_5_5_1,
    ],
    &[gl::FLOAT, gl::HALF_FLOAT],
);

pub static PROGRAM_PARAMETER: Validator = Validator::new(
    "program_parameter",
    &[
        gl::DELETE_STATUS,
        gl::LINK_STATUS,
        gl::VALIDATE_STATUS,
        gl::INFO_LOG_LENGTH,
        gl::ATTACHED_SHADERS,
        gl::ACTIVE_ATTRIBUTES,
        gl::ACTIVE_UNIFORMS,
    ],
    &[],
);

pub static QUERY_TARGET: Validator = Validator::new(
    "query_target",
    &[
        gl::ANY_SAMPLES_PASSED_EXT,
        gl::ANY_SAMPLES_PASSED_CONSERVATIVE_EXT,
        gl::COMMANDS_ISSUED_CHROMIUM,
        gl::TIME_ELAPSED_EXT,
    ],
    &[gl::TRANSFORM_FEEDBACK_PRIMITIVES_WRITTEN],
);

pub static READ_PIXEL_FORMAT: Validator =
    Validator::new("read_pixel_format", &[gl::ALPHA, gl::RGB, gl::RGBA], &[]);

pub static READ_PIXEL_TYPE: Validator = Validator::new(
    "read_pixel_type",
    &[
        gl::UNSIGNED_BYTE,
        gl::UNSIGNED_SHORT_5_6_5,
        gl::UNSIGNED_SHORT_4_4_4_4,
        gl::UNSIGNED_SHORT_5_5_5_1,
    ],
    &[gl::FLOAT],
);

pub static RENDERBUFFER_FORMAT: Validator = Validator::new(
    "render_buffer_format",
    &[
        gl::RGBA4,
        gl::RGB565,
        gl::RGB5_A1,
        gl::DEPTH_COMPONENT16,
        gl::STENCIL_INDEX8,
    ],
    &[],
);

pub static RENDERBUFFER_TARGET: Validator =
    Validator::new("render_buffer_target", &[gl::RENDERBUFFER], &[]);

pub static SHADER_PARAMETER: Validator = Validator::new(
    "shader_parameter",
    &[
        gl::SHADER_TYPE,
        gl::DELETE_STATUS,
        gl::COMPILE_STATUS,
        gl::INFO_LOG_LENGTH,
        gl::SHADER_SOURCE_LENGTH,
    ],
    &[],
);

pub static SHADER_TYPE: Validator =
    Validator::new("shader_type", &[gl::VERTEX_SHADER, gl::FRAGMENT_SHADER], &[]);

pub static SRC_BLEND_FACTOR: Validator = Validator::new(
    "src_blend_factor",
    &[
        gl::ZERO,
        gl::ONE,
        gl::SRC_COLOR,
        gl::ONE_MINUS_SRC_COLOR,
        gl::SRC_ALPHA,
        gl::ONE_MINUS_SRC_ALPHA,
        gl::DST_ALPHA,
        gl::ONE_MINUS_DST_ALPHA,
        gl::DST_COLOR,
        gl::ONE_MINUS_DST_COLOR,
        gl::SRC_ALPHA_SATURATE,
        gl::CONSTANT_COLOR,
        gl::ONE_MINUS_CONSTANT_COLOR,
        gl::CONSTANT_ALPHA,
        gl::ONE_MINUS_CONSTANT_ALPHA,
    ],
    &[],
);

pub static STENCIL_OP: Validator = Validator::new(
    "stencil_op",
    &[
        gl::KEEP,
        gl::ZERO,
        gl::REPLACE,
        gl::INCR,
        gl::INCR_WRAP,
        gl::DECR,
        gl::DECR_WRAP,
        gl::INVERT,
    ],
    &[],
);

pub static STRING_TYPE: Validator = Validator::new(
    "string_type",
    &[
        gl::VENDOR,
        gl::RENDERER,
        gl::VERSION,
        gl::SHADING_LANGUAGE_VERSION,
        gl::EXTENSIONS,
    ],
    &[],
);

/// Targets accepted by `BindTexture` and friends.
pub static TEXTURE_BIND_TARGET: Validator = Validator::new(
    "texture_bind_target",
    &[gl::TEXTURE_2D, gl::TEXTURE_CUBE_MAP],
    &[gl::TEXTURE_3D, gl::TEXTURE_2D_ARRAY],
);

pub static TEXTURE_FORMAT: Validator = Validator::new(
    "texture_format",
    &[gl::ALPHA, gl::LUMINANCE, gl::LUMINANCE_ALPHA, gl::RGB, gl::RGBA],
    &[],
);

pub static TEXTURE_PARAMETER: Validator = Validator::new(
    "texture_parameter",
    &[
        gl::TEXTURE_MAG_FILTER,
        gl::TEXTURE_MIN_FILTER,
        gl::TEXTURE_WRAP_S,
        gl::TEXTURE_WRAP_T,
    ],
    &[gl::TEXTURE_WRAP_R],
);

/// Image targets accepted by `TexImage2D`/`TexSubImage2D`/`FramebufferTexture2D`.
pub static TEXTURE_TARGET: Validator = Validator::new(
    "texture_target",
    &[
        gl::TEXTURE_2D,
        gl::TEXTURE_CUBE_MAP_POSITIVE_X,
        gl::TEXTURE_CUBE_MAP_NEGATIVE_X,
        gl::TEXTURE_CUBE_MAP_POSITIVE_Y,
        gl::TEXTURE_CUBE_MAP_NEGATIVE_Y,
        gl::TEXTURE_CUBE_MAP_POSITIVE_Z,
        gl::TEXTURE_CUBE_MAP_NEGATIVE_Z,
    ],
    &[],
);

pub static TRANSFORM_FEEDBACK_BIND_TARGET: Validator =
    Validator::new("transform_feedback_bind_target", &[gl::TRANSFORM_FEEDBACK], &[]);

pub static TRANSFORM_FEEDBACK_PRIMITIVE_MODE: Validator = Validator::new(
    "transform_feedback_primitive_mode",
    &[gl::POINTS, gl::LINES, gl::TRIANGLES],
    &[],
);

pub static VALUEBUFFER_TARGET: Validator = Validator::new(
    "value_buffer_target",
    &[gl::SUBSCRIBED_VALUES_BUFFER_CHROMIUM],
    &[],
);

pub static VERTEX_ATTRIB_TYPE: Validator = Validator::new(
    "vertex_attrib_type",
    &[gl::BYTE, gl::UNSIGNED_BYTE, gl::SHORT, gl::UNSIGNED_SHORT, gl::FLOAT],
    &[gl::INT, gl::UNSIGNED_INT, gl::HALF_FLOAT],
);

/// Map from a texture image target (including cube faces) to the bind target it belongs to.
pub fn bind_target_for_image_target(target: u32) -> u32 {
    match target {
        gl::TEXTURE_CUBE_MAP_POSITIVE_X..=gl::TEXTURE_CUBE_MAP_NEGATIVE_Z => gl::TEXTURE_CUBE_MAP,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn es3_values_require_es3() {
        assert!(BUFFER_TARGET.is_valid(gl::ARRAY_BUFFER, false));
        assert!(!BUFFER_TARGET.is_valid(gl::UNIFORM_BUFFER, false));
        assert!(BUFFER_TARGET.is_valid(gl::UNIFORM_BUFFER, true));
        assert_eq!(BUFFER_TARGET.values(false).count(), 2);
        assert_eq!(BUFFER_TARGET.values(true).count(), 8);
    }
}
