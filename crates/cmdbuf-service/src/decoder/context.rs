//! Fixed-function state setters and state queries.

use cmdbuf_protocol::gl;
use cmdbuf_protocol::{CommandId, CommandView, ParseError, ParseResult};

use crate::backend::GlBackend;
use crate::shared_memory::CommandBufferEngine;

use super::Decoder;

const VENDOR: &str = "Chromium";
const RENDERER: &str = "Chromium";

impl<E: CommandBufferEngine, B: GlBackend> Decoder<E, B> {
    pub(super) fn active_texture(&mut self, view: &CommandView<'_>) -> ParseResult {
        let unit = view.arg(0).wrapping_sub(gl::TEXTURE0);
        if unit >= self.config.max_texture_units {
            self.set_error(view, gl::INVALID_ENUM, "texture unit out of range");
            return Ok(());
        }
        self.state.active_texture_unit = unit;
        self.forward(view, &[]);
        Ok(())
    }

    /// Setters whose arguments are already fully checked by field validation, plus the few
    /// with value constraints of their own.
    pub(super) fn set_state(&mut self, view: &CommandView<'_>) -> ParseResult {
        use CommandId::*;

        let floats = || [0, 1, 2, 3].map(|idx| view.f32_arg(idx));
        let ints = || [0, 1, 2, 3].map(|idx| view.i32_arg(idx));
        let state = &mut self.state;
        match view.id() {
            BlendColor => state.blend.color = floats(),
            BlendEquation => state.blend.equation = view.arg(0),
            BlendFunc => {
                state.blend.src = view.arg(0);
                state.blend.dst = view.arg(1);
            }
            ClearColor => state.clear_color = floats(),
            ClearDepthf => state.clear_depth = view.f32_arg(0).clamp(0.0, 1.0),
            ClearStencil => state.clear_stencil = view.i32_arg(0),
            ColorMask => state.color_mask = [0, 1, 2, 3].map(|idx| view.bool_arg(idx)),
            CullFace => state.cull_face = view.arg(0),
            DepthFunc => state.depth_func = view.arg(0),
            DepthMask => state.depth_mask = view.bool_arg(0),
            FrontFace => state.front_face = view.arg(0),
            Hint => state.generate_mipmap_hint = view.arg(1),
            LineWidth => {
                let width = view.f32_arg(0);
                if !(width > 0.0) {
                    self.set_error(view, gl::INVALID_VALUE, "width must be positive");
                    return Ok(());
                }
                state.line_width = width;
            }
            StencilFunc => {
                state.stencil.func = view.arg(0);
                state.stencil.reference = view.i32_arg(1);
                state.stencil.value_mask = view.arg(2);
            }
            StencilMask => state.stencil.write_mask = view.arg(0),
            StencilOp => {
                state.stencil.fail = view.arg(0);
                state.stencil.zfail = view.arg(1);
                state.stencil.zpass = view.arg(2);
            }
            Scissor => state.scissor = ints(),
            Viewport => state.viewport = ints(),
            _ => {}
        }
        self.forward(view, &[]);
        Ok(())
    }

    pub(super) fn enable_cap(&mut self, view: &CommandView<'_>) -> ParseResult {
        let cap = view.arg(0);
        if view.id() == CommandId::Enable {
            self.state.enabled.insert(cap);
        } else {
            self.state.enabled.remove(&cap);
        }
        self.forward(view, &[]);
        Ok(())
    }

    pub(super) fn is_enabled(&mut self, view: &CommandView<'_>) -> ParseResult {
        let enabled = self.state.is_enabled(view.arg(0));
        self.write_u32_result(view.shm_arg(1), u32::from(enabled))
    }

    pub(super) fn pixel_store(&mut self, view: &CommandView<'_>) -> ParseResult {
        let (pname, param) = (view.arg(0), view.i32_arg(1));
        if !matches!(param, 1 | 2 | 4 | 8) {
            self.set_error(view, gl::INVALID_VALUE, "alignment must be 1, 2, 4 or 8");
            return Ok(());
        }
        match pname {
            gl::PACK_ALIGNMENT => self.state.pack_alignment = param,
            _ => self.state.unpack_alignment = param,
        }
        self.forward(view, &[]);
        Ok(())
    }

    /// `GetBooleanv` / `GetFloatv` / `GetIntegerv`, answered from shadowed state.
    pub(super) fn get_state(&mut self, view: &CommandView<'_>) -> ParseResult {
        let (pname, params) = (view.arg(0), view.shm_arg(1));
        let empty = match view.id() {
            CommandId::GetBooleanv => self.sized_result_is_empty::<u8>(params)?,
            _ => self.sized_result_is_empty::<i32>(params)?,
        };
        if !empty {
            return Err(ParseError::InvalidArguments);
        }

        let Some(value) = self.state.query(pname, &self.config) else {
            self.set_error(view, gl::INVALID_ENUM, "pname");
            return Ok(());
        };
        match view.id() {
            CommandId::GetBooleanv => self.write_sized(params, &value.to_bools()),
            CommandId::GetFloatv => self.write_sized(params, &value.to_floats()),
            _ => self.write_sized(params, &value.to_ints()),
        }
    }

    pub(super) fn get_string(&mut self, view: &CommandView<'_>) -> ParseResult {
        let es3 = self.config.unsafe_es3_apis_enabled;
        let value = match view.arg(0) {
            gl::VENDOR => VENDOR.to_owned(),
            gl::RENDERER => RENDERER.to_owned(),
            gl::VERSION if es3 => "OpenGL ES 3.0 Chromium".to_owned(),
            gl::VERSION => "OpenGL ES 2.0 Chromium".to_owned(),
            gl::SHADING_LANGUAGE_VERSION if es3 => "OpenGL ES GLSL ES 3.0 Chromium".to_owned(),
            gl::SHADING_LANGUAGE_VERSION => "OpenGL ES GLSL ES 1.0 Chromium".to_owned(),
            _ => self.config.extensions.join(" "),
        };
        self.buckets.create(view.arg(1)).set_from_string(&value);
        Ok(())
    }

    pub(super) fn get_error(&mut self, view: &CommandView<'_>) -> ParseResult {
        let error = self.take_error();
        self.write_u32_result(view.shm_arg(0), error)
    }
}
