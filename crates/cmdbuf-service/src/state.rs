//! Cross-command GL context state shadowed by the decoder.
//!
//! Everything here uses client ids. Service ids live in [`ResourceTables`](crate::ResourceTables).

use std::collections::{BTreeMap, BTreeSet};

use cmdbuf_protocol::gl::{self, GLenum};
use cmdbuf_protocol::{IdNamespace, ShmRef};

use crate::config::DecoderConfig;

/// Mailbox names are opaque 64-byte tokens.
pub type Mailbox = [u8; 64];

#[derive(Clone, Debug, PartialEq)]
pub struct VertexAttrib {
    pub enabled: bool,
    /// `ARRAY_BUFFER` binding captured by `VertexAttribPointer`.
    pub buffer: u32,
    pub size: i32,
    pub ty: GLenum,
    pub normalized: bool,
    pub stride: i32,
    pub offset: u32,
    /// Current generic value, raw bits of float or integer components.
    pub value: [u32; 4],
}

impl Default for VertexAttrib {
    fn default() -> Self {
        Self {
            enabled: false,
            buffer: 0,
            size: 4,
            ty: gl::FLOAT,
            normalized: false,
            stride: 0,
            offset: 0,
            value: [0, 0, 0, 1.0f32.to_bits()],
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BufferInfo {
    pub size: i32,
    pub usage: GLenum,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelInfo {
    pub width: i32,
    pub height: i32,
    pub format: GLenum,
    pub ty: GLenum,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TextureInfo {
    /// Defined images keyed by `(image target, level)`.
    pub levels: BTreeMap<(GLenum, i32), LevelInfo>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderbufferInfo {
    pub format: GLenum,
    pub width: i32,
    pub height: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Attachment {
    Texture { client_id: u32, target: GLenum, level: i32 },
    Renderbuffer { client_id: u32 },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderInfo {
    pub ty: GLenum,
    pub source: Option<String>,
    pub compiled: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProgramInfo {
    pub attached: BTreeSet<u32>,
    pub linked: bool,
    pub attrib_bindings: BTreeMap<String, u32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueryInfo {
    pub target: GLenum,
    /// Where the completion record goes.
    pub sync: ShmRef,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceEntry {
    pub category: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StencilState {
    pub func: GLenum,
    pub reference: i32,
    pub value_mask: u32,
    pub write_mask: u32,
    pub fail: GLenum,
    pub zfail: GLenum,
    pub zpass: GLenum,
}

impl Default for StencilState {
    fn default() -> Self {
        Self {
            func: gl::ALWAYS,
            reference: 0,
            value_mask: u32::MAX,
            write_mask: u32::MAX,
            fail: gl::KEEP,
            zfail: gl::KEEP,
            zpass: gl::KEEP,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BlendState {
    pub color: [f32; 4],
    pub equation: GLenum,
    pub src: GLenum,
    pub dst: GLenum,
}

impl Default for BlendState {
    fn default() -> Self {
        Self {
            color: [0.0; 4],
            equation: gl::FUNC_ADD,
            src: gl::ONE,
            dst: gl::ZERO,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ContextState {
    pub buffer_bindings: BTreeMap<GLenum, u32>,
    pub read_framebuffer: u32,
    pub draw_framebuffer: u32,
    pub renderbuffer: u32,
    /// Per texture unit, bind target -> client texture id.
    pub texture_units: Vec<BTreeMap<GLenum, u32>>,
    pub sampler_units: Vec<u32>,
    pub active_texture_unit: u32,
    pub current_program: u32,
    pub vertex_array: u32,
    pub valuebuffer: u32,
    pub transform_feedback: u32,
    /// Primitive mode of the active transform feedback, if any.
    pub transform_feedback_active: Option<GLenum>,

    pub pack_alignment: i32,
    pub unpack_alignment: i32,
    pub enabled: BTreeSet<GLenum>,
    pub viewport: [i32; 4],
    pub scissor: [i32; 4],
    pub clear_color: [f32; 4],
    pub clear_depth: f32,
    pub clear_stencil: i32,
    pub color_mask: [bool; 4],
    pub depth_mask: bool,
    pub depth_func: GLenum,
    pub cull_face: GLenum,
    pub front_face: GLenum,
    pub line_width: f32,
    pub generate_mipmap_hint: GLenum,
    pub blend: BlendState,
    pub stencil: StencilState,
    pub vertex_attribs: Vec<VertexAttrib>,
    pub draw_buffers: Vec<GLenum>,

    pub trace_stack: Vec<TraceEntry>,
    pub group_markers: Vec<String>,
    pub event_markers: Vec<String>,

    /// Query target -> client query id.
    pub active_queries: BTreeMap<GLenum, u32>,
    pub queries: BTreeMap<u32, QueryInfo>,
    pub buffers: BTreeMap<u32, BufferInfo>,
    pub textures: BTreeMap<u32, TextureInfo>,
    pub renderbuffers: BTreeMap<u32, RenderbufferInfo>,
    pub framebuffer_attachments: BTreeMap<u32, BTreeMap<GLenum, Attachment>>,
    pub programs: BTreeMap<u32, ProgramInfo>,
    pub shaders: BTreeMap<u32, ShaderInfo>,
    /// Produced mailboxes -> service texture id.
    pub mailboxes: BTreeMap<Mailbox, u32>,
}

impl ContextState {
    pub fn new(config: &DecoderConfig) -> Self {
        let units = config.max_texture_units as usize;
        let mut draw_buffers = vec![gl::NONE; config.max_draw_buffers as usize];
        if let Some(first) = draw_buffers.first_mut() {
            *first = gl::BACK;
        }
        Self {
            buffer_bindings: BTreeMap::new(),
            read_framebuffer: 0,
            draw_framebuffer: 0,
            renderbuffer: 0,
            texture_units: vec![BTreeMap::new(); units],
            sampler_units: vec![0; units],
            active_texture_unit: 0,
            current_program: 0,
            vertex_array: 0,
            valuebuffer: 0,
            transform_feedback: 0,
            transform_feedback_active: None,
            pack_alignment: 4,
            unpack_alignment: 4,
            enabled: BTreeSet::from([gl::DITHER]),
            viewport: [0; 4],
            scissor: [0; 4],
            clear_color: [0.0; 4],
            clear_depth: 1.0,
            clear_stencil: 0,
            color_mask: [true; 4],
            depth_mask: true,
            depth_func: gl::LESS,
            cull_face: gl::BACK,
            front_face: gl::CCW,
            line_width: 1.0,
            generate_mipmap_hint: gl::DONT_CARE,
            blend: BlendState::default(),
            stencil: StencilState::default(),
            vertex_attribs: vec![VertexAttrib::default(); config.max_vertex_attribs as usize],
            draw_buffers,
            trace_stack: Vec::new(),
            group_markers: Vec::new(),
            event_markers: Vec::new(),
            active_queries: BTreeMap::new(),
            queries: BTreeMap::new(),
            buffers: BTreeMap::new(),
            textures: BTreeMap::new(),
            renderbuffers: BTreeMap::new(),
            framebuffer_attachments: BTreeMap::new(),
            programs: BTreeMap::new(),
            shaders: BTreeMap::new(),
            mailboxes: BTreeMap::new(),
        }
    }

    pub fn bound_buffer(&self, target: GLenum) -> u32 {
        self.buffer_bindings.get(&target).copied().unwrap_or(0)
    }

    /// Texture bound to `target` on the active unit.
    pub fn bound_texture(&self, target: GLenum) -> u32 {
        self.texture_units
            .get(self.active_texture_unit as usize)
            .and_then(|unit| unit.get(&target))
            .copied()
            .unwrap_or(0)
    }

    pub fn set_bound_texture(&mut self, target: GLenum, texture: u32) {
        if let Some(unit) = self.texture_units.get_mut(self.active_texture_unit as usize) {
            unit.insert(target, texture);
        }
    }

    /// `GL_FRAMEBUFFER` reads back the draw binding.
    pub fn bound_framebuffer(&self, target: GLenum) -> u32 {
        match target {
            gl::READ_FRAMEBUFFER => self.read_framebuffer,
            _ => self.draw_framebuffer,
        }
    }

    pub fn set_bound_framebuffer(&mut self, target: GLenum, framebuffer: u32) {
        match target {
            gl::READ_FRAMEBUFFER => self.read_framebuffer = framebuffer,
            gl::DRAW_FRAMEBUFFER => self.draw_framebuffer = framebuffer,
            _ => {
                self.read_framebuffer = framebuffer;
                self.draw_framebuffer = framebuffer;
            }
        }
    }

    pub fn is_enabled(&self, cap: GLenum) -> bool {
        self.enabled.contains(&cap)
    }

    /// Drops every binding of a deleted object and forgets its shadow state.
    pub fn forget(&mut self, ns: IdNamespace, client_id: u32) {
        match ns {
            IdNamespace::Buffers => {
                self.buffer_bindings.retain(|_, id| *id != client_id);
                for attrib in &mut self.vertex_attribs {
                    if attrib.buffer == client_id {
                        attrib.buffer = 0;
                    }
                }
                self.buffers.remove(&client_id);
            }
            IdNamespace::Framebuffers => {
                if self.read_framebuffer == client_id {
                    self.read_framebuffer = 0;
                }
                if self.draw_framebuffer == client_id {
                    self.draw_framebuffer = 0;
                }
                self.framebuffer_attachments.remove(&client_id);
            }
            IdNamespace::Renderbuffers => {
                if self.renderbuffer == client_id {
                    self.renderbuffer = 0;
                }
                self.detach(|a| {
                    matches!(a, Attachment::Renderbuffer { client_id: id } if *id == client_id)
                });
                self.renderbuffers.remove(&client_id);
            }
            IdNamespace::Textures => {
                for unit in &mut self.texture_units {
                    unit.retain(|_, id| *id != client_id);
                }
                self.detach(|a| {
                    matches!(a, Attachment::Texture { client_id: id, .. } if *id == client_id)
                });
                self.textures.remove(&client_id);
            }
            IdNamespace::Queries => {
                self.active_queries.retain(|_, id| *id != client_id);
                self.queries.remove(&client_id);
            }
            IdNamespace::VertexArrays => {
                if self.vertex_array == client_id {
                    self.vertex_array = 0;
                }
            }
            IdNamespace::Samplers => {
                for unit in &mut self.sampler_units {
                    if *unit == client_id {
                        *unit = 0;
                    }
                }
            }
            IdNamespace::TransformFeedbacks => {
                if self.transform_feedback == client_id {
                    self.transform_feedback = 0;
                    self.transform_feedback_active = None;
                }
            }
            IdNamespace::Valuebuffers => {
                if self.valuebuffer == client_id {
                    self.valuebuffer = 0;
                }
            }
            IdNamespace::ProgramsAndShaders => {
                self.programs.remove(&client_id);
                self.shaders.remove(&client_id);
            }
            IdNamespace::Syncs => {}
        }
    }

    fn detach(&mut self, matches: impl Fn(&Attachment) -> bool) {
        for attachments in self.framebuffer_attachments.values_mut() {
            attachments.retain(|_, a| !matches(a));
        }
    }

    /// Current value of a `Get*v` state parameter.
    pub fn query(&self, pname: GLenum, config: &DecoderConfig) -> Option<StateValue> {
        use StateValue::*;

        let int = |v: u32| Some(Ints(vec![v as i32]));
        let value = match pname {
            gl::ACTIVE_TEXTURE => return int(gl::TEXTURE0 + self.active_texture_unit),
            gl::ARRAY_BUFFER_BINDING => return int(self.bound_buffer(gl::ARRAY_BUFFER)),
            gl::ELEMENT_ARRAY_BUFFER_BINDING => {
                return int(self.bound_buffer(gl::ELEMENT_ARRAY_BUFFER))
            }
            gl::CURRENT_PROGRAM => return int(self.current_program),
            gl::FRAMEBUFFER_BINDING => return int(self.draw_framebuffer),
            gl::RENDERBUFFER_BINDING => return int(self.renderbuffer),
            gl::TEXTURE_BINDING_2D => return int(self.bound_texture(gl::TEXTURE_2D)),
            gl::TEXTURE_BINDING_CUBE_MAP => return int(self.bound_texture(gl::TEXTURE_CUBE_MAP)),
            gl::VERTEX_ARRAY_BINDING_OES => return int(self.vertex_array),
            gl::MAX_VERTEX_ATTRIBS => return int(config.max_vertex_attribs),
            gl::MAX_TEXTURE_IMAGE_UNITS | gl::MAX_COMBINED_TEXTURE_IMAGE_UNITS => {
                return int(config.max_texture_units)
            }
            gl::MAX_TEXTURE_SIZE => return int(config.max_texture_size),
            gl::MAX_RENDERBUFFER_SIZE => return int(config.max_renderbuffer_size),
            gl::MAX_DRAW_BUFFERS => return int(config.max_draw_buffers),
            gl::PACK_ALIGNMENT => Ints(vec![self.pack_alignment]),
            gl::UNPACK_ALIGNMENT => Ints(vec![self.unpack_alignment]),
            gl::STENCIL_CLEAR_VALUE => Ints(vec![self.clear_stencil]),
            gl::VIEWPORT => Ints(self.viewport.to_vec()),
            gl::SCISSOR_BOX => Ints(self.scissor.to_vec()),
            gl::COLOR_CLEAR_VALUE => Floats(self.clear_color.to_vec()),
            gl::DEPTH_CLEAR_VALUE => Floats(vec![self.clear_depth]),
            gl::LINE_WIDTH => Floats(vec![self.line_width]),
            gl::COLOR_WRITEMASK => Bools(self.color_mask.to_vec()),
            gl::DEPTH_WRITEMASK => Bools(vec![self.depth_mask]),
            gl::BLEND
            | gl::CULL_FACE
            | gl::DEPTH_TEST
            | gl::DITHER
            | gl::POLYGON_OFFSET_FILL
            | gl::SAMPLE_ALPHA_TO_COVERAGE
            | gl::SAMPLE_COVERAGE
            | gl::SCISSOR_TEST
            | gl::STENCIL_TEST
            | gl::RASTERIZER_DISCARD
            | gl::PRIMITIVE_RESTART_FIXED_INDEX => Bools(vec![self.is_enabled(pname)]),
            _ => return None,
        };
        Some(value)
    }
}

/// Number of values a `Get*v` state parameter returns.
pub fn state_value_count(pname: GLenum) -> u32 {
    match pname {
        gl::VIEWPORT | gl::SCISSOR_BOX | gl::COLOR_CLEAR_VALUE | gl::COLOR_WRITEMASK => 4,
        _ => 1,
    }
}

/// A state parameter in its natural type, converted on demand like `glGet*v` does.
#[derive(Clone, Debug, PartialEq)]
pub enum StateValue {
    Ints(Vec<i32>),
    Floats(Vec<f32>),
    Bools(Vec<bool>),
}

impl StateValue {
    pub fn to_ints(&self) -> Vec<i32> {
        match self {
            StateValue::Ints(v) => v.clone(),
            StateValue::Floats(v) => v.iter().map(|f| f.round() as i32).collect(),
            StateValue::Bools(v) => v.iter().map(|&b| i32::from(b)).collect(),
        }
    }

    pub fn to_floats(&self) -> Vec<f32> {
        match self {
            StateValue::Ints(v) => v.iter().map(|&i| i as f32).collect(),
            StateValue::Floats(v) => v.clone(),
            StateValue::Bools(v) => v.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect(),
        }
    }

    pub fn to_bools(&self) -> Vec<u8> {
        match self {
            StateValue::Ints(v) => v.iter().map(|&i| u8::from(i != 0)).collect(),
            StateValue::Floats(v) => v.iter().map(|&f| u8::from(f != 0.0)).collect(),
            StateValue::Bools(v) => v.iter().map(|&b| u8::from(b)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framebuffer_target_binds_both_read_and_draw() {
        let mut state = ContextState::new(&DecoderConfig::default());
        state.set_bound_framebuffer(gl::FRAMEBUFFER, 3);
        assert_eq!((state.read_framebuffer, state.draw_framebuffer), (3, 3));
        state.set_bound_framebuffer(gl::READ_FRAMEBUFFER, 4);
        assert_eq!(state.bound_framebuffer(gl::FRAMEBUFFER), 3);
        assert_eq!(state.bound_framebuffer(gl::READ_FRAMEBUFFER), 4);
    }

    #[test]
    fn forgetting_a_texture_unbinds_and_detaches_it() {
        let mut state = ContextState::new(&DecoderConfig::default());
        state.set_bound_texture(gl::TEXTURE_2D, 7);
        state.framebuffer_attachments.entry(1).or_default().insert(
            gl::COLOR_ATTACHMENT0,
            Attachment::Texture {
                client_id: 7,
                target: gl::TEXTURE_2D,
                level: 0,
            },
        );
        state.forget(IdNamespace::Textures, 7);
        assert_eq!(state.bound_texture(gl::TEXTURE_2D), 0);
        assert!(state.framebuffer_attachments[&1].is_empty());
    }

    #[test]
    fn state_values_convert_between_types() {
        let state = ContextState::new(&DecoderConfig::default());
        let config = DecoderConfig::default();
        assert_eq!(
            state.query(gl::DITHER, &config).map(|v| v.to_ints()),
            Some(vec![1])
        );
        assert_eq!(
            state.query(gl::LINE_WIDTH, &config).map(|v| v.to_bools()),
            Some(vec![1])
        );
        assert_eq!(
            state.query(gl::MAX_DRAW_BUFFERS, &config).map(|v| v.to_floats()),
            Some(vec![8.0])
        );
        assert_eq!(state_value_count(gl::VIEWPORT), 4);
    }
}
