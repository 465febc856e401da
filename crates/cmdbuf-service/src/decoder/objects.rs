//! Object lifetimes: ids, bindings, programs and shaders.

use std::collections::BTreeSet;

use cmdbuf_protocol::gl::{self, GLenum};
use cmdbuf_protocol::IdNamespace::{self, *};
use cmdbuf_protocol::{
    le_u32s, ActiveInfoResult, CommandId, CommandView, ParseError, ParseResult,
};

use crate::backend::{GlBackend, VariableKind};
use crate::resources::ObjectEntry;
use crate::shared_memory::CommandBufferEngine;
use crate::state::{ProgramInfo, ShaderInfo};

use super::Decoder;

fn object_namespace(id: CommandId) -> IdNamespace {
    use CommandId::*;

    match id {
        GenBuffersImmediate | DeleteBuffersImmediate | BindBuffer | IsBuffer => Buffers,
        GenFramebuffersImmediate | DeleteFramebuffersImmediate | BindFramebuffer
        | IsFramebuffer => Framebuffers,
        GenRenderbuffersImmediate | DeleteRenderbuffersImmediate | BindRenderbuffer
        | IsRenderbuffer => Renderbuffers,
        GenTexturesImmediate | DeleteTexturesImmediate | BindTexture | IsTexture => Textures,
        GenSamplersImmediate | DeleteSamplersImmediate | BindSampler => Samplers,
        GenTransformFeedbacksImmediate
        | DeleteTransformFeedbacksImmediate
        | BindTransformFeedback => TransformFeedbacks,
        GenQueriesEXTImmediate | DeleteQueriesEXTImmediate => Queries,
        GenVertexArraysOESImmediate
        | DeleteVertexArraysOESImmediate
        | BindVertexArrayOES
        | IsVertexArrayOES => VertexArrays,
        GenValuebuffersCHROMIUMImmediate
        | DeleteValuebuffersCHROMIUMImmediate
        | BindValuebufferCHROMIUM
        | IsValuebufferCHROMIUM => Valuebuffers,
        IsSync => Syncs,
        _ => ProgramsAndShaders,
    }
}

/// Namespaces whose objects a `Bind*` may create when the client never generated the id.
fn generated_on_bind(ns: IdNamespace) -> bool {
    matches!(ns, Buffers | Framebuffers | Renderbuffers | Textures)
}

/// Whether an object first bound to `existing` may not be bound to `target`.
fn target_conflicts(ns: IdNamespace, existing: GLenum, target: GLenum) -> bool {
    if existing == 0 || existing == target {
        return false;
    }
    match ns {
        Textures => true,
        Buffers => existing == gl::ELEMENT_ARRAY_BUFFER || target == gl::ELEMENT_ARRAY_BUFFER,
        _ => false,
    }
}

impl<E: CommandBufferEngine, B: GlBackend> Decoder<E, B> {
    pub(super) fn gen_objects(&mut self, view: &CommandView<'_>, data: &[u8]) -> ParseResult {
        let ns = object_namespace(view.id());
        let ids: Vec<u32> = le_u32s(data).collect();
        let mut seen = BTreeSet::new();
        if ids
            .iter()
            .any(|&id| id == 0 || !seen.insert(id) || self.resources.contains(ns, id))
        {
            return Err(ParseError::InvalidArguments);
        }

        let service_ids = self.backend.gen_objects(ns, ids.len());
        for (client_id, service_id) in ids.into_iter().zip(service_ids) {
            self.resources
                .insert(ns, client_id, ObjectEntry::new(service_id));
        }
        Ok(())
    }

    /// Unknown and zero ids are ignored.
    pub(super) fn delete_objects(&mut self, view: &CommandView<'_>, data: &[u8]) -> ParseResult {
        let ns = object_namespace(view.id());
        if ns == TransformFeedbacks && self.state.transform_feedback_active.is_some() {
            let bound = self.state.transform_feedback;
            if le_u32s(data).any(|id| id != 0 && id == bound) {
                self.set_error(view, gl::INVALID_OPERATION, "transform feedback is active");
                return Ok(());
            }
        }

        let mut service_ids = Vec::new();
        for client_id in le_u32s(data).filter(|&id| id != 0) {
            if let Some(entry) = self.resources.remove(ns, client_id) {
                self.state.forget(ns, client_id);
                service_ids.push(entry.service_id);
            }
        }
        if !service_ids.is_empty() {
            self.backend.delete_objects(ns, &service_ids);
        }
        Ok(())
    }

    pub(super) fn bind_object(&mut self, view: &CommandView<'_>) -> ParseResult {
        use CommandId::*;

        let id = view.id();
        let ns = object_namespace(id);
        let (target, client_id) = match id {
            BindVertexArrayOES => (0, view.arg(0)),
            BindSampler => (0, view.arg(1)),
            _ => (view.arg(0), view.arg(1)),
        };

        if id == BindSampler && view.arg(0) >= self.config.max_texture_units {
            self.set_error(view, gl::INVALID_VALUE, "unit out of range");
            return Ok(());
        }
        if id == BindTransformFeedback && self.state.transform_feedback_active.is_some() {
            self.set_error(view, gl::INVALID_OPERATION, "transform feedback is active");
            return Ok(());
        }

        if client_id != 0 {
            match self.resources.get(ns, client_id).map(|entry| entry.target) {
                Some(existing) if target_conflicts(ns, existing, target) => {
                    self.set_error(view, gl::INVALID_OPERATION, "object bound to another target");
                    return Ok(());
                }
                Some(_) => {}
                None if self.config.bind_generates_resource && generated_on_bind(ns) => {
                    let service_id = self.backend.gen_objects(ns, 1).first().copied().unwrap_or(0);
                    self.resources
                        .insert(ns, client_id, ObjectEntry::new(service_id));
                }
                None => {
                    self.set_error(view, gl::INVALID_OPERATION, "id not generated");
                    return Ok(());
                }
            }
            if let Some(entry) = self.resources.get_mut(ns, client_id) {
                entry.bound = true;
                if entry.target == 0 {
                    entry.target = target;
                }
            }
        }

        match id {
            BindBuffer => {
                self.state.buffer_bindings.insert(target, client_id);
            }
            BindFramebuffer => self.state.set_bound_framebuffer(target, client_id),
            BindRenderbuffer => self.state.renderbuffer = client_id,
            BindSampler => {
                let unit = view.arg(0) as usize;
                if let Some(slot) = self.state.sampler_units.get_mut(unit) {
                    *slot = client_id;
                }
            }
            BindTexture => {
                if client_id != 0 {
                    self.state.textures.entry(client_id).or_default();
                }
                self.state.set_bound_texture(target, client_id);
            }
            BindTransformFeedback => self.state.transform_feedback = client_id,
            BindVertexArrayOES => self.state.vertex_array = client_id,
            _ => self.state.valuebuffer = client_id,
        }
        self.forward(view, &[]);
        Ok(())
    }

    /// Objects count as existing once they have been bound; programs, shaders and syncs once
    /// they have been created.
    pub(super) fn is_object(&mut self, view: &CommandView<'_>) -> ParseResult {
        let client_id = view.arg(0);
        let exists = match view.id() {
            CommandId::IsProgram => self.state.programs.contains_key(&client_id),
            CommandId::IsShader => self.state.shaders.contains_key(&client_id),
            CommandId::IsSync => self.resources.contains(Syncs, client_id),
            id => self
                .resources
                .get(object_namespace(id), client_id)
                .is_some_and(|entry| entry.bound),
        };
        self.write_u32_result(view.shm_arg(1), u32::from(exists))
    }

    pub(super) fn create_program_or_shader(&mut self, view: &CommandView<'_>) -> ParseResult {
        let (ty, client_id) = match view.id() {
            CommandId::CreateShader => (Some(view.arg(0)), view.arg(1)),
            _ => (None, view.arg(0)),
        };
        if client_id == 0 || self.resources.contains(ProgramsAndShaders, client_id) {
            return Err(ParseError::InvalidArguments);
        }

        let service_id = self
            .backend
            .gen_objects(ProgramsAndShaders, 1)
            .first()
            .copied()
            .unwrap_or(0);
        self.resources
            .insert(ProgramsAndShaders, client_id, ObjectEntry::new(service_id));
        match ty {
            Some(ty) => {
                self.state.shaders.insert(
                    client_id,
                    ShaderInfo {
                        ty,
                        source: None,
                        compiled: false,
                    },
                );
            }
            None => {
                self.state.programs.insert(client_id, ProgramInfo::default());
            }
        }
        Ok(())
    }

    pub(super) fn delete_program_or_shader(&mut self, view: &CommandView<'_>) -> ParseResult {
        let client_id = view.arg(0);
        if client_id == 0 {
            return Ok(());
        }
        let exists = match view.id() {
            CommandId::DeleteProgram => self.state.programs.contains_key(&client_id),
            _ => self.state.shaders.contains_key(&client_id),
        };
        if !exists {
            self.set_error(view, gl::INVALID_VALUE, "unknown id");
            return Ok(());
        }

        if let Some(entry) = self.resources.remove(ProgramsAndShaders, client_id) {
            self.backend
                .delete_objects(ProgramsAndShaders, &[entry.service_id]);
        }
        self.state.forget(ProgramsAndShaders, client_id);
        Ok(())
    }

    pub(super) fn attach_shader(&mut self, view: &CommandView<'_>) -> ParseResult {
        let (program, shader) = (view.arg(0), view.arg(1));
        let Some(shader_ty) = self.state.shaders.get(&shader).map(|s| s.ty) else {
            self.set_error(view, gl::INVALID_VALUE, "unknown shader");
            return Ok(());
        };
        let Some(info) = self.state.programs.get(&program) else {
            self.set_error(view, gl::INVALID_VALUE, "unknown program");
            return Ok(());
        };
        let same_type_attached = info
            .attached
            .iter()
            .any(|id| self.state.shaders.get(id).is_some_and(|s| s.ty == shader_ty));
        if same_type_attached {
            self.set_error(view, gl::INVALID_OPERATION, "shader of this type already attached");
            return Ok(());
        }

        if let Some(info) = self.state.programs.get_mut(&program) {
            info.attached.insert(shader);
        }
        self.forward(view, &[]);
        Ok(())
    }

    pub(super) fn bind_attrib_location(&mut self, view: &CommandView<'_>) -> ParseResult {
        let name = self.bucket_string(view.arg(2))?;
        let (program, index) = (view.arg(0), view.arg(1));
        if index >= self.config.max_vertex_attribs {
            self.set_error(view, gl::INVALID_VALUE, "index out of range");
            return Ok(());
        }
        if name.starts_with("gl_") {
            self.set_error(view, gl::INVALID_OPERATION, "reserved prefix");
            return Ok(());
        }
        let Some(info) = self.state.programs.get_mut(&program) else {
            self.set_error(view, gl::INVALID_VALUE, "unknown program");
            return Ok(());
        };
        info.attrib_bindings.insert(name.clone(), index);
        self.forward(view, name.as_bytes());
        Ok(())
    }

    pub(super) fn shader_source(&mut self, view: &CommandView<'_>) -> ParseResult {
        let source = self.bucket_string(view.arg(1))?;
        let Some(info) = self.state.shaders.get_mut(&view.arg(0)) else {
            self.set_error(view, gl::INVALID_VALUE, "unknown shader");
            return Ok(());
        };
        info.source = Some(source.clone());
        info.compiled = false;
        self.forward(view, source.as_bytes());
        Ok(())
    }

    pub(super) fn compile_shader(&mut self, view: &CommandView<'_>) -> ParseResult {
        let Some(info) = self.state.shaders.get_mut(&view.arg(0)) else {
            self.set_error(view, gl::INVALID_VALUE, "unknown shader");
            return Ok(());
        };
        info.compiled = info.source.is_some();
        self.forward(view, &[]);
        Ok(())
    }

    /// A program links when it has a compiled vertex and fragment shader attached.
    pub(super) fn link_program(&mut self, view: &CommandView<'_>) -> ParseResult {
        let program = view.arg(0);
        let Some(info) = self.state.programs.get(&program) else {
            self.set_error(view, gl::INVALID_VALUE, "unknown program");
            return Ok(());
        };
        let mut types = BTreeSet::new();
        let mut all_compiled = true;
        for shader in &info.attached {
            match self.state.shaders.get(shader) {
                Some(s) => {
                    types.insert(s.ty);
                    all_compiled &= s.compiled;
                }
                None => all_compiled = false,
            }
        }
        let linked = all_compiled
            && types.contains(&gl::VERTEX_SHADER)
            && types.contains(&gl::FRAGMENT_SHADER);

        if let Some(info) = self.state.programs.get_mut(&program) {
            info.linked = linked;
        }
        self.forward(view, &[]);
        Ok(())
    }

    pub(super) fn use_program(&mut self, view: &CommandView<'_>) -> ParseResult {
        let program = view.arg(0);
        if self.state.transform_feedback_active.is_some() {
            self.set_error(view, gl::INVALID_OPERATION, "transform feedback is active");
            return Ok(());
        }
        if program != 0 {
            match self.state.programs.get(&program).map(|info| info.linked) {
                None => {
                    self.set_error(view, gl::INVALID_VALUE, "unknown program");
                    return Ok(());
                }
                Some(false) => {
                    self.set_error(view, gl::INVALID_OPERATION, "program not linked");
                    return Ok(());
                }
                Some(true) => {}
            }
        }
        self.state.current_program = program;
        self.forward(view, &[]);
        Ok(())
    }

    pub(super) fn get_programiv(&mut self, view: &CommandView<'_>) -> ParseResult {
        let (program, pname, params) = (view.arg(0), view.arg(1), view.shm_arg(2));
        if !self.sized_result_is_empty::<i32>(params)? {
            return Err(ParseError::InvalidArguments);
        }
        let Some(info) = self.state.programs.get(&program) else {
            self.set_error(view, gl::INVALID_VALUE, "unknown program");
            return Ok(());
        };
        let (linked, attached) = (info.linked, info.attached.len() as i32);
        let service_id = self
            .resources
            .service_id(ProgramsAndShaders, program)
            .unwrap_or(0);

        let value = match pname {
            gl::LINK_STATUS | gl::VALIDATE_STATUS => i32::from(linked),
            gl::ATTACHED_SHADERS => attached,
            gl::ACTIVE_ATTRIBUTES if linked => {
                self.backend
                    .active_variable_count(service_id, VariableKind::Attrib) as i32
            }
            gl::ACTIVE_UNIFORMS if linked => {
                self.backend
                    .active_variable_count(service_id, VariableKind::Uniform) as i32
            }
            _ => 0,
        };
        self.write_sized(params, &[value])
    }

    pub(super) fn get_shaderiv(&mut self, view: &CommandView<'_>) -> ParseResult {
        let (shader, pname, params) = (view.arg(0), view.arg(1), view.shm_arg(2));
        if !self.sized_result_is_empty::<i32>(params)? {
            return Err(ParseError::InvalidArguments);
        }
        let Some(info) = self.state.shaders.get(&shader) else {
            self.set_error(view, gl::INVALID_VALUE, "unknown shader");
            return Ok(());
        };
        let value = match pname {
            gl::SHADER_TYPE => info.ty as i32,
            gl::COMPILE_STATUS => i32::from(info.compiled),
            gl::SHADER_SOURCE_LENGTH => info.source.as_ref().map_or(0, |s| s.len() as i32 + 1),
            _ => 0,
        };
        self.write_sized(params, &[value])
    }

    /// `GetAttribLocation` / `GetUniformLocation`. The result must arrive as `-1`.
    pub(super) fn get_location(&mut self, view: &CommandView<'_>) -> ParseResult {
        let name = self.bucket_string(view.arg(1))?;
        let (program, location_shm) = (view.arg(0), view.shm_arg(2));
        if self.read_u32_result(location_shm)? as i32 != -1 {
            return Err(ParseError::InvalidArguments);
        }
        let Some(info) = self.state.programs.get(&program) else {
            self.set_error(view, gl::INVALID_VALUE, "unknown program");
            return Ok(());
        };
        if !info.linked {
            self.set_error(view, gl::INVALID_OPERATION, "program not linked");
            return Ok(());
        }

        let kind = match view.id() {
            CommandId::GetAttribLocation => VariableKind::Attrib,
            _ => VariableKind::Uniform,
        };
        let bound = match kind {
            VariableKind::Attrib => info.attrib_bindings.get(&name).map(|&idx| idx as i32),
            VariableKind::Uniform => None,
        };
        let location = match bound {
            Some(location) => location,
            None => {
                let service_id = self
                    .resources
                    .service_id(ProgramsAndShaders, program)
                    .unwrap_or(0);
                self.backend.variable_location(service_id, kind, &name)
            }
        };
        self.write_u32_result(location_shm, location as u32)
    }

    /// `GetActiveAttrib` / `GetActiveUniform`. The name goes to the bucket, the rest to the
    /// result, whose `success` must arrive as zero.
    pub(super) fn get_active(&mut self, view: &CommandView<'_>) -> ParseResult {
        let (program, index, bucket_id, result) =
            (view.arg(0), view.arg(1), view.arg(2), view.shm_arg(3));
        let current = self
            .engine
            .resolve(result, ActiveInfoResult::SIZE_BYTES as u32)
            .map(|bytes| ActiveInfoResult::read_from(bytes).unwrap_or_default())?;
        if current.success != 0 {
            return Err(ParseError::InvalidArguments);
        }
        if !self.state.programs.contains_key(&program) {
            self.set_error(view, gl::INVALID_VALUE, "unknown program");
            return Ok(());
        }

        let kind = match view.id() {
            CommandId::GetActiveAttrib => VariableKind::Attrib,
            _ => VariableKind::Uniform,
        };
        let service_id = self
            .resources
            .service_id(ProgramsAndShaders, program)
            .unwrap_or(0);
        let Some(var) = self.backend.active_variable(service_id, kind, index) else {
            self.set_error(view, gl::INVALID_VALUE, "index out of range");
            return Ok(());
        };

        self.buckets.create(bucket_id).set_from_string(&var.name);
        let info = ActiveInfoResult {
            success: 1,
            size: var.size,
            ty: var.ty,
        };
        self.write_result(result, info.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use cmdbuf_protocol::gl;
    use cmdbuf_protocol::{Command, CommandId, IdNamespace, ParseError, ParseResult};

    use crate::backend::RecordingBackend;
    use crate::config::DecoderConfig;
    use crate::decoder::Decoder;
    use crate::shared_memory::TransferBufferManager;

    type TestDecoder = Decoder<TransferBufferManager, RecordingBackend>;

    fn decoder(config: DecoderConfig) -> TestDecoder {
        Decoder::new(TransferBufferManager::new(), RecordingBackend::new(), config)
    }

    fn run(d: &mut TestDecoder, cmd: Command) -> ParseResult {
        d.execute(&cmd.encode().unwrap()).1
    }

    fn ids(id: CommandId, ids: &[u32]) -> Command {
        Command::new(id).arg(ids.len() as i32).with_u32_data(ids)
    }

    #[test]
    fn gen_rejects_zero_duplicate_and_used_ids() {
        let mut d = decoder(DecoderConfig::default());
        assert_eq!(run(&mut d, ids(CommandId::GenTexturesImmediate, &[1, 2])), Ok(()));
        assert_eq!(
            run(&mut d, ids(CommandId::GenTexturesImmediate, &[0])),
            Err(ParseError::InvalidArguments)
        );
        assert_eq!(
            run(&mut d, ids(CommandId::GenTexturesImmediate, &[3, 3])),
            Err(ParseError::InvalidArguments)
        );
        assert_eq!(
            run(&mut d, ids(CommandId::GenTexturesImmediate, &[2])),
            Err(ParseError::InvalidArguments)
        );
        assert_eq!(d.resources().len(IdNamespace::Textures), 2);
    }

    #[test]
    fn delete_unbinds_and_ignores_unknown_ids() {
        let mut d = decoder(DecoderConfig::default());
        run(&mut d, ids(CommandId::GenBuffersImmediate, &[4])).unwrap();
        run(&mut d, Command::new(CommandId::BindBuffer).arg(gl::ARRAY_BUFFER).arg(4u32)).unwrap();
        let service = d.resources().service_id(IdNamespace::Buffers, 4).unwrap();

        run(&mut d, ids(CommandId::DeleteBuffersImmediate, &[4, 99])).unwrap();
        assert_eq!(d.state().bound_buffer(gl::ARRAY_BUFFER), 0);
        assert_eq!(d.backend().deleted(), &[(IdNamespace::Buffers, service)]);
        assert_eq!(d.take_error(), gl::NO_ERROR);
    }

    #[test]
    fn bind_generates_unknown_ids_only_when_allowed() {
        let mut d = decoder(DecoderConfig::default());
        run(&mut d, Command::new(CommandId::BindTexture).arg(gl::TEXTURE_2D).arg(8u32)).unwrap();
        assert!(d.resources().contains(IdNamespace::Textures, 8));

        let mut d = decoder(DecoderConfig {
            bind_generates_resource: false,
            ..DecoderConfig::default()
        });
        run(&mut d, Command::new(CommandId::BindTexture).arg(gl::TEXTURE_2D).arg(8u32)).unwrap();
        assert!(!d.resources().contains(IdNamespace::Textures, 8));
        assert_eq!(d.take_error(), gl::INVALID_OPERATION);
        assert!(d.backend().calls().is_empty());
    }

    #[test]
    fn texture_cannot_change_target() {
        let mut d = decoder(DecoderConfig::default());
        run(&mut d, Command::new(CommandId::BindTexture).arg(gl::TEXTURE_2D).arg(1u32)).unwrap();
        let bind = Command::new(CommandId::BindTexture)
            .arg(gl::TEXTURE_CUBE_MAP)
            .arg(1u32);
        run(&mut d, bind).unwrap();
        assert_eq!(d.take_error(), gl::INVALID_OPERATION);
        assert_eq!(d.state().bound_texture(gl::TEXTURE_CUBE_MAP), 0);
    }

    #[test]
    fn vertex_arrays_are_never_generated_on_bind() {
        let mut d = decoder(DecoderConfig::default());
        run(&mut d, Command::new(CommandId::BindVertexArrayOES).arg(5u32)).unwrap();
        assert_eq!(d.take_error(), gl::INVALID_OPERATION);
        run(&mut d, ids(CommandId::GenVertexArraysOESImmediate, &[5])).unwrap();
        run(&mut d, Command::new(CommandId::BindVertexArrayOES).arg(5u32)).unwrap();
        assert_eq!(d.state().vertex_array, 5);
        assert_eq!(d.take_error(), gl::NO_ERROR);
    }

    #[test]
    fn program_must_link_before_use() {
        let mut d = decoder(DecoderConfig::default());
        run(&mut d, Command::new(CommandId::CreateProgram).arg(1u32)).unwrap();
        assert_eq!(
            run(&mut d, Command::new(CommandId::CreateProgram).arg(1u32)),
            Err(ParseError::InvalidArguments)
        );
        run(&mut d, Command::new(CommandId::UseProgram).arg(1u32)).unwrap();
        assert_eq!(d.take_error(), gl::INVALID_OPERATION);
        run(&mut d, Command::new(CommandId::UseProgram).arg(7u32)).unwrap();
        assert_eq!(d.take_error(), gl::INVALID_VALUE);
        assert_eq!(d.state().current_program, 0);
    }

    #[test]
    fn delete_program_of_unknown_id_is_invalid_value() {
        let mut d = decoder(DecoderConfig::default());
        run(&mut d, Command::new(CommandId::DeleteProgram).arg(0u32)).unwrap();
        assert_eq!(d.take_error(), gl::NO_ERROR);
        run(&mut d, Command::new(CommandId::DeleteShader).arg(3u32)).unwrap();
        assert_eq!(d.take_error(), gl::INVALID_VALUE);
    }
}
