//! Seam between the decoder and the native graphics API.

use std::collections::{BTreeMap, HashMap, VecDeque};

use cmdbuf_protocol::gl::{self, GLenum};
use cmdbuf_protocol::{CommandId, IdNamespace};
use serde::Serialize;

/// A validated call with client ids already translated to service ids.
///
/// `args` holds the command's scalar arguments in declaration order with shared-memory and
/// bucket slots removed. `data` is the input payload (immediate or shared memory), if any.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NativeCall<'a> {
    pub command: CommandId,
    pub args: &'a [u32],
    pub data: &'a [u8],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum VariableKind {
    Attrib,
    Uniform,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActiveVariable {
    pub name: String,
    pub size: i32,
    pub ty: GLenum,
}

pub trait GlBackend {
    /// Issues `call`. Output bytes (pixels, query results) go to `out`; the return value is the
    /// call's scalar result, if it has one.
    fn call(&mut self, call: &NativeCall<'_>, out: &mut [u8]) -> u32;

    fn gen_objects(&mut self, ns: IdNamespace, count: usize) -> Vec<u32>;

    fn delete_objects(&mut self, ns: IdNamespace, service_ids: &[u32]);

    /// Pending native error, drained on read.
    fn get_error(&mut self) -> GLenum {
        gl::NO_ERROR
    }

    fn active_variable(
        &mut self,
        _program: u32,
        _kind: VariableKind,
        _index: u32,
    ) -> Option<ActiveVariable> {
        None
    }

    fn active_variable_count(&mut self, program: u32, kind: VariableKind) -> u32 {
        let mut count = 0;
        while self.active_variable(program, kind, count).is_some() {
            count += 1;
        }
        count
    }

    /// Location of a named variable in a linked program, `-1` if there is none.
    fn variable_location(&mut self, _program: u32, _kind: VariableKind, _name: &str) -> i32 {
        -1
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedCall {
    pub command: CommandId,
    pub args: Vec<u32>,
    pub data: Vec<u8>,
}

/// Backend that records every call instead of rendering.
///
/// Service ids are handed out from one counter starting at `1`, so they never collide across
/// namespaces. Return values, errors and program variables can be scripted.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    calls: Vec<RecordedCall>,
    next_service_id: u32,
    deleted: Vec<(IdNamespace, u32)>,
    returns: HashMap<CommandId, u32>,
    errors: VecDeque<GLenum>,
    variables: BTreeMap<(u32, VariableKind), Vec<ActiveVariable>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[RecordedCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<RecordedCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn last_call(&self) -> Option<&RecordedCall> {
        self.calls.last()
    }

    pub fn deleted(&self) -> &[(IdNamespace, u32)] {
        &self.deleted
    }

    /// Makes every subsequent `command` call return `value`.
    pub fn set_return(&mut self, command: CommandId, value: u32) {
        self.returns.insert(command, value);
    }

    /// Queues an error for the next [`GlBackend::get_error`].
    pub fn inject_error(&mut self, error: GLenum) {
        self.errors.push_back(error);
    }

    pub fn set_variables(&mut self, program: u32, kind: VariableKind, vars: Vec<ActiveVariable>) {
        self.variables.insert((program, kind), vars);
    }

    fn default_return(command: CommandId) -> u32 {
        match command {
            CommandId::CheckFramebufferStatus => gl::FRAMEBUFFER_COMPLETE,
            CommandId::ClientWaitSync => gl::ALREADY_SIGNALED,
            _ => 0,
        }
    }
}

impl GlBackend for RecordingBackend {
    fn call(&mut self, call: &NativeCall<'_>, _out: &mut [u8]) -> u32 {
        self.calls.push(RecordedCall {
            command: call.command,
            args: call.args.to_vec(),
            data: call.data.to_vec(),
        });
        self.returns
            .get(&call.command)
            .copied()
            .unwrap_or_else(|| Self::default_return(call.command))
    }

    fn gen_objects(&mut self, _ns: IdNamespace, count: usize) -> Vec<u32> {
        (0..count)
            .map(|_| {
                self.next_service_id += 1;
                self.next_service_id
            })
            .collect()
    }

    fn delete_objects(&mut self, ns: IdNamespace, service_ids: &[u32]) {
        self.deleted.extend(service_ids.iter().map(|&id| (ns, id)));
    }

    fn get_error(&mut self) -> GLenum {
        self.errors.pop_front().unwrap_or(gl::NO_ERROR)
    }

    fn active_variable(
        &mut self,
        program: u32,
        kind: VariableKind,
        index: u32,
    ) -> Option<ActiveVariable> {
        self.variables
            .get(&(program, kind))?
            .get(index as usize)
            .cloned()
    }

    fn variable_location(&mut self, program: u32, kind: VariableKind, name: &str) -> i32 {
        self.variables
            .get(&(program, kind))
            .and_then(|vars| vars.iter().position(|v| v.name == name))
            .map_or(-1, |idx| idx as i32)
    }
}
