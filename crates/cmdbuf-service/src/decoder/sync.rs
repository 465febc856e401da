//! Begin/end pairs and other ordering state: queries, syncs, transform feedback, trace ranges,
//! debug markers and texture mailboxes.

use cmdbuf_protocol::gl;
use cmdbuf_protocol::IdNamespace::{Queries, Syncs, Textures};
use cmdbuf_protocol::{CommandId, CommandView, ParseError, ParseResult, QuerySync};
use tracing::{debug, info};

use crate::backend::{GlBackend, NativeCall};
use crate::resources::ObjectEntry;
use crate::shared_memory::CommandBufferEngine;
use crate::state::{Mailbox, QueryInfo, TraceEntry};

use super::Decoder;

impl<E: CommandBufferEngine, B: GlBackend> Decoder<E, B> {
    fn call_native(&mut self, command: CommandId, args: &[u32]) -> u32 {
        self.backend.call(
            &NativeCall {
                command,
                args,
                data: &[],
            },
            &mut [],
        )
    }

    pub(super) fn begin_query(&mut self, view: &CommandView<'_>) -> ParseResult {
        let (target, id, sync) = (view.arg(0), view.arg(1), view.shm_arg(2));
        if id == 0 {
            self.set_error(view, gl::INVALID_OPERATION, "id is 0");
            return Ok(());
        }
        if self.state.active_queries.contains_key(&target)
            || self.state.active_queries.values().any(|&active| active == id)
        {
            self.set_error(view, gl::INVALID_OPERATION, "query already in progress");
            return Ok(());
        }
        let Some(service_id) = self.resources.service_id(Queries, id) else {
            self.set_error(view, gl::INVALID_OPERATION, "id not generated");
            return Ok(());
        };
        if self.state.queries.get(&id).is_some_and(|query| query.target != target) {
            self.set_error(view, gl::INVALID_OPERATION, "target does not match query");
            return Ok(());
        }

        self.call_native(view.id(), &[target, service_id]);
        self.state.queries.insert(id, QueryInfo { target, sync });
        self.state.active_queries.insert(target, id);
        Ok(())
    }

    /// Ends the active query on `target` and completes it immediately: the backend's return
    /// value becomes the result and `submit_count` the process count.
    pub(super) fn end_query(&mut self, view: &CommandView<'_>) -> ParseResult {
        let (target, submit_count) = (view.arg(0), view.arg(1));
        let Some(&id) = self.state.active_queries.get(&target) else {
            self.set_error(view, gl::INVALID_OPERATION, "no active query");
            return Ok(());
        };
        let sync = self.state.queries.get(&id).map_or(Default::default(), |query| query.sync);
        self.engine.check(sync, QuerySync::SIZE_BYTES as u32)?;

        self.state.active_queries.remove(&target);
        let result = self.forward(view, &[]);
        let record = QuerySync {
            process_count: submit_count,
            _pad: 0,
            result: u64::from(result),
        };
        self.write_result(sync, record.as_bytes())
    }

    pub(super) fn fence_sync(&mut self, view: &CommandView<'_>) -> ParseResult {
        let client_id = view.arg(0);
        if client_id == 0 || self.resources.contains(Syncs, client_id) {
            return Err(ParseError::InvalidArguments);
        }
        let service_id = self.backend.gen_objects(Syncs, 1).first().copied().unwrap_or(0);
        self.resources.insert(Syncs, client_id, ObjectEntry::new(service_id));
        self.forward(view, &[]);
        Ok(())
    }

    pub(super) fn delete_sync(&mut self, view: &CommandView<'_>) -> ParseResult {
        let client_id = view.arg(0);
        if client_id == 0 {
            return Ok(());
        }
        match self.resources.remove(Syncs, client_id) {
            Some(entry) => self.backend.delete_objects(Syncs, &[entry.service_id]),
            None => self.set_error(view, gl::INVALID_VALUE, "unknown sync"),
        }
        Ok(())
    }

    /// The client primes the result with `GL_WAIT_FAILED`; it stays that way on a GL error.
    pub(super) fn client_wait_sync(&mut self, view: &CommandView<'_>) -> ParseResult {
        let (client_id, result) = (view.arg(0), view.shm_arg(4));
        if self.read_u32_result(result)? != gl::WAIT_FAILED {
            return Err(ParseError::InvalidArguments);
        }
        if !self.resources.contains(Syncs, client_id) {
            self.set_error(view, gl::INVALID_VALUE, "unknown sync");
            return Ok(());
        }
        let status = self.forward(view, &[]);
        self.write_u32_result(result, status)
    }

    pub(super) fn wait_sync(&mut self, view: &CommandView<'_>) -> ParseResult {
        let (client_id, flags) = (view.arg(0), view.arg(1));
        let timeout = gl::join_u64(view.arg(2), view.arg(3));
        if !self.resources.contains(Syncs, client_id) {
            self.set_error(view, gl::INVALID_VALUE, "unknown sync");
            return Ok(());
        }
        if flags != 0 || timeout != gl::TIMEOUT_IGNORED {
            self.set_error(view, gl::INVALID_VALUE, "flags must be 0 and timeout ignored");
            return Ok(());
        }
        self.forward(view, &[]);
        Ok(())
    }

    pub(super) fn begin_transform_feedback(&mut self, view: &CommandView<'_>) -> ParseResult {
        if self.state.transform_feedback_active.is_some() {
            self.set_error(view, gl::INVALID_OPERATION, "transform feedback already active");
            return Ok(());
        }
        if self.state.current_program == 0 {
            self.set_error(view, gl::INVALID_OPERATION, "no program in use");
            return Ok(());
        }
        self.state.transform_feedback_active = Some(view.arg(0));
        self.forward(view, &[]);
        Ok(())
    }

    pub(super) fn end_transform_feedback(&mut self, view: &CommandView<'_>) -> ParseResult {
        if self.state.transform_feedback_active.take().is_none() {
            self.set_error(view, gl::INVALID_OPERATION, "transform feedback not active");
            return Ok(());
        }
        self.forward(view, &[]);
        Ok(())
    }

    pub(super) fn trace_begin(&mut self, view: &CommandView<'_>) -> ParseResult {
        let category = self.bucket_string(view.arg(0))?;
        let name = self.bucket_string(view.arg(1))?;
        info!(%category, %name, depth = self.state.trace_stack.len(), "trace begin");
        self.state.trace_stack.push(TraceEntry { category, name });
        Ok(())
    }

    pub(super) fn trace_end(&mut self, view: &CommandView<'_>) -> ParseResult {
        match self.state.trace_stack.pop() {
            Some(TraceEntry { category, name }) => {
                info!(%category, %name, depth = self.state.trace_stack.len(), "trace end");
            }
            None => self.set_error(view, gl::INVALID_OPERATION, "no trace begin found"),
        }
        Ok(())
    }

    /// `InsertEventMarkerEXT` and `PushGroupMarkerEXT`.
    pub(super) fn marker(&mut self, view: &CommandView<'_>) -> ParseResult {
        let marker = self.bucket_string(view.arg(0))?;
        debug!(command = view.info().name, %marker);
        self.forward(view, marker.as_bytes());
        if view.id() == CommandId::PushGroupMarkerEXT {
            self.state.group_markers.push(marker);
        } else {
            self.state.event_markers.push(marker);
        }
        Ok(())
    }

    pub(super) fn produce_texture(&mut self, view: &CommandView<'_>, data: &[u8]) -> ParseResult {
        let mailbox: Mailbox = data.try_into().map_err(|_| ParseError::OutOfBounds)?;
        let texture = self.state.bound_texture(view.arg(0));
        let Some(service_id) = self.resources.service_id(Textures, texture) else {
            self.set_error(view, gl::INVALID_OPERATION, "no texture bound");
            return Ok(());
        };
        self.state.mailboxes.insert(mailbox, service_id);
        self.forward(view, data);
        Ok(())
    }

    /// Rebinds the texture bound to `target` to the service texture the mailbox names.
    pub(super) fn consume_texture(&mut self, view: &CommandView<'_>, data: &[u8]) -> ParseResult {
        let mailbox: Mailbox = data.try_into().map_err(|_| ParseError::OutOfBounds)?;
        let texture = self.state.bound_texture(view.arg(0));
        if texture == 0 {
            self.set_error(view, gl::INVALID_OPERATION, "no texture bound");
            return Ok(());
        }
        let Some(&service_id) = self.state.mailboxes.get(&mailbox) else {
            self.set_error(view, gl::INVALID_OPERATION, "unknown mailbox");
            return Ok(());
        };
        if let Some(entry) = self.resources.get_mut(Textures, texture) {
            entry.service_id = service_id;
        }
        self.state.textures.remove(&texture);
        self.forward(view, data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use cmdbuf_protocol::gl;
    use cmdbuf_protocol::{
        Command, CommandId, CommandWriter, IdNamespace, ParseError, ParseResult, QuerySync,
        ShmRef,
    };

    use crate::backend::RecordingBackend;
    use crate::config::DecoderConfig;
    use crate::decoder::Decoder;
    use crate::shared_memory::{CommandBufferEngine, TransferBufferManager};

    type TestDecoder = Decoder<TransferBufferManager, RecordingBackend>;

    fn decoder_with(config: DecoderConfig) -> TestDecoder {
        let mut engine = TransferBufferManager::new();
        engine.register(1, 128).unwrap();
        Decoder::new(engine, RecordingBackend::new(), config)
    }

    fn decoder() -> TestDecoder {
        decoder_with(DecoderConfig::default())
    }

    fn es3_decoder() -> TestDecoder {
        decoder_with(DecoderConfig {
            unsafe_es3_apis_enabled: true,
            ..DecoderConfig::default()
        })
    }

    fn run(d: &mut TestDecoder, cmd: Command) -> ParseResult {
        d.execute(&cmd.encode().unwrap()).1
    }

    fn run_writer(d: &mut TestDecoder, w: &CommandWriter) -> Vec<ParseResult> {
        let bytes = w.as_bytes();
        let mut offset = 0;
        let mut results = Vec::new();
        while offset < bytes.len() {
            let (entries, result) = d.execute(&bytes[offset..]);
            offset += entries * 4;
            results.push(result);
        }
        results
    }

    #[test]
    fn trace_range_uses_bucket_strings() {
        let mut d = decoder();
        let mut w = CommandWriter::new();
        w.put_bucket(123, b"test_category").unwrap();
        w.put_bucket(234, b"test_command").unwrap();
        w.trace_begin(123, 234);
        assert!(run_writer(&mut d, &w).iter().all(Result::is_ok));
        assert_eq!(d.state().trace_stack.len(), 1);
        assert_eq!(d.state().trace_stack[0].name, "test_command");

        let mut w = CommandWriter::new();
        w.trace_end();
        assert_eq!(run_writer(&mut d, &w), vec![Ok(())]);
        assert!(d.state().trace_stack.is_empty());
        assert_eq!(d.take_error(), gl::NO_ERROR);
    }

    #[test]
    fn trace_begin_with_missing_bucket_is_a_protocol_error() {
        let mut d = decoder();
        let mut w = CommandWriter::new();
        w.trace_begin(1, 2);
        assert_eq!(run_writer(&mut d, &w), vec![Err(ParseError::InvalidArguments)]);
        assert!(d.state().trace_stack.is_empty());
    }

    #[test]
    fn query_completes_at_end() {
        let mut d = decoder();
        d.backend_mut().set_return(CommandId::EndQueryEXT, 7);
        let mut w = CommandWriter::new();
        w.gen_or_delete(CommandId::GenQueriesEXTImmediate, &[5]).unwrap();
        run_writer(&mut d, &w);

        let begin = Command::new(CommandId::BeginQueryEXT)
            .arg(gl::ANY_SAMPLES_PASSED_EXT)
            .arg(5u32)
            .arg(1i32)
            .arg(32u32);
        let end = Command::new(CommandId::EndQueryEXT)
            .arg(gl::ANY_SAMPLES_PASSED_EXT)
            .arg(3u32);
        assert_eq!(run(&mut d, begin.clone()), Ok(()));
        assert_eq!(run(&mut d, begin), Ok(()));
        assert_eq!(d.take_error(), gl::INVALID_OPERATION);
        assert_eq!(run(&mut d, end.clone()), Ok(()));

        let bytes = d.engine().resolve(ShmRef::new(1, 32), 16).unwrap();
        let record = QuerySync::read_from(bytes).unwrap();
        assert_eq!((record.process_count, record.result), (3, 7));

        assert_eq!(run(&mut d, end), Ok(()));
        assert_eq!(d.take_error(), gl::INVALID_OPERATION);
    }

    #[test]
    fn begin_query_needs_a_generated_id() {
        let mut d = decoder();
        let begin = Command::new(CommandId::BeginQueryEXT)
            .arg(gl::ANY_SAMPLES_PASSED_EXT)
            .arg(9u32)
            .arg(1i32)
            .arg(0u32);
        assert_eq!(run(&mut d, begin), Ok(()));
        assert_eq!(d.take_error(), gl::INVALID_OPERATION);
        assert!(d.state().active_queries.is_empty());
    }

    #[test]
    fn sync_lifecycle() {
        let mut d = es3_decoder();
        assert_eq!(run(&mut d, Command::new(CommandId::FenceSync).arg(3u32)), Ok(()));
        assert_eq!(
            run(&mut d, Command::new(CommandId::FenceSync).arg(3u32)),
            Err(ParseError::InvalidArguments)
        );

        let result = ShmRef::new(1, 0);
        let wait = Command::new(CommandId::ClientWaitSync)
            .arg(3u32)
            .arg(0u32)
            .arg(0u32)
            .arg(0u32)
            .arg(result.id)
            .arg(result.offset);
        assert_eq!(run(&mut d, wait.clone()), Err(ParseError::InvalidArguments));
        d.engine_mut().write_u32(result, gl::WAIT_FAILED).unwrap();
        assert_eq!(run(&mut d, wait), Ok(()));
        assert_eq!(d.engine().read_u32(result), Ok(gl::ALREADY_SIGNALED));

        let (lo, hi) = gl::split_u64(gl::TIMEOUT_IGNORED);
        let server_wait = Command::new(CommandId::WaitSync).arg(3u32).arg(0u32).arg(lo).arg(hi);
        assert_eq!(run(&mut d, server_wait), Ok(()));
        assert_eq!(d.take_error(), gl::NO_ERROR);

        assert_eq!(run(&mut d, Command::new(CommandId::DeleteSync).arg(3u32)), Ok(()));
        assert!(!d.resources().contains(IdNamespace::Syncs, 3));
        assert_eq!(run(&mut d, Command::new(CommandId::DeleteSync).arg(3u32)), Ok(()));
        assert_eq!(d.take_error(), gl::INVALID_VALUE);
    }

    #[test]
    fn transform_feedback_pairs_begin_and_end() {
        let mut d = es3_decoder();
        let begin = Command::new(CommandId::BeginTransformFeedback).arg(gl::POINTS);
        let end = Command::new(CommandId::EndTransformFeedback);

        assert_eq!(run(&mut d, end.clone()), Ok(()));
        assert_eq!(d.take_error(), gl::INVALID_OPERATION);

        d.state.current_program = 1;
        assert_eq!(run(&mut d, begin.clone()), Ok(()));
        assert_eq!(d.state().transform_feedback_active, Some(gl::POINTS));
        assert_eq!(run(&mut d, begin), Ok(()));
        assert_eq!(d.take_error(), gl::INVALID_OPERATION);
        assert_eq!(run(&mut d, end), Ok(()));
        assert_eq!(d.state().transform_feedback_active, None);
        assert_eq!(d.take_error(), gl::NO_ERROR);
    }

    #[test]
    fn consumed_mailbox_rebinds_service_texture() {
        let mut d = decoder();
        let mailbox = [0xab; 64];
        let mut w = CommandWriter::new();
        w.gen_or_delete(CommandId::GenTexturesImmediate, &[1, 2]).unwrap();
        w.bind_texture(gl::TEXTURE_2D, 1);
        run_writer(&mut d, &w);
        let produce = Command::new(CommandId::ProduceTextureCHROMIUMImmediate)
            .arg(gl::TEXTURE_2D)
            .with_data(mailbox.to_vec());
        assert_eq!(run(&mut d, produce), Ok(()));

        let mut w = CommandWriter::new();
        w.bind_texture(gl::TEXTURE_2D, 2);
        run_writer(&mut d, &w);
        let consume = Command::new(CommandId::ConsumeTextureCHROMIUMImmediate)
            .arg(gl::TEXTURE_2D)
            .with_data(mailbox.to_vec());
        assert_eq!(run(&mut d, consume), Ok(()));
        assert_eq!(
            d.resources().service_id(IdNamespace::Textures, 2),
            d.resources().service_id(IdNamespace::Textures, 1)
        );

        let unknown = Command::new(CommandId::ConsumeTextureCHROMIUMImmediate)
            .arg(gl::TEXTURE_2D)
            .with_data(vec![0; 64]);
        assert_eq!(run(&mut d, unknown), Ok(()));
        assert_eq!(d.take_error(), gl::INVALID_OPERATION);
    }

    #[test]
    fn group_markers_push_and_pop() {
        let mut d = decoder();
        let mut w = CommandWriter::new();
        w.put_bucket(1, b"frame").unwrap();
        run_writer(&mut d, &w);
        assert_eq!(run(&mut d, Command::new(CommandId::PushGroupMarkerEXT).arg(1u32)), Ok(()));
        assert_eq!(d.state().group_markers, vec!["frame".to_owned()]);
        assert_eq!(run(&mut d, Command::new(CommandId::PopGroupMarkerEXT)), Ok(()));
        assert!(d.state().group_markers.is_empty());
        assert_eq!(
            run(&mut d, Command::new(CommandId::InsertEventMarkerEXT).arg(9u32)),
            Err(ParseError::InvalidArguments)
        );
    }
}
