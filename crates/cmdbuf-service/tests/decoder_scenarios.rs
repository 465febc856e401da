use cmdbuf_protocol::gl;
use cmdbuf_protocol::{
    Command, CommandId, CommandRing, CommandWriter, ParseError, ShmRef, SizedResult,
};
use cmdbuf_service::{
    CommandBufferEngine, CommandParser, Decoder, DecoderConfig, RecordingBackend,
    TransferBufferManager,
};

type TestDecoder = Decoder<TransferBufferManager, RecordingBackend>;

fn decoder_with(config: DecoderConfig) -> TestDecoder {
    let mut engine = TransferBufferManager::new();
    engine.register(1, 1024).unwrap();
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

fn run(d: &mut TestDecoder, cmd: &Command) -> Result<(), ParseError> {
    d.execute(&cmd.encode().unwrap()).1
}

fn run_bytes(d: &mut TestDecoder, bytes: &[u8]) -> Vec<Result<(), ParseError>> {
    let mut offset = 0;
    let mut results = Vec::new();
    while offset < bytes.len() {
        let (entries, result) = d.execute(&bytes[offset..]);
        assert_ne!(entries, 0, "stream framing broke at byte {offset}");
        offset += entries * 4;
        results.push(result);
    }
    results
}

#[test]
fn trace_begin_then_end_leaves_no_error() {
    let mut d = decoder();
    let mut w = CommandWriter::new();
    w.put_bucket(123, b"test_category").unwrap();
    w.put_bucket(234, b"test_command").unwrap();
    w.trace_begin(123, 234);
    assert!(run_bytes(&mut d, w.as_bytes()).iter().all(Result::is_ok));
    assert_eq!(d.state().trace_stack.len(), 1);
    assert_eq!(d.state().trace_stack[0].category, "test_category");
    assert_eq!(d.state().trace_stack[0].name, "test_command");

    let mut w = CommandWriter::new();
    w.trace_end();
    assert_eq!(run_bytes(&mut d, w.as_bytes()), vec![Ok(())]);
    assert!(d.state().trace_stack.is_empty());
    assert_eq!(d.take_error(), gl::NO_ERROR);
}

#[test]
fn lone_trace_end_queues_invalid_operation() {
    let mut d = decoder();
    let mut w = CommandWriter::new();
    w.trace_end();
    assert_eq!(run_bytes(&mut d, w.as_bytes()), vec![Ok(())]);
    assert_eq!(d.take_error(), gl::INVALID_OPERATION);
    assert_eq!(d.take_error(), gl::NO_ERROR);
}

fn es3_only_commands() -> Vec<Command> {
    vec![
        Command::new(CommandId::VertexAttribI4i)
            .arg(0u32)
            .arg(1i32)
            .arg(-2i32)
            .arg(3i32)
            .arg(-4i32),
        Command::new(CommandId::VertexAttribI4ui)
            .arg(1u32)
            .arg(1u32)
            .arg(2u32)
            .arg(3u32)
            .arg(4u32),
        Command::new(CommandId::BeginTransformFeedback).arg(gl::TRIANGLES),
        Command::new(CommandId::EndTransformFeedback),
    ]
}

#[test]
fn es3_commands_are_unknown_when_disabled() {
    let mut d = decoder();
    for cmd in es3_only_commands() {
        assert_eq!(run(&mut d, &cmd), Err(ParseError::UnknownCommand), "{:?}", cmd.id);
    }
    assert!(d.backend().calls().is_empty());
    assert!(d.errors().is_empty());
}

#[test]
fn es3_commands_decode_when_enabled() {
    let mut d = es3_decoder();
    for cmd in es3_only_commands() {
        assert_eq!(run(&mut d, &cmd), Ok(()), "{:?}", cmd.id);
    }
    let recorded: Vec<_> = d.backend().calls().iter().map(|c| c.command).collect();
    assert_eq!(
        recorded,
        vec![CommandId::VertexAttribI4i, CommandId::VertexAttribI4ui]
    );
    // No program is in use and nothing was begun, so both halves of the pair fail semantically.
    assert_eq!(d.take_error(), gl::INVALID_OPERATION);
}

#[test]
fn gating_depends_only_on_configuration() {
    let cmd = Command::new(CommandId::VertexAttribI4i)
        .arg(2u32)
        .arg(7i32)
        .arg(7i32)
        .arg(7i32)
        .arg(7i32);
    let bytes = cmd.encode().unwrap();

    let mut off = decoder();
    let mut on = es3_decoder();
    assert_eq!(off.execute(&bytes), (6, Err(ParseError::UnknownCommand)));
    assert_eq!(on.execute(&bytes), (6, Ok(())));
}

#[test]
fn buffer_data_reads_contents_from_shared_memory() {
    let mut d = decoder();
    let contents = ShmRef::new(1, 64);
    d.engine_mut().write(contents, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();

    let mut w = CommandWriter::new();
    w.gen_or_delete(CommandId::GenBuffersImmediate, &[10]).unwrap();
    w.bind_buffer(gl::ARRAY_BUFFER, 10);
    w.buffer_data(gl::ARRAY_BUFFER, 8, contents, gl::STATIC_DRAW);
    assert!(run_bytes(&mut d, w.as_bytes()).iter().all(Result::is_ok));

    let call = d.backend().last_call().unwrap();
    assert_eq!(call.command, CommandId::BufferData);
    assert_eq!(call.args, vec![gl::ARRAY_BUFFER, 8, gl::STATIC_DRAW]);
    assert_eq!(call.data, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(d.take_error(), gl::NO_ERROR);
}

#[test]
fn buffer_data_past_the_segment_is_out_of_bounds() {
    let mut d = decoder();
    let mut w = CommandWriter::new();
    w.gen_or_delete(CommandId::GenBuffersImmediate, &[10]).unwrap();
    w.bind_buffer(gl::ARRAY_BUFFER, 10);
    run_bytes(&mut d, w.as_bytes());
    let calls_before = d.backend().calls().len();

    let mut w = CommandWriter::new();
    w.buffer_data(gl::ARRAY_BUFFER, 64, ShmRef::new(1, 1000), gl::STATIC_DRAW);
    assert_eq!(run_bytes(&mut d, w.as_bytes()), vec![Err(ParseError::OutOfBounds)]);
    assert_eq!(d.backend().calls().len(), calls_before);
}

#[test]
fn get_integerv_reports_limits_from_configuration() {
    let mut d = decoder_with(DecoderConfig {
        max_texture_size: 2048,
        ..DecoderConfig::default()
    });
    let params = ShmRef::new(1, 0);
    let mut w = CommandWriter::new();
    w.get_integerv(gl::MAX_TEXTURE_SIZE, params);
    assert_eq!(run_bytes(&mut d, w.as_bytes()), vec![Ok(())]);

    let buf = d.engine().resolve(params, 8).unwrap();
    assert_eq!(SizedResult::<i32>::read(buf), Some(vec![2048]));
}

#[test]
fn clear_buffer_forwards_only_the_effective_prefix() {
    let mut d = es3_decoder();
    let depth = Command::new(CommandId::ClearBufferfvImmediate)
        .arg(gl::DEPTH)
        .arg(0i32)
        .with_f32_data(&[0.5]);
    assert_eq!(run(&mut d, &depth), Ok(()));

    let call = d.backend().last_call().unwrap();
    assert_eq!(call.command, CommandId::ClearBufferfvImmediate);
    assert_eq!(call.data, 0.5f32.to_le_bytes().to_vec());
}

#[test]
fn parser_drains_a_ring_of_mixed_commands() {
    let mut ring = CommandRing::new(64);
    ring.append(&Command::new(CommandId::SetBucketSize).arg(3u32).arg(0u32))
        .unwrap();
    ring.append(
        &Command::new(CommandId::GenTexturesImmediate)
            .arg(2i32)
            .with_u32_data(&[4, 5]),
    )
    .unwrap();
    ring.append(&Command::new(CommandId::BindTexture).arg(gl::TEXTURE_2D).arg(5u32))
        .unwrap();
    ring.insert_token().unwrap();

    let mut d = decoder();
    let mut parser = CommandParser::new(ring.capacity());
    parser.set_put(ring.put()).unwrap();
    parser
        .process_commands(&mut d, ring.as_bytes(), usize::MAX)
        .unwrap();

    assert!(parser.is_empty());
    assert_eq!(d.engine().token(), 1);
    assert_eq!(d.state().bound_texture(gl::TEXTURE_2D), 5);
    assert!(d.buckets().get(3).is_some());
}
