use std::fs;
use std::process::Command as Process;

use cmdbuf_protocol::gl;
use cmdbuf_protocol::{CommandId, CommandWriter, ShmRef};
use cmdbuf_replay::{decode_stream, load_config, load_segment, read_stream, replay, ReplayError};

fn draw_stream() -> Vec<u8> {
    let mut w = CommandWriter::new();
    w.put_bucket(1, b"frame").unwrap();
    w.put_bucket(2, b"draw").unwrap();
    w.trace_begin(1, 2);
    w.gen_or_delete(CommandId::GenBuffersImmediate, &[7]).unwrap();
    w.bind_buffer(gl::ARRAY_BUFFER, 7);
    w.buffer_data(gl::ARRAY_BUFFER, 16, ShmRef::new(3, 0), gl::STATIC_DRAW);
    w.clear_color([0.0, 0.0, 0.0, 1.0]);
    w.clear(gl::COLOR_BUFFER_BIT);
    w.trace_end();
    w.set_token(42);
    w.finish()
}

#[test]
fn replays_a_stream_with_a_shared_memory_segment() {
    let dir = tempfile::tempdir().unwrap();
    let stream_path = dir.path().join("frame.cmdbuf");
    let shm_path = dir.path().join("vertices.bin");
    fs::write(&stream_path, draw_stream()).unwrap();
    fs::write(&shm_path, [9u8; 64]).unwrap();

    let bytes = read_stream(&stream_path).unwrap();
    let segment = load_segment(&format!("3={}", shm_path.display())).unwrap();
    assert_eq!(segment.0, 3);

    let report = replay(&bytes, vec![segment], Default::default()).unwrap();
    assert!(report.failures.is_empty(), "{:?}", report.failures);
    assert!(report.gl_errors.is_empty(), "{:?}", report.gl_errors);
    assert_eq!(report.token, 42);
    assert_eq!(report.open_traces, 0);

    let upload = report
        .calls
        .iter()
        .find(|call| call.command == "BufferData")
        .unwrap();
    assert_eq!(upload.data_len, 16);
}

#[test]
fn missing_segment_is_reported_per_command() {
    let report = replay(&draw_stream(), Vec::new(), Default::default()).unwrap();
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].command, Some("BufferData"));
    assert_eq!(report.token, 42);
    assert!(report.calls.iter().all(|call| call.command != "BufferData"));
}

#[test]
fn misaligned_stream_file_is_rejected() {
    let file = tempfile::NamedTempFile::new().unwrap();
    fs::write(file.path(), [0u8; 6]).unwrap();
    assert!(matches!(
        read_stream(file.path()),
        Err(ReplayError::Misaligned { len: 6 })
    ));
}

#[test]
fn config_file_overrides_defaults() {
    let file = tempfile::NamedTempFile::new().unwrap();
    fs::write(
        file.path(),
        r#"{ "unsafe_es3_apis_enabled": true, "max_draw_buffers": 4 }"#,
    )
    .unwrap();
    let config = load_config(Some(file.path())).unwrap();
    assert!(config.unsafe_es3_apis_enabled);
    assert_eq!(config.max_draw_buffers, 4);
    assert_eq!(config.max_vertex_attribs, 16);
}

#[test]
fn decode_names_every_command() {
    let names: Vec<_> = decode_stream(&draw_stream())
        .into_iter()
        .map(|cmd| cmd.name.unwrap())
        .collect();
    assert_eq!(names.first(), Some(&"SetBucketSize"));
    assert!(names.contains(&"TraceBeginCHROMIUM"));
    assert_eq!(names.last(), Some(&"SetToken"));
}

#[test]
fn cli_decode_prints_json() {
    let dir = tempfile::tempdir().unwrap();
    let stream_path = dir.path().join("frame.cmdbuf");
    fs::write(&stream_path, draw_stream()).unwrap();

    let output = Process::new(env!("CARGO_BIN_EXE_cmdbuf-replay"))
        .arg("decode")
        .arg("--json")
        .arg(&stream_path)
        .output()
        .unwrap();
    assert!(output.status.success());
    let commands: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let commands = commands.as_array().unwrap();
    assert_eq!(commands.len(), decode_stream(&draw_stream()).len());
    assert_eq!(commands[0]["name"], "SetBucketSize");
}
