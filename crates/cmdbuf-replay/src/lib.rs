//! Offline tooling for captured command streams.
//!
//! A stream file is a raw sequence of encoded commands, as the client would have written them
//! into the ring. [`decode_stream`] lists every command without executing anything;
//! [`replay`] feeds the stream through a [`CommandParser`] and [`Decoder`] backed by a
//! [`RecordingBackend`], with shared-memory segments loaded from separate files.

use std::fs;
use std::path::{Path, PathBuf};

use cmdbuf_protocol::gl::{self, GLenum};
use cmdbuf_protocol::{command_info, decode_header, CommandIter, ParseError, ENTRY_SIZE};
use cmdbuf_service::{
    CommandBufferEngine, CommandParser, ConfigError, Decoder, DecoderConfig, GlErrors,
    RecordingBackend, ShmError, TransferBufferManager,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("command stream length {len} is not a whole number of 4-byte entries")]
    Misaligned { len: usize },

    #[error("invalid shared memory argument {0:?} (expected ID=PATH)")]
    BadSegmentSpec(String),

    #[error(transparent)]
    Shm(#[from] ShmError),

    #[error("invalid decoder config: {0}")]
    ConfigJson(#[from] serde_json::Error),

    #[error(transparent)]
    ConfigEnv(#[from] ConfigError),

    #[error("command parser rejected the stream: {0}")]
    Parser(#[from] ParseError),
}

/// One command as found in a stream file.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DecodedCommand {
    /// Byte offset from the start of the stream.
    pub offset: usize,
    pub id: u16,
    pub name: Option<&'static str>,
    pub size_entries: u32,
    pub args: Vec<u32>,
    pub immediate_bytes: usize,
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProtocolFailure {
    pub offset: usize,
    pub command: Option<&'static str>,
    pub error: String,
    pub code: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CallSummary {
    pub command: &'static str,
    pub args: Vec<u32>,
    pub data_len: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReplayReport {
    /// Commands the parser consumed, failed ones included.
    pub commands: usize,
    pub failures: Vec<ProtocolFailure>,
    /// Byte offset of a command whose framing stopped the replay.
    pub stalled_at: Option<usize>,
    /// GL errors still queued at the end, in `GetError` order.
    pub gl_errors: Vec<String>,
    pub calls: Vec<CallSummary>,
    pub token: i32,
    pub open_traces: usize,
}

pub fn read_stream(path: &Path) -> Result<Vec<u8>, ReplayError> {
    let bytes = fs::read(path).map_err(|source| ReplayError::Io {
        path: path.to_owned(),
        source,
    })?;
    if bytes.len() % ENTRY_SIZE != 0 {
        return Err(ReplayError::Misaligned { len: bytes.len() });
    }
    Ok(bytes)
}

/// Parses a `ID=PATH` argument and loads the file as the segment contents.
pub fn load_segment(spec: &str) -> Result<(i32, Vec<u8>), ReplayError> {
    let bad = || ReplayError::BadSegmentSpec(spec.to_owned());
    let (id, path) = spec.split_once('=').ok_or_else(bad)?;
    let id: i32 = id.trim().parse().map_err(|_| bad())?;
    let path = PathBuf::from(path);
    let data = fs::read(&path).map_err(|source| ReplayError::Io { path, source })?;
    Ok((id, data))
}

/// Loads a JSON config file, or falls back to the `CMDBUF_*` environment.
pub fn load_config(path: Option<&Path>) -> Result<DecoderConfig, ReplayError> {
    let Some(path) = path else {
        return Ok(DecoderConfig::from_env()?);
    };
    let text = fs::read_to_string(path).map_err(|source| ReplayError::Io {
        path: path.to_owned(),
        source,
    })?;
    Ok(serde_json::from_str(&text)?)
}

pub fn decode_stream(bytes: &[u8]) -> Vec<DecodedCommand> {
    CommandIter::new(bytes)
        .map(|(offset, cmd)| match cmd {
            Ok(view) => {
                let immediate = view.immediate();
                DecodedCommand {
                    offset,
                    id: view.header().command,
                    name: Some(view.info().name),
                    size_entries: view.header().size,
                    args: view.args().to_vec(),
                    immediate_bytes: immediate.map_or(0, <[u8]>::len),
                    error: immediate.err().map(|err| err.to_string()),
                }
            }
            Err(err) => {
                let header = decode_header(&bytes[offset..]).ok();
                let id = header.map_or(0, |h| h.command);
                DecodedCommand {
                    offset,
                    id,
                    name: header.and_then(|h| command_info(h.command)).map(|info| info.name),
                    size_entries: header.map_or(0, |h| h.size),
                    args: Vec::new(),
                    immediate_bytes: 0,
                    error: Some(err.to_string()),
                }
            }
        })
        .collect()
}

/// Runs `stream` through a fresh decoder and reports what happened.
///
/// A failing command is recorded and skipped. Replay stops early only when a header cannot be
/// framed.
pub fn replay(
    stream: &[u8],
    segments: Vec<(i32, Vec<u8>)>,
    config: DecoderConfig,
) -> Result<ReplayReport, ReplayError> {
    if stream.len() % ENTRY_SIZE != 0 {
        return Err(ReplayError::Misaligned { len: stream.len() });
    }
    let mut engine = TransferBufferManager::new();
    for (id, data) in segments {
        debug!(id, len = data.len(), "registering shared memory segment");
        engine.register_with(id, data)?;
    }
    let mut decoder = Decoder::new(engine, RecordingBackend::new(), config);

    // One spare entry keeps `put` strictly inside the ring.
    let entries = stream.len() / ENTRY_SIZE;
    let mut ring = stream.to_vec();
    ring.extend_from_slice(&[0; ENTRY_SIZE]);
    let mut parser = CommandParser::new(entries + 1);
    parser.set_put(entries)?;

    let mut commands = 0;
    let mut failures = Vec::new();
    let mut stalled_at = None;
    while !parser.is_empty() {
        let offset = parser.get() * ENTRY_SIZE;
        let result = parser.process_commands(&mut decoder, &ring, 1);
        let command = decode_header(&ring[offset..])
            .ok()
            .and_then(|h| command_info(h.command))
            .map(|info| info.name);
        let advanced = parser.get() * ENTRY_SIZE > offset;

        if let Err(err) = result {
            warn!(offset, ?command, %err, "command failed");
            failures.push(ProtocolFailure {
                offset,
                command,
                error: err.to_string(),
                code: err.code(),
            });
        }
        if !advanced {
            stalled_at = Some(offset);
            break;
        }
        commands += 1;
    }

    let mut gl_errors = Vec::new();
    loop {
        let error = decoder.take_error();
        if error == gl::NO_ERROR {
            break;
        }
        gl_errors.push(gl_error_name(error));
    }

    let calls = decoder
        .backend()
        .calls()
        .iter()
        .map(|call| CallSummary {
            command: call.command.name(),
            args: call.args.clone(),
            data_len: call.data.len(),
        })
        .collect();
    let report = ReplayReport {
        commands,
        failures,
        stalled_at,
        gl_errors,
        calls,
        token: decoder.engine().token(),
        open_traces: decoder.state().trace_stack.len(),
    };
    info!(
        commands = report.commands,
        failures = report.failures.len(),
        calls = report.calls.len(),
        "replay finished"
    );
    Ok(report)
}

/// `GL_INVALID_ENUM` style name, or the hex value for codes outside the latch.
pub fn gl_error_name(error: GLenum) -> String {
    GlErrors::from_gl(error)
        .and_then(|flag| flag.iter_names().next())
        .map(|(name, _)| format!("GL_{name}"))
        .unwrap_or_else(|| format!("0x{error:04x}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    use cmdbuf_protocol::{Command, CommandHeader, CommandId, CommandWriter};

    #[test]
    fn error_names_follow_gl_spelling() {
        assert_eq!(gl_error_name(gl::INVALID_OPERATION), "GL_INVALID_OPERATION");
        assert_eq!(gl_error_name(0x1234), "0x1234");
    }

    #[test]
    fn decode_lists_unknown_commands_by_id() {
        let mut bytes = CommandHeader::new(200, 1).unwrap().encode_le().to_vec();
        let mut w = CommandWriter::new();
        w.set_token(4);
        bytes.extend_from_slice(w.as_bytes());

        let decoded = decode_stream(&bytes);
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].id, 200);
        assert_eq!(decoded[0].name, None);
        assert_eq!(decoded[0].error.as_deref(), Some("unknown command"));
        assert_eq!(decoded[1].name, Some("SetToken"));
        assert_eq!(decoded[1].args, vec![4]);
    }

    #[test]
    fn replay_skips_failed_commands() {
        let mut bytes = CommandHeader::new(200, 1).unwrap().encode_le().to_vec();
        bytes.extend(
            Command::new(CommandId::SetToken)
                .arg(11i32)
                .encode()
                .unwrap(),
        );
        let report = replay(&bytes, Vec::new(), DecoderConfig::default()).unwrap();
        assert_eq!(report.commands, 2);
        assert_eq!(report.token, 11);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].offset, 0);
        assert_eq!(report.failures[0].code, ParseError::UnknownCommand.code());
        assert_eq!(report.stalled_at, None);
    }

    #[test]
    fn zero_sized_header_stops_the_replay() {
        let mut w = CommandWriter::new();
        w.set_token(1);
        let mut bytes = w.finish();
        bytes.extend_from_slice(&[0; 8]);

        let report = replay(&bytes, Vec::new(), DecoderConfig::default()).unwrap();
        assert_eq!(report.commands, 1);
        assert_eq!(report.stalled_at, Some(8));
        assert_eq!(report.failures[0].code, ParseError::InvalidSize.code());
    }

    #[test]
    fn segment_spec_needs_an_id() {
        assert!(matches!(
            load_segment("nope"),
            Err(ReplayError::BadSegmentSpec(_))
        ));
        assert!(matches!(
            load_segment("x=/dev/null"),
            Err(ReplayError::BadSegmentSpec(_))
        ));
    }
}
