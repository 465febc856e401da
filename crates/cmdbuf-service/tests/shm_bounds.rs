//! Every shared-memory pair of every command is bounds-checked before anything runs.

use cmdbuf_protocol::{commands, Command, CommandId, FieldKind, Immediate, ParseError};
use cmdbuf_service::{Decoder, DecoderConfig, RecordingBackend, TransferBufferManager};
use proptest::prelude::*;

const SEGMENT: i32 = 1;
const SEGMENT_SIZE: usize = 4096;

/// `(command, index of its ShmId slot)` for every shared-memory pair in the table.
fn shm_pairs() -> Vec<(CommandId, usize)> {
    commands()
        .iter()
        .flat_map(|info| info.shm_fields().map(move |slot| (info.id, slot)))
        .collect()
}

/// Zeroed arguments with every pair pointing at the start of the segment, except `slot`.
fn build(id: CommandId, slot: usize, shm_id: i32, shm_offset: u32) -> Command {
    let info = id.info();
    let mut cmd = Command::new(id);
    for (idx, field) in info.fields.iter().enumerate() {
        let value = match field.kind {
            FieldKind::ShmId if idx == slot => shm_id as u32,
            FieldKind::ShmOffset if idx == slot + 1 => shm_offset,
            FieldKind::ShmId => SEGMENT as u32,
            _ if field.name == "data_memory_size" => 4,
            _ => 0,
        };
        cmd = cmd.arg(value);
    }
    if !matches!(info.immediate, Immediate::Skip | Immediate::Selected { .. }) {
        let len = info.compute_data_size(&cmd.args).unwrap_or(0);
        cmd = cmd.with_data(vec![0u8; len]);
    }
    cmd
}

fn decoder() -> Decoder<TransferBufferManager, RecordingBackend> {
    let mut engine = TransferBufferManager::new();
    let pattern: Vec<u8> = (0..SEGMENT_SIZE).map(|i| i as u8).collect();
    engine.register_with(SEGMENT, pattern).unwrap();
    let config = DecoderConfig {
        unsafe_es3_apis_enabled: true,
        ..DecoderConfig::default()
    };
    Decoder::new(engine, RecordingBackend::new(), config)
}

fn bad_reference() -> impl Strategy<Value = (i32, u32)> {
    prop_oneof![
        (prop_oneof![i32::MIN..0, 2..=i32::MAX], 0..SEGMENT_SIZE as u32),
        (Just(SEGMENT), SEGMENT_SIZE as u32 + 1..=u32::MAX),
    ]
}

#[test]
fn table_has_shared_memory_commands() {
    let ids: Vec<_> = shm_pairs().into_iter().map(|(id, _)| id).collect();
    assert!(ids.contains(&CommandId::BufferData));
    assert!(ids.contains(&CommandId::GetIntegerv));
    assert!(ids.contains(&CommandId::ReadPixels));
}

proptest! {
    #[test]
    fn unresolvable_reference_is_out_of_bounds_and_changes_nothing(
        (id, slot) in proptest::sample::select(shm_pairs()),
        (shm_id, shm_offset) in bad_reference(),
    ) {
        let mut d = decoder();
        let cmd = build(id, slot, shm_id, shm_offset);
        let bytes = cmd.encode().unwrap();

        let state = d.state().clone();
        let resources = d.resources().clone();
        let buckets = d.buckets().clone();
        let errors = d.errors().clone();
        let segment = d.engine().segment(SEGMENT).unwrap().to_vec();

        let (entries, result) = d.execute(&bytes);
        prop_assert_eq!(entries * 4, bytes.len());
        prop_assert_eq!(result, Err(ParseError::OutOfBounds));

        prop_assert_eq!(d.state(), &state);
        prop_assert_eq!(d.resources(), &resources);
        prop_assert_eq!(d.buckets(), &buckets);
        prop_assert_eq!(d.errors(), &errors);
        prop_assert_eq!(d.engine().segment(SEGMENT).unwrap(), &segment[..]);
        prop_assert!(d.backend().calls().is_empty());
    }
}
