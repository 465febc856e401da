use cmdbuf_protocol::gl;
use cmdbuf_protocol::{
    decode_command, le_u32s, Command, CommandHeader, CommandId, CommandIter, CommandRing,
    CommandWriter, ParseError, ShmRef,
};
use proptest::prelude::*;

fn push_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

#[test]
fn iterates_back_to_back_commands() {
    let mut w = CommandWriter::new();
    w.set_token(9);
    w.put_bucket(3, b"gpu").unwrap();
    w.gen_or_delete(CommandId::GenBuffersImmediate, &[10, 11, 12]).unwrap();
    w.get_integerv(gl::VIEWPORT, ShmRef::new(1, 16));
    let bytes = w.finish();

    let cmds: Vec<_> = CommandIter::new(&bytes)
        .map(|(_, cmd)| cmd.unwrap())
        .collect();
    let ids: Vec<_> = cmds.iter().map(|c| c.id()).collect();
    assert_eq!(
        ids,
        vec![
            CommandId::SetToken,
            CommandId::SetBucketSize,
            CommandId::SetBucketDataImmediate,
            CommandId::GenBuffersImmediate,
            CommandId::GetIntegerv,
        ]
    );

    assert_eq!(cmds[0].i32_arg(0), 9);
    assert_eq!(cmds[2].immediate().unwrap(), b"gpu");
    assert_eq!(cmds[2].trailing().len(), 4);
    assert_eq!(le_u32s(cmds[3].immediate().unwrap()).collect::<Vec<_>>(), vec![10, 11, 12]);
    assert_eq!(cmds[4].named("pname"), Some(gl::VIEWPORT));
    assert_eq!(cmds[4].shm_arg(1), ShmRef::new(1, 16));
}

#[test]
fn unknown_command_is_reported_and_skipped() {
    let mut bytes = Vec::new();
    push_u32(&mut bytes, CommandHeader::new(100, 2).unwrap().to_word());
    push_u32(&mut bytes, 0xdead_beef);
    let mut w = CommandWriter::new();
    w.flush();
    bytes.extend_from_slice(w.as_bytes());

    let results: Vec<_> = CommandIter::new(&bytes)
        .map(|(offset, cmd)| (offset, cmd.map(|c| c.id())))
        .collect();
    assert_eq!(
        results,
        vec![
            (0, Err(ParseError::UnknownCommand)),
            (8, Ok(CommandId::Flush)),
        ]
    );
}

#[test]
fn framing_error_stops_iteration() {
    let mut bytes = Vec::new();
    push_u32(&mut bytes, CommandHeader::new(CommandId::Flush as u16, 0).unwrap().to_word());
    push_u32(&mut bytes, CommandHeader::new(CommandId::Flush as u16, 1).unwrap().to_word());
    let results: Vec<_> = CommandIter::new(&bytes).map(|(_, cmd)| cmd.map(|c| c.id())).collect();
    assert_eq!(results, vec![Err(ParseError::InvalidSize)]);

    let mut truncated = Vec::new();
    let header = CommandHeader::new(CommandId::BindBuffer as u16, 3).unwrap();
    push_u32(&mut truncated, header.to_word());
    push_u32(&mut truncated, gl::ARRAY_BUFFER);
    assert_eq!(decode_command(&truncated).unwrap_err(), ParseError::OutOfBounds);
}

#[test]
fn clear_bufferfv_always_carries_four_floats() {
    let depth = Command::new(CommandId::ClearBufferfvImmediate)
        .arg(gl::DEPTH)
        .arg(0i32)
        .with_f32_data(&[1.0]);
    let bytes = depth.encode().unwrap();
    assert_eq!(bytes.len(), 12 + 16);

    let view = decode_command(&bytes).unwrap();
    assert_eq!(view.immediate().unwrap().len(), 16);
    assert_eq!(view.effective_data().unwrap(), Some(&1.0f32.to_le_bytes()[..]));

    let color = Command::new(CommandId::ClearBufferfvImmediate)
        .arg(gl::COLOR)
        .arg(0i32)
        .with_f32_data(&[0.1, 0.2, 0.3, 0.4]);
    let bytes = color.encode().unwrap();
    let view = decode_command(&bytes).unwrap();
    assert_eq!(view.effective_data().unwrap().map(<[u8]>::len), Some(16));

    // An invalid selector still decodes; the meaningful prefix is unknown.
    let bad = Command::new(CommandId::ClearBufferfvImmediate)
        .arg(gl::STENCIL)
        .arg(0i32)
        .encode()
        .unwrap();
    assert_eq!(decode_command(&bad).unwrap().effective_data(), Ok(None));
}

#[test]
fn ring_contents_decode_from_get_to_put() {
    let mut ring = CommandRing::new(16);
    let first = ring.insert_token().unwrap();
    ring.append(&Command::new(CommandId::Flush)).unwrap();
    let second = ring.insert_token().unwrap();
    assert_eq!((first, second), (1, 2));

    let end = ring.put() * 4;
    let ids: Vec<_> = CommandIter::new(&ring.as_bytes()[..end])
        .map(|(_, cmd)| cmd.unwrap().id())
        .collect();
    assert_eq!(ids, vec![CommandId::SetToken, CommandId::Flush, CommandId::SetToken]);
}

proptest! {
    #[test]
    fn immediate_count_beyond_payload_is_out_of_bounds(carried in 0u32..8, extra in 1u32..1024) {
        let ids: Vec<u32> = (1..=carried).collect();
        let mut bytes = Command::new(CommandId::DeleteTexturesImmediate)
            .arg(carried as i32)
            .with_u32_data(&ids)
            .encode()
            .unwrap();
        bytes[4..8].copy_from_slice(&(carried + extra).to_le_bytes());
        let view = decode_command(&bytes).unwrap();
        prop_assert_eq!(view.immediate(), Err(ParseError::OutOfBounds));
    }

    #[test]
    fn arbitrary_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        for (_, cmd) in CommandIter::new(&bytes) {
            if let Ok(view) = cmd {
                let _ = view.immediate();
                let _ = view.effective_data();
            }
        }
    }
}
