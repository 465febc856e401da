//! Growable command stream builder.
//!
//! Used by tests, fixtures and host-side tooling that need canonical command streams with
//! correct header sizes and zeroed padding.

use crate::command::{Command, EncodeError, Word};
use crate::gl;
use crate::header::{CommandHeader, ENTRY_SIZE};
use crate::shm::ShmRef;
use crate::table::CommandId;

#[derive(Debug, Default, Clone)]
pub struct CommandWriter {
    buf: Vec<u8>,
}

impl CommandWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.buf.clear();
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Appends `cmd` and returns the byte offset of the next free slot.
    pub fn append(&mut self, cmd: &Command) -> Result<usize, EncodeError> {
        let len = cmd.encoded_len()?;
        let offset = self.buf.len();
        self.buf.resize(offset + len, 0);
        cmd.encode_into(&mut self.buf[offset..])?;
        Ok(self.buf.len())
    }

    /// Appends a command without immediate data. The table guarantees such commands fit a
    /// header, so this cannot fail.
    fn append_fixed(&mut self, id: CommandId, args: &[Word]) -> usize {
        let info = id.info();
        debug_assert!(!info.has_immediate());
        debug_assert_eq!(args.len(), info.fields.len());

        let offset = self.buf.len();
        let entries = 1 + info.fields.len();
        let header = CommandHeader {
            command: id as u16,
            size: entries as u32,
        };
        self.buf.resize(offset + entries * ENTRY_SIZE, 0);
        self.buf[offset..offset + ENTRY_SIZE].copy_from_slice(&header.encode_le());
        for (idx, arg) in args.iter().take(info.fields.len()).enumerate() {
            let at = offset + ENTRY_SIZE * (idx + 1);
            self.buf[at..at + ENTRY_SIZE].copy_from_slice(&arg.0.to_le_bytes());
        }
        self.buf.len()
    }

    /// Pads with a `Noop` command covering `entries` entries (header included).
    pub fn noop(&mut self, entries: u32) -> Result<usize, EncodeError> {
        let skip = entries.saturating_sub(1) as usize * ENTRY_SIZE;
        self.append(&Command::new(CommandId::Noop).with_data(vec![0u8; skip]))
    }

    pub fn set_token(&mut self, token: i32) -> usize {
        self.append_fixed(CommandId::SetToken, &[token.into()])
    }

    pub fn set_bucket_size(&mut self, bucket_id: u32, size: u32) -> usize {
        self.append_fixed(CommandId::SetBucketSize, &[bucket_id.into(), size.into()])
    }

    pub fn set_bucket_data_immediate(
        &mut self,
        bucket_id: u32,
        offset: u32,
        data: &[u8],
    ) -> Result<usize, EncodeError> {
        self.append(
            &Command::new(CommandId::SetBucketDataImmediate)
                .arg(bucket_id)
                .arg(offset)
                .arg(data.len() as u32)
                .with_data(data),
        )
    }

    /// Sizes bucket `bucket_id` to `data` and fills it inline.
    pub fn put_bucket(&mut self, bucket_id: u32, data: &[u8]) -> Result<usize, EncodeError> {
        self.set_bucket_size(bucket_id, data.len() as u32);
        self.set_bucket_data_immediate(bucket_id, 0, data)
    }

    /// Emits `Gen*Immediate` (or any other `n`-counted id list command) for `ids`.
    pub fn gen_or_delete(&mut self, id: CommandId, ids: &[u32]) -> Result<usize, EncodeError> {
        self.append(
            &Command::new(id)
                .arg(ids.len() as i32)
                .with_u32_data(ids),
        )
    }

    pub fn bind_buffer(&mut self, target: gl::GLenum, buffer: u32) -> usize {
        self.append_fixed(CommandId::BindBuffer, &[target.into(), buffer.into()])
    }

    pub fn bind_texture(&mut self, target: gl::GLenum, texture: u32) -> usize {
        self.append_fixed(CommandId::BindTexture, &[target.into(), texture.into()])
    }

    pub fn buffer_data(
        &mut self,
        target: gl::GLenum,
        size: i32,
        data: ShmRef,
        usage: gl::GLenum,
    ) -> usize {
        self.append_fixed(
            CommandId::BufferData,
            &[
                target.into(),
                size.into(),
                data.id.into(),
                data.offset.into(),
                usage.into(),
            ],
        )
    }

    pub fn clear_color(&mut self, rgba: [f32; 4]) -> usize {
        self.append_fixed(
            CommandId::ClearColor,
            &[rgba[0].into(), rgba[1].into(), rgba[2].into(), rgba[3].into()],
        )
    }

    pub fn clear(&mut self, mask: gl::GLbitfield) -> usize {
        self.append_fixed(CommandId::Clear, &[mask.into()])
    }

    pub fn enable(&mut self, cap: gl::GLenum) -> usize {
        self.append_fixed(CommandId::Enable, &[cap.into()])
    }

    pub fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32) -> usize {
        self.append_fixed(
            CommandId::Viewport,
            &[x.into(), y.into(), width.into(), height.into()],
        )
    }

    pub fn draw_arrays(&mut self, mode: gl::GLenum, first: i32, count: i32) -> usize {
        self.append_fixed(CommandId::DrawArrays, &[mode.into(), first.into(), count.into()])
    }

    pub fn get_error(&mut self, result: ShmRef) -> usize {
        self.append_fixed(CommandId::GetError, &[result.id.into(), result.offset.into()])
    }

    pub fn get_integerv(&mut self, pname: gl::GLenum, params: ShmRef) -> usize {
        self.append_fixed(
            CommandId::GetIntegerv,
            &[pname.into(), params.id.into(), params.offset.into()],
        )
    }

    pub fn trace_begin(&mut self, category_bucket_id: u32, name_bucket_id: u32) -> usize {
        self.append_fixed(
            CommandId::TraceBeginCHROMIUM,
            &[category_bucket_id.into(), name_bucket_id.into()],
        )
    }

    pub fn trace_end(&mut self) -> usize {
        self.append_fixed(CommandId::TraceEndCHROMIUM, &[])
    }

    pub fn flush(&mut self) -> usize {
        self.append_fixed(CommandId::Flush, &[])
    }
}
