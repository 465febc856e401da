//! Latched GL errors, drained one at a time by `GetError`.

use bitflags::bitflags;
use cmdbuf_protocol::gl::{self, GLenum};
use tracing::debug;

bitflags! {
    #[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct GlErrors: u32 {
        const INVALID_ENUM = 1 << 0;
        const INVALID_VALUE = 1 << 1;
        const INVALID_OPERATION = 1 << 2;
        const OUT_OF_MEMORY = 1 << 3;
        const INVALID_FRAMEBUFFER_OPERATION = 1 << 4;
    }
}

impl GlErrors {
    pub fn from_gl(error: GLenum) -> Option<Self> {
        match error {
            gl::INVALID_ENUM => Some(Self::INVALID_ENUM),
            gl::INVALID_VALUE => Some(Self::INVALID_VALUE),
            gl::INVALID_OPERATION => Some(Self::INVALID_OPERATION),
            gl::OUT_OF_MEMORY => Some(Self::OUT_OF_MEMORY),
            gl::INVALID_FRAMEBUFFER_OPERATION => Some(Self::INVALID_FRAMEBUFFER_OPERATION),
            _ => None,
        }
    }

    /// GL enum of the lowest set bit, or `GL_NO_ERROR`.
    pub fn lowest_to_gl(self) -> GLenum {
        let lowest = self.bits() & self.bits().wrapping_neg();
        match Self::from_bits_truncate(lowest) {
            Self::INVALID_ENUM => gl::INVALID_ENUM,
            Self::INVALID_VALUE => gl::INVALID_VALUE,
            Self::INVALID_OPERATION => gl::INVALID_OPERATION,
            Self::OUT_OF_MEMORY => gl::OUT_OF_MEMORY,
            Self::INVALID_FRAMEBUFFER_OPERATION => gl::INVALID_FRAMEBUFFER_OPERATION,
            _ => gl::NO_ERROR,
        }
    }
}

/// Each distinct error is remembered once until it is read back.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorState {
    pending: GlErrors,
}

impl ErrorState {
    pub fn set(&mut self, error: GLenum, function: &str, msg: &str) {
        debug!(error, function, msg, "GL error");
        match GlErrors::from_gl(error) {
            Some(bit) => self.pending |= bit,
            None => debug!(error, "ignoring unknown GL error code"),
        }
    }

    /// Folds an error reported by the native driver into the latch.
    pub fn merge_native(&mut self, error: GLenum) {
        if let Some(bit) = GlErrors::from_gl(error) {
            self.pending |= bit;
        }
    }

    /// Clears and returns one pending error, lowest bit first.
    pub fn take(&mut self) -> GLenum {
        let error = self.pending.lowest_to_gl();
        if let Some(bit) = GlErrors::from_gl(error) {
            self.pending.remove(bit);
        }
        error
    }

    pub fn pending(&self) -> GlErrors {
        self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
