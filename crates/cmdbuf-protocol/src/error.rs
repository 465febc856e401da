use thiserror::Error;

/// Transport-level result of executing one command.
///
/// These are returned directly from the decode loop. Semantic (GL) errors never show up here;
/// they are latched separately and drained with the `GetError` command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[repr(u32)]
pub enum ParseError {
    #[error("invalid command size")]
    InvalidSize = 1,
    #[error("command data out of bounds")]
    OutOfBounds = 2,
    #[error("unknown command")]
    UnknownCommand = 3,
    #[error("invalid command arguments")]
    InvalidArguments = 4,
}

pub type ParseResult<T = ()> = Result<T, ParseError>;

/// Wire code for "no error", as stored alongside the other [`ParseError`] codes.
pub const NO_ERROR_CODE: u32 = 0;

impl ParseError {
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::InvalidSize),
            2 => Some(Self::OutOfBounds),
            3 => Some(Self::UnknownCommand),
            4 => Some(Self::InvalidArguments),
            _ => None,
        }
    }
}

/// Collapses a command result into its wire code.
pub fn result_code(result: ParseResult) -> u32 {
    match result {
        Ok(()) => NO_ERROR_CODE,
        Err(err) => err.code(),
    }
}
