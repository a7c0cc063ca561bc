use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Error is the failure type of every packing, opening and transport operation.
///
/// Unknown users or items are not errors; lookups report them as `None`.
#[derive(Debug, Error)]
pub enum Error {
    /// The header's magic, version, flags or declared sizes are unusable.
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// The file holds fewer bytes than its header declares.
    #[error("truncated file: expected at least {expected} bytes, found {actual}")]
    TruncatedFile { expected: u64, actual: u64 },

    /// The operation is not allowed in the current state (e.g. writing to a closed packer).
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// The data is structurally invalid (e.g. a corrupt index table or transport stream).
    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn truncated(expected: u64, actual: u64) -> Self {
        Self::TruncatedFile { expected, actual }
    }

    /// eof_as_invalid maps a premature end of stream onto `InvalidData`, leaving other I/O
    /// failures as they are.
    pub(crate) fn eof_as_invalid(e: io::Error, what: &str) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Self::InvalidData(format!("unexpected end of stream reading {}", what))
        } else {
            Self::Io(e)
        }
    }
}
