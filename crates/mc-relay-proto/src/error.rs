//! Protocol-level errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("buffer too short: need {needed} more bytes, have {remaining}")]
    BufferTooShort { needed: usize, remaining: usize },

    #[error("VarInt encoding error: {0}")]
    VarInt(#[from] crate::types::VarIntError),

    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    #[error("string too long: {len} > {max}")]
    StringTooLong { len: usize, max: usize },

    #[error("frame too large: {0} bytes")]
    FrameTooLarge(usize),

    #[error("frame length prefix is malformed")]
    BadFrameLength,

    #[error("decompression error: {0}")]
    DecompressError(String),

    #[error("compression error: {0}")]
    CompressError(String),

    #[error("cipher already installed for this direction")]
    CipherAlreadySet,

    #[error("NBT nesting exceeds {0} levels")]
    NbtTooDeep(usize),

    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl ProtoError {
    /// Whether this error means the byte stream itself can no longer be trusted.
    pub fn is_malformed_frame(&self) -> bool {
        !matches!(self, ProtoError::CipherAlreadySet)
    }
}
