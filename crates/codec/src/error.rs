use rollup_types::{IntConversionError, IntType};
use thiserror::Error;

/// Errors that can occur while encoding or decoding stored values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("value does not fit in {0}")]
    Overflow(IntType),

    #[error("expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid boolean encoding")]
    InvalidBoolean,

    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    #[error("malformed ABI data: {0}")]
    MalformedAbi(String),

    #[error("SBOR decode error: {0}")]
    SborDecode(String),

    #[error("SBOR encode error: {0}")]
    SborEncode(String),

    #[error("unsupported action: {0}")]
    UnsupportedAction(&'static str),
}

impl From<IntConversionError> for CodecError {
    fn from(err: IntConversionError) -> Self {
        CodecError::Overflow(err.target)
    }
}
