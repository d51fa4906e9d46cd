//! Encoders between engine values and the bytes a backend stores or sends.
//!
//! Three independent contracts, each pluggable per backend or per message
//! schema:
//!
//! - [`TypeCoder`]: scalars (integers of a declared width, booleans,
//!   strings, bytes) to and from stored values
//! - [`MessageCoder`]: domain request/response messages to and from bytes
//! - [`RawEncoder`]: engine-level key/value pairs and actions into the
//!   concrete argument shapes a backend's transaction call expects
//!
//! Two wire flavours ship here:
//!
//! | Flavour | Scalars | KV pair | Action |
//! |---|---|---|---|
//! | Native | SBOR | `(key, Option<value>)` | tagged [`Action`](rollup_types::Action) |
//! | ABI | 32-byte big-endian words | `(key, value or empty)` | `tag ‖ payload` bytes |
//!
//! Every decode is the exact inverse of its encode; malformed input is an
//! error, never a silent default.

mod abi;
mod error;
mod message_coder;
mod native;
mod raw_encoder;
mod type_coder;

pub use abi::{AbiEncoder, AbiTypeCoder, ACTION_TAG_REPLY, ACTION_TAG_SET_QUEUE_HEAD, WORD_SIZE};
pub use error::CodecError;
pub use message_coder::{MessageCoder, RawMessageCoder, SborMessageCoder};
pub use native::{NativeEncoder, SborTypeCoder};
pub use raw_encoder::RawEncoder;
pub use type_coder::TypeCoder;

/// SBOR-encode any value, mapping failures into [`CodecError`].
pub fn sbor_encode<T: sbor::BasicEncode + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
    sbor::basic_encode(value).map_err(|e| CodecError::SborEncode(format!("{:?}", e)))
}

/// SBOR-decode any value, mapping failures into [`CodecError`].
pub fn sbor_decode<T: sbor::BasicDecode>(bytes: &[u8]) -> Result<T, CodecError> {
    sbor::basic_decode(bytes).map_err(|e| CodecError::SborDecode(format!("{:?}", e)))
}
