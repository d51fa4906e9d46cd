//! Scalar encoding contract.

use crate::CodecError;
use rollup_types::{BigIntType, IntType, NumberType, QueueIndex, U256};

/// Converts scalars to and from the opaque bytes a backend stores.
///
/// Implementors provide the width-generic integer primitives plus booleans,
/// strings and bytes. The typed helpers (`number`, `big_int`, `index`) are
/// derived from `encode_uint`/`decode_uint`.
///
/// Encoding must be deterministic: the engine asserts equality on raw
/// bytes when it builds optimistic-lock conditions.
pub trait TypeCoder: Send + Sync {
    /// Encode `value` at width `ty`, failing if it does not fit.
    fn encode_uint(&self, value: &U256, ty: IntType) -> Result<Vec<u8>, CodecError>;

    /// Decode an integer stored at width `ty`.
    fn decode_uint(&self, bytes: &[u8], ty: IntType) -> Result<U256, CodecError>;

    fn encode_boolean(&self, value: bool) -> Result<Vec<u8>, CodecError>;

    fn decode_boolean(&self, bytes: &[u8]) -> Result<bool, CodecError>;

    fn encode_string(&self, value: &str) -> Result<Vec<u8>, CodecError>;

    fn decode_string(&self, bytes: &[u8]) -> Result<String, CodecError>;

    fn encode_bytes(&self, value: &[u8]) -> Result<Vec<u8>, CodecError>;

    fn decode_bytes(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError>;

    // Derived methods

    /// Encode a `u8`/`u16`/`u32`.
    fn encode_number(&self, value: u32, ty: NumberType) -> Result<Vec<u8>, CodecError> {
        self.encode_uint(&U256::from(value), ty.into())
    }

    /// Decode a `u8`/`u16`/`u32`.
    fn decode_number(&self, bytes: &[u8], ty: NumberType) -> Result<u32, CodecError> {
        let value = self.decode_uint(bytes, ty.into())?;
        Ok(u32::try_from(value)?)
    }

    /// Encode a `u64`/`u128`/`u256`.
    fn encode_big_int(&self, value: &U256, ty: BigIntType) -> Result<Vec<u8>, CodecError> {
        self.encode_uint(value, ty.into())
    }

    /// Decode a `u64`/`u128`/`u256`.
    fn decode_big_int(&self, bytes: &[u8], ty: BigIntType) -> Result<U256, CodecError> {
        self.decode_uint(bytes, ty.into())
    }

    /// Encode a queue index or version number at the configured width.
    fn encode_index(&self, value: QueueIndex, ty: IntType) -> Result<Vec<u8>, CodecError> {
        self.encode_uint(&U256::from(value), ty)
    }

    /// Decode a queue index or version number at the configured width.
    fn decode_index(&self, bytes: &[u8], ty: IntType) -> Result<QueueIndex, CodecError> {
        let value = self.decode_uint(bytes, ty)?;
        u64::try_from(value).map_err(|_| CodecError::Overflow(IntType::U64))
    }
}
