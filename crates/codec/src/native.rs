//! Native wire flavour: SBOR scalars and tagged actions.

use crate::{sbor_decode, sbor_encode, CodecError, RawEncoder, TypeCoder};
use rollup_types::{Action, IntType, KvEntry, U256};

/// SBOR-based scalar coder.
///
/// Each width is encoded as its SBOR primitive, so a value written as `u32`
/// cannot be read back as `u64`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SborTypeCoder;

impl TypeCoder for SborTypeCoder {
    fn encode_uint(&self, value: &U256, ty: IntType) -> Result<Vec<u8>, CodecError> {
        match ty {
            IntType::U8 => sbor_encode(&u8::try_from(*value)?),
            IntType::U16 => sbor_encode(&u16::try_from(*value)?),
            IntType::U32 => sbor_encode(&u32::try_from(*value)?),
            IntType::U64 => sbor_encode(&u64::try_from(*value)?),
            IntType::U128 => sbor_encode(&u128::try_from(*value)?),
            IntType::U256 => sbor_encode(value),
        }
    }

    fn decode_uint(&self, bytes: &[u8], ty: IntType) -> Result<U256, CodecError> {
        Ok(match ty {
            IntType::U8 => U256::from(sbor_decode::<u8>(bytes)?),
            IntType::U16 => U256::from(sbor_decode::<u16>(bytes)?),
            IntType::U32 => U256::from(sbor_decode::<u32>(bytes)?),
            IntType::U64 => U256::from(sbor_decode::<u64>(bytes)?),
            IntType::U128 => U256::from(sbor_decode::<u128>(bytes)?),
            IntType::U256 => sbor_decode::<U256>(bytes)?,
        })
    }

    fn encode_boolean(&self, value: bool) -> Result<Vec<u8>, CodecError> {
        sbor_encode(&value)
    }

    fn decode_boolean(&self, bytes: &[u8]) -> Result<bool, CodecError> {
        sbor_decode(bytes).map_err(|_| CodecError::InvalidBoolean)
    }

    fn encode_string(&self, value: &str) -> Result<Vec<u8>, CodecError> {
        sbor_encode(&value.to_string())
    }

    fn decode_string(&self, bytes: &[u8]) -> Result<String, CodecError> {
        sbor_decode(bytes)
    }

    fn encode_bytes(&self, value: &[u8]) -> Result<Vec<u8>, CodecError> {
        sbor_encode(&value.to_vec())
    }

    fn decode_bytes(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        sbor_decode(bytes)
    }
}

/// Passes pairs and actions through unchanged.
///
/// The anchor consumes `(key, Option<value>)` tuples and the tagged
/// [`Action`] enum directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeEncoder;

impl RawEncoder for NativeEncoder {
    type Kv = KvEntry;
    type Action = Action;

    fn encode_key_value(&self, key: &[u8], value: Option<&[u8]>) -> KvEntry {
        (key.to_vec(), value.map(|v| v.to_vec()))
    }

    fn encode_action(&self, action: &Action) -> Result<Action, CodecError> {
        Ok(action.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollup_types::{BigIntType, NumberType};

    #[test]
    fn test_number_boundaries() {
        let coder = SborTypeCoder;
        for (value, ty) in [
            (0u32, NumberType::U8),
            (u8::MAX as u32, NumberType::U8),
            (u16::MAX as u32, NumberType::U16),
            (u32::MAX, NumberType::U32),
        ] {
            let bytes = coder.encode_number(value, ty).unwrap();
            assert_eq!(coder.decode_number(&bytes, ty).unwrap(), value);
        }
    }

    #[test]
    fn test_big_int_boundaries() {
        let coder = SborTypeCoder;
        for (value, ty) in [
            (U256::ZERO, BigIntType::U64),
            (U256::from(u64::MAX), BigIntType::U64),
            (U256::from(u128::MAX), BigIntType::U128),
            (U256::MAX, BigIntType::U256),
        ] {
            let bytes = coder.encode_big_int(&value, ty).unwrap();
            assert_eq!(coder.decode_big_int(&bytes, ty).unwrap(), value);
        }
    }

    #[test]
    fn test_overflow_rejected() {
        let coder = SborTypeCoder;
        assert_eq!(
            coder.encode_number(256, NumberType::U8),
            Err(CodecError::Overflow(IntType::U8))
        );
        assert_eq!(
            coder.encode_big_int(&U256::MAX, BigIntType::U128),
            Err(CodecError::Overflow(IntType::U128))
        );
    }

    #[test]
    fn test_width_mismatch_is_decode_error() {
        let coder = SborTypeCoder;
        let bytes = coder.encode_index(5, IntType::U32).unwrap();
        assert!(coder.decode_index(&bytes, IntType::U64).is_err());
        assert_eq!(coder.decode_index(&bytes, IntType::U32).unwrap(), 5);
    }

    #[test]
    fn test_strings_bytes_and_booleans() {
        let coder = SborTypeCoder;
        for s in ["", "a", "héllo"] {
            let bytes = coder.encode_string(s).unwrap();
            assert_eq!(coder.decode_string(&bytes).unwrap(), s);
        }
        for b in [vec![], vec![0u8], vec![1, 2, 3]] {
            let bytes = coder.encode_bytes(&b).unwrap();
            assert_eq!(coder.decode_bytes(&bytes).unwrap(), b);
        }
        for v in [true, false] {
            let bytes = coder.encode_boolean(v).unwrap();
            assert_eq!(coder.decode_boolean(&bytes).unwrap(), v);
        }
        assert_eq!(coder.decode_boolean(&[0xff]), Err(CodecError::InvalidBoolean));
    }

    #[test]
    fn test_native_encoder_preserves_absence() {
        let encoder = NativeEncoder;
        assert_eq!(encoder.encode_key_value(b"k", None), (b"k".to_vec(), None));
        assert_eq!(
            encoder.encode_key_value(b"k", Some(b"")),
            (b"k".to_vec(), Some(vec![]))
        );
        assert_eq!(
            encoder.encode_action(&Action::SetQueueHead(3)).unwrap(),
            Action::SetQueueHead(3)
        );
    }
}
