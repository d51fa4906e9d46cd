//! Unsigned integer widths and a 256-bit container.

use radix_common::math;
use sbor::prelude::*;
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// Width selector for small fixed-width integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumberType {
    U8,
    U16,
    U32,
}

/// Width selector for big integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BigIntType {
    U64,
    U128,
    U256,
}

/// Every unsigned width a type coder understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntType {
    U8,
    U16,
    U32,
    U64,
    U128,
    U256,
}

impl IntType {
    /// Number of bytes needed to hold the largest value of this width.
    pub const fn byte_width(self) -> usize {
        match self {
            IntType::U8 => 1,
            IntType::U16 => 2,
            IntType::U32 => 4,
            IntType::U64 => 8,
            IntType::U128 => 16,
            IntType::U256 => 32,
        }
    }

    /// Whether `value` is representable at this width.
    pub fn fits(self, value: &U256) -> bool {
        value.significant_bytes() <= self.byte_width()
    }

    /// Whether `value` is representable at this width.
    pub fn fits_u64(self, value: u64) -> bool {
        self.fits(&U256::from(value))
    }
}

impl fmt::Display for IntType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IntType::U8 => "u8",
            IntType::U16 => "u16",
            IntType::U32 => "u32",
            IntType::U64 => "u64",
            IntType::U128 => "u128",
            IntType::U256 => "u256",
        };
        f.write_str(name)
    }
}

impl From<NumberType> for IntType {
    fn from(ty: NumberType) -> Self {
        match ty {
            NumberType::U8 => IntType::U8,
            NumberType::U16 => IntType::U16,
            NumberType::U32 => IntType::U32,
        }
    }
}

impl From<BigIntType> for IntType {
    fn from(ty: BigIntType) -> Self {
        match ty {
            BigIntType::U64 => IntType::U64,
            BigIntType::U128 => IntType::U128,
            BigIntType::U256 => IntType::U256,
        }
    }
}

/// A value did not fit the requested width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("value does not fit in {target}")]
pub struct IntConversionError {
    pub target: IntType,
}

/// 256-bit unsigned integer stored big-endian.
///
/// Big-endian storage makes the derived ordering numeric and the SBOR form a
/// plain 32-byte array. Arithmetic and formatting go through
/// [`radix_common::math::U256`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, BasicSbor)]
#[sbor(transparent)]
pub struct U256([u8; 32]);

impl U256 {
    pub const ZERO: Self = U256([0u8; 32]);
    pub const MAX: Self = U256([0xffu8; 32]);

    /// Construct from 32 big-endian bytes.
    pub const fn from_be_bytes(bytes: [u8; 32]) -> Self {
        U256(bytes)
    }

    /// The 32 big-endian bytes.
    pub const fn to_be_bytes(self) -> [u8; 32] {
        self.0
    }

    /// Construct from a big-endian slice of any length.
    ///
    /// Leading zero bytes beyond 32 are accepted; returns `None` if the value
    /// needs more than 256 bits.
    pub fn from_be_slice(bytes: &[u8]) -> Option<Self> {
        let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
        let significant = &bytes[start..];
        if significant.len() > 32 {
            return None;
        }
        let mut out = [0u8; 32];
        out[32 - significant.len()..].copy_from_slice(significant);
        Some(U256(out))
    }

    /// The low `width` bytes, big-endian, or an error if higher bytes are set.
    pub fn to_be_width(&self, ty: IntType) -> Result<Vec<u8>, IntConversionError> {
        if !ty.fits(self) {
            return Err(IntConversionError { target: ty });
        }
        Ok(self.0[32 - ty.byte_width()..].to_vec())
    }

    /// Number of bytes after stripping leading zeros.
    pub fn significant_bytes(&self) -> usize {
        32 - self.0.iter().take_while(|b| **b == 0).count()
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// The arithmetic form.
    pub fn to_math(self) -> math::U256 {
        let mut le = self.0;
        le.reverse();
        math::U256::from_le_bytes(&le)
    }

    pub fn from_math(value: math::U256) -> Self {
        let mut be = value.to_le_bytes();
        be.reverse();
        U256(be)
    }
}

impl From<math::U256> for U256 {
    fn from(value: math::U256) -> Self {
        U256::from_math(value)
    }
}

impl From<U256> for math::U256 {
    fn from(value: U256) -> Self {
        value.to_math()
    }
}

macro_rules! impl_from_primitive {
    ($($ty:ty => $target:expr),*) => {
        $(
            impl From<$ty> for U256 {
                fn from(value: $ty) -> Self {
                    U256::from_math(math::U256::from(value))
                }
            }

            impl TryFrom<U256> for $ty {
                type Error = IntConversionError;

                fn try_from(value: U256) -> Result<Self, Self::Error> {
                    <$ty>::try_from(value.to_math())
                        .map_err(|_| IntConversionError { target: $target })
                }
            }
        )*
    };
}

impl_from_primitive!(
    u8 => IntType::U8,
    u16 => IntType::U16,
    u32 => IntType::U32,
    u64 => IntType::U64,
    u128 => IntType::U128
);

impl fmt::Display for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_math(), f)
    }
}

impl fmt::Debug for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U256({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_conversions() {
        assert_eq!(u8::try_from(U256::from(255u8)), Ok(255));
        assert_eq!(u32::try_from(U256::from(u32::MAX)), Ok(u32::MAX));
        assert_eq!(u128::try_from(U256::from(u128::MAX)), Ok(u128::MAX));
        assert_eq!(
            u16::try_from(U256::from(65_536u32)),
            Err(IntConversionError {
                target: IntType::U16
            })
        );
    }

    #[test]
    fn test_width_checks() {
        assert!(IntType::U8.fits(&U256::from(255u32)));
        assert!(!IntType::U8.fits(&U256::from(256u32)));
        assert!(IntType::U256.fits(&U256::MAX));
        assert!(!IntType::U128.fits(&U256::MAX));
        assert_eq!(
            U256::from(0x0102u16).to_be_width(IntType::U32).unwrap(),
            vec![0, 0, 1, 2]
        );
    }

    #[test]
    fn test_from_be_slice() {
        assert_eq!(U256::from_be_slice(&[0, 0, 7]), Some(U256::from(7u8)));
        assert_eq!(U256::from_be_slice(&[]), Some(U256::ZERO));
        let mut long = vec![0u8; 40];
        long[39] = 1;
        assert_eq!(U256::from_be_slice(&long), Some(U256::from(1u8)));
        long[0] = 1;
        assert_eq!(U256::from_be_slice(&long), None);
    }

    #[test]
    fn test_math_form_keeps_byte_order() {
        let value = U256::from(0x0102_0304u32);
        let wide = value.to_math();
        assert_eq!(wide, math::U256::from(0x0102_0304u32));
        assert_eq!(U256::from(wide), value);
        assert_eq!(U256::from_math(math::U256::MAX), U256::MAX);
        assert!(U256::from(7u8) < U256::from(u128::MAX));
    }

    #[test]
    fn test_decimal_display() {
        assert_eq!(U256::ZERO.to_string(), "0");
        assert_eq!(U256::from(1234567890u64).to_string(), "1234567890");
        assert_eq!(
            U256::from(u128::MAX).to_string(),
            "340282366920938463463374607431768211455"
        );
        assert_eq!(
            U256::MAX.to_string(),
            "115792089237316195423570985008687907853269984665640564039457584007913129639935"
        );
    }
}
