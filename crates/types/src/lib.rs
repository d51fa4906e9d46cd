//! Core types for the rollup transaction engine.
//!
//! This crate provides the foundational types shared by the engine, the
//! codecs and the anchor:
//!
//! - **Storage**: `Key`, `Value`, `KvEntry` and the reserved key layout
//! - **Integers**: `U256` and the width selectors used by type coders
//! - **Actions**: the closed set of outbound effects a rollup can carry
//! - **Identity**: attestor signing keys, signatures and account ids
//!
//! # Design Philosophy
//!
//! This crate has no dependencies on other workspace crates. Everything here
//! is plain data: no I/O, no encoding policy. How a value is laid out on the
//! wire is decided by `rollup-codec`.

mod action;
mod hash;
mod identity;
mod int;
mod kv;

pub use action::Action;
pub use hash::{Hash, HexError, TxHash};
pub use identity::{AccountId, AttestorKey, AttestorSignature, SignatureError};
pub use int::{BigIntType, IntConversionError, IntType, NumberType, U256};
pub use kv::{
    KvEntry, Key, QueueIndex, ReservedKeys, Value, VersionNumber, DEFAULT_MESSAGE_PREFIX,
    DEFAULT_QUEUE_HEAD_KEY, DEFAULT_QUEUE_TAIL_KEY, DEFAULT_VERSION_KEY,
};

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
