//! Test fixtures shared across crates.

use crate::{AttestorKey, Key};

/// Deterministic attestor derived from a single seed byte.
pub fn test_attestor(seed: u8) -> AttestorKey {
    AttestorKey::from_seed(&[seed; 32])
}

/// Application key from a string literal.
pub fn key(name: &str) -> Key {
    name.as_bytes().to_vec()
}
