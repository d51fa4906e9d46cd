//! Storage primitives and the reserved key layout.

/// Opaque storage slot identifier.
pub type Key = Vec<u8>;

/// Opaque stored value.
pub type Value = Vec<u8>;

/// A key paired with a value or an explicit absence.
///
/// Used both as a condition (`None` asserts the slot is empty) and as an
/// update (`None` deletes the slot).
pub type KvEntry = (Key, Option<Value>);

/// Position in the message queue.
pub type QueueIndex = u64;

/// Optimistic-concurrency counter stored at the version key.
pub type VersionNumber = u64;

/// Default key holding the version number.
pub const DEFAULT_VERSION_KEY: &[u8] = b"v/_number";

/// Default key holding the queue head index.
pub const DEFAULT_QUEUE_HEAD_KEY: &[u8] = b"q/_head";

/// Default key holding the queue tail index.
pub const DEFAULT_QUEUE_TAIL_KEY: &[u8] = b"q/_tail";

/// Default prefix of every message slot.
pub const DEFAULT_MESSAGE_PREFIX: &[u8] = b"q/";

/// Keys agreed with the remote contract for the lifetime of a deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedKeys {
    /// Slot holding the version number.
    pub version: Key,
    /// Slot holding the index of the oldest unconsumed message.
    pub queue_head: Key,
    /// Slot holding the index of the next free message slot.
    pub queue_tail: Key,
    /// Prefix prepended to the encoded index of every message slot.
    pub message_prefix: Vec<u8>,
}

impl Default for ReservedKeys {
    fn default() -> Self {
        Self {
            version: DEFAULT_VERSION_KEY.to_vec(),
            queue_head: DEFAULT_QUEUE_HEAD_KEY.to_vec(),
            queue_tail: DEFAULT_QUEUE_TAIL_KEY.to_vec(),
            message_prefix: DEFAULT_MESSAGE_PREFIX.to_vec(),
        }
    }
}

impl ReservedKeys {
    /// Build a message slot key from an already-encoded queue index.
    pub fn message_key(&self, encoded_index: &[u8]) -> Key {
        let mut key = Vec::with_capacity(self.message_prefix.len() + encoded_index.len());
        key.extend_from_slice(&self.message_prefix);
        key.extend_from_slice(encoded_index);
        key
    }

    /// Whether `key` is one of the three control-plane slots.
    pub fn is_control_key(&self, key: &[u8]) -> bool {
        key == self.version.as_slice()
            || key == self.queue_head.as_slice()
            || key == self.queue_tail.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let keys = ReservedKeys::default();
        assert_eq!(keys.version, b"v/_number".to_vec());
        assert_eq!(keys.queue_head, b"q/_head".to_vec());
        assert_eq!(keys.queue_tail, b"q/_tail".to_vec());
        assert!(keys.is_control_key(b"q/_tail"));
        assert!(!keys.is_control_key(b"q/\x01"));
    }

    #[test]
    fn test_message_key_prefixing() {
        let keys = ReservedKeys::default();
        assert_eq!(keys.message_key(&[0, 0, 0, 7]), b"q/\x00\x00\x00\x07".to_vec());
    }
}
