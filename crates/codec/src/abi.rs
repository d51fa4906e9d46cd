//! ABI wire flavour for EVM-style anchors.
//!
//! # Wire Format
//!
//! ```text
//! uint    [32-byte big-endian word]
//! bool    [word: 0 or 1]
//! string  [raw UTF-8]
//! bytes   [offset word = 32][length word][data, right-padded to 32]
//!
//! kv      (key, value)              empty value = absent
//! action  [0x00][reply payload]     Reply
//!         [0x01][index word]        SetQueueHead
//! ```

use crate::{CodecError, RawEncoder, TypeCoder};
use rollup_types::{Action, IntType, KvEntry, QueueIndex, U256};

/// Size of one ABI word.
pub const WORD_SIZE: usize = 32;

/// Action tag for a reply.
pub const ACTION_TAG_REPLY: u8 = 0x00;

/// Action tag for a queue head update.
pub const ACTION_TAG_SET_QUEUE_HEAD: u8 = 0x01;

fn word(value: &U256) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

fn usize_word(value: usize) -> Vec<u8> {
    word(&U256::from(value as u64))
}

fn read_word(bytes: &[u8], at: usize) -> Result<U256, CodecError> {
    let end = at + WORD_SIZE;
    if bytes.len() < end {
        return Err(CodecError::InvalidLength {
            expected: end,
            actual: bytes.len(),
        });
    }
    U256::from_be_slice(&bytes[at..end])
        .ok_or_else(|| CodecError::MalformedAbi("word wider than 256 bits".into()))
}

fn read_usize_word(bytes: &[u8], at: usize) -> Result<usize, CodecError> {
    let value = read_word(bytes, at)?;
    u64::try_from(value)
        .ok()
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| CodecError::MalformedAbi(format!("word at {} is not a length", at)))
}

/// 32-byte-word scalar coder.
#[derive(Debug, Clone, Copy, Default)]
pub struct AbiTypeCoder;

impl TypeCoder for AbiTypeCoder {
    fn encode_uint(&self, value: &U256, ty: IntType) -> Result<Vec<u8>, CodecError> {
        if !ty.fits(value) {
            return Err(CodecError::Overflow(ty));
        }
        Ok(word(value))
    }

    fn decode_uint(&self, bytes: &[u8], ty: IntType) -> Result<U256, CodecError> {
        if bytes.len() != WORD_SIZE {
            return Err(CodecError::InvalidLength {
                expected: WORD_SIZE,
                actual: bytes.len(),
            });
        }
        let value = read_word(bytes, 0)?;
        if !ty.fits(&value) {
            return Err(CodecError::Overflow(ty));
        }
        Ok(value)
    }

    fn encode_boolean(&self, value: bool) -> Result<Vec<u8>, CodecError> {
        Ok(word(&U256::from(value as u8)))
    }

    fn decode_boolean(&self, bytes: &[u8]) -> Result<bool, CodecError> {
        let value = self
            .decode_uint(bytes, IntType::U8)
            .map_err(|_| CodecError::InvalidBoolean)?;
        match u8::try_from(value) {
            Ok(0) => Ok(false),
            Ok(1) => Ok(true),
            _ => Err(CodecError::InvalidBoolean),
        }
    }

    fn encode_string(&self, value: &str) -> Result<Vec<u8>, CodecError> {
        Ok(value.as_bytes().to_vec())
    }

    fn decode_string(&self, bytes: &[u8]) -> Result<String, CodecError> {
        String::from_utf8(bytes.to_vec()).map_err(|e| CodecError::InvalidUtf8(e.to_string()))
    }

    fn encode_bytes(&self, value: &[u8]) -> Result<Vec<u8>, CodecError> {
        let padded = value.len().div_ceil(WORD_SIZE) * WORD_SIZE;
        let mut out = Vec::with_capacity(2 * WORD_SIZE + padded);
        out.extend(usize_word(WORD_SIZE));
        out.extend(usize_word(value.len()));
        out.extend_from_slice(value);
        out.resize(2 * WORD_SIZE + padded, 0);
        Ok(out)
    }

    fn decode_bytes(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        let offset = read_usize_word(bytes, 0)?;
        if offset != WORD_SIZE {
            return Err(CodecError::MalformedAbi(format!(
                "unexpected bytes offset {}",
                offset
            )));
        }
        let len = read_usize_word(bytes, WORD_SIZE)?;
        let data_start = 2 * WORD_SIZE;
        if len > bytes.len() - data_start {
            return Err(CodecError::MalformedAbi(format!(
                "bytes length {} exceeds {} available",
                len,
                bytes.len() - data_start
            )));
        }
        let padded = len.div_ceil(WORD_SIZE) * WORD_SIZE;
        let expected = data_start + padded;
        if bytes.len() != expected {
            return Err(CodecError::InvalidLength {
                expected,
                actual: bytes.len(),
            });
        }
        if bytes[data_start + len..].iter().any(|b| *b != 0) {
            return Err(CodecError::MalformedAbi("non-zero padding".into()));
        }
        Ok(bytes[data_start..data_start + len].to_vec())
    }
}

/// Tuple pairs and byte-tagged actions.
///
/// Role actions have no ABI form and are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct AbiEncoder;

impl AbiEncoder {
    /// Inverse of `encode_key_value`: an empty value means absent.
    pub fn decode_key_value(&self, kv: &(Vec<u8>, Vec<u8>)) -> KvEntry {
        let (key, value) = kv;
        let value = if value.is_empty() {
            None
        } else {
            Some(value.clone())
        };
        (key.clone(), value)
    }

    /// Inverse of `encode_action`.
    pub fn decode_action(&self, bytes: &[u8]) -> Result<Action, CodecError> {
        let (tag, payload) = bytes
            .split_first()
            .ok_or_else(|| CodecError::MalformedAbi("empty action".into()))?;
        match *tag {
            ACTION_TAG_REPLY => Ok(Action::Reply(payload.to_vec())),
            ACTION_TAG_SET_QUEUE_HEAD => {
                let index = AbiTypeCoder.decode_index(payload, IntType::U256)?;
                Ok(Action::SetQueueHead(index))
            }
            other => Err(CodecError::MalformedAbi(format!(
                "unknown action tag {:#04x}",
                other
            ))),
        }
    }

    fn tagged(tag: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + payload.len());
        out.push(tag);
        out.extend_from_slice(payload);
        out
    }

    fn index_word(index: QueueIndex) -> Vec<u8> {
        word(&U256::from(index))
    }
}

impl RawEncoder for AbiEncoder {
    type Kv = (Vec<u8>, Vec<u8>);
    type Action = Vec<u8>;

    fn encode_key_value(&self, key: &[u8], value: Option<&[u8]>) -> Self::Kv {
        (key.to_vec(), value.map(|v| v.to_vec()).unwrap_or_default())
    }

    fn encode_action(&self, action: &Action) -> Result<Vec<u8>, CodecError> {
        match action {
            Action::Reply(payload) => Ok(Self::tagged(ACTION_TAG_REPLY, payload)),
            Action::SetQueueHead(index) => Ok(Self::tagged(
                ACTION_TAG_SET_QUEUE_HEAD,
                &Self::index_word(*index),
            )),
            Action::GrantAttestor(_) => Err(CodecError::UnsupportedAction("GrantAttestor")),
            Action::RevokeAttestor(_) => Err(CodecError::UnsupportedAction("RevokeAttestor")),
        }
    }
}
