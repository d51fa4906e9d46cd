//! Domain message encoding.

use crate::{sbor_decode, sbor_encode, CodecError};
use std::marker::PhantomData;

/// Converts a domain message to and from the bytes stored in a queue slot or
/// carried by a reply.
pub trait MessageCoder<M>: Send + Sync {
    fn encode(&self, message: &M) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, bytes: &[u8]) -> Result<M, CodecError>;
}

/// SBOR coder for any message type deriving `BasicSbor`.
pub struct SborMessageCoder<M> {
    _marker: PhantomData<fn() -> M>,
}

impl<M> SborMessageCoder<M> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<M> Default for SborMessageCoder<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Clone for SborMessageCoder<M> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<M> std::fmt::Debug for SborMessageCoder<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SborMessageCoder")
    }
}

impl<M: sbor::BasicEncode + sbor::BasicDecode> MessageCoder<M> for SborMessageCoder<M> {
    fn encode(&self, message: &M) -> Result<Vec<u8>, CodecError> {
        sbor_encode(message)
    }

    fn decode(&self, bytes: &[u8]) -> Result<M, CodecError> {
        sbor_decode(bytes)
    }
}

/// Identity coder for workers that handle raw payloads themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawMessageCoder;

impl MessageCoder<Vec<u8>> for RawMessageCoder {
    fn encode(&self, message: &Vec<u8>) -> Result<Vec<u8>, CodecError> {
        Ok(message.clone())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(bytes.to_vec())
    }
}
