use crate::CodecError;
use rollup_types::Action;
use std::fmt;

/// Maps engine-level key/value pairs and actions onto a backend's call shapes.
///
/// A key/value pair is used both for conditions (`None` asserts absence) and
/// for updates (`None` deletes).
pub trait RawEncoder: Send + Sync {
    /// Wire shape of one key/value pair.
    type Kv: Clone + fmt::Debug + Send + Sync;

    /// Wire shape of one action.
    type Action: Clone + fmt::Debug + Send + Sync;

    fn encode_key_value(&self, key: &[u8], value: Option<&[u8]>) -> Self::Kv;

    /// Fails for action variants the backend cannot express.
    fn encode_action(&self, action: &Action) -> Result<Self::Action, CodecError>;
}
