use rollup_types::IntType;
use serde::Deserialize;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Width of queue head, tail and `SetQueueHead` payloads.
    pub index_type: IntType,

    /// Width of the version number.
    pub version_type: IntType,

    /// Commit through the delegated-signing path.
    pub meta_transaction: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            index_type: IntType::U32,
            version_type: IntType::U32,
            meta_transaction: false,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the queue index width.
    pub fn with_index_type(mut self, ty: IntType) -> Self {
        self.index_type = ty;
        self
    }

    /// Set the version number width.
    pub fn with_version_type(mut self, ty: IntType) -> Self {
        self.version_type = ty;
        self
    }

    /// Force the delegated-signing path.
    pub fn with_meta_transaction(mut self, enabled: bool) -> Self {
        self.meta_transaction = enabled;
        self
    }
}
