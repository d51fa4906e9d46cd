use rollup_client::BackendError;
use rollup_codec::CodecError;
use rollup_types::QueueIndex;
use thiserror::Error;

/// Role check failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessControlError {
    #[error("caller may not manage this role")]
    InvalidCaller,

    #[error("account does not hold the role")]
    MissingRole,

    #[error("account already holds the role")]
    RoleRedundant,
}

/// Errors returned by anchor entry points.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnchorError {
    #[error("invalid pop target {target} for queue [{head}, {tail})")]
    InvalidPopTarget {
        target: QueueIndex,
        head: QueueIndex,
        tail: QueueIndex,
    },

    #[error("condition not met")]
    ConditionNotMet,

    #[error("failed to decode: {0}")]
    FailedToDecode(String),

    #[error("queue index overflow")]
    QueueIndexOverflow,

    #[error("access control: {0}")]
    AccessControl(#[from] AccessControlError),

    #[error("forward request sent to another contract")]
    InvalidDestination,

    #[error("nonce mismatch: expected {expected}, got {got}")]
    NonceTooLow { expected: u128, got: u128 },

    #[error("nonce overflow")]
    NonceOverflow,

    #[error("incorrect signature")]
    IncorrectSignature,

    #[error("signer does not match request sender")]
    PublicKeyNotMatch,

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl From<AnchorError> for BackendError {
    fn from(err: AnchorError) -> Self {
        match err {
            AnchorError::ConditionNotMet => BackendError::ConditionNotMet,
            other => BackendError::Rejected(other.to_string()),
        }
    }
}
