use rollup_codec::CodecError;
use rollup_types::QueueIndex;
use thiserror::Error;

/// Errors reported by a [`Backend`](crate::Backend).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The ledger no longer holds what the transaction's conditions assert.
    #[error("condition not met")]
    ConditionNotMet,

    /// Transport or query failure.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The ledger or a dry run refused the transaction.
    #[error("rejected: {0}")]
    Rejected(String),

    /// The delegated-signing path was used without an attestor key.
    #[error("attestor signer not configured")]
    SignerNotConfigured,

    #[error("encoding error: {0}")]
    Encoding(#[from] CodecError),
}

/// Errors surfaced by the [`Client`](crate::Client).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("session not started")]
    SessionNotStarted,

    /// Another commit landed first. Roll back and start a new round.
    #[error("condition not met")]
    ConditionNotMet,

    #[error("remote query failed: {0}")]
    RemoteQuery(String),

    #[error("transaction submission failed: {0}")]
    Submission(String),

    #[error("attestor signer not configured")]
    SignerNotConfigured,

    #[error("decode error: {0}")]
    Decode(CodecError),

    #[error("encode error: {0}")]
    Encode(CodecError),

    /// A slot inside `[head, tail)` held no message.
    #[error("message {0} missing from queue")]
    MessageNotFound(QueueIndex),

    #[error("version number overflow")]
    VersionOverflow,
}

impl ClientError {
    /// Map a failure on the read path.
    pub(crate) fn from_query(err: BackendError) -> Self {
        match err {
            BackendError::Encoding(e) => ClientError::Encode(e),
            other => ClientError::RemoteQuery(other.to_string()),
        }
    }

    /// Map a failure on the submit path.
    pub(crate) fn from_submission(err: BackendError) -> Self {
        match err {
            BackendError::ConditionNotMet => ClientError::ConditionNotMet,
            BackendError::SignerNotConfigured => ClientError::SignerNotConfigured,
            other => ClientError::Submission(other.to_string()),
        }
    }

    /// Whether another committer won the race.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ClientError::ConditionNotMet)
    }

    /// Whether a fresh round may succeed where this one failed.
    ///
    /// Every other error is fatal for the round.
    pub fn is_retryable_round(&self) -> bool {
        self.is_conflict()
    }
}
