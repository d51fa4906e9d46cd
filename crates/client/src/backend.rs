//! Remote ledger contract consumed by the engine.

use crate::BackendError;
use rollup_codec::{RawEncoder, TypeCoder};
use rollup_types::{
    AccountId, AttestorKey, AttestorSignature, Hash, Key, QueueIndex, ReservedKeys, TxHash, Value,
};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A ledger-hosted key/value store with a message queue and conditional
/// transactions.
///
/// Implementations own transport, signing and fee handling. The engine owns
/// caching: `get_remote_value` must always go to the remote side.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    /// Wire shape of one key/value pair.
    type Kv: Clone + fmt::Debug + Send + Sync + 'static;

    /// Wire shape of one action.
    type Action: Clone + fmt::Debug + Send + Sync + 'static;

    /// Scalar coder matching the remote contract.
    fn type_coder(&self) -> Arc<dyn TypeCoder>;

    /// Encoder producing this backend's wire shapes.
    fn raw_encoder(&self) -> Arc<dyn RawEncoder<Kv = Self::Kv, Action = Self::Action>>;

    /// Reserved keys agreed with the remote contract.
    fn reserved_keys(&self) -> ReservedKeys {
        ReservedKeys::default()
    }

    /// Key of the queue slot holding message `index`. Deterministic.
    fn message_key(&self, index: QueueIndex) -> Result<Key, BackendError>;

    /// Read one slot. `None` means absent.
    async fn get_remote_value(&self, key: &[u8]) -> Result<Option<Value>, BackendError>;

    /// Submit a conditional transaction signed by the attestor.
    ///
    /// Atomic: if every condition holds, all updates and actions apply;
    /// otherwise nothing applies and the call fails.
    async fn send_transaction(
        &self,
        conditions: Vec<Self::Kv>,
        updates: Vec<Self::Kv>,
        actions: Vec<Self::Action>,
    ) -> Result<TxHash, BackendError>;

    /// Same as `send_transaction`, via delegated signing.
    async fn send_meta_transaction(
        &self,
        conditions: Vec<Self::Kv>,
        updates: Vec<Self::Kv>,
        actions: Vec<Self::Action>,
    ) -> Result<TxHash, BackendError>;

    /// Whether commits should take the delegated-signing path.
    fn use_meta_transaction(&self) -> bool {
        false
    }
}

/// Backend primitives for the delegated-signing path.
#[async_trait::async_trait]
pub trait MetaTxBackend: Backend {
    /// Request the attestor signs and the sender submits.
    type ForwardRequest: Clone + fmt::Debug + Send + Sync;

    /// Canonical byte form of a rollup batch.
    fn encode_batch(
        &self,
        conditions: &[Self::Kv],
        updates: &[Self::Kv],
        actions: &[Self::Action],
    ) -> Result<Vec<u8>, BackendError>;

    /// Ask the remote side for a forward request carrying a fresh nonce.
    async fn prepare(
        &self,
        from: AccountId,
        data: Vec<u8>,
    ) -> Result<(Self::ForwardRequest, Hash), BackendError>;

    /// Bytes the attestor signs for `request`.
    fn signing_payload(&self, request: &Self::ForwardRequest) -> Result<Vec<u8>, BackendError>;

    /// Submit a signed forward request through the sender's identity.
    async fn submit_forward_request(
        &self,
        request: Self::ForwardRequest,
        signature: AttestorSignature,
    ) -> Result<TxHash, BackendError>;
}

/// Run the delegated-signing flow for one batch.
///
/// Encodes the batch, prepares a forward request under the attestor's
/// identity, signs the request (not the raw batch) and submits it.
pub async fn forward_meta_transaction<B>(
    backend: &B,
    attestor: Option<&AttestorKey>,
    conditions: Vec<B::Kv>,
    updates: Vec<B::Kv>,
    actions: Vec<B::Action>,
) -> Result<TxHash, BackendError>
where
    B: MetaTxBackend + ?Sized,
{
    let attestor = attestor.ok_or(BackendError::SignerNotConfigured)?;
    let data = backend.encode_batch(&conditions, &updates, &actions)?;
    let (request, hash) = backend.prepare(attestor.account_id(), data).await?;
    debug!(
        attestor = %attestor.account_id(),
        request_hash = %hash,
        "Prepared forward request"
    );
    let payload = backend.signing_payload(&request)?;
    let signature = attestor.sign(&payload);
    backend.submit_forward_request(request, signature).await
}
