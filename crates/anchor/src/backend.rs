//! Native backend over a shared anchor.

use crate::{ForwardRequest, RollupBatch, SharedAnchor};
use rollup_client::{forward_meta_transaction, Backend, BackendError, ClientConfig, MetaTxBackend};
use rollup_codec::{sbor_encode, NativeEncoder, RawEncoder, TypeCoder};
use rollup_types::{
    AccountId, Action, AttestorKey, AttestorSignature, Hash, Key, KvEntry, QueueIndex,
    ReservedKeys, TxHash, Value,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Backend submitting native batches to a [`SharedAnchor`].
///
/// The attestor key authorizes batches. When a distinct sender key is
/// configured, commits go through the meta-transaction path: the attestor
/// signs and the sender submits.
#[derive(Clone)]
pub struct AnchorBackend {
    anchor: SharedAnchor,
    attestor: Option<AttestorKey>,
    sender: Option<AttestorKey>,
    latency: Duration,
}

impl AnchorBackend {
    pub fn new(anchor: SharedAnchor) -> Self {
        Self {
            anchor,
            attestor: None,
            sender: None,
            latency: Duration::ZERO,
        }
    }

    /// Set the key that signs batches.
    pub fn with_attestor(mut self, attestor: AttestorKey) -> Self {
        self.attestor = Some(attestor);
        self
    }

    /// Set a separate paying identity, enabling meta-transactions.
    pub fn with_sender(mut self, sender: AttestorKey) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Delay applied to every remote call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn anchor(&self) -> &SharedAnchor {
        &self.anchor
    }

    pub fn attestor(&self) -> Option<&AttestorKey> {
        self.attestor.as_ref()
    }

    /// Client configuration matching the anchor's index width.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::default().with_index_type(self.anchor.lock().config().index_type)
    }

    pub(crate) async fn round_trip(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    pub(crate) fn attestor_account(&self) -> Result<AccountId, BackendError> {
        self.attestor
            .as_ref()
            .map(AttestorKey::account_id)
            .ok_or(BackendError::SignerNotConfigured)
    }
}

#[async_trait::async_trait]
impl Backend for AnchorBackend {
    type Kv = KvEntry;
    type Action = Action;

    fn type_coder(&self) -> Arc<dyn TypeCoder> {
        self.anchor.lock().type_coder()
    }

    fn raw_encoder(&self) -> Arc<dyn RawEncoder<Kv = KvEntry, Action = Action>> {
        Arc::new(NativeEncoder)
    }

    fn reserved_keys(&self) -> ReservedKeys {
        self.anchor.lock().config().keys.clone()
    }

    fn message_key(&self, index: QueueIndex) -> Result<Key, BackendError> {
        Ok(self.anchor.lock().message_key(index)?)
    }

    async fn get_remote_value(&self, key: &[u8]) -> Result<Option<Value>, BackendError> {
        self.round_trip().await;
        Ok(self.anchor.lock().get_value(key))
    }

    async fn send_transaction(
        &self,
        conditions: Vec<KvEntry>,
        updates: Vec<KvEntry>,
        actions: Vec<Action>,
    ) -> Result<TxHash, BackendError> {
        let caller = self.attestor_account()?;
        self.round_trip().await;
        let tx_hash = self
            .anchor
            .lock()
            .rollup_cond_eq(caller, conditions, updates, actions)?;
        Ok(tx_hash)
    }

    async fn send_meta_transaction(
        &self,
        conditions: Vec<KvEntry>,
        updates: Vec<KvEntry>,
        actions: Vec<Action>,
    ) -> Result<TxHash, BackendError> {
        forward_meta_transaction(self, self.attestor.as_ref(), conditions, updates, actions).await
    }

    fn use_meta_transaction(&self) -> bool {
        self.sender.is_some()
    }
}

#[async_trait::async_trait]
impl MetaTxBackend for AnchorBackend {
    type ForwardRequest = ForwardRequest;

    fn encode_batch(
        &self,
        conditions: &[KvEntry],
        updates: &[KvEntry],
        actions: &[Action],
    ) -> Result<Vec<u8>, BackendError> {
        let batch: RollupBatch = (conditions.to_vec(), updates.to_vec(), actions.to_vec());
        Ok(sbor_encode(&batch)?)
    }

    async fn prepare(
        &self,
        from: AccountId,
        data: Vec<u8>,
    ) -> Result<(ForwardRequest, Hash), BackendError> {
        self.round_trip().await;
        Ok(self.anchor.lock().prepare(from, data)?)
    }

    fn signing_payload(&self, request: &ForwardRequest) -> Result<Vec<u8>, BackendError> {
        Ok(request.digest()?.as_bytes().to_vec())
    }

    async fn submit_forward_request(
        &self,
        request: ForwardRequest,
        signature: AttestorSignature,
    ) -> Result<TxHash, BackendError> {
        self.round_trip().await;
        let mut anchor = self.anchor.lock();
        anchor.dry_run_meta_tx(request.clone(), &signature)?;
        debug!(
            from = %request.from,
            nonce = request.nonce,
            sender = ?self.sender.as_ref().map(AttestorKey::account_id),
            "Dry run passed, submitting forward request"
        );
        Ok(anchor.meta_tx_rollup_cond_eq(request, &signature)?)
    }
}
