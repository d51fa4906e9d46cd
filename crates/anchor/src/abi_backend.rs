//! EVM-style backend over a shared anchor.

use crate::{AnchorBackend, ForwardRequest};
use rollup_client::{forward_meta_transaction, Backend, BackendError, MetaTxBackend};
use rollup_codec::{AbiEncoder, RawEncoder, TypeCoder};
use rollup_types::{
    AccountId, Action, AttestorSignature, Hash, Key, KvEntry, QueueIndex, ReservedKeys, TxHash,
    Value,
};
use std::sync::Arc;

/// Backend speaking ABI wire shapes: `(key, value)` byte tuples where an
/// empty value means absent, and tag-prefixed action bytes.
///
/// Batches are translated back to native shapes before they reach the
/// anchor. Pair it with an anchor deployed with
/// [`AbiTypeCoder`](rollup_codec::AbiTypeCoder) so stored scalars are
/// 32-byte words.
#[derive(Clone)]
pub struct AbiAnchorBackend {
    inner: AnchorBackend,
    encoder: AbiEncoder,
}

impl AbiAnchorBackend {
    pub fn new(inner: AnchorBackend) -> Self {
        Self {
            inner,
            encoder: AbiEncoder,
        }
    }

    pub fn inner(&self) -> &AnchorBackend {
        &self.inner
    }

    fn to_native(
        &self,
        conditions: &[(Vec<u8>, Vec<u8>)],
        updates: &[(Vec<u8>, Vec<u8>)],
        actions: &[Vec<u8>],
    ) -> Result<(Vec<KvEntry>, Vec<KvEntry>, Vec<Action>), BackendError> {
        let conditions = conditions
            .iter()
            .map(|kv| self.encoder.decode_key_value(kv))
            .collect();
        let updates = updates
            .iter()
            .map(|kv| self.encoder.decode_key_value(kv))
            .collect();
        let actions = actions
            .iter()
            .map(|a| self.encoder.decode_action(a))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((conditions, updates, actions))
    }
}

#[async_trait::async_trait]
impl Backend for AbiAnchorBackend {
    type Kv = (Vec<u8>, Vec<u8>);
    type Action = Vec<u8>;

    fn type_coder(&self) -> Arc<dyn TypeCoder> {
        self.inner.type_coder()
    }

    fn raw_encoder(&self) -> Arc<dyn RawEncoder<Kv = Self::Kv, Action = Self::Action>> {
        Arc::new(AbiEncoder)
    }

    fn reserved_keys(&self) -> ReservedKeys {
        self.inner.reserved_keys()
    }

    fn message_key(&self, index: QueueIndex) -> Result<Key, BackendError> {
        self.inner.message_key(index)
    }

    async fn get_remote_value(&self, key: &[u8]) -> Result<Option<Value>, BackendError> {
        self.inner.get_remote_value(key).await
    }

    async fn send_transaction(
        &self,
        conditions: Vec<Self::Kv>,
        updates: Vec<Self::Kv>,
        actions: Vec<Self::Action>,
    ) -> Result<TxHash, BackendError> {
        let (conditions, updates, actions) = self.to_native(&conditions, &updates, &actions)?;
        self.inner
            .send_transaction(conditions, updates, actions)
            .await
    }

    async fn send_meta_transaction(
        &self,
        conditions: Vec<Self::Kv>,
        updates: Vec<Self::Kv>,
        actions: Vec<Self::Action>,
    ) -> Result<TxHash, BackendError> {
        forward_meta_transaction(
            self,
            self.inner.attestor(),
            conditions,
            updates,
            actions,
        )
        .await
    }

    fn use_meta_transaction(&self) -> bool {
        self.inner.use_meta_transaction()
    }
}

#[async_trait::async_trait]
impl MetaTxBackend for AbiAnchorBackend {
    type ForwardRequest = ForwardRequest;

    fn encode_batch(
        &self,
        conditions: &[Self::Kv],
        updates: &[Self::Kv],
        actions: &[Self::Action],
    ) -> Result<Vec<u8>, BackendError> {
        let (conditions, updates, actions) = self.to_native(conditions, updates, actions)?;
        self.inner.encode_batch(&conditions, &updates, &actions)
    }

    async fn prepare(
        &self,
        from: AccountId,
        data: Vec<u8>,
    ) -> Result<(ForwardRequest, Hash), BackendError> {
        self.inner.prepare(from, data).await
    }

    fn signing_payload(&self, request: &ForwardRequest) -> Result<Vec<u8>, BackendError> {
        self.inner.signing_payload(request)
    }

    async fn submit_forward_request(
        &self,
        request: ForwardRequest,
        signature: AttestorSignature,
    ) -> Result<TxHash, BackendError> {
        self.inner.submit_forward_request(request, signature).await
    }
}
