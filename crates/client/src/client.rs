//! The transaction engine.

use crate::{Backend, BackendError, ClientConfig, ClientError, Session};
use rollup_codec::{MessageCoder, RawEncoder, TypeCoder};
use rollup_types::{
    Action, BigIntType, Key, NumberType, QueueIndex, ReservedKeys, TxHash, Value, VersionNumber,
    U256,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Condition, update and action lists of one commit.
struct Batch<K, A> {
    conditions: Vec<K>,
    updates: Vec<K>,
    actions: Vec<A>,
}

/// Session-based optimistic-concurrency client.
///
/// Generic over the backend `B`, the inbound request type `M` and the
/// outbound reply type `R`. Exactly one [`Session`] is live at a time; it is
/// replaced wholesale by `start_session`, `rollback` and a successful
/// `commit`.
///
/// Operations must be awaited one at a time. A client is not shared between
/// concurrent call sites; concurrent workers each own a client and race
/// through the version key.
pub struct Client<B: Backend, M, R> {
    backend: B,
    type_coder: Arc<dyn TypeCoder>,
    raw_encoder: Arc<dyn RawEncoder<Kv = B::Kv, Action = B::Action>>,
    inbound: Arc<dyn MessageCoder<M>>,
    outbound: Arc<dyn MessageCoder<R>>,
    keys: ReservedKeys,
    config: ClientConfig,
    session: Session<R>,
}

impl<B, M, R> Client<B, M, R>
where
    B: Backend,
    M: Send + 'static,
    R: Send + Sync + 'static,
{
    /// Create a client. No session is started.
    pub fn new(
        backend: B,
        inbound: Arc<dyn MessageCoder<M>>,
        outbound: Arc<dyn MessageCoder<R>>,
        config: ClientConfig,
    ) -> Self {
        Self {
            type_coder: backend.type_coder(),
            raw_encoder: backend.raw_encoder(),
            keys: backend.reserved_keys(),
            backend,
            inbound,
            outbound,
            config,
            session: Session::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn reserved_keys(&self) -> &ReservedKeys {
        &self.keys
    }

    /// The live session.
    pub fn session(&self) -> &Session<R> {
        &self.session
    }

    /// Version read at session start.
    pub fn version(&self) -> Option<VersionNumber> {
        self.session.version()
    }

    /// Discard the current session and start a fresh one.
    ///
    /// The version key is read through the session cache, so it always ends
    /// up in the commit's condition list. An absent version reads as 0.
    pub async fn start_session(&mut self) -> Result<(), ClientError> {
        self.session = Session::new();
        let key = self.keys.version.clone();
        let version = match self.read_through(key).await? {
            Some(bytes) => self
                .type_coder
                .decode_index(&bytes, self.config.version_type)
                .map_err(ClientError::Decode)?,
            None => 0,
        };
        self.session.set_version(version);
        debug!(version, "Session started");
        Ok(())
    }

    /// Drop every buffered read, write, reply and cursor advance.
    pub async fn rollback(&mut self) -> Result<(), ClientError> {
        debug!(
            updates = self.session.updates().len(),
            actions = self.session.actions().len(),
            "Rolling back session"
        );
        self.start_session().await
    }

    fn ensure_started(&self) -> Result<(), ClientError> {
        if self.session.is_started() {
            Ok(())
        } else {
            Err(ClientError::SessionNotStarted)
        }
    }

    // Queue

    async fn read_index(&self, key: &[u8]) -> Result<QueueIndex, ClientError> {
        match self
            .backend
            .get_remote_value(key)
            .await
            .map_err(ClientError::from_query)?
        {
            Some(bytes) => self
                .type_coder
                .decode_index(&bytes, self.config.index_type)
                .map_err(ClientError::Decode),
            None => Ok(0),
        }
    }

    /// Index of the oldest unconsumed message. Always read fresh.
    pub async fn queue_head_index(&self) -> Result<QueueIndex, ClientError> {
        self.read_index(&self.keys.queue_head).await
    }

    /// Index of the next free queue slot. Always read fresh.
    pub async fn queue_tail_index(&self) -> Result<QueueIndex, ClientError> {
        self.read_index(&self.keys.queue_tail).await
    }

    /// Whether the remote queue holds unconsumed messages.
    ///
    /// Needs no session; workers use it to skip empty rounds.
    pub async fn has_message(&self) -> Result<bool, ClientError> {
        let head = self.queue_head_index().await?;
        let tail = self.queue_tail_index().await?;
        Ok(head < tail)
    }

    /// Fetch and decode the message at `index`.
    pub async fn message(&self, index: QueueIndex) -> Result<M, ClientError> {
        let key = self
            .backend
            .message_key(index)
            .map_err(ClientError::from_query)?;
        let bytes = self
            .backend
            .get_remote_value(&key)
            .await
            .map_err(ClientError::from_query)?
            .ok_or(ClientError::MessageNotFound(index))?;
        self.inbound.decode(&bytes).map_err(ClientError::Decode)
    }

    /// Next unconsumed message, or `None` once the queue is drained.
    ///
    /// The cursor starts at the head on the first call and the queue end is
    /// fixed at the tail observed then. Each message is returned once per
    /// session, in index order.
    #[instrument(skip(self), fields(cursor = ?self.session.current_index()))]
    pub async fn poll_message(&mut self) -> Result<Option<M>, ClientError> {
        self.ensure_started()?;
        let observed = self.queue_tail_index().await?;
        let tail = self.session.clamp_tail(observed);

        let current = match self.session.current_index() {
            Some(index) => index,
            None => {
                let head = self.queue_head_index().await?;
                self.session.set_cursor(head);
                head
            }
        };

        if current >= tail {
            debug!(current, tail, "Queue drained");
            return Ok(None);
        }

        let message = self.message(current).await?;
        self.session.advance_cursor(current);
        debug!(index = current, "Polled message");
        Ok(Some(message))
    }

    // Values

    /// Pending write, then cached read, then remote fetch (memoized).
    async fn read_through(&mut self, key: Key) -> Result<Option<Value>, ClientError> {
        if let Some(pending) = self.session.pending(&key) {
            return Ok(pending.clone());
        }
        if let Some(cached) = self.session.cached(&key) {
            return Ok(cached.clone());
        }
        let value = self
            .backend
            .get_remote_value(&key)
            .await
            .map_err(ClientError::from_query)?;
        self.session.remember(key, value.clone());
        Ok(value)
    }

    /// Read a raw value. `None` means absent.
    pub async fn get_value(&mut self, key: &[u8]) -> Result<Option<Value>, ClientError> {
        self.ensure_started()?;
        self.read_through(key.to_vec()).await
    }

    /// Buffer a write. `None` deletes.
    pub fn set_value(&mut self, key: &[u8], value: Option<Value>) -> Result<(), ClientError> {
        self.ensure_started()?;
        self.session.write(key.to_vec(), value);
        Ok(())
    }

    /// Buffer a delete.
    pub fn remove_value(&mut self, key: &[u8]) -> Result<(), ClientError> {
        self.set_value(key, None)
    }

    async fn get_decoded<T>(
        &mut self,
        key: &[u8],
        decode: impl FnOnce(&dyn TypeCoder, &[u8]) -> Result<T, rollup_codec::CodecError>,
    ) -> Result<Option<T>, ClientError> {
        match self.get_value(key).await? {
            Some(bytes) => decode(self.type_coder.as_ref(), &bytes)
                .map(Some)
                .map_err(ClientError::Decode),
            None => Ok(None),
        }
    }

    fn set_encoded(
        &mut self,
        key: &[u8],
        encode: impl FnOnce(&dyn TypeCoder) -> Result<Vec<u8>, rollup_codec::CodecError>,
    ) -> Result<(), ClientError> {
        self.ensure_started()?;
        let bytes = encode(self.type_coder.as_ref()).map_err(ClientError::Encode)?;
        self.set_value(key, Some(bytes))
    }

    pub async fn get_number(
        &mut self,
        key: &[u8],
        ty: NumberType,
    ) -> Result<Option<u32>, ClientError> {
        self.get_decoded(key, |c, b| c.decode_number(b, ty)).await
    }

    pub fn set_number(&mut self, key: &[u8], value: u32, ty: NumberType) -> Result<(), ClientError> {
        self.set_encoded(key, |c| c.encode_number(value, ty))
    }

    pub async fn get_big_int(
        &mut self,
        key: &[u8],
        ty: BigIntType,
    ) -> Result<Option<U256>, ClientError> {
        self.get_decoded(key, |c, b| c.decode_big_int(b, ty)).await
    }

    pub fn set_big_int(
        &mut self,
        key: &[u8],
        value: &U256,
        ty: BigIntType,
    ) -> Result<(), ClientError> {
        self.set_encoded(key, |c| c.encode_big_int(value, ty))
    }

    pub async fn get_boolean(&mut self, key: &[u8]) -> Result<Option<bool>, ClientError> {
        self.get_decoded(key, |c, b| c.decode_boolean(b)).await
    }

    pub fn set_boolean(&mut self, key: &[u8], value: bool) -> Result<(), ClientError> {
        self.set_encoded(key, |c| c.encode_boolean(value))
    }

    pub async fn get_string(&mut self, key: &[u8]) -> Result<Option<String>, ClientError> {
        self.get_decoded(key, |c, b| c.decode_string(b)).await
    }

    pub fn set_string(&mut self, key: &[u8], value: &str) -> Result<(), ClientError> {
        self.set_encoded(key, |c| c.encode_string(value))
    }

    pub async fn get_bytes(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, ClientError> {
        self.get_decoded(key, |c, b| c.decode_bytes(b)).await
    }

    pub fn set_bytes(&mut self, key: &[u8], value: &[u8]) -> Result<(), ClientError> {
        self.set_encoded(key, |c| c.encode_bytes(value))
    }

    // Replies

    /// Buffer an outgoing reply. Encoded at commit time.
    pub fn add_action(&mut self, reply: R) -> Result<(), ClientError> {
        self.ensure_started()?;
        self.session.push_action(reply);
        Ok(())
    }

    // Commit

    fn build_batch(&self) -> Result<Batch<B::Kv, B::Action>, ClientError> {
        let encoder = self.raw_encoder.as_ref();
        let version = self.session.version().ok_or(ClientError::SessionNotStarted)?;

        let conditions: Vec<B::Kv> = self
            .session
            .values()
            .iter()
            .map(|(key, value)| encoder.encode_key_value(key, value.as_deref()))
            .collect();

        let next = version.checked_add(1).ok_or(ClientError::VersionOverflow)?;
        let next_bytes = self
            .type_coder
            .encode_index(next, self.config.version_type)
            .map_err(ClientError::Encode)?;
        let mut updates = Vec::with_capacity(1 + self.session.updates().len());
        updates.push(encoder.encode_key_value(&self.keys.version, Some(&next_bytes)));
        updates.extend(
            self.session
                .updates()
                .iter()
                .map(|(key, value)| encoder.encode_key_value(key, value.as_deref())),
        );

        let mut actions = Vec::with_capacity(1 + self.session.actions().len());
        if self.session.index_updated() {
            if let Some(index) = self.session.current_index() {
                if !self.config.index_type.fits_u64(index) {
                    return Err(ClientError::Encode(rollup_codec::CodecError::Overflow(
                        self.config.index_type,
                    )));
                }
                actions.push(
                    encoder
                        .encode_action(&Action::SetQueueHead(index))
                        .map_err(ClientError::Encode)?,
                );
            }
        }
        for reply in self.session.actions() {
            let payload = self.outbound.encode(reply).map_err(ClientError::Encode)?;
            actions.push(
                encoder
                    .encode_action(&Action::Reply(payload))
                    .map_err(ClientError::Encode)?,
            );
        }

        debug!(
            version,
            conditions = conditions.len(),
            updates = updates.len(),
            actions = actions.len(),
            "Assembled rollup batch"
        );
        Ok(Batch {
            conditions,
            updates,
            actions,
        })
    }

    /// Submit the session as one conditional transaction.
    ///
    /// Returns `None` without contacting the backend when nothing is
    /// pending. On failure the session is left intact; call `rollback` for a
    /// clean slate.
    ///
    /// On success a fresh session is started. The transaction is already
    /// applied at that point, so if reading the new version fails the hash
    /// is still returned, the failure is logged, and the client is left
    /// without a session: later session calls return
    /// [`ClientError::SessionNotStarted`] until `start_session` succeeds.
    #[instrument(skip(self), fields(version = ?self.session.version()))]
    pub async fn commit(&mut self) -> Result<Option<TxHash>, ClientError> {
        self.ensure_started()?;
        if !self.session.has_pending_work() {
            debug!("Nothing to commit");
            return Ok(None);
        }

        let Batch {
            conditions,
            updates,
            actions,
        } = self.build_batch()?;

        let meta = self.config.meta_transaction || self.backend.use_meta_transaction();
        let result = if meta {
            self.backend
                .send_meta_transaction(conditions, updates, actions)
                .await
        } else {
            self.backend
                .send_transaction(conditions, updates, actions)
                .await
        };

        let tx_hash = match result {
            Ok(hash) => hash,
            Err(BackendError::ConditionNotMet) => {
                warn!("Commit rejected: condition not met");
                return Err(ClientError::ConditionNotMet);
            }
            Err(e) => return Err(ClientError::from_submission(e)),
        };
        info!(tx_hash = %tx_hash, meta, "Committed rollup transaction");

        if let Err(e) = self.start_session().await {
            warn!(error = %e, "Committed but failed to start next session");
        }
        Ok(Some(tx_hash))
    }
}
