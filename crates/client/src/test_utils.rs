//! In-memory backend for engine tests.
//!
//! Applies submitted batches without checking conditions and records every
//! successful submission for inspection.

use crate::{Backend, BackendError};
use parking_lot::Mutex;
use rollup_codec::{NativeEncoder, RawEncoder, SborTypeCoder, TypeCoder};
use rollup_types::{Action, Hash, IntType, Key, KvEntry, QueueIndex, ReservedKeys, TxHash, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub const KEY_1: &[u8] = b"key1";
pub const KEY_2: &[u8] = b"key2";
pub const KEY_3: &[u8] = b"key3";
pub const KEY_4: &[u8] = b"key4";

/// One recorded transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub conditions: Vec<KvEntry>,
    pub updates: Vec<KvEntry>,
    pub actions: Vec<Action>,
    pub meta: bool,
}

#[derive(Default)]
struct MockState {
    store: BTreeMap<Key, Value>,
    submissions: Vec<Submission>,
    fail_next: Option<BackendError>,
    unavailable: bool,
}

/// Cloneable handle to a shared in-memory store.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
    reads: Arc<AtomicU64>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Version 33, queue `[1, 4)` holding `message1..3`, and `key1..key4`
    /// holding `value1..value4`.
    pub fn with_fixture() -> Self {
        let backend = Self::new();
        let coder = SborTypeCoder;
        let keys = ReservedKeys::default();
        let encode = |v: u64| coder.encode_index(v, IntType::U32).unwrap_or_default();
        {
            let mut state = backend.state.lock();
            state.store.insert(keys.version.clone(), encode(33));
            state.store.insert(keys.queue_head.clone(), encode(1));
            state.store.insert(keys.queue_tail.clone(), encode(4));
            for (i, key) in [KEY_1, KEY_2, KEY_3, KEY_4].iter().enumerate() {
                state
                    .store
                    .insert(key.to_vec(), format!("value{}", i + 1).into_bytes());
            }
            for i in 1..4u64 {
                state.store.insert(
                    keys.message_key(&encode(i)),
                    format!("message{}", i).into_bytes(),
                );
            }
        }
        backend
    }

    /// Number of remote reads served.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.state.lock().submissions.clone()
    }

    pub fn last_submission(&self) -> Option<Submission> {
        self.state.lock().submissions.last().cloned()
    }

    /// Make the next submission fail with `err`.
    pub fn fail_next(&self, err: BackendError) {
        self.state.lock().fail_next = Some(err);
    }

    /// Make every read fail.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unavailable = unavailable;
    }

    pub fn delete(&self, key: &[u8]) {
        self.state.lock().store.remove(key);
    }

    /// Append a message at the tail.
    pub fn push_message(&self, payload: Vec<u8>) {
        let keys = ReservedKeys::default();
        let mut state = self.state.lock();
        let tail = state
            .store
            .get(&keys.queue_tail)
            .and_then(|b| SborTypeCoder.decode_index(b, IntType::U32).ok())
            .unwrap_or(0);
        let encode = |v: u64| SborTypeCoder.encode_index(v, IntType::U32).unwrap_or_default();
        state.store.insert(keys.message_key(&encode(tail)), payload);
        state.store.insert(keys.queue_tail.clone(), encode(tail + 1));
    }

    fn submit(
        &self,
        conditions: Vec<KvEntry>,
        updates: Vec<KvEntry>,
        actions: Vec<Action>,
        meta: bool,
    ) -> Result<TxHash, BackendError> {
        let mut state = self.state.lock();
        if let Some(err) = state.fail_next.take() {
            return Err(err);
        }
        let keys = ReservedKeys::default();
        for (key, value) in &updates {
            match value {
                Some(v) => state.store.insert(key.clone(), v.clone()),
                None => state.store.remove(key),
            };
        }
        for action in &actions {
            if let Action::SetQueueHead(index) = action {
                let bytes = SborTypeCoder.encode_index(*index, IntType::U32)?;
                state.store.insert(keys.queue_head.clone(), bytes);
            }
        }
        let id = state.submissions.len() as u64;
        state.submissions.push(Submission {
            conditions,
            updates,
            actions,
            meta,
        });
        Ok(Hash::from_bytes(&id.to_le_bytes()))
    }
}

#[async_trait::async_trait]
impl Backend for MockBackend {
    type Kv = KvEntry;
    type Action = Action;

    fn type_coder(&self) -> Arc<dyn TypeCoder> {
        Arc::new(SborTypeCoder)
    }

    fn raw_encoder(&self) -> Arc<dyn RawEncoder<Kv = KvEntry, Action = Action>> {
        Arc::new(NativeEncoder)
    }

    fn message_key(&self, index: QueueIndex) -> Result<Key, BackendError> {
        let encoded = SborTypeCoder.encode_index(index, IntType::U32)?;
        Ok(ReservedKeys::default().message_key(&encoded))
    }

    async fn get_remote_value(&self, key: &[u8]) -> Result<Option<Value>, BackendError> {
        let state = self.state.lock();
        if state.unavailable {
            return Err(BackendError::Unavailable("mock offline".into()));
        }
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(state.store.get(key).cloned())
    }

    async fn send_transaction(
        &self,
        conditions: Vec<KvEntry>,
        updates: Vec<KvEntry>,
        actions: Vec<Action>,
    ) -> Result<TxHash, BackendError> {
        self.submit(conditions, updates, actions, false)
    }

    async fn send_meta_transaction(
        &self,
        conditions: Vec<KvEntry>,
        updates: Vec<KvEntry>,
        actions: Vec<Action>,
    ) -> Result<TxHash, BackendError> {
        self.submit(conditions, updates, actions, true)
    }
}
