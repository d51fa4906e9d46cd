//! Anchor state machine.

use crate::{AccessControlError, AnchorError, AnchorEvent, Nonce};
use parking_lot::{Mutex, MutexGuard};
use rollup_codec::{SborTypeCoder, TypeCoder};
use rollup_types::{
    AccountId, Action, Hash, IntType, Key, KvEntry, QueueIndex, ReservedKeys, TxHash, Value,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Access control roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    /// May grant and revoke roles.
    Admin,
    /// May submit rollup batches.
    Attestor,
}

/// Deployment parameters.
#[derive(Debug, Clone)]
pub struct AnchorConfig {
    /// Width of stored queue indices.
    pub index_type: IntType,
    pub keys: ReservedKeys,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            index_type: IntType::U32,
            keys: ReservedKeys::default(),
        }
    }
}

/// Inverse of one state mutation.
enum Undo {
    Kv(Key, Option<Value>),
    /// Role entry and whether it was present before.
    Role((Role, AccountId), bool),
    Nonce(AccountId, Option<Nonce>),
}

/// Log lengths and counters at the start of a transaction.
#[derive(Debug, Clone, Copy)]
struct Checkpoint {
    journal: usize,
    events: usize,
    replies: usize,
    tx_count: u64,
}

/// Ledger-side contract state.
///
/// Entry points are all-or-nothing. While one runs, every mutation pushes
/// its inverse onto a journal; a failure replays the journal backwards and
/// truncates the logs, so the cost of a call is proportional to what it
/// touches.
pub struct Anchor {
    pub(crate) address: AccountId,
    type_coder: Arc<dyn TypeCoder>,
    config: AnchorConfig,
    kv: BTreeMap<Key, Value>,
    roles: BTreeSet<(Role, AccountId)>,
    pub(crate) nonces: BTreeMap<AccountId, Nonce>,
    events: Vec<AnchorEvent>,
    replies: Vec<Vec<u8>>,
    tx_count: u64,
    journal: Vec<Undo>,
    depth: usize,
}

impl Anchor {
    /// Deploy an anchor administered by `admin`.
    pub fn new(admin: AccountId, type_coder: Arc<dyn TypeCoder>, config: AnchorConfig) -> Self {
        let address = AccountId(*Hash::from_parts(&[b"anchor", &admin.0]).as_bytes());
        let mut anchor = Self {
            address,
            type_coder,
            config,
            kv: BTreeMap::new(),
            roles: BTreeSet::new(),
            nonces: BTreeMap::new(),
            events: Vec::new(),
            replies: Vec::new(),
            tx_count: 0,
            journal: Vec::new(),
            depth: 0,
        };
        anchor.roles.insert((Role::Admin, admin));
        anchor.events.push(AnchorEvent::RoleGranted {
            role: Role::Admin,
            grantee: admin,
            grantor: admin,
        });
        anchor
    }

    /// Anchor with SBOR scalars and the default layout.
    pub fn native(admin: AccountId) -> Self {
        Self::new(admin, Arc::new(SborTypeCoder), AnchorConfig::default())
    }

    pub fn address(&self) -> AccountId {
        self.address
    }

    pub fn type_coder(&self) -> Arc<dyn TypeCoder> {
        self.type_coder.clone()
    }

    pub fn config(&self) -> &AnchorConfig {
        &self.config
    }

    pub fn events(&self) -> &[AnchorEvent] {
        &self.events
    }

    /// Every reply delivered so far, in delivery order.
    pub fn replies(&self) -> &[Vec<u8>] {
        &self.replies
    }

    /// Number of committed batches.
    pub fn tx_count(&self) -> u64 {
        self.tx_count
    }

    pub(crate) fn push_event(&mut self, event: AnchorEvent) {
        self.events.push(event);
    }

    /// Run `f`, undoing everything it did if it fails.
    pub(crate) fn transact<T>(
        &mut self,
        f: impl FnOnce(&mut Anchor) -> Result<T, AnchorError>,
    ) -> Result<T, AnchorError> {
        self.scoped(f, true)
    }

    /// Run `f` and undo everything it did, whatever the outcome.
    pub(crate) fn simulate<T>(
        &mut self,
        f: impl FnOnce(&mut Anchor) -> Result<T, AnchorError>,
    ) -> Result<T, AnchorError> {
        self.scoped(f, false)
    }

    fn scoped<T>(
        &mut self,
        f: impl FnOnce(&mut Anchor) -> Result<T, AnchorError>,
        keep: bool,
    ) -> Result<T, AnchorError> {
        let mark = Checkpoint {
            journal: self.journal.len(),
            events: self.events.len(),
            replies: self.replies.len(),
            tx_count: self.tx_count,
        };
        self.depth += 1;
        let out = f(self);
        self.depth -= 1;
        if !keep || out.is_err() {
            self.restore(mark);
        }
        if self.depth == 0 {
            self.journal.clear();
        }
        out
    }

    fn restore(&mut self, mark: Checkpoint) {
        while self.journal.len() > mark.journal {
            let Some(undo) = self.journal.pop() else {
                break;
            };
            match undo {
                Undo::Kv(key, Some(value)) => {
                    self.kv.insert(key, value);
                }
                Undo::Kv(key, None) => {
                    self.kv.remove(&key);
                }
                Undo::Role(entry, true) => {
                    self.roles.insert(entry);
                }
                Undo::Role(entry, false) => {
                    self.roles.remove(&entry);
                }
                Undo::Nonce(account, Some(nonce)) => {
                    self.nonces.insert(account, nonce);
                }
                Undo::Nonce(account, None) => {
                    self.nonces.remove(&account);
                }
            }
        }
        self.events.truncate(mark.events);
        self.replies.truncate(mark.replies);
        self.tx_count = mark.tx_count;
    }

    fn record(&mut self, undo: Undo) {
        if self.depth > 0 {
            self.journal.push(undo);
        }
    }

    pub(crate) fn set_nonce(&mut self, account: AccountId, nonce: Nonce) {
        let previous = self.nonces.insert(account, nonce);
        self.record(Undo::Nonce(account, previous));
    }

    // Key/value store

    pub fn get_value(&self, key: &[u8]) -> Option<Value> {
        self.kv.get(key).cloned()
    }

    fn set_value(&mut self, key: &[u8], value: Option<&[u8]>) {
        let previous = match value {
            Some(v) => self.kv.insert(key.to_vec(), v.to_vec()),
            None => self.kv.remove(key),
        };
        self.record(Undo::Kv(key.to_vec(), previous));
    }

    // Message queue

    fn read_index(&self, key: &[u8]) -> Result<QueueIndex, AnchorError> {
        match self.kv.get(key) {
            Some(bytes) => self
                .type_coder
                .decode_index(bytes, self.config.index_type)
                .map_err(|e| AnchorError::FailedToDecode(e.to_string())),
            None => Ok(0),
        }
    }

    fn write_index(&mut self, key: &[u8], index: QueueIndex) -> Result<(), AnchorError> {
        let bytes = self
            .type_coder
            .encode_index(index, self.config.index_type)
            .map_err(|_| AnchorError::QueueIndexOverflow)?;
        self.set_value(key, Some(&bytes));
        Ok(())
    }

    /// Key of the slot holding message `index`.
    pub fn message_key(&self, index: QueueIndex) -> Result<Key, AnchorError> {
        let encoded = self
            .type_coder
            .encode_index(index, self.config.index_type)
            .map_err(|_| AnchorError::QueueIndexOverflow)?;
        Ok(self.config.keys.message_key(&encoded))
    }

    pub fn queue_head(&self) -> Result<QueueIndex, AnchorError> {
        self.read_index(&self.config.keys.queue_head)
    }

    pub fn queue_tail(&self) -> Result<QueueIndex, AnchorError> {
        self.read_index(&self.config.keys.queue_tail)
    }

    pub fn has_message(&self) -> Result<bool, AnchorError> {
        Ok(self.queue_tail()? > self.queue_head()?)
    }

    /// Append an encoded message at the tail. Returns its index.
    pub fn push_message(&mut self, data: Vec<u8>) -> Result<QueueIndex, AnchorError> {
        self.transact(|anchor| {
            let id = anchor.queue_tail()?;
            let next = id.checked_add(1).ok_or(AnchorError::QueueIndexOverflow)?;
            let key = anchor.message_key(id)?;
            anchor.set_value(&key, Some(&data));
            let tail_key = anchor.config.keys.queue_tail.clone();
            anchor.write_index(&tail_key, next)?;
            debug!(id, len = data.len(), "Message queued");
            anchor.events.push(AnchorEvent::MessageQueued { id, data });
            Ok(id)
        })
    }

    /// Consume every message below `target`.
    fn pop_to(&mut self, target: QueueIndex) -> Result<(), AnchorError> {
        let head = self.queue_head()?;
        let tail = self.queue_tail()?;
        if target > tail || target < head {
            return Err(AnchorError::InvalidPopTarget { target, head, tail });
        }
        if target == head {
            return Ok(());
        }
        for id in head..target {
            let key = self.message_key(id)?;
            self.set_value(&key, None);
        }
        let head_key = self.config.keys.queue_head.clone();
        self.write_index(&head_key, target)?;
        self.events.push(AnchorEvent::MessageProcessed { id: target });
        Ok(())
    }

    // Access control

    pub fn has_role(&self, role: Role, account: AccountId) -> bool {
        self.roles.contains(&(role, account))
    }

    fn check_role(&self, role: Role, account: AccountId) -> Result<(), AccessControlError> {
        if self.has_role(role, account) {
            Ok(())
        } else {
            Err(AccessControlError::MissingRole)
        }
    }

    fn apply_grant(
        &mut self,
        caller: AccountId,
        role: Role,
        account: AccountId,
    ) -> Result<(), AccessControlError> {
        if !self.has_role(Role::Admin, caller) {
            return Err(AccessControlError::InvalidCaller);
        }
        if self.has_role(role, account) {
            return Err(AccessControlError::RoleRedundant);
        }
        self.roles.insert((role, account));
        self.record(Undo::Role((role, account), false));
        self.events.push(AnchorEvent::RoleGranted {
            role,
            grantee: account,
            grantor: caller,
        });
        Ok(())
    }

    fn apply_revoke(
        &mut self,
        caller: AccountId,
        role: Role,
        account: AccountId,
    ) -> Result<(), AccessControlError> {
        if caller != account && !self.has_role(Role::Admin, caller) {
            return Err(AccessControlError::InvalidCaller);
        }
        self.check_role(role, account)?;
        self.roles.remove(&(role, account));
        self.record(Undo::Role((role, account), true));
        self.events.push(AnchorEvent::RoleRevoked {
            role,
            account,
            sender: caller,
        });
        Ok(())
    }

    /// Grant `role` to `account`. Admin only.
    pub fn grant_role(
        &mut self,
        caller: AccountId,
        role: Role,
        account: AccountId,
    ) -> Result<(), AnchorError> {
        self.transact(|anchor| Ok(anchor.apply_grant(caller, role, account)?))
    }

    /// Revoke `role` from `account`. Admin, or the account itself.
    pub fn revoke_role(
        &mut self,
        caller: AccountId,
        role: Role,
        account: AccountId,
    ) -> Result<(), AnchorError> {
        self.transact(|anchor| Ok(anchor.apply_revoke(caller, role, account)?))
    }

    /// Drop one of the caller's own roles.
    pub fn renounce_role(&mut self, caller: AccountId, role: Role) -> Result<(), AnchorError> {
        self.revoke_role(caller, role, caller)
    }

    // Rollup

    /// Apply a conditional batch as `caller`.
    ///
    /// Fails unless the caller is an attestor and every condition matches
    /// the stored bytes exactly (absent matches only absent).
    pub fn rollup_cond_eq(
        &mut self,
        caller: AccountId,
        conditions: Vec<KvEntry>,
        updates: Vec<KvEntry>,
        actions: Vec<Action>,
    ) -> Result<TxHash, AnchorError> {
        self.transact(|anchor| anchor.apply_rollup(caller, conditions, updates, actions))
    }

    pub(crate) fn apply_rollup(
        &mut self,
        caller: AccountId,
        conditions: Vec<KvEntry>,
        updates: Vec<KvEntry>,
        actions: Vec<Action>,
    ) -> Result<TxHash, AnchorError> {
        self.check_role(Role::Attestor, caller)?;

        for (key, expected) in &conditions {
            if self.kv.get(key) != expected.as_ref() {
                debug!(key = %String::from_utf8_lossy(key), "Condition not met");
                return Err(AnchorError::ConditionNotMet);
            }
        }

        for (key, value) in &updates {
            self.set_value(key, value.as_deref());
        }

        for action in actions {
            self.handle_action(caller, action)?;
        }

        self.tx_count += 1;
        let tx_hash = Hash::from_parts(&[
            b"rollup",
            &self.address.0,
            &caller.0,
            &self.tx_count.to_le_bytes(),
        ]);
        self.events.push(AnchorEvent::Rollup {
            tx_hash,
            attestor: caller,
        });
        info!(
            tx_hash = %tx_hash,
            attestor = %caller,
            conditions = conditions.len(),
            updates = updates.len(),
            "Rollup applied"
        );
        Ok(tx_hash)
    }

    fn handle_action(&mut self, caller: AccountId, action: Action) -> Result<(), AnchorError> {
        match action {
            Action::Reply(data) => {
                self.replies.push(data.clone());
                self.events.push(AnchorEvent::ReplyReceived { data });
            }
            Action::SetQueueHead(target) => self.pop_to(target)?,
            Action::GrantAttestor(account) => self.apply_grant(caller, Role::Attestor, account)?,
            Action::RevokeAttestor(account) => {
                self.apply_revoke(caller, Role::Attestor, account)?
            }
        }
        Ok(())
    }
}

/// Anchor shared between backends and test harnesses.
#[derive(Clone)]
pub struct SharedAnchor(Arc<Mutex<Anchor>>);

impl SharedAnchor {
    pub fn new(anchor: Anchor) -> Self {
        Self(Arc::new(Mutex::new(anchor)))
    }

    pub fn lock(&self) -> MutexGuard<'_, Anchor> {
        self.0.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollup_types::test_utils::{key, test_attestor};

    fn setup() -> (Anchor, AccountId, AccountId) {
        let admin = test_attestor(1).account_id();
        let attestor = test_attestor(2).account_id();
        let mut anchor = Anchor::native(admin);
        anchor.grant_role(admin, Role::Attestor, attestor).unwrap();
        (anchor, admin, attestor)
    }

    #[test]
    fn test_push_and_pop() {
        let (mut anchor, _, attestor) = setup();
        assert!(!anchor.has_message().unwrap());
        assert_eq!(anchor.push_message(vec![1]).unwrap(), 0);
        assert_eq!(anchor.push_message(vec![2]).unwrap(), 1);
        assert!(anchor.has_message().unwrap());

        anchor
            .rollup_cond_eq(attestor, vec![], vec![], vec![Action::SetQueueHead(1)])
            .unwrap();
        assert_eq!(anchor.queue_head().unwrap(), 1);
        assert_eq!(anchor.get_value(&anchor.message_key(0).unwrap()), None);
        assert_eq!(
            anchor.get_value(&anchor.message_key(1).unwrap()),
            Some(vec![2])
        );
    }

    #[test]
    fn test_pop_target_bounds() {
        let (mut anchor, _, attestor) = setup();
        anchor.push_message(vec![1]).unwrap();
        let err = anchor
            .rollup_cond_eq(attestor, vec![], vec![], vec![Action::SetQueueHead(5)])
            .unwrap_err();
        assert_eq!(
            err,
            AnchorError::InvalidPopTarget {
                target: 5,
                head: 0,
                tail: 1
            }
        );
    }

    #[test]
    fn test_conditions_compare_exact_bytes() {
        let (mut anchor, _, attestor) = setup();
        let k = key("k");
        anchor
            .rollup_cond_eq(attestor, vec![(k.clone(), None)], vec![(k.clone(), Some(vec![1]))], vec![])
            .unwrap();
        assert_eq!(
            anchor.rollup_cond_eq(attestor, vec![(k.clone(), None)], vec![], vec![]),
            Err(AnchorError::ConditionNotMet)
        );
        assert_eq!(
            anchor.rollup_cond_eq(attestor, vec![(k.clone(), Some(vec![2]))], vec![], vec![]),
            Err(AnchorError::ConditionNotMet)
        );
        assert!(anchor
            .rollup_cond_eq(attestor, vec![(k, Some(vec![1]))], vec![], vec![])
            .is_ok());
    }

    #[test]
    fn test_failed_batch_leaves_no_trace() {
        let (mut anchor, _, attestor) = setup();
        let before = anchor.events().len();
        let err = anchor.rollup_cond_eq(
            attestor,
            vec![],
            vec![(key("k"), Some(vec![1]))],
            vec![Action::Reply(vec![9]), Action::SetQueueHead(3)],
        );
        assert!(err.is_err());
        assert_eq!(anchor.get_value(b"k"), None);
        assert!(anchor.replies().is_empty());
        assert_eq!(anchor.events().len(), before);
        assert_eq!(anchor.tx_count(), 0);
    }

    #[test]
    fn test_failed_batch_restores_touched_state() {
        let (mut anchor, admin, attestor) = setup();
        let other = test_attestor(3).account_id();
        anchor.grant_role(admin, Role::Attestor, admin).unwrap();
        anchor.push_message(vec![1]).unwrap();
        anchor
            .rollup_cond_eq(admin, vec![], vec![(key("a"), Some(vec![1]))], vec![])
            .unwrap();
        let events = anchor.events().len();

        let err = anchor.rollup_cond_eq(
            admin,
            vec![],
            vec![(key("a"), Some(vec![2])), (key("b"), Some(vec![3]))],
            vec![
                Action::SetQueueHead(1),
                Action::GrantAttestor(other),
                Action::RevokeAttestor(attestor),
                Action::Reply(vec![9]),
                Action::SetQueueHead(4),
            ],
        );
        assert!(err.is_err());
        assert_eq!(anchor.get_value(b"a"), Some(vec![1]));
        assert_eq!(anchor.get_value(b"b"), None);
        assert_eq!(anchor.queue_head().unwrap(), 0);
        assert_eq!(
            anchor.get_value(&anchor.message_key(0).unwrap()),
            Some(vec![1])
        );
        assert!(!anchor.has_role(Role::Attestor, other));
        assert!(anchor.has_role(Role::Attestor, attestor));
        assert!(anchor.replies().is_empty());
        assert_eq!(anchor.events().len(), events);
        assert_eq!(anchor.tx_count(), 1);
    }

    #[test]
    fn test_journal_released_after_each_call() {
        let (mut anchor, _, attestor) = setup();
        for i in 0..1_000u32 {
            anchor.push_message(i.to_be_bytes().to_vec()).unwrap();
            assert!(anchor.journal.is_empty());
        }
        anchor
            .rollup_cond_eq(attestor, vec![], vec![], vec![Action::SetQueueHead(1_000)])
            .unwrap();
        assert!(anchor.journal.is_empty());
        assert!(anchor
            .rollup_cond_eq(attestor, vec![(key("x"), Some(vec![1]))], vec![], vec![])
            .is_err());
        assert!(anchor.journal.is_empty());
        assert_eq!(anchor.events().len(), 1 + 1 + 1_000 + 2);
    }

    #[test]
    fn test_attestor_role_required() {
        let (mut anchor, admin, _) = setup();
        assert_eq!(
            anchor.rollup_cond_eq(admin, vec![], vec![], vec![]),
            Err(AnchorError::AccessControl(AccessControlError::MissingRole))
        );
    }

    #[test]
    fn test_role_management() {
        let (mut anchor, admin, attestor) = setup();
        let other = test_attestor(3).account_id();
        assert_eq!(
            anchor.grant_role(attestor, Role::Attestor, other),
            Err(AnchorError::AccessControl(AccessControlError::InvalidCaller))
        );
        assert_eq!(
            anchor.grant_role(admin, Role::Attestor, attestor),
            Err(AnchorError::AccessControl(AccessControlError::RoleRedundant))
        );
        anchor.renounce_role(attestor, Role::Attestor).unwrap();
        assert!(!anchor.has_role(Role::Attestor, attestor));
        assert_eq!(
            anchor.revoke_role(admin, Role::Attestor, attestor),
            Err(AnchorError::AccessControl(AccessControlError::MissingRole))
        );
    }

    #[test]
    fn test_role_actions_need_admin_caller() {
        let (mut anchor, admin, attestor) = setup();
        let other = test_attestor(3).account_id();
        assert!(anchor
            .rollup_cond_eq(attestor, vec![], vec![], vec![Action::GrantAttestor(other)])
            .is_err());

        anchor.grant_role(admin, Role::Attestor, admin).unwrap();
        anchor
            .rollup_cond_eq(admin, vec![], vec![], vec![Action::GrantAttestor(other)])
            .unwrap();
        assert!(anchor.has_role(Role::Attestor, other));
        anchor
            .rollup_cond_eq(admin, vec![], vec![], vec![Action::RevokeAttestor(other)])
            .unwrap();
        assert!(!anchor.has_role(Role::Attestor, other));
    }

    #[test]
    fn test_replies_recorded_in_order() {
        let (mut anchor, _, attestor) = setup();
        anchor
            .rollup_cond_eq(
                attestor,
                vec![],
                vec![],
                vec![Action::Reply(vec![1]), Action::Reply(vec![2])],
            )
            .unwrap();
        assert_eq!(anchor.replies(), &[vec![1], vec![2]]);
    }
}
