//! Scratch state of one transaction round.

use rollup_types::{Key, QueueIndex, Value, VersionNumber};
use std::collections::BTreeMap;

/// Reads, writes, replies and queue cursor buffered for one commit.
///
/// A key missing from `values` has not been fetched; `Some(None)` records
/// that it was fetched and found absent. Ordered maps keep the condition and
/// update lists deterministic.
#[derive(Debug, Clone)]
pub struct Session<R> {
    version: Option<VersionNumber>,
    values: BTreeMap<Key, Option<Value>>,
    updates: BTreeMap<Key, Option<Value>>,
    actions: Vec<R>,
    current_index: Option<QueueIndex>,
    tail_snapshot: Option<QueueIndex>,
    index_updated: bool,
}

impl<R> Default for Session<R> {
    fn default() -> Self {
        Self {
            version: None,
            values: BTreeMap::new(),
            updates: BTreeMap::new(),
            actions: Vec::new(),
            current_index: None,
            tail_snapshot: None,
            index_updated: false,
        }
    }
}

impl<R> Session<R> {
    /// An unstarted session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the version has been read.
    pub fn is_started(&self) -> bool {
        self.version.is_some()
    }

    pub fn version(&self) -> Option<VersionNumber> {
        self.version
    }

    /// Read cache: every key fetched remotely this session.
    pub fn values(&self) -> &BTreeMap<Key, Option<Value>> {
        &self.values
    }

    /// Write set: `None` deletes.
    pub fn updates(&self) -> &BTreeMap<Key, Option<Value>> {
        &self.updates
    }

    /// Outgoing replies in call order.
    pub fn actions(&self) -> &[R] {
        &self.actions
    }

    pub fn current_index(&self) -> Option<QueueIndex> {
        self.current_index
    }

    pub fn tail_snapshot(&self) -> Option<QueueIndex> {
        self.tail_snapshot
    }

    pub fn index_updated(&self) -> bool {
        self.index_updated
    }

    /// Whether a commit would submit anything.
    ///
    /// Reads alone never count.
    pub fn has_pending_work(&self) -> bool {
        self.index_updated || !self.updates.is_empty() || !self.actions.is_empty()
    }

    pub(crate) fn set_version(&mut self, version: VersionNumber) {
        self.version = Some(version);
    }

    /// Pending write for `key`, if any.
    pub(crate) fn pending(&self, key: &[u8]) -> Option<&Option<Value>> {
        self.updates.get(key)
    }

    /// Cached remote read for `key`, if any.
    pub(crate) fn cached(&self, key: &[u8]) -> Option<&Option<Value>> {
        self.values.get(key)
    }

    pub(crate) fn remember(&mut self, key: Key, value: Option<Value>) {
        self.values.insert(key, value);
    }

    pub(crate) fn write(&mut self, key: Key, value: Option<Value>) {
        self.updates.insert(key, value);
    }

    pub(crate) fn push_action(&mut self, action: R) {
        self.actions.push(action);
    }

    /// Queue end for this session, fixed at the first poll.
    pub(crate) fn clamp_tail(&mut self, observed: QueueIndex) -> QueueIndex {
        let snapshot = *self.tail_snapshot.get_or_insert(observed);
        snapshot.min(observed)
    }

    pub(crate) fn set_cursor(&mut self, index: QueueIndex) {
        self.current_index = Some(index);
    }

    pub(crate) fn advance_cursor(&mut self, consumed: QueueIndex) {
        self.current_index = Some(consumed + 1);
        self.index_updated = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_session_is_unstarted_and_idle() {
        let session: Session<Vec<u8>> = Session::new();
        assert!(!session.is_started());
        assert!(!session.has_pending_work());
        assert_eq!(session.current_index(), None);
    }

    #[test]
    fn test_reads_are_not_pending_work() {
        let mut session: Session<Vec<u8>> = Session::new();
        session.set_version(0);
        session.remember(b"k".to_vec(), Some(vec![1]));
        session.remember(b"missing".to_vec(), None);
        assert!(!session.has_pending_work());
        assert_eq!(session.cached(b"missing"), Some(&None));
        assert_eq!(session.cached(b"never"), None);
    }

    #[test]
    fn test_each_kind_of_work_counts() {
        let mut writes: Session<Vec<u8>> = Session::new();
        writes.write(b"k".to_vec(), None);
        assert!(writes.has_pending_work());

        let mut replies: Session<Vec<u8>> = Session::new();
        replies.push_action(vec![1]);
        assert!(replies.has_pending_work());

        let mut polls: Session<Vec<u8>> = Session::new();
        polls.set_cursor(3);
        assert!(!polls.has_pending_work());
        polls.advance_cursor(3);
        assert!(polls.has_pending_work());
        assert_eq!(polls.current_index(), Some(4));
    }

    #[test]
    fn test_tail_fixed_at_first_observation() {
        let mut session: Session<Vec<u8>> = Session::new();
        assert_eq!(session.clamp_tail(4), 4);
        assert_eq!(session.clamp_tail(9), 4);
        assert_eq!(session.tail_snapshot(), Some(4));
    }
}
