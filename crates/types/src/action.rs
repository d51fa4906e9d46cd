//! Outbound effects carried by a rollup transaction.

use crate::{AccountId, QueueIndex};
use sbor::prelude::*;

/// One effect applied by the anchor after conditions hold and updates land.
///
/// The engine only ever emits `Reply` and `SetQueueHead`. The role variants
/// exist for administrators driving the anchor directly.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub enum Action {
    /// An encoded response message.
    Reply(Vec<u8>),
    /// Move the queue head, consuming every message below it.
    SetQueueHead(QueueIndex),
    /// Give an account the attestor role.
    GrantAttestor(AccountId),
    /// Remove the attestor role from an account.
    RevokeAttestor(AccountId),
}

impl Action {
    /// Whether the engine itself may produce this action.
    pub fn is_engine_action(&self) -> bool {
        matches!(self, Action::Reply(_) | Action::SetQueueHead(_))
    }
}
