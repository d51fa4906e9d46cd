use crate::Role;
use rollup_types::{AccountId, QueueIndex, TxHash};

/// Events emitted by anchor entry points, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnchorEvent {
    MessageQueued {
        id: QueueIndex,
        data: Vec<u8>,
    },
    /// Every message below `id` has been consumed.
    MessageProcessed {
        id: QueueIndex,
    },
    ReplyReceived {
        data: Vec<u8>,
    },
    RoleGranted {
        role: Role,
        grantee: AccountId,
        grantor: AccountId,
    },
    RoleRevoked {
        role: Role,
        account: AccountId,
        sender: AccountId,
    },
    MetaTransactionDecoded,
    Rollup {
        tx_hash: TxHash,
        attestor: AccountId,
    },
}
