//! In-memory rollup anchor.
//!
//! The anchor is the ledger-side half of the protocol: a key/value store with
//! an embedded FIFO message queue, a conditional batch entry point guarded
//! by an attestor role, and a meta-transaction entry point that lets a
//! sender submit batches signed by an attestor.
//!
//! Every entry point is all-or-nothing. Mutations made during a call are
//! journaled and undone if the call fails, so a failed call leaves no trace.
//!
//! Two [`Backend`](rollup_client::Backend) implementations drive it:
//!
//! - [`AnchorBackend`]: native wire shapes (SBOR scalars, tagged actions)
//! - [`AbiAnchorBackend`]: EVM-style wire shapes, translated on entry

mod abi_backend;
mod anchor;
mod backend;
mod error;
mod event;
mod meta_tx;

pub use abi_backend::AbiAnchorBackend;
pub use anchor::{Anchor, AnchorConfig, Role, SharedAnchor};
pub use backend::AnchorBackend;
pub use error::{AccessControlError, AnchorError};
pub use event::AnchorEvent;
pub use meta_tx::{ForwardRequest, Nonce, RollupBatch};
