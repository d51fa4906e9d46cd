//! Session-based optimistic-concurrency transaction engine.
//!
//! A [`Client`] turns a round of reads, writes, queue polls and replies into
//! a single conditional transaction against a remote key/value store:
//!
//! ```text
//! start_session ─► get/set/poll_message/add_action ─► commit
//!       ▲                                               │
//!       └──────────── fresh session on success ◄────────┘
//! ```
//!
//! Every key read remotely during the session becomes an equality condition,
//! and every commit bumps the version key. Two workers that read the same
//! version therefore cannot both commit: the loser gets
//! [`ClientError::ConditionNotMet`] and must `rollback` and start over.
//!
//! The remote side is abstracted behind [`Backend`]; the delegated-signing
//! path is provided by [`MetaTxBackend`] and [`forward_meta_transaction`].

mod backend;
mod client;
mod config;
mod error;
mod session;

pub use backend::{forward_meta_transaction, Backend, MetaTxBackend};
pub use client::Client;
pub use config::ClientConfig;
pub use error::{BackendError, ClientError};
pub use session::Session;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
