//! Rollup worker: drains requests from the anchor queue, answers them and
//! commits the answers in one optimistic transaction per round.
//!
//! - [`Worker`]: one round is `start_session`, drain, handle, `commit`
//! - [`MessageHandler`]: maps a request to zero or more replies
//! - [`WorkerConfig`]: TOML configuration
//! - [`price_feed`]: demo price-feed oracle schema and handler

pub mod config;
pub mod handler;
pub mod price_feed;
pub mod worker;

pub use config::{ConfigError, WorkerConfig, WorkerSettings};
pub use handler::MessageHandler;
pub use worker::{RoundOutcome, Worker, WorkerError, WorkerReport};
