//! Request handling contract.

use crate::WorkerError;

/// Maps one inbound request to the replies it produces.
#[async_trait::async_trait]
pub trait MessageHandler<M, R>: Send + Sync {
    /// Handle `request`. An error aborts the round without committing.
    async fn handle(&self, request: M) -> Result<Vec<R>, WorkerError>;
}
