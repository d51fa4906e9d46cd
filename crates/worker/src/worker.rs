//! Round driver.

use crate::{MessageHandler, WorkerSettings};
use rollup_client::{Backend, Client, ClientError};
use rollup_types::TxHash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("handler failed: {0}")]
    Handler(String),
}

/// Result of one round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    Committed {
        tx_hash: TxHash,
        messages: usize,
        replies: usize,
    },
    /// The round read state but had nothing to write.
    NothingToCommit,
    /// The queue was empty; no session was started.
    QueueEmpty,
    /// Another worker committed first. The session was rolled back.
    Conflict,
}

/// Totals across rounds.
#[derive(Debug, Clone, Default)]
pub struct WorkerReport {
    pub rounds: u64,
    pub commits: u64,
    pub conflicts: u64,
    pub empty_rounds: u64,
    pub errors: u64,
    pub messages: u64,
    pub replies: u64,
    pub duration: Duration,
}

impl WorkerReport {
    fn record(&mut self, outcome: &RoundOutcome) {
        self.rounds += 1;
        match outcome {
            RoundOutcome::Committed {
                messages, replies, ..
            } => {
                self.commits += 1;
                self.messages += *messages as u64;
                self.replies += *replies as u64;
            }
            RoundOutcome::NothingToCommit | RoundOutcome::QueueEmpty => self.empty_rounds += 1,
            RoundOutcome::Conflict => self.conflicts += 1,
        }
    }
}

/// Drains the queue, answers each request and commits the answers.
pub struct Worker<B: Backend, M, R> {
    name: String,
    client: Client<B, M, R>,
    handler: Arc<dyn MessageHandler<M, R>>,
    settings: WorkerSettings,
    report: WorkerReport,
}

impl<B, M, R> Worker<B, M, R>
where
    B: Backend,
    M: Send + 'static,
    R: Send + Sync + 'static,
{
    pub fn new(
        name: impl Into<String>,
        client: Client<B, M, R>,
        handler: Arc<dyn MessageHandler<M, R>>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            name: name.into(),
            client,
            handler,
            settings,
            report: WorkerReport::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn client(&self) -> &Client<B, M, R> {
        &self.client
    }

    pub fn report(&self) -> &WorkerReport {
        &self.report
    }

    /// Run one round.
    ///
    /// A lost race is reported as [`RoundOutcome::Conflict`] after a
    /// rollback and is never retried here. Any other failure is returned.
    #[instrument(skip(self), fields(worker = %self.name))]
    pub async fn run_round(&mut self) -> Result<RoundOutcome, WorkerError> {
        if self.settings.skip_if_empty && !self.client.has_message().await? {
            debug!("Queue empty, skipping round");
            return Ok(RoundOutcome::QueueEmpty);
        }

        self.client.start_session().await?;
        let mut messages = 0;
        let mut replies = 0;
        while messages < self.settings.max_messages_per_round {
            let Some(request) = self.client.poll_message().await? else {
                break;
            };
            messages += 1;
            for reply in self.handler.handle(request).await? {
                self.client.add_action(reply)?;
                replies += 1;
            }
        }

        match self.client.commit().await {
            Ok(Some(tx_hash)) => {
                info!(tx_hash = %tx_hash, messages, replies, "Round committed");
                Ok(RoundOutcome::Committed {
                    tx_hash,
                    messages,
                    replies,
                })
            }
            Ok(None) => Ok(RoundOutcome::NothingToCommit),
            Err(e) if e.is_conflict() => {
                warn!(messages, "Lost commit race, rolling back");
                self.client.rollback().await?;
                Ok(RoundOutcome::Conflict)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Run rounds every `interval` until cancelled or `max_rounds` is hit.
    ///
    /// Round errors are logged and counted; the loop continues.
    pub async fn run_until_cancelled(
        &mut self,
        cancel: CancellationToken,
        interval: Duration,
        max_rounds: Option<u64>,
    ) -> WorkerReport {
        let start = Instant::now();
        info!(worker = %self.name, interval_ms = interval.as_millis(), "Starting worker");

        loop {
            if cancel.is_cancelled() || max_rounds.is_some_and(|max| self.report.rounds >= max) {
                break;
            }

            match self.run_round().await {
                Ok(outcome) => self.report.record(&outcome),
                Err(e) => {
                    warn!(worker = %self.name, error = %e, "Round failed");
                    self.report.rounds += 1;
                    self.report.errors += 1;
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        self.report.duration = start.elapsed();
        info!(
            worker = %self.name,
            rounds = self.report.rounds,
            commits = self.report.commits,
            conflicts = self.report.conflicts,
            "Worker stopped"
        );
        self.report.clone()
    }
}
