// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Worker loop for the outbound-message queue.
//!
//! Shares the dequeue discipline of the webhook worker: a semaphore bounds
//! jobs in flight, a ticker bounds starts per second, and failed attempts go
//! back to the queue with exponential backoff. A file job owns its upload
//! blob until the outcome is terminal: the blob is deleted exactly once, on
//! success or on exhaustion, and kept across retries.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use wagate_config::QueueConfig;
use wagate_core::backoff::exponential_delay;
use wagate_core::{directions, OutboundJob, WagateError};
use wagate_storage::models::{FailOutcome, NewMessageLog, QueueEntry};
use wagate_storage::queries::{messages, queue};
use wagate_storage::{Database, OUTBOUND_QUEUE};

use crate::sender::MessageSender;

const IDLE_POLL: Duration = Duration::from_millis(250);
const RETRY_BASE: Duration = Duration::from_secs(1);
const RETRY_CAP: Duration = Duration::from_secs(300);

/// Enqueue an outbound job. Returns the durable queue entry id handed back
/// to the API caller.
pub async fn submit(
    db: &Database,
    job: &OutboundJob,
    max_attempts: u32,
) -> Result<i64, WagateError> {
    let payload =
        serde_json::to_string(job).map_err(|e| WagateError::Internal(e.to_string()))?;
    let id = queue::enqueue(db, OUTBOUND_QUEUE, &payload, max_attempts as i64).await?;
    tracing::debug!(
        job_id = id,
        session_id = job.session_id(),
        message_type = job.message_type(),
        "outbound job enqueued"
    );
    Ok(id)
}

/// Worker that drains the outbound-message queue.
pub struct MessageWorker {
    db: Database,
    sender: MessageSender,
    concurrency: usize,
    start_interval: Duration,
}

impl MessageWorker {
    pub fn new(db: Database, sender: MessageSender, config: &QueueConfig) -> Self {
        Self {
            db,
            sender,
            concurrency: config.concurrency,
            start_interval: Duration::from_secs_f64(1.0 / f64::from(config.rate_per_sec.max(1))),
        }
    }

    /// Run the dequeue loop until cancelled.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        match queue::release_expired(&self.db, OUTBOUND_QUEUE).await {
            Ok(0) => {}
            Ok(n) => tracing::info!(released = n, "reclaimed stale outbound jobs"),
            Err(e) => tracing::warn!(error = %e, "failed to reclaim stale outbound jobs"),
        }

        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut rate = tokio::time::interval(self.start_interval);
        rate.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            concurrency = self.concurrency,
            interval_ms = self.start_interval.as_millis() as u64,
            "message worker started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = rate.tick() => {}
            }

            let permit = tokio::select! {
                _ = cancel.cancelled() => break,
                permit = permits.clone().acquire_owned() => match permit {
                    Ok(p) => p,
                    Err(_) => break,
                },
            };

            match queue::dequeue_due(&self.db, OUTBOUND_QUEUE).await {
                Ok(Some(entry)) => {
                    let worker = Arc::clone(&self);
                    tokio::spawn(async move {
                        worker.process(entry).await;
                        drop(permit);
                    });
                }
                Ok(None) => {
                    drop(permit);
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(IDLE_POLL) => {}
                    }
                }
                Err(e) => {
                    drop(permit);
                    tracing::error!(error = %e, "outbound dequeue failed");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(IDLE_POLL) => {}
                    }
                }
            }
        }

        tracing::info!("message worker stopped");
    }

    /// Attempt one delivery and settle the job's queue state.
    pub async fn process(&self, entry: QueueEntry) {
        let job_id = entry.id;
        let job: OutboundJob = match serde_json::from_str(&entry.payload) {
            Ok(job) => job,
            Err(e) => {
                tracing::error!(job_id, error = %e, "undecodable outbound payload");
                if let Err(e) = queue::fail(&self.db, job_id, 0).await {
                    tracing::error!(job_id, error = %e, "failed to record job failure");
                }
                return;
            }
        };

        match self.sender.deliver(&job).await {
            Ok(receipt) => {
                tracing::info!(
                    job_id,
                    session_id = job.session_id(),
                    message_id = %receipt.message_id,
                    "outbound message sent"
                );
                if let Err(e) = queue::ack(&self.db, job_id).await {
                    tracing::error!(job_id, error = %e, "failed to ack outbound job");
                }
                let log = NewMessageLog {
                    session_id: job.session_id().to_string(),
                    direction: directions::OUTGOING.to_string(),
                    message_id: Some(receipt.message_id),
                    recipient: Some(MessageSender::recipient(&job).to_string()),
                    message_type: Some(job.message_type().to_string()),
                    content_preview: MessageSender::preview(&job),
                    status: Some("sent".to_string()),
                };
                if let Err(e) = messages::insert(&self.db, &log).await {
                    tracing::error!(job_id, error = %e, "failed to log outbound message");
                }
                self.cleanup_blob(&job).await;
            }
            Err(err) => {
                let delay = exponential_delay(entry.attempts as u32, RETRY_BASE, RETRY_CAP);
                match queue::fail(&self.db, job_id, delay.as_secs() as i64).await {
                    Ok(FailOutcome::Retrying { attempts }) => {
                        // Blob stays on disk: the retry will need it.
                        tracing::warn!(
                            job_id,
                            attempts,
                            retry_in_secs = delay.as_secs(),
                            error = %err,
                            "outbound delivery failed, will retry"
                        );
                    }
                    Ok(FailOutcome::Terminal) => {
                        tracing::warn!(
                            job_id,
                            session_id = job.session_id(),
                            error = %err,
                            "outbound delivery failed permanently"
                        );
                        self.cleanup_blob(&job).await;
                    }
                    Err(e) => {
                        tracing::error!(job_id, error = %e, "failed to record job failure");
                    }
                }
            }
        }
    }

    /// Delete the upload blob a file job owns. Called exactly once per job,
    /// at its terminal outcome.
    async fn cleanup_blob(&self, job: &OutboundJob) {
        let OutboundJob::File { path, .. } = job else {
            return;
        };
        match tokio::fs::remove_file(path).await {
            Ok(()) => tracing::debug!(path = %path, "upload blob removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %path, error = %e, "failed to remove upload blob"),
        }
    }
}
