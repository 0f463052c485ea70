// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery worker for the webhook queue.
//!
//! Pulls due jobs off the durable queue and POSTs them to the customer's
//! endpoint, bounded by a concurrency limit (permits) and a global
//! starts-per-second rate gate (ticker). Failed attempts are rescheduled with
//! exponential backoff; exhausted jobs stay in the table as `failed`.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use tokio::sync::Semaphore;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use wagate_config::QueueConfig;
use wagate_core::backoff::exponential_delay;
use wagate_storage::models::{FailOutcome, WebhookDelivery};
use wagate_storage::queries::webhooks;
use wagate_storage::Database;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const IDLE_POLL: Duration = Duration::from_millis(250);
const RETRY_BASE: Duration = Duration::from_secs(1);
const RETRY_CAP: Duration = Duration::from_secs(300);
const USER_AGENT: &str = concat!("wagate/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, thiserror::Error)]
enum DeliveryError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("endpoint returned {0}")]
    Status(reqwest::StatusCode),
}

/// Worker that drains the webhook delivery queue.
pub struct WebhookWorker {
    db: Database,
    http: reqwest::Client,
    concurrency: usize,
    start_interval: Duration,
}

impl WebhookWorker {
    pub fn new(db: Database, config: &QueueConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self {
            db,
            http,
            concurrency: config.concurrency,
            start_interval: Duration::from_secs_f64(1.0 / f64::from(config.rate_per_sec.max(1))),
        }
    }

    /// Run the dequeue loop until cancelled. In-flight deliveries finish; the
    /// lock timeout reclaims anything interrupted by a hard kill.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        // Jobs stranded in `processing` by a previous crash.
        match webhooks::release_expired(&self.db).await {
            Ok(0) => {}
            Ok(n) => tracing::info!(released = n, "reclaimed stale webhook deliveries"),
            Err(e) => tracing::warn!(error = %e, "failed to reclaim stale webhook deliveries"),
        }

        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut rate = tokio::time::interval(self.start_interval);
        rate.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            concurrency = self.concurrency,
            interval_ms = self.start_interval.as_millis() as u64,
            "webhook worker started"
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

            match webhooks::dequeue_due(&self.db).await {
                Ok(Some(job)) => {
                    let worker = Arc::clone(&self);
                    tokio::spawn(async move {
                        worker.process(job).await;
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
                    tracing::error!(error = %e, "webhook dequeue failed");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(IDLE_POLL) => {}
                    }
                }
            }
        }

        tracing::info!("webhook worker stopped");
    }

    /// Attempt one delivery and settle the job's queue state.
    pub async fn process(&self, job: WebhookDelivery) {
        let delivery_id = job.id;
        match self.deliver(&job).await {
            Ok(()) => {
                tracing::info!(
                    delivery_id,
                    event = %job.event_type,
                    url = %job.webhook_url,
                    "webhook delivered"
                );
                if let Err(e) = webhooks::ack(&self.db, delivery_id).await {
                    tracing::error!(delivery_id, error = %e, "failed to ack webhook delivery");
                }
            }
            Err(err) => {
                let delay = exponential_delay(job.attempts as u32, RETRY_BASE, RETRY_CAP);
                match webhooks::fail(&self.db, delivery_id, delay.as_secs() as i64).await {
                    Ok(FailOutcome::Retrying { attempts }) => {
                        tracing::warn!(
                            delivery_id,
                            attempts,
                            retry_in_secs = delay.as_secs(),
                            error = %err,
                            "webhook delivery failed, will retry"
                        );
                    }
                    Ok(FailOutcome::Terminal) => {
                        tracing::warn!(
                            delivery_id,
                            event = %job.event_type,
                            url = %job.webhook_url,
                            error = %err,
                            "webhook delivery failed permanently, row retained"
                        );
                    }
                    Err(e) => {
                        tracing::error!(delivery_id, error = %e, "failed to record webhook failure");
                    }
                }
            }
        }
    }

    async fn deliver(&self, job: &WebhookDelivery) -> Result<(), DeliveryError> {
        let mut request = self
            .http
            .post(&job.webhook_url)
            .header(CONTENT_TYPE, "application/json")
            .body(job.payload.clone());
        if let Some(request_id) = &job.request_id {
            request = request.header("X-Request-ID", request_id.clone());
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(DeliveryError::Status(response.status()));
        }
        Ok(())
    }
}
