//! Webhook service (dispatcher): the public façade over dispatch, the
//! queue's job processor, and read-through history/stat queries.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;

use domain::models::{
    AttemptResult, DeliveryJob, DeliveryRecordPage, DeliveryRecordQuery, DeliveryStats,
    DispatchOptions, TransportError, TransportErrorKind,
};
use persistence::repositories::{WebhookDeliveryRepository, WebhookRepository};

use crate::deliverer::HttpDeliverer;
use crate::error::DispatchError;
use crate::hooks::{NoopHooks, WebhookHooks};
use crate::queue::{JobProcessor, PriorityQueue};
use crate::retry;

/// Result of a `dispatch` call: how many subscribers matched the event.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DispatchResult {
    pub queued: usize,
}

/// Result of a synchronous `test` send: single-shot, never retried, but
/// still logged to delivery history like any other attempt.
#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    pub success: bool,
    pub status_code: Option<u16>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Accepts domain events, fans them out to matching subscribers via the
/// queue, and implements the queue's job-processing callback.
pub struct Dispatcher {
    registry: WebhookRepository,
    history: WebhookDeliveryRepository,
    deliverer: HttpDeliverer,
    queue: Arc<PriorityQueue>,
    hooks: Arc<dyn WebhookHooks>,
}

impl Dispatcher {
    pub fn new(
        registry: WebhookRepository,
        history: WebhookDeliveryRepository,
        deliverer: HttpDeliverer,
        queue: Arc<PriorityQueue>,
    ) -> Self {
        Self {
            registry,
            history,
            deliverer,
            queue,
            hooks: Arc::new(NoopHooks),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn WebhookHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Queries active subscribers for `event` and enqueues one job per match.
    pub async fn dispatch(
        &self,
        event: &str,
        data: serde_json::Value,
        options: DispatchOptions,
    ) -> Result<DispatchResult, DispatchError> {
        let webhooks = self.registry.find_active_for_event(event).await?;
        let now = Utc::now();
        let mut queued = 0usize;
        for webhook in webhooks {
            let job = DeliveryJob::first_attempt(webhook.id, event, data.clone(), options, now);
            self.queue.enqueue(job).await;
            queued += 1;
        }
        Ok(DispatchResult { queued })
    }

    /// The queue's worker callback: loads the webhook, delivers, logs the
    /// attempt, and either finalizes or schedules a retry.
    pub async fn process_job(&self, job: DeliveryJob) {
        let job_start = Utc::now();

        let webhook = match self.registry.find_by_id(job.webhook_id).await {
            Ok(Some(webhook)) => webhook,
            Ok(None) => {
                tracing::error!(
                    webhook_id = job.webhook_id,
                    delivery_id = %job.delivery_id,
                    "webhook vanished before delivery; dropping job"
                );
                return;
            }
            Err(error) => {
                tracing::error!(%error, delivery_id = %job.delivery_id, "failed to load webhook for delivery");
                return;
            }
        };

        let mut job = job;
        job.data = self.hooks.before_send(&job).await;

        let result = match self.deliverer.deliver(&webhook, &job).await {
            Ok(result) => result,
            Err(error) => {
                tracing::error!(%error, delivery_id = %job.delivery_id, "internal error building delivery request");
                AttemptResult {
                    success: false,
                    status_code: None,
                    error: Some(TransportError::new(TransportErrorKind::Other, error.to_string())),
                    duration_ms: 0,
                    attempt: job.attempt,
                    response_body: None,
                    completed_at: Utc::now(),
                }
            }
        };

        self.hooks.after_send(&job, &result).await;

        self.finalize(&job, job_start, result).await;
    }

    /// Persists the attempt and, on a retryable failure, schedules the next
    /// one. Shared by the normal delivery path and the processor-panic path,
    /// so both log exactly one `DeliveryRecord` per attempt.
    async fn finalize(&self, job: &DeliveryJob, created_at: chrono::DateTime<Utc>, result: AttemptResult) {
        if let Err(error) = self.history.record(job.delivery_id, job.webhook_id, &job.event, created_at, &result).await {
            tracing::error!(%error, delivery_id = %job.delivery_id, "failed to persist delivery record");
        }

        if result.success {
            tracing::info!(delivery_id = %job.delivery_id, webhook_id = job.webhook_id, attempt = job.attempt, "webhook delivered");
            return;
        }

        if retry::is_final_failure(job.attempt, job.max_attempts) {
            tracing::warn!(
                delivery_id = %job.delivery_id,
                webhook_id = job.webhook_id,
                attempt = job.attempt,
                "webhook delivery failed permanently"
            );
            return;
        }

        if !retry::should_retry(result.status_code, result.error.as_ref()) {
            tracing::warn!(
                delivery_id = %job.delivery_id,
                webhook_id = job.webhook_id,
                status = ?result.status_code,
                "webhook delivery failed with a non-retryable error"
            );
            return;
        }

        let delay = retry::calculate_delay(job.attempt, job.retry_config());
        match self.queue.schedule_retry(job, delay).await {
            Ok(()) => tracing::info!(
                delivery_id = %job.delivery_id,
                webhook_id = job.webhook_id,
                delay_ms = delay.as_millis() as u64,
                "webhook delivery scheduled for retry"
            ),
            Err(error) => tracing::error!(%error, delivery_id = %job.delivery_id, "failed to schedule retry"),
        }
    }

    /// Called by the queue when a job processor panics instead of returning
    /// normally — the `InternalProcessorBug` case. Logs a failed
    /// `DeliveryRecord` and reschedules the job unconditionally, since the
    /// failure reflects a bug in our own code rather than a legitimate
    /// delivery rejection.
    pub async fn handle_processor_panic(&self, job: DeliveryJob, message: String) {
        let now = Utc::now();
        let result = AttemptResult {
            success: false,
            status_code: None,
            error: Some(TransportError::new(TransportErrorKind::Other, format!("internal processor bug: {message}"))),
            duration_ms: 0,
            attempt: job.attempt,
            response_body: None,
            completed_at: now,
        };

        if let Err(error) = self.history.record(job.delivery_id, job.webhook_id, &job.event, now, &result).await {
            tracing::error!(%error, delivery_id = %job.delivery_id, "failed to persist delivery record for a processor panic");
        }

        if retry::is_final_failure(job.attempt, job.max_attempts) {
            tracing::error!(delivery_id = %job.delivery_id, webhook_id = job.webhook_id, "processor panicked and exhausted retries");
            return;
        }

        let delay = retry::calculate_delay(job.attempt, job.retry_config());
        match self.queue.schedule_retry(&job, delay).await {
            Ok(()) => tracing::warn!(
                delivery_id = %job.delivery_id,
                webhook_id = job.webhook_id,
                delay_ms = delay.as_millis() as u64,
                "rescheduled job after processor panic"
            ),
            Err(error) => tracing::error!(%error, delivery_id = %job.delivery_id, "failed to reschedule job after processor panic"),
        }
    }

    /// Synchronous single-shot send, bypassing the queue entirely: no retry,
    /// but still logs exactly one `DeliveryRecord`, same as a queue-driven
    /// attempt.
    pub async fn test(&self, webhook_id: i64, event: &str, data: serde_json::Value) -> Result<TestResult, DispatchError> {
        let webhook = self
            .registry
            .find_by_id(webhook_id)
            .await?
            .ok_or(DispatchError::WebhookNotFound(webhook_id))?;

        let job_start = Utc::now();
        let options = DispatchOptions {
            max_attempts: Some(1),
            ..Default::default()
        };
        let job = DeliveryJob::first_attempt(webhook_id, event, data, options, job_start);
        let result = self.deliverer.deliver(&webhook, &job).await?;

        if let Err(error) = self.history.record(job.delivery_id, job.webhook_id, &job.event, job_start, &result).await {
            tracing::error!(%error, delivery_id = %job.delivery_id, "failed to persist delivery record for a test send");
        }

        Ok(TestResult {
            success: result.success,
            status_code: result.status_code,
            error: result.error.map(|e| e.to_string()),
            duration_ms: result.duration_ms,
        })
    }

    /// Paginated delivery history for one webhook.
    pub async fn get_deliveries(
        &self,
        webhook_id: i64,
        query: DeliveryRecordQuery,
    ) -> Result<DeliveryRecordPage, DispatchError> {
        Ok(self.history.get_deliveries(webhook_id, query).await?)
    }

    /// Combined live queue occupancy and lifetime delivery counters.
    pub async fn stats(&self) -> Result<DeliveryStats, DispatchError> {
        let queue_stats = self.queue.stats().await;
        let (delivered_total, failed_total) = self.history.totals().await?;
        Ok(DeliveryStats {
            pending: queue_stats.pending,
            processing: queue_stats.processing,
            delivered_total,
            failed_total,
        })
    }
}

/// Adapts [`Dispatcher`] to the queue's [`JobProcessor`] callback.
pub struct DispatcherProcessor(pub Arc<Dispatcher>);

#[async_trait]
impl JobProcessor for DispatcherProcessor {
    async fn process(&self, job: DeliveryJob) {
        self.0.process_job(job).await;
    }

    async fn handle_panic(&self, job: DeliveryJob, message: String) {
        self.0.handle_processor_panic(job, message).await;
    }
}
