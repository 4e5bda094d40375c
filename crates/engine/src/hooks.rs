//! Optional before/after-send hook points on the dispatcher.

use async_trait::async_trait;

use domain::models::{AttemptResult, DeliveryJob};

/// Observes (and may rewrite) a job's payload before send, and observes the
/// resulting attempt afterward. The default implementation passes both
/// through unchanged.
#[async_trait]
pub trait WebhookHooks: Send + Sync {
    /// Called just before the HTTP deliverer sends `job`. May return a
    /// modified payload `data`; returning the input unchanged is the default.
    async fn before_send(&self, job: &DeliveryJob) -> serde_json::Value {
        job.data.clone()
    }

    /// Called after a delivery attempt completes, successful or not.
    async fn after_send(&self, _job: &DeliveryJob, _result: &AttemptResult) {}
}

/// No-op hooks: passes the payload through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

#[async_trait]
impl WebhookHooks for NoopHooks {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domain::models::DispatchOptions;

    #[tokio::test]
    async fn test_noop_before_send_passes_data_through() {
        let hooks = NoopHooks;
        let job = DeliveryJob::first_attempt(
            1,
            "content.created",
            serde_json::json!({"id": 42}),
            DispatchOptions::default(),
            Utc::now(),
        );
        let data = hooks.before_send(&job).await;
        assert_eq!(data, serde_json::json!({"id": 42}));
    }

    #[tokio::test]
    async fn test_noop_after_send_does_not_panic() {
        let hooks = NoopHooks;
        let job = DeliveryJob::first_attempt(1, "content.created", serde_json::json!({}), DispatchOptions::default(), Utc::now());
        let result = AttemptResult {
            success: true,
            status_code: Some(200),
            error: None,
            duration_ms: 10,
            attempt: 1,
            response_body: None,
            completed_at: Utc::now(),
        };
        hooks.after_send(&job, &result).await;
    }
}
