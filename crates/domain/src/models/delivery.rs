//! Delivery-side domain models: jobs, payloads, attempt results, and history records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared::pagination::Page;

/// Default number of attempts (including the first) before a job is abandoned.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
/// Default initial retry delay.
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1_000;
/// Default exponential backoff multiplier.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
/// Default per-request timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
/// Priority assigned to a freshly dispatched job.
pub const DISPATCH_PRIORITY: i32 = 1;
/// Priority assigned to a scheduled retry (lower than a fresh dispatch).
pub const RETRY_PRIORITY: i32 = 0;
/// Response bodies are truncated to this many bytes before being retained.
pub const RESPONSE_TRUNCATE_BYTES: usize = 1024;

/// Retry-affecting parameters, either defaulted or supplied via `dispatch` options.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicyConfig {
    pub initial_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub max_attempts: u32,
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Options a caller may pass to `dispatch` to override retry/timeout defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchOptions {
    pub max_attempts: Option<u32>,
    pub initial_delay_ms: Option<u64>,
    pub backoff_multiplier: Option<f64>,
    pub timeout_ms: Option<u64>,
}

/// One physical HTTP delivery attempt, queued or in flight.
///
/// Every retry is a *new* `DeliveryJob` with a fresh `delivery_id` — the queue
/// never reuses one across attempts (see the unique-`deliveryId`-per-attempt
/// invariant).
#[derive(Debug, Clone)]
pub struct DeliveryJob {
    pub delivery_id: Uuid,
    pub webhook_id: i64,
    pub event: String,
    pub data: serde_json::Value,
    pub attempt: u32,
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub timeout_ms: u64,
    pub priority: i32,
    pub scheduled_for: DateTime<Utc>,
}

impl DeliveryJob {
    /// Builds the first-attempt job for a freshly dispatched event.
    pub fn first_attempt(
        webhook_id: i64,
        event: impl Into<String>,
        data: serde_json::Value,
        options: DispatchOptions,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            delivery_id: Uuid::new_v4(),
            webhook_id,
            event: event.into(),
            data,
            attempt: 1,
            max_attempts: options.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            initial_delay_ms: options.initial_delay_ms.unwrap_or(DEFAULT_INITIAL_DELAY_MS),
            backoff_multiplier: options.backoff_multiplier.unwrap_or(DEFAULT_BACKOFF_MULTIPLIER),
            timeout_ms: options.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
            priority: DISPATCH_PRIORITY,
            scheduled_for: now,
        }
    }

    /// Builds the retry job clone: new deliveryId, incremented attempt, lower
    /// priority, scheduled `delay` in the future.
    pub fn retry(&self, delay: chrono::Duration, now: DateTime<Utc>) -> Self {
        Self {
            delivery_id: Uuid::new_v4(),
            webhook_id: self.webhook_id,
            event: self.event.clone(),
            data: self.data.clone(),
            attempt: self.attempt + 1,
            max_attempts: self.max_attempts,
            initial_delay_ms: self.initial_delay_ms,
            backoff_multiplier: self.backoff_multiplier,
            timeout_ms: self.timeout_ms,
            priority: RETRY_PRIORITY,
            scheduled_for: now + delay,
        }
    }

    pub fn retry_config(&self) -> RetryPolicyConfig {
        RetryPolicyConfig {
            initial_delay_ms: self.initial_delay_ms,
            backoff_multiplier: self.backoff_multiplier,
            max_attempts: self.max_attempts,
        }
    }
}

/// The exact JSON shape sent to (and signed for) a subscriber.
///
/// Field order is the wire order: `event`, `timestamp`, `deliveryId`, `data`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub event: String,
    pub timestamp: i64,
    pub delivery_id: Uuid,
    pub data: serde_json::Value,
}

impl WebhookPayload {
    pub fn new(event: impl Into<String>, delivery_id: Uuid, data: serde_json::Value, now: DateTime<Utc>) -> Self {
        Self {
            event: event.into(),
            timestamp: now.timestamp_millis(),
            delivery_id,
            data,
        }
    }
}

/// Classification of a failed HTTP attempt's transport-layer cause.
///
/// These variants map 1:1 onto the error classes the retry policy contract is
/// specified against (timeouts, dropped connections, DNS failures, refused
/// connections, and TLS/certificate errors).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportErrorKind {
    Timeout,
    SocketHangUp,
    Dns,
    ConnectionRefused,
    Tls,
    Other,
}

/// A transport-layer (non-HTTP-status) delivery failure.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{kind:?}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

/// The outcome of a single HTTP delivery attempt.
#[derive(Debug, Clone)]
pub struct AttemptResult {
    pub success: bool,
    pub status_code: Option<u16>,
    pub error: Option<TransportError>,
    pub duration_ms: u64,
    pub attempt: u32,
    pub response_body: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl AttemptResult {
    /// Truncates `body` to `RESPONSE_TRUNCATE_BYTES` on a UTF-8 boundary.
    pub fn truncate_body(body: &str) -> String {
        if body.len() <= RESPONSE_TRUNCATE_BYTES {
            return body.to_string();
        }
        let mut end = RESPONSE_TRUNCATE_BYTES;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body[..end].to_string()
    }
}

/// An append-only audit row for one delivery attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryRecord {
    pub delivery_id: Uuid,
    pub webhook_id: i64,
    pub event: String,
    pub status_code: Option<i32>,
    pub success: bool,
    pub attempt: i32,
    pub response: Option<String>,
    pub duration_ms: i32,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Query parameters for listing delivery history for a webhook.
#[derive(Debug, Clone, Default)]
pub struct DeliveryRecordQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub type DeliveryRecordPage = Page<DeliveryRecord>;

/// Aggregate delivery counters, as surfaced by `Dispatcher::stats`.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DeliveryStats {
    pub pending: usize,
    pub processing: usize,
    pub delivered_total: i64,
    pub failed_total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).single().unwrap()
    }

    #[test]
    fn test_first_attempt_defaults() {
        let job = DeliveryJob::first_attempt(7, "content.created", serde_json::json!({"id": 1}), DispatchOptions::default(), now());
        assert_eq!(job.attempt, 1);
        assert_eq!(job.priority, DISPATCH_PRIORITY);
        assert_eq!(job.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(job.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(job.scheduled_for, now());
    }

    #[test]
    fn test_retry_job_has_new_delivery_id_and_lower_priority() {
        let job = DeliveryJob::first_attempt(7, "content.created", serde_json::json!({}), DispatchOptions::default(), now());
        let retry = job.retry(chrono::Duration::milliseconds(1000), now());
        assert_ne!(retry.delivery_id, job.delivery_id);
        assert_eq!(retry.attempt, 2);
        assert_eq!(retry.priority, RETRY_PRIORITY);
        assert_eq!(retry.scheduled_for, now() + chrono::Duration::milliseconds(1000));
    }

    #[test]
    fn test_multiple_retries_all_have_distinct_delivery_ids() {
        let job = DeliveryJob::first_attempt(7, "content.created", serde_json::json!({}), DispatchOptions::default(), now());
        let r1 = job.retry(chrono::Duration::milliseconds(1000), now());
        let r2 = r1.retry(chrono::Duration::milliseconds(2000), now());
        let ids = [job.delivery_id, r1.delivery_id, r2.delivery_id];
        assert_ne!(ids[0], ids[1]);
        assert_ne!(ids[1], ids[2]);
        assert_ne!(ids[0], ids[2]);
    }

    #[test]
    fn test_payload_field_order_is_event_timestamp_delivery_id_data() {
        let id = Uuid::new_v4();
        let payload = WebhookPayload::new("content.created", id, serde_json::json!({"a": 1}), now());
        let json = serde_json::to_string(&payload).unwrap();
        let ev = json.find("\"event\"").unwrap();
        let ts = json.find("\"timestamp\"").unwrap();
        let did = json.find("\"deliveryId\"").unwrap();
        let data = json.find("\"data\"").unwrap();
        assert!(ev < ts && ts < did && did < data);
    }

    #[test]
    fn test_truncate_body_short_is_unchanged() {
        assert_eq!(AttemptResult::truncate_body("hello"), "hello");
    }

    #[test]
    fn test_truncate_body_long_is_truncated_to_limit() {
        let body = "a".repeat(2000);
        let truncated = AttemptResult::truncate_body(&body);
        assert_eq!(truncated.len(), RESPONSE_TRUNCATE_BYTES);
    }

    #[test]
    fn test_truncate_body_respects_utf8_boundary() {
        // "é" is 2 bytes in UTF-8; place one right at the truncation boundary.
        let mut body = "a".repeat(RESPONSE_TRUNCATE_BYTES - 1);
        body.push('é');
        body.push_str(&"b".repeat(100));
        let truncated = AttemptResult::truncate_body(&body);
        assert!(truncated.len() <= RESPONSE_TRUNCATE_BYTES);
        assert!(String::from_utf8(truncated.into_bytes()).is_ok());
    }
}
