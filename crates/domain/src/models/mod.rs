//! Domain models for the webhook delivery pipeline.

pub mod delivery;
pub mod webhook;

pub use delivery::{
    AttemptResult, DeliveryJob, DeliveryRecord, DeliveryRecordPage, DeliveryRecordQuery,
    DeliveryStats, DispatchOptions, RetryPolicyConfig, TransportError, TransportErrorKind,
    WebhookPayload, DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_INITIAL_DELAY_MS, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_TIMEOUT_MS, DISPATCH_PRIORITY, RESPONSE_TRUNCATE_BYTES, RETRY_PRIORITY,
};
pub use webhook::{
    CreateWebhookRequest, ListWebhooksQuery, UpdateWebhookRequest, Webhook, WebhookPage,
};
