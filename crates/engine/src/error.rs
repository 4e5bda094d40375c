//! Typed errors for the delivery pipeline's engine-layer components.

use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the HTTP deliverer.
#[derive(Debug, Error)]
pub enum DelivererError {
    #[error("failed to serialize webhook payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to build outbound request: {0}")]
    RequestBuild(String),
}

/// Errors raised by the priority queue.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue has no processor bound")]
    NoProcessor,

    #[error("job {0} exceeds its max attempts and cannot be scheduled for retry")]
    ExhaustedRetries(Uuid),
}

/// Errors raised by the dispatcher (webhook service façade).
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Registry(#[from] persistence::repositories::RegistryError),

    #[error(transparent)]
    Deliverer(#[from] DelivererError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("webhook {0} not found")]
    WebhookNotFound(i64),

    #[error(transparent)]
    Storage(#[from] sqlx::Error),
}
