//! Repository implementations for database operations.

pub mod webhook;
pub mod webhook_delivery;

pub use webhook::{RegistryError, WebhookRepository};
pub use webhook_delivery::WebhookDeliveryRepository;
