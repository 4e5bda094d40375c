//! Domain layer for the Ferriqa webhook delivery pipeline.
//!
//! This crate contains:
//! - Domain models (Webhook, DeliveryJob, WebhookPayload, AttemptResult, DeliveryRecord)
//! - Domain error types

pub mod models;
