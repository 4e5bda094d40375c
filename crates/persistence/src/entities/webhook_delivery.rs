//! Webhook delivery entity (database row mapping).
//!
//! Maps to the `webhook_deliveries` table: one append-only row per physical
//! HTTP attempt, including each retry.

use chrono::{DateTime, TimeZone, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use domain::models::DeliveryRecord;

/// Database row mapping for the `webhook_deliveries` table.
#[derive(Debug, Clone, FromRow)]
pub struct WebhookDeliveryEntity {
    pub delivery_id: Uuid,
    pub webhook_id: i64,
    pub event: String,
    pub status_code: Option<i32>,
    pub success: bool,
    pub attempt: i32,
    pub response: Option<String>,
    pub duration_ms: i32,
    pub error: Option<String>,
    pub created_at: i64,
    pub completed_at: Option<i64>,
}

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_else(|| Utc.timestamp_opt(0, 0).single().unwrap())
}

impl From<WebhookDeliveryEntity> for DeliveryRecord {
    fn from(entity: WebhookDeliveryEntity) -> Self {
        Self {
            delivery_id: entity.delivery_id,
            webhook_id: entity.webhook_id,
            event: entity.event,
            status_code: entity.status_code,
            success: entity.success,
            attempt: entity.attempt,
            response: entity.response,
            duration_ms: entity.duration_ms,
            error: entity.error,
            created_at: millis_to_datetime(entity.created_at),
            completed_at: entity.completed_at.map(millis_to_datetime),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity() -> WebhookDeliveryEntity {
        WebhookDeliveryEntity {
            delivery_id: Uuid::new_v4(),
            webhook_id: 1,
            event: "content.created".into(),
            status_code: Some(200),
            success: true,
            attempt: 1,
            response: Some("{\"ok\":true}".into()),
            duration_ms: 42,
            error: None,
            created_at: 1_700_000_000_000,
            completed_at: Some(1_700_000_000_500),
        }
    }

    #[test]
    fn test_conversion_preserves_fields() {
        let e = entity();
        let delivery_id = e.delivery_id;
        let record: DeliveryRecord = e.into();
        assert_eq!(record.delivery_id, delivery_id);
        assert!(record.success);
        assert_eq!(record.status_code, Some(200));
        assert_eq!(record.created_at.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(record.completed_at.unwrap().timestamp_millis(), 1_700_000_000_500);
    }

    #[test]
    fn test_missing_completed_at_converts_to_none() {
        let mut e = entity();
        e.completed_at = None;
        let record: DeliveryRecord = e.into();
        assert!(record.completed_at.is_none());
    }
}
