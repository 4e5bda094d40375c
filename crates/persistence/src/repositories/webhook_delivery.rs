//! Delivery history store: append-only log of HTTP delivery attempts.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use domain::models::{AttemptResult, DeliveryRecord, DeliveryRecordPage, DeliveryRecordQuery};
use shared::pagination::{Page, PageRequest};

use crate::entities::WebhookDeliveryEntity;
use crate::metrics::QueryTimer;

/// Repository backing the delivery history store (`webhook_deliveries` rows).
///
/// Rows are never mutated after insert; each HTTP attempt, including every
/// retry, gets exactly one row.
#[derive(Clone)]
pub struct WebhookDeliveryRepository {
    pool: PgPool,
}

impl WebhookDeliveryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Records the outcome of one delivery attempt. `created_at` is the
    /// instant the job was picked up for processing; `result.completed_at`
    /// is the instant the attempt finished — the two are never the same
    /// column value, since an attempt always takes nonzero time.
    pub async fn record(
        &self,
        delivery_id: Uuid,
        webhook_id: i64,
        event: &str,
        created_at: DateTime<Utc>,
        result: &AttemptResult,
    ) -> Result<DeliveryRecord, sqlx::Error> {
        let timer = QueryTimer::new("record_webhook_delivery");
        let status_code = result.status_code.map(|c| c as i32);
        let error = result.error.as_ref().map(|e| e.to_string());
        let entity = sqlx::query_as::<_, WebhookDeliveryEntity>(
            r#"
            INSERT INTO webhook_deliveries
                (delivery_id, webhook_id, event, status_code, success, attempt, response,
                 duration_ms, error, created_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING delivery_id, webhook_id, event, status_code, success, attempt, response,
                      duration_ms, error, created_at, completed_at
            "#,
        )
        .bind(delivery_id)
        .bind(webhook_id)
        .bind(event)
        .bind(status_code)
        .bind(result.success)
        .bind(result.attempt as i32)
        .bind(&result.response_body)
        .bind(result.duration_ms as i32)
        .bind(error)
        .bind(created_at.timestamp_millis())
        .bind(result.completed_at.timestamp_millis())
        .fetch_one(&self.pool)
        .await;
        timer.record();
        Ok(entity?.into())
    }

    /// Paginated delivery history for one webhook, newest first.
    pub async fn get_deliveries(
        &self,
        webhook_id: i64,
        query: DeliveryRecordQuery,
    ) -> Result<DeliveryRecordPage, sqlx::Error> {
        let timer = QueryTimer::new("get_webhook_deliveries");
        let request = PageRequest::new(query.page, query.limit);

        let entities = sqlx::query_as::<_, WebhookDeliveryEntity>(
            r#"
            SELECT delivery_id, webhook_id, event, status_code, success, attempt, response,
                   duration_ms, error, created_at, completed_at
            FROM webhook_deliveries
            WHERE webhook_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(webhook_id)
        .bind(request.limit)
        .bind(request.offset())
        .fetch_all(&self.pool)
        .await;
        let entities = entities?;

        let total: (i64,) = sqlx::query_as(
            r#"SELECT COUNT(*) FROM webhook_deliveries WHERE webhook_id = $1"#,
        )
        .bind(webhook_id)
        .fetch_one(&self.pool)
        .await?;

        timer.record();
        let records: Vec<DeliveryRecord> = entities.into_iter().map(Into::into).collect();
        Ok(Page::new(records, request, total.0))
    }

    /// Lifetime counts of delivered/failed attempts across all webhooks.
    pub async fn totals(&self) -> Result<(i64, i64), sqlx::Error> {
        let timer = QueryTimer::new("webhook_delivery_totals");
        let row: (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE success) AS delivered_total,
                COUNT(*) FILTER (WHERE NOT success) AS failed_total
            FROM webhook_deliveries
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        timer.record();
        Ok(row)
    }
}
