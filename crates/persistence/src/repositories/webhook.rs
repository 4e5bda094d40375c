//! Subscription registry: CRUD and queries over webhook endpoints.

use chrono::Utc;
use sqlx::PgPool;
use thiserror::Error;
use validator::Validate;

use domain::models::{CreateWebhookRequest, ListWebhooksQuery, UpdateWebhookRequest, Webhook, WebhookPage};
use shared::pagination::{Page, PageRequest};

use crate::entities::WebhookEntity;
use crate::metrics::QueryTimer;

/// Errors raised by [`WebhookRepository`] operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("webhook {0} not found")]
    NotFound(i64),
    #[error("invalid webhook request: {0}")]
    Validation(#[from] validator::ValidationErrors),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Repository backing the subscription registry (CRUD over `webhooks` rows).
#[derive(Clone)]
pub struct WebhookRepository {
    pool: PgPool,
}

impl WebhookRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a new webhook and returns the stored row, including the
    /// storage-assigned id and created_at (not the caller's clock).
    pub async fn create(&self, input: CreateWebhookRequest) -> Result<Webhook, RegistryError> {
        input.validate()?;

        let timer = QueryTimer::new("create_webhook");
        let events = serde_json::to_value(&input.events).expect("string vec always serializes");
        let headers = input
            .headers
            .as_ref()
            .map(|h| serde_json::to_value(h).expect("string map always serializes"));
        let result = sqlx::query_as::<_, WebhookEntity>(
            r#"
            INSERT INTO webhooks (name, url, events, headers, secret, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, name, url, events, headers, secret, is_active, created_at
            "#,
        )
        .bind(&input.name)
        .bind(&input.url)
        .bind(events)
        .bind(headers)
        .bind(&input.secret)
        .bind(input.is_active)
        .bind(Utc::now().timestamp_millis())
        .fetch_one(&self.pool)
        .await;
        timer.record();
        Ok(result?.into())
    }

    /// Finds a webhook by id.
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Webhook>, RegistryError> {
        let timer = QueryTimer::new("find_webhook_by_id");
        let result = sqlx::query_as::<_, WebhookEntity>(
            r#"SELECT id, name, url, events, headers, secret, is_active, created_at FROM webhooks WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    /// Applies a partial update. An empty patch returns the current row
    /// unchanged rather than issuing a write.
    pub async fn update(&self, id: i64, patch: UpdateWebhookRequest) -> Result<Webhook, RegistryError> {
        patch.validate()?;

        if patch.is_empty() {
            return self.find_by_id(id).await?.ok_or(RegistryError::NotFound(id));
        }

        let timer = QueryTimer::new("update_webhook");
        let events = patch
            .events
            .as_ref()
            .map(|e| serde_json::to_value(e).expect("string vec always serializes"));
        let headers = patch
            .headers
            .as_ref()
            .map(|h| serde_json::to_value(h).expect("string map always serializes"));
        let result = sqlx::query_as::<_, WebhookEntity>(
            r#"
            UPDATE webhooks SET
                name = COALESCE($2, name),
                url = COALESCE($3, url),
                events = COALESCE($4, events),
                headers = COALESCE($5, headers),
                secret = COALESCE($6, secret),
                is_active = COALESCE($7, is_active)
            WHERE id = $1
            RETURNING id, name, url, events, headers, secret, is_active, created_at
            "#,
        )
        .bind(id)
        .bind(&patch.name)
        .bind(&patch.url)
        .bind(events)
        .bind(headers)
        .bind(&patch.secret)
        .bind(patch.is_active)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result?.map(Into::into).ok_or(RegistryError::NotFound(id))
    }

    /// Deletes a webhook. Idempotent: deleting an absent id is not an error.
    pub async fn delete(&self, id: i64) -> Result<(), RegistryError> {
        let timer = QueryTimer::new("delete_webhook");
        sqlx::query(r#"DELETE FROM webhooks WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;
        timer.record();
        Ok(())
    }

    /// Paginated listing, newest first, optionally filtered by subscribed
    /// event (exact match via JSONB containment) and active flag.
    pub async fn query(&self, params: ListWebhooksQuery) -> Result<WebhookPage, RegistryError> {
        let timer = QueryTimer::new("query_webhooks");
        let request = PageRequest::new(params.page, params.limit);
        let event_filter: Option<serde_json::Value> = params.event.as_ref().map(|e| serde_json::json!([e]));

        let entities = sqlx::query_as::<_, WebhookEntity>(
            r#"
            SELECT id, name, url, events, headers, secret, is_active, created_at
            FROM webhooks
            WHERE ($1::jsonb IS NULL OR events @> $1)
              AND ($2::boolean IS NULL OR is_active = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(&event_filter)
        .bind(params.is_active)
        .bind(request.limit)
        .bind(request.offset())
        .fetch_all(&self.pool)
        .await;

        let entities = entities?;

        let total: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM webhooks
            WHERE ($1::jsonb IS NULL OR events @> $1)
              AND ($2::boolean IS NULL OR is_active = $2)
            "#,
        )
        .bind(&event_filter)
        .bind(params.is_active)
        .fetch_one(&self.pool)
        .await?;

        timer.record();
        let webhooks: Vec<Webhook> = entities.into_iter().map(Into::into).collect();
        Ok(Page::new(webhooks, request, total.0))
    }

    /// Active webhooks subscribed to `event`, via a JSONB containment query.
    pub async fn find_active_for_event(&self, event: &str) -> Result<Vec<Webhook>, RegistryError> {
        let timer = QueryTimer::new("find_active_webhooks_for_event");
        let needle = serde_json::json!([event]);
        let result = sqlx::query_as::<_, WebhookEntity>(
            r#"
            SELECT id, name, url, events, headers, secret, is_active, created_at
            FROM webhooks
            WHERE is_active = true AND events @> $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(needle)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        Ok(result?.into_iter().map(Into::into).collect())
    }
}
