//! Webhook entity (database row mapping).

use chrono::{DateTime, TimeZone, Utc};
use sqlx::FromRow;
use std::collections::HashMap;

use domain::models::Webhook;

/// Database row mapping for the `webhooks` table.
///
/// `events` and `headers` are stored as JSONB; `created_at` is milliseconds
/// since epoch, matching the rest of this schema's integer-typed timestamps.
#[derive(Debug, Clone, FromRow)]
pub struct WebhookEntity {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub events: serde_json::Value,
    pub headers: Option<serde_json::Value>,
    pub secret: Option<String>,
    pub is_active: bool,
    pub created_at: i64,
}

/// Parses `events` into a string list, tolerating corrupt storage.
///
/// A broken or wrongly-shaped `events` column must not block dispatch for
/// every other webhook, so this logs and degrades to an empty list rather
/// than propagating an error.
fn parse_events(webhook_id: i64, value: &serde_json::Value) -> Vec<String> {
    match value {
        serde_json::Value::Array(items) => {
            let mut events = Vec::with_capacity(items.len());
            let mut had_non_string = false;
            for item in items {
                match item.as_str() {
                    Some(s) => events.push(s.to_string()),
                    None => had_non_string = true,
                }
            }
            if had_non_string {
                tracing::warn!(webhook_id, "webhook events array contained a non-string entry; dropping it");
            }
            events
        }
        serde_json::Value::Null => Vec::new(),
        other => {
            tracing::warn!(webhook_id, kind = %other, "webhook events column is not a JSON array; treating as empty");
            Vec::new()
        }
    }
}

/// Parses `headers` into a string map, tolerating corrupt storage.
fn parse_headers(webhook_id: i64, value: Option<&serde_json::Value>) -> Option<HashMap<String, String>> {
    match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::Object(map)) => {
            let mut headers = HashMap::with_capacity(map.len());
            let mut had_non_string = false;
            for (k, v) in map {
                match v.as_str() {
                    Some(s) => {
                        headers.insert(k.clone(), s.to_string());
                    }
                    None => had_non_string = true,
                }
            }
            if had_non_string {
                tracing::warn!(webhook_id, "webhook headers object contained a non-string value; dropping it");
            }
            Some(headers)
        }
        Some(other) => {
            tracing::warn!(webhook_id, kind = %other, "webhook headers column is not a JSON object; treating as empty");
            None
        }
    }
}

fn parse_created_at(webhook_id: i64, millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_else(|| {
        tracing::warn!(webhook_id, millis, "webhook created_at is out of range; defaulting to epoch");
        Webhook::default_created_at()
    })
}

impl From<WebhookEntity> for Webhook {
    fn from(entity: WebhookEntity) -> Self {
        let events = parse_events(entity.id, &entity.events);
        let headers = parse_headers(entity.id, entity.headers.as_ref());
        let created_at = parse_created_at(entity.id, entity.created_at);
        Self {
            id: entity.id,
            name: entity.name,
            url: entity.url,
            events,
            headers,
            secret: entity.secret,
            is_active: entity.is_active,
            created_at,
        }
    }
}
