//! Webhook subscription domain model.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;
use validator::{Validate, ValidationError};

use shared::pagination::Page;

/// A configured outbound webhook endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Webhook {
    pub id: i64,
    pub name: String,
    pub url: String,
    /// Event names this endpoint is subscribed to. Non-empty by invariant.
    pub events: Vec<String>,
    /// Custom headers merged into every outbound request, overriding defaults.
    pub headers: Option<HashMap<String, String>>,
    /// Shared secret used to HMAC-sign outbound payloads; absent means unsigned.
    pub secret: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Webhook {
    /// True if this webhook is active and subscribed to `event` (exact, case-sensitive match).
    pub fn subscribes_to(&self, event: &str) -> bool {
        self.is_active && self.events.iter().any(|e| e == event)
    }

    /// A missing/null creation timestamp defaults to the Unix epoch rather than erroring.
    /// Deliberate boundary-degradation: webhooks are external-facing configuration and a
    /// corrupt timestamp must not block dispatch.
    pub fn default_created_at() -> DateTime<Utc> {
        Utc.timestamp_opt(0, 0).single().expect("epoch is a valid instant")
    }
}

fn default_true() -> bool {
    true
}

fn validate_absolute_url(url: &str) -> Result<(), ValidationError> {
    match Url::parse(url) {
        Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => Ok(()),
        Ok(_) => {
            let mut err = ValidationError::new("url_scheme");
            err.message = Some("URL must use the http or https scheme".into());
            Err(err)
        }
        Err(_) => {
            let mut err = ValidationError::new("url_format");
            err.message = Some("URL must be a parseable absolute URL".into());
            Err(err)
        }
    }
}

fn validate_non_empty_events(events: &[String]) -> Result<(), ValidationError> {
    if events.is_empty() {
        let mut err = ValidationError::new("events_required");
        err.message = Some("events must not be empty".into());
        return Err(err);
    }
    Ok(())
}

/// Request payload for registering a new webhook.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateWebhookRequest {
    #[validate(length(min = 1, max = 200, message = "name must be 1-200 characters"))]
    pub name: String,

    #[validate(custom(function = "validate_absolute_url"))]
    pub url: String,

    #[validate(custom(function = "validate_non_empty_events"))]
    pub events: Vec<String>,

    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,

    #[serde(default)]
    pub secret: Option<String>,

    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Partial-update payload for an existing webhook. Only `Some` fields change.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWebhookRequest {
    #[validate(length(min = 1, max = 200, message = "name must be 1-200 characters"))]
    pub name: Option<String>,

    #[validate(custom(function = "validate_absolute_url_opt"))]
    pub url: Option<String>,

    #[validate(custom(function = "validate_non_empty_events_opt"))]
    pub events: Option<Vec<String>>,

    pub headers: Option<HashMap<String, String>>,
    pub secret: Option<String>,
    pub is_active: Option<bool>,
}

fn validate_absolute_url_opt(url: &Option<String>) -> Result<(), ValidationError> {
    match url {
        Some(u) => validate_absolute_url(u),
        None => Ok(()),
    }
}

fn validate_non_empty_events_opt(events: &Option<Vec<String>>) -> Result<(), ValidationError> {
    match events {
        Some(e) => validate_non_empty_events(e),
        None => Ok(()),
    }
}

impl UpdateWebhookRequest {
    /// True if this patch touches no fields at all (a true "no-op" update).
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.url.is_none()
            && self.events.is_none()
            && self.headers.is_none()
            && self.secret.is_none()
            && self.is_active.is_none()
    }
}

/// Query parameters for `SubscriptionRegistry::query`.
#[derive(Debug, Clone, Default)]
pub struct ListWebhooksQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub event: Option<String>,
    pub is_active: Option<bool>,
}

/// A page of webhooks.
pub type WebhookPage = Page<Webhook>;

#[cfg(test)]
mod tests {
    use super::*;

    fn webhook(events: Vec<&str>, is_active: bool) -> Webhook {
        Webhook {
            id: 1,
            name: "Test".into(),
            url: "https://example.com/hook".into(),
            events: events.into_iter().map(String::from).collect(),
            headers: None,
            secret: None,
            is_active,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_subscribes_to_exact_match() {
        let w = webhook(vec!["content.created"], true);
        assert!(w.subscribes_to("content.created"));
        assert!(!w.subscribes_to("content.updated"));
    }

    #[test]
    fn test_subscribes_to_case_sensitive() {
        let w = webhook(vec!["content.created"], true);
        assert!(!w.subscribes_to("Content.Created"));
    }

    #[test]
    fn test_subscribes_to_inactive_never_matches() {
        let w = webhook(vec!["content.created"], false);
        assert!(!w.subscribes_to("content.created"));
    }

    #[test]
    fn test_default_created_at_is_epoch() {
        assert_eq!(Webhook::default_created_at().timestamp(), 0);
    }

    #[test]
    fn test_create_webhook_request_validates_https_url() {
        let req = CreateWebhookRequest {
            name: "Hook".into(),
            url: "https://example.com/hook".into(),
            events: vec!["content.created".into()],
            headers: None,
            secret: None,
            is_active: true,
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_create_webhook_request_rejects_bad_url() {
        let req = CreateWebhookRequest {
            name: "Hook".into(),
            url: "not-a-url".into(),
            events: vec!["content.created".into()],
            headers: None,
            secret: None,
            is_active: true,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_create_webhook_request_rejects_empty_events() {
        let req = CreateWebhookRequest {
            name: "Hook".into(),
            url: "https://example.com/hook".into(),
            events: vec![],
            headers: None,
            secret: None,
            is_active: true,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_create_webhook_request_rejects_ftp_scheme() {
        let req = CreateWebhookRequest {
            name: "Hook".into(),
            url: "ftp://example.com/hook".into(),
            events: vec!["content.created".into()],
            headers: None,
            secret: None,
            is_active: true,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_update_webhook_request_empty_patch_is_noop() {
        let patch = UpdateWebhookRequest::default();
        assert!(patch.is_empty());
    }

    #[test]
    fn test_update_webhook_request_partial_patch_not_empty() {
        let patch = UpdateWebhookRequest {
            name: Some("Renamed".into()),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn test_webhook_serialization_round_trip() {
        let w = webhook(vec!["content.created"], true);
        let json = serde_json::to_string(&w).unwrap();
        let back: Webhook = serde_json::from_str(&json).unwrap();
        assert_eq!(back, w);
    }
}
