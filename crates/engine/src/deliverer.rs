//! HTTP deliverer: performs a single signed HTTP POST with timeout control.
//!
//! Pure I/O; this component has no notion of scheduling or retries.

use std::time::{Duration, Instant};

use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, USER_AGENT};

use domain::models::{AttemptResult, DeliveryJob, TransportError, TransportErrorKind, WebhookPayload};
use domain::models::Webhook;

use crate::error::DelivererError;

const USER_AGENT_VALUE: &str = "Ferriqa-Webhook/1.0";

/// Sends a single signed webhook HTTP POST and reports its outcome.
#[derive(Clone)]
pub struct HttpDeliverer {
    client: reqwest::Client,
}

impl HttpDeliverer {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .build()
            .expect("reqwest client with default TLS config always builds");
        Self { client }
    }

    /// Serialises `job`'s payload once, signs it if the webhook has a
    /// secret, sends it, and returns the resulting [`AttemptResult`].
    pub async fn deliver(&self, webhook: &Webhook, job: &DeliveryJob) -> Result<AttemptResult, DelivererError> {
        let now = Utc::now();
        let payload = WebhookPayload::new(job.event.clone(), job.delivery_id, job.data.clone(), now);
        let body = serde_json::to_vec(&payload)?;

        let headers = self.build_headers(webhook, &job.delivery_id.to_string(), &job.event, payload.timestamp, &body)?;

        let timeout = Duration::from_millis(job.timeout_ms);
        let start = Instant::now();
        let response = self
            .client
            .post(&webhook.url)
            .headers(headers)
            .body(body)
            .timeout(timeout)
            .send()
            .await;
        let duration_ms = start.elapsed().as_millis() as u64;

        Ok(match response {
            Ok(resp) => {
                let status = resp.status().as_u16();
                let success = (200..300).contains(&status);
                let body_text = resp.text().await.unwrap_or_default();
                let truncated = AttemptResult::truncate_body(&body_text);
                AttemptResult {
                    success,
                    status_code: Some(status),
                    error: None,
                    duration_ms,
                    attempt: job.attempt,
                    response_body: Some(truncated),
                    completed_at: Utc::now(),
                }
            }
            Err(err) => AttemptResult {
                success: false,
                status_code: None,
                error: Some(TransportError::new(classify(&err), err.to_string())),
                duration_ms,
                attempt: job.attempt,
                response_body: None,
                completed_at: Utc::now(),
            },
        })
    }

    fn build_headers(
        &self,
        webhook: &Webhook,
        delivery_id: &str,
        event: &str,
        timestamp_ms: i64,
        body: &[u8],
    ) -> Result<HeaderMap, DelivererError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-webhook-delivery-id",
            HeaderValue::from_str(delivery_id).map_err(|e| DelivererError::RequestBuild(e.to_string()))?,
        );
        headers.insert(
            "x-webhook-event",
            HeaderValue::from_str(event).map_err(|e| DelivererError::RequestBuild(e.to_string()))?,
        );
        headers.insert(
            "x-webhook-timestamp",
            HeaderValue::from_str(&timestamp_ms.to_string()).expect("integer string is always a valid header value"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        if let Some(custom) = &webhook.headers {
            for (name, value) in custom {
                let header_name = HeaderName::from_bytes(name.as_bytes())
                    .map_err(|e| DelivererError::RequestBuild(e.to_string()))?;
                let header_value =
                    HeaderValue::from_str(value).map_err(|e| DelivererError::RequestBuild(e.to_string()))?;
                headers.insert(header_name, header_value);
            }
        }

        if let Some(secret) = &webhook.secret {
            let signature = shared::crypto::hmac_sha256_hex(secret, body);
            headers.insert(
                "x-webhook-signature",
                HeaderValue::from_str(&format!("sha256={signature}"))
                    .expect("hex-encoded signature is always a valid header value"),
            );
        }

        Ok(headers)
    }
}

impl Default for HttpDeliverer {
    fn default() -> Self {
        Self::new()
    }
}

/// Classifies a `reqwest::Error` into the transport-error taxonomy the retry
/// policy is specified against.
fn classify(err: &reqwest::Error) -> TransportErrorKind {
    if err.is_timeout() {
        return TransportErrorKind::Timeout;
    }

    let message = err.to_string().to_lowercase();
    if err.is_connect() {
        if message.contains("dns") || message.contains("lookup") {
            return TransportErrorKind::Dns;
        }
        if message.contains("certificate") || message.contains("tls") || message.contains("ssl") {
            return TransportErrorKind::Tls;
        }
        if message.contains("refused") {
            return TransportErrorKind::ConnectionRefused;
        }
        return TransportErrorKind::Other;
    }

    if message.contains("connection reset") || message.contains("hang up") || message.contains("broken pipe") {
        return TransportErrorKind::SocketHangUp;
    }

    TransportErrorKind::Other
}
