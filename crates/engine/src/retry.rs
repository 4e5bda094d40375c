//! Retry policy engine: pure functions over attempt number, status code, and
//! transport error kind. No I/O, no shared state.

use std::time::Duration;

use domain::models::{RetryPolicyConfig, TransportError, TransportErrorKind};

/// Delays above this are logged as suspicious but never rejected — the
/// contract places no hard cap on `calculate_delay`.
const WARN_THRESHOLD: Duration = Duration::from_secs(3600);

/// Computes the delay before the next attempt: `initial * multiplier^(attempt-1)`.
pub fn calculate_delay(attempt: u32, config: RetryPolicyConfig) -> Duration {
    let exponent = attempt.saturating_sub(1);
    let multiplier = config.backoff_multiplier.powi(exponent as i32);
    let delay_ms = (config.initial_delay_ms as f64) * multiplier;
    let delay = Duration::from_millis(delay_ms.round().max(0.0) as u64);

    if delay > WARN_THRESHOLD {
        tracing::warn!(
            attempt,
            delay_secs = delay.as_secs(),
            "computed retry delay exceeds one hour"
        );
    }

    delay
}

/// Whether a failed attempt should be retried, given its HTTP status and/or
/// transport error. Status code takes precedence when both are present.
pub fn should_retry(status_code: Option<u16>, error: Option<&TransportError>) -> bool {
    if let Some(status) = status_code {
        return status >= 500 || status == 408 || status == 429;
    }
    match error.map(|e| e.kind) {
        Some(TransportErrorKind::Timeout) | Some(TransportErrorKind::SocketHangUp) => true,
        Some(TransportErrorKind::Dns)
        | Some(TransportErrorKind::ConnectionRefused)
        | Some(TransportErrorKind::Tls)
        | Some(TransportErrorKind::Other) => false,
        None => false,
    }
}

/// Whether `attempt` has exhausted the job's retry budget.
pub fn is_final_failure(attempt: u32, max_attempts: u32) -> bool {
    attempt >= max_attempts
}
