use anyhow::{Context, Result};
use rand::Rng;
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Retry schedule: 3 retries with exponential backoff from 1s, plus jitter.
const RETRY_BASE_DELAY_SECS: u64 = 1;
const MAX_RETRIES: usize = 3;
const RETRY_JITTER_DIVISOR: u128 = 4; // + up to 25% jitter

/// Upper bound on a server-provided Retry-After hint.
const MAX_RETRY_AFTER_SECS: u64 = 60;

/// Whether a request may safely reach the server more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum RetryPolicy {
    /// Reads, deletes and stateless completions: retry any transient failure.
    Idempotent,
    /// Calls that create a resource or advance a run. Only retried when the
    /// server provably did not act on the first attempt.
    NonIdempotent,
}

/// How an attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    Status(StatusCode),
    /// The connection was never established.
    Connect,
    /// The request may have been delivered, but no response arrived in time.
    Timeout,
    Other,
}

impl Failure {
    fn from_send_error(err: &reqwest::Error) -> Self {
        if err.is_connect() {
            Failure::Connect
        } else if err.is_timeout() {
            Failure::Timeout
        } else {
            Failure::Other
        }
    }
}

fn is_retriable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn may_retry(policy: RetryPolicy, failure: Failure) -> bool {
    match (policy, failure) {
        (_, Failure::Connect) => true,
        (_, Failure::Other) => false,
        (RetryPolicy::Idempotent, Failure::Timeout) => true,
        (RetryPolicy::Idempotent, Failure::Status(status)) => is_retriable_status(status),
        // A 429 is rejected before any processing. A timeout or a 5xx may
        // follow a create that already happened.
        (RetryPolicy::NonIdempotent, Failure::Status(status)) => {
            status == StatusCode::TOO_MANY_REQUESTS
        }
        (RetryPolicy::NonIdempotent, Failure::Timeout) => false,
    }
}

fn retry_base_delay(attempt: usize) -> Duration {
    let multiplier = 1u64.checked_shl(attempt as u32).unwrap_or(u64::MAX);
    Duration::from_secs(RETRY_BASE_DELAY_SECS.saturating_mul(multiplier))
}

fn add_jitter(delay: Duration) -> Duration {
    let max_jitter_ms = delay.as_millis() / RETRY_JITTER_DIVISOR;
    if max_jitter_ms == 0 {
        return delay;
    }

    let max_jitter_ms = std::cmp::min(max_jitter_ms, u128::from(u64::MAX)) as u64;
    let jitter_ms = rand::thread_rng().gen_range(0..=max_jitter_ms);
    delay + Duration::from_millis(jitter_ms)
}

/// Parse a Retry-After header given in whole seconds.
fn retry_after_hint(response: &reqwest::Response) -> Option<Duration> {
    let secs = response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()?;
    Some(Duration::from_secs(secs.min(MAX_RETRY_AFTER_SECS)))
}

/// Send a request, retrying transient failures.
///
/// `make_request` is called once per attempt because request builders (and
/// multipart bodies in particular) cannot be cloned. A non-retriable error
/// status is returned as a response for the caller to inspect. `policy`
/// decides which failures are retried.
pub(super) async fn send_with_retry(
    policy: RetryPolicy,
    mut make_request: impl FnMut() -> reqwest::RequestBuilder,
) -> Result<reqwest::Response> {
    let max_attempts = MAX_RETRIES + 1;

    for attempt in 0..max_attempts {
        match make_request().send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }

                let should_retry =
                    may_retry(policy, Failure::Status(status)) && attempt < MAX_RETRIES;
                if should_retry {
                    let base_delay = retry_after_hint(&response)
                        .unwrap_or_else(|| retry_base_delay(attempt));
                    let delay = add_jitter(base_delay);
                    debug!(
                        "HTTP request failed with status {}; retrying in {:?} (base {:?}, attempt {}/{})",
                        status,
                        delay,
                        base_delay,
                        attempt + 1,
                        max_attempts
                    );
                    let _ = response.bytes().await;
                    sleep(delay).await;
                    continue;
                }

                return Ok(response);
            }
            Err(err) => {
                let should_retry =
                    may_retry(policy, Failure::from_send_error(&err)) && attempt < MAX_RETRIES;
                if should_retry {
                    let base_delay = retry_base_delay(attempt);
                    let delay = add_jitter(base_delay);
                    debug!(
                        "HTTP request error: {}; retrying in {:?} (base {:?}, attempt {}/{})",
                        err,
                        delay,
                        base_delay,
                        attempt + 1,
                        max_attempts
                    );
                    sleep(delay).await;
                    continue;
                }

                return Err(anyhow::Error::new(err)).with_context(|| {
                    format!("HTTP request failed after {} attempt(s)", attempt + 1)
                });
            }
        }
    }

    unreachable!("send_with_retry should have returned within max_attempts")
}
