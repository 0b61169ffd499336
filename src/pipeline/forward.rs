use crate::app::ports::{HttpClientPort, HttpReply};
use crate::config::ForwardConfig;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of delivering one payload to one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForwardResult {
    pub ok: bool,
    /// 0 when no HTTP response was ever received
    pub status: u16,
    pub response: String,
    pub attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&ForwardConfig::default())
    }
}

impl From<&ForwardConfig> for RetryPolicy {
    fn from(config: &ForwardConfig) -> Self {
        Self {
            timeout: config.timeout(),
            max_retries: config.max_retries,
            base_delay: config.backoff_base(),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt + 1`: base, 2x base, 4x base...
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

enum Attempt {
    Done(HttpReply),
    Retryable(HttpReply),
    TransportError(String),
}

/// Delivers partial updates with bounded retry. Holds no per-request state,
/// so one instance serves all targets and all requests.
pub struct Forwarder {
    client: Arc<dyn HttpClientPort>,
    headers: HeaderMap,
    policy: RetryPolicy,
}

impl Forwarder {
    pub fn new(client: Arc<dyn HttpClientPort>, policy: RetryPolicy) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self {
            client,
            headers,
            policy,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// PATCH `payload` to `url`, retrying transport failures and 5xx only.
    ///
    /// Makes at most `max_retries + 1` attempts and never sleeps after the
    /// last one. Failures come back as `ok: false`, never as an error.
    pub async fn send(&self, url: &str, payload: &Value) -> ForwardResult {
        let attempts = self.policy.max_retries.saturating_add(1);
        let mut last_status = 0;
        let mut last_text = String::new();

        for attempt in 0..attempts {
            let outcome = match self
                .client
                .patch(url, payload, &self.headers, self.policy.timeout)
                .await
            {
                Ok(reply) if (200..300).contains(&reply.status) => Attempt::Done(reply),
                Ok(reply) if (500..600).contains(&reply.status) => Attempt::Retryable(reply),
                Ok(reply) => Attempt::Done(reply),
                Err(e) => Attempt::TransportError(e),
            };

            match outcome {
                Attempt::Done(reply) => {
                    return ForwardResult {
                        ok: (200..300).contains(&reply.status),
                        status: reply.status,
                        response: reply.body,
                        attempts: attempt + 1,
                    };
                }
                Attempt::Retryable(reply) => {
                    debug!(url, status = reply.status, attempt, "server error from target");
                    last_status = reply.status;
                    last_text = reply.body;
                }
                Attempt::TransportError(e) => {
                    debug!(url, error = %e, attempt, "transport error from target");
                    last_text = e;
                }
            }

            if attempt + 1 < attempts {
                tokio::time::sleep(self.policy.backoff(attempt)).await;
            }
        }

        warn!(url, status = last_status, attempts, "giving up on target after retries");
        ForwardResult {
            ok: false,
            status: last_status,
            response: last_text,
            attempts,
        }
    }
}
