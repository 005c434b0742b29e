//! Callback delivery.

use std::time::Duration;

use reqwest::Client;
use tokio::time::sleep;

use crate::models::callback::CallbackPayload;
use crate::models::task::DeliveryRecord;

const MAX_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Callback request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Callback answered with status {0}")]
    Status(reqwest::StatusCode),
}

/// Bounded exponential backoff for callback delivery.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Only one attempt, no backoff.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before attempt `attempt + 1`, given `attempt` failures so far.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

/// Posts results to caller-supplied callback URLs.
#[derive(Debug, Clone)]
pub struct CallbackClient {
    http: Client,
}

impl CallbackClient {
    pub fn new(timeout: Duration) -> Result<Self, DeliveryError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    /// One POST of the JSON payload. Non-2xx answers are errors.
    pub async fn post(&self, url: &str, payload: &CallbackPayload) -> Result<(), DeliveryError> {
        let response = self.http.post(url).json(payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Status(status));
        }
        Ok(())
    }

    /// Single delivery attempt; failures are logged and reported as `false`.
    pub async fn deliver(&self, url: &str, payload: &CallbackPayload) -> bool {
        match self.post(url, payload).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(callback_url = %url, error = %e, "Callback delivery failed");
                false
            }
        }
    }

    /// Deliver with bounded retries, returning what happened.
    pub async fn deliver_with_retry(
        &self,
        url: &str,
        payload: &CallbackPayload,
        policy: &RetryPolicy,
    ) -> DeliveryRecord {
        let mut record = DeliveryRecord::default();
        let max_attempts = policy.max_attempts.max(1);

        while record.attempts < max_attempts {
            if record.attempts > 0 {
                sleep(policy.backoff(record.attempts)).await;
            }
            record.attempts += 1;

            match self.post(url, payload).await {
                Ok(()) => {
                    record.delivered = true;
                    record.last_error = None;
                    metrics::counter!("callback_deliveries_total", "outcome" => "delivered")
                        .increment(1);
                    return record;
                }
                Err(e) => {
                    tracing::warn!(
                        callback_url = %url,
                        attempt = record.attempts,
                        max_attempts,
                        error = %e,
                        "Callback delivery attempt failed"
                    );
                    record.last_error = Some(e.to_string());
                }
            }
        }

        metrics::counter!("callback_deliveries_total", "outcome" => "failed").increment(1);
        record
    }
}
