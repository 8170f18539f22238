use crate::config::MailConfig;
use crate::core::compose::MailPayload;
use crate::core::retry::{Attempt, RetryError, RetryPolicy};
use crate::domain::model::SendResult;
use crate::domain::ports::Mailer;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// SendGrid-backed delivery client. Success is a 202 with the message id in
/// the `X-Message-Id` response header.
pub struct SendGridMailer {
    client: Client,
    config: MailConfig,
    retry: RetryPolicy,
    test_mode: bool,
}

impl SendGridMailer {
    pub fn new(client: Client, config: MailConfig, test_mode: bool) -> Self {
        Self {
            client,
            config,
            retry: RetryPolicy::standard(),
            test_mode,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn retry_after_hint(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get("Retry-After")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn message_id(response: &reqwest::Response) -> Option<String> {
    let headers = response.headers();
    headers
        .get("X-Message-Id")
        .or_else(|| headers.get("X-Message-ID"))
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

#[async_trait]
impl Mailer for SendGridMailer {
    async fn send(&self, payload: &MailPayload) -> SendResult {
        if self.test_mode {
            tracing::info!("[TEST] Simulated provider dispatch; no network call made.");
            return SendResult::sent(202, Some("TEST-MSG-ID".to_string()));
        }

        if self.config.api_key.is_empty() {
            tracing::error!("Delivery provider API key is not configured.");
            return SendResult::failed(None, "missing_api_key");
        }

        let outcome = self
            .retry
            .run(|attempt| async move {
                let result = self
                    .client
                    .post(&self.config.endpoint)
                    .bearer_auth(&self.config.api_key)
                    .json(payload)
                    .timeout(REQUEST_TIMEOUT)
                    .send()
                    .await;

                let response = match result {
                    Ok(response) => response,
                    Err(err) if err.is_timeout() || err.is_connect() => {
                        tracing::warn!(
                            "Network failure dispatching email (attempt {}): {}. Retrying...",
                            attempt,
                            err
                        );
                        return Attempt::Retry { wait_hint: None };
                    }
                    Err(err) => {
                        tracing::error!("Unexpected error dispatching email: {}", err);
                        return Attempt::Fatal(SendResult::failed(None, err.to_string()));
                    }
                };

                let status = response.status();
                if status == StatusCode::ACCEPTED {
                    return Attempt::Done(SendResult::sent(status.as_u16(), message_id(&response)));
                }

                if is_retryable_status(status) {
                    let hint = retry_after_hint(&response);
                    tracing::warn!(
                        "Provider returned {} (attempt {}). Retrying...",
                        status,
                        attempt
                    );
                    return Attempt::Retry { wait_hint: hint };
                }

                let body = response.text().await.unwrap_or_default();
                tracing::error!("Failed to dispatch email: {} - {}", status, body);
                Attempt::Fatal(SendResult::failed(Some(status.as_u16()), body))
            })
            .await;

        match outcome {
            Ok(result) => result,
            Err(RetryError::Fatal(result)) => result,
            Err(RetryError::Exhausted) => {
                tracing::error!("Exceeded maximum retry attempts dispatching email.");
                SendResult::failed(None, "max_retries_exceeded")
            }
        }
    }
}
