use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use std::time::Duration;
use tokio::time::sleep;

#[cfg(test)]
use mockall::automock;

use crate::config::RetryConfig;
use crate::error::{Result, SupportError};
use crate::models::{ChatRequest, ChatResponse};

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn chat(&self, api_key: &str, req: &ChatRequest) -> Result<ChatResponse>;
}

pub struct MistralTransport {
    client: Client,
    url: String,
    retry: RetryConfig,
}

impl MistralTransport {
    pub fn new(url: String, retry: RetryConfig) -> Result<Self> {
        if url.trim().is_empty() {
            return Err(SupportError::Config(
                "Mistral endpoint URL is empty".to_string(),
            ));
        }
        Ok(Self {
            client: Client::new(),
            url,
            retry,
        })
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let base = self
            .retry
            .initial_delay()
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        let spread = self.retry.jitter_factor.clamp(0.0, 1.0);
        let jitter = if spread > 0.0 {
            rand::thread_rng().gen_range((1.0 - spread)..=(1.0 + spread))
        } else {
            1.0
        };
        let delay = Duration::from_millis((base.as_millis() as f64 * jitter) as u64);
        std::cmp::min(delay, self.retry.max_delay())
    }
}

#[async_trait]
impl Transport for MistralTransport {
    async fn chat(&self, api_key: &str, req: &ChatRequest) -> Result<ChatResponse> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempts = 0;

        loop {
            attempts += 1;

            let failure = match self
                .client
                .post(&self.url)
                .bearer_auth(api_key)
                .json(req)
                .send()
                .await
            {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.json().await.map_err(|e| {
                            SupportError::MalformedResponse(format!(
                                "Failed to parse Mistral API response: {e}"
                            ))
                        });
                    }
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    format!("Mistral API returned {status}: {body}")
                }
                Err(e) => format!("Failed to send request to Mistral API: {e}"),
            };

            if attempts >= max_attempts {
                return Err(SupportError::Transport(if max_attempts > 1 {
                    format!("{failure} (after {attempts} attempts)")
                } else {
                    failure
                }));
            }

            let delay = self.backoff(attempts);
            tracing::warn!(
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                "Mistral request failed, retrying: {}",
                failure
            );
            sleep(delay).await;
        }
    }
}
