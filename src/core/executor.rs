//! HTTP request executor with bounded retries and jittered backoff.
//!
//! HTTP 429, 5xx and transport connect/timeout failures are retried; the
//! first non-retryable response is returned to the caller. Exhaustion is
//! reported as an explicit error value, never by exiting here, so every
//! caller decides what the failure means for it.

use std::time::Duration;

use rand::Rng;
use reqwest::{header, Client, Method, Response, StatusCode};
use serde_json::Value;
use url::Url;

use crate::core::auth::Redactor;
use crate::utils::error::{ApiError, Result};

const USER_AGENT: &str = concat!("petwatch/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff_ms: 1000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt`: `base * 2^attempt` plus uniform
    /// jitter in [10%, 30%] of the backoff value, so simultaneous clients
    /// do not retry in lockstep.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let backoff = self
            .base_backoff_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        let jitter_frac: f64 = rand::thread_rng().gen_range(0.10..=0.30);
        let jitter = (backoff as f64 * jitter_frac) as u64;
        Duration::from_millis(backoff.saturating_add(jitter))
    }
}

pub struct Executor {
    client: Client,
    base_url: String,
    policy: RetryPolicy,
    token: Option<String>,
    redactor: Redactor,
}

impl Executor {
    pub fn new(base_url: &str, policy: RetryPolicy, redactor: Redactor) -> Result<Self> {
        Url::parse(base_url)
            .map_err(|err| ApiError::Config(format!("invalid base URL {base_url}: {err}")))?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| ApiError::Config(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            policy,
            token: None,
            redactor,
        })
    }

    pub fn set_token(&mut self, token: &str) {
        self.redactor.add_secret(token);
        self.token = Some(token.to_string());
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub fn redactor(&self) -> &Redactor {
        &self.redactor
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send one logical request, retrying retryable failures up to the
    /// policy maximum. Returns the first non-retryable response as-is.
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Response> {
        let url = self.url_for(path);

        for attempt in 0..=self.policy.max_retries {
            let mut request = self
                .client
                .request(method.clone(), &url)
                .header(header::ACCEPT, "application/json");
            if let Some(token) = &self.token {
                request = request.bearer_auth(token);
            }
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(body) = body {
                request = request.json(body);
                tracing::debug!(
                    "{} {} body {}",
                    method,
                    url,
                    self.redactor.redact(&body.to_string())
                );
            } else {
                tracing::debug!("{} {}", method, url);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    tracing::debug!("{} {} -> {}", method, url, status);

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        if attempt < self.policy.max_retries {
                            let delay = self.policy.backoff_delay(attempt);
                            tracing::debug!("Rate limited, sleeping {:?}", delay);
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                        return Err(ApiError::RateLimited);
                    }

                    if status.is_server_error() {
                        if attempt < self.policy.max_retries {
                            let delay = self.policy.backoff_delay(attempt);
                            tracing::debug!("Server error {}, sleeping {:?}", status, delay);
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                        return Err(ApiError::Server {
                            status: status.as_u16(),
                        });
                    }

                    return Ok(response);
                }
                Err(err) if err.is_connect() || err.is_timeout() => {
                    if attempt < self.policy.max_retries {
                        let delay = self.policy.backoff_delay(attempt);
                        tracing::debug!("Transport error ({}), sleeping {:?}", err, delay);
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(ApiError::Network(err.to_string()));
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(ApiError::Network("request failed after all retries".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_stays_within_documented_jitter_band() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_backoff_ms: 1000,
        };
        for attempt in 0..5 {
            let base = 1000u64 * 2u64.pow(attempt);
            for _ in 0..50 {
                let delay = policy.backoff_delay(attempt).as_millis() as u64;
                assert!(delay >= base, "attempt {attempt}: {delay} < {base}");
                // Integer truncation keeps the upper bound at base * 1.3.
                assert!(
                    delay <= base + (base * 3) / 10,
                    "attempt {attempt}: {delay} above jitter band"
                );
            }
        }
    }

    #[test]
    fn backoff_is_non_decreasing_in_attempt_number() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_backoff_ms: 200,
        };
        for _ in 0..20 {
            let mut previous = Duration::ZERO;
            for attempt in 0..5 {
                let delay = policy.backoff_delay(attempt);
                assert!(delay >= previous, "delay shrank at attempt {attempt}");
                previous = delay;
            }
        }
    }

    #[test]
    fn huge_attempt_numbers_saturate_instead_of_overflowing() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_backoff_ms: u64::MAX / 2,
        };
        let _ = policy.backoff_delay(63);
    }

    #[test]
    fn invalid_base_url_is_a_config_error() {
        let result = Executor::new("not a url", RetryPolicy::default(), Redactor::default());
        assert!(matches!(result, Err(ApiError::Config(_))));
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let executor = Executor::new(
            "http://127.0.0.1:9/",
            RetryPolicy::default(),
            Redactor::default(),
        )
        .unwrap();
        assert_eq!(
            executor.url_for("/tracker/X"),
            "http://127.0.0.1:9/tracker/X"
        );
    }
}
