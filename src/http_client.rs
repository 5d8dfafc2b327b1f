//! Rate-limited, retrying HTTP client.
//!
//! Every GET goes through [`HttpClient::get_bytes`], [`HttpClient::get_text`], or
//! [`HttpClient::get_json`], which all funnel through [`HttpClient::request`].
//! `reqwest` has no retry support of its own, so the backoff ladder for
//! rate-limit responses, server errors, and transport errors lives here.

use crate::config::FetchConfig;
use crate::error::{FetchError, Result};
use crate::rate_limiter::RateLimiter;
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER, USER_AGENT};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    rate_limiter: RateLimiter,
    max_retries: u32,
}

impl HttpClient {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let user_agent = config.resolve_user_agent()?;

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&user_agent).map_err(|_| FetchError::MissingUserAgent)?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        let rate_limiter = RateLimiter::new(config.rate_limit)?;

        Ok(Self {
            client,
            rate_limiter,
            max_retries: config.max_retries,
        })
    }

    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        Ok(self.request(url).await?.bytes().await?.to_vec())
    }

    pub async fn get_text(&self, url: &str) -> Result<String> {
        Ok(self.request(url).await?.text().await?)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.request(url).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let text = response.text().await?;
        if !content_type.is_empty() && !content_type.contains("json") {
            return Err(FetchError::UnexpectedContentType {
                url: url.to_string(),
                expected: "application/json".to_string(),
                got: content_type,
            });
        }
        serde_json::from_str(&text).map_err(FetchError::from)
    }

    /// Issues one GET with retries, following this protocol:
    /// rate-limit, request, branch on the response class, sleep, retry.
    ///
    /// `attempt` is 1-indexed (the first request is attempt 1), matching the
    /// reproduced backoff contract: a `max_retries` of 6 yields exactly 6
    /// total requests, and the first retry's backoff is computed from
    /// `attempt == 1`, not `0`.
    async fn request(&self, url: &str) -> Result<reqwest::Response> {
        let mut attempt: u32 = 1;
        loop {
            self.rate_limiter.acquire().await;

            let outcome = self.client.get(url).send().await;

            match outcome {
                Ok(response) if response.status().is_success() || response.status().is_redirection() => {
                    return Ok(response);
                }
                Ok(response) if response.status().as_u16() == 429 => {
                    if attempt >= self.max_retries {
                        return Err(FetchError::RateLimited);
                    }
                    let delay = retry_after_delay(&response, attempt);
                    warn!(url, attempt, ?delay, "rate limited, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Ok(response) if response.status().is_server_error() => {
                    if attempt >= self.max_retries {
                        return Err(FetchError::ServerError {
                            status: response.status().as_u16(),
                        });
                    }
                    let delay = server_error_delay(attempt);
                    debug!(url, attempt, ?delay, status = %response.status(), "server error, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Ok(response) => {
                    return Err(FetchError::HttpStatus {
                        status: response.status().as_u16(),
                        url: url.to_string(),
                    });
                }
                Err(err) if err.is_timeout() || err.is_connect() || err.is_request() => {
                    if attempt >= self.max_retries {
                        return Err(FetchError::TimedOut { url: url.to_string() });
                    }
                    let delay = transport_error_delay(attempt);
                    debug!(url, attempt, ?delay, "transport error, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(FetchError::from(err)),
            }
        }
    }
}

fn retry_after_delay(response: &reqwest::Response, attempt: u32) -> Duration {
    let from_header = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs);

    from_header.unwrap_or_else(|| {
        let backoff = 2f64.powi(attempt as i32) + fastrand::f64();
        Duration::from_secs_f64(backoff.min(60.0))
    })
}

fn server_error_delay(attempt: u32) -> Duration {
    let backoff = 0.5 * 2f64.powi(attempt as i32) + fastrand::f64();
    Duration::from_secs_f64(backoff.min(30.0))
}

fn transport_error_delay(attempt: u32) -> Duration {
    let backoff = 0.5 * attempt as f64 + fastrand::f64();
    Duration::from_secs_f64(backoff.min(10.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_delay_is_capped() {
        assert!(server_error_delay(20) <= Duration::from_secs_f64(30.0));
    }

    #[test]
    fn transport_error_delay_is_capped() {
        assert!(transport_error_delay(100) <= Duration::from_secs_f64(10.0));
    }

    #[test]
    fn first_retry_uses_attempt_one_not_zero() {
        // The first retry (attempt == 1) must clear the 0.5*attempt floor;
        // at attempt == 0 this would allow a near-zero delay.
        assert!(transport_error_delay(1) >= Duration::from_secs_f64(0.5));
    }
}
