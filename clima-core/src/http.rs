//! HTTP transport shared by providers: a plain `reqwest` client decorated
//! with a time-boxed response cache and bounded retry.

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use reqwest::{Client, Url};
use std::{path::Path, time::Duration};

pub mod cache;
pub mod retry;

use cache::{CacheConfig, ResponseCache};
use retry::{RetryConfig, with_retry};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct HttpClient {
    http: Client,
    cache: Option<ResponseCache>,
    retry: RetryConfig,
}

impl HttpClient {
    pub fn new(retry: RetryConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("clima/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            cache: None,
            retry,
        })
    }

    /// Keep successful responses in `dir` according to `config`.
    pub fn with_cache(mut self, dir: &Path, config: &CacheConfig) -> Self {
        self.cache = config
            .enabled
            .then(|| ResponseCache::new(dir, config.expire_after_secs));
        self
    }

    /// GET `base` with `query` and return the body of a successful response.
    pub async fn get_text(&self, base: &str, query: &[(&str, String)]) -> Result<String> {
        let url = Url::parse_with_params(base, query)
            .with_context(|| format!("Invalid request URL: {base}"))?;
        let key = url.as_str();

        if let Some(cache) = &self.cache {
            match cache.get(key, Utc::now()) {
                Ok(Some(body)) => {
                    tracing::debug!(url = key, "serving response from cache");
                    return Ok(body);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "HTTP cache lookup failed"),
            }
        }

        let res = with_retry(&self.retry, || self.http.get(url.clone()).send())
            .await
            .with_context(|| format!("Failed to send request to {}", url.host_str().unwrap_or(base)))?;

        let status = res.status();
        let body = res.text().await.context("Failed to read response body")?;

        if !status.is_success() {
            return Err(anyhow!(
                "Request failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.put(key, &body, Utc::now()) {
                tracing::warn!(error = %e, "failed to store response in HTTP cache");
            }
        }

        Ok(body)
    }
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_bodies() {
        assert_eq!(truncate_body("short"), "short");
    }

    #[test]
    fn truncate_cuts_on_char_boundary() {
        let body = "é".repeat(300);
        let cut = truncate_body(&body);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 203);
    }
}
