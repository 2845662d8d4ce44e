//! A small retrying HTTP backend shared by every ecosystem client.
//!
//! Retry/backoff mirrors the shape used by PMG's other HTTP-speaking components:
//! exponential backoff with jitter, capped, honoring `Retry-After` on 429s.

use crate::error::{RegistryError, RegistryResult};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct HttpBackend {
    pub(crate) client: reqwest::Client,
    max_retries: u32,
}

impl HttpBackend {
    pub fn new(user_agent: &str) -> RegistryResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RegistryError::Network {
                message: format!("failed to build http client: {e}"),
            })?;
        Ok(Self {
            client,
            max_retries: 3,
        })
    }

    pub async fn get_json(&self, url: &str) -> RegistryResult<serde_json::Value> {
        let response = self.get(url).await?;
        response.json().await.map_err(|e| RegistryError::InvalidResponse {
            message: format!("invalid JSON from {url}: {e}"),
        })
    }

    pub async fn get(&self, url: &str) -> RegistryResult<reqwest::Response> {
        let mut retries = 0;
        loop {
            match self.get_once(url).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && retries < self.max_retries => {
                    retries += 1;
                    let backoff = backoff_for(&e, retries);
                    warn!(url, retry = retries, backoff_ms = backoff.as_millis(), error = %e, "retrying registry request");
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_once(&self, url: &str) -> RegistryResult<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RegistryError::Network {
                message: format!("request to {url} failed: {e}"),
            })?;

        match response.status().as_u16() {
            200..=299 => Ok(response),
            404 => Err(RegistryError::NotFound {
                name: url.to_string(),
                version: String::new(),
            }),
            429 => {
                let retry_after = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(Duration::from_secs);
                Err(RegistryError::RateLimited { retry_after })
            }
            status => Err(RegistryError::Network {
                message: format!("HTTP {status} from {url}"),
            }),
        }
    }
}

fn backoff_for(err: &RegistryError, attempt: u32) -> Duration {
    use rand::Rng;
    if let RegistryError::RateLimited {
        retry_after: Some(retry_after),
    } = err
    {
        let capped = (*retry_after).min(Duration::from_secs(30));
        return capped;
    }
    let base = Duration::from_secs(1 << attempt).min(Duration::from_secs(30));
    let jittered_ms = rand::thread_rng().gen_range(0..=base.as_millis() as u64);
    Duration::from_millis(jittered_ms.max(10))
}
