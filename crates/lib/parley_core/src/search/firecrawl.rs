//! Firecrawl HTTP client.
//!
//! `search` calls `/v1/search` directly. `crawl` submits a crawl job for a
//! Google results page and polls it until the pages are ready.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::time::{Instant, sleep};
use tracing::debug;
use url::Url;

use crate::config::{Config, ConfigError};

use super::{SearchError, WebSearch};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CRAWL_TIMEOUT: Duration = Duration::from_secs(60);
const CRAWL_POLL_INTERVAL: Duration = Duration::from_secs(2);
const GOOGLE_SEARCH_URL: &str = "https://www.google.com/search";

#[derive(Serialize)]
struct SearchBody<'a> {
    query: &'a str,
    limit: u32,
}

#[derive(Deserialize)]
struct CrawlJob {
    #[serde(default)]
    success: bool,
    id: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct CrawlStatus {
    status: String,
    #[serde(default)]
    data: Vec<Value>,
}

/// Firecrawl API client.
#[derive(Clone)]
pub struct FirecrawlClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl FirecrawlClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self::new(
            config.firecrawl_api_key()?,
            config.firecrawl_api_url.clone(),
        ))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Sends `request` and returns the JSON body of a successful response.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, SearchError> {
        let resp = request
            .bearer_auth(&self.api_key)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(SearchError::Status { status, body });
        }
        Ok(resp.json().await?)
    }
}

/// Google results URL for `query`, percent-encoded.
pub fn google_search_url(query: &str) -> Result<Url, SearchError> {
    Ok(Url::parse_with_params(GOOGLE_SEARCH_URL, &[("q", query)])?)
}

#[async_trait]
impl WebSearch for FirecrawlClient {
    async fn search(&self, query: &str, limit: u32) -> Result<Value, SearchError> {
        let request = self
            .client
            .post(self.endpoint("/v1/search"))
            .json(&SearchBody { query, limit });
        self.send(request).await
    }

    async fn crawl(&self, query: &str, limit: u32) -> Result<Value, SearchError> {
        let url = google_search_url(query)?;
        let body = json!({
            "url": url.as_str(),
            "limit": limit,
            "scrapeOptions": {
                "formats": ["markdown"],
                "onlyMainContent": true,
            },
        });

        let job: CrawlJob = serde_json::from_value(
            self.send(self.client.post(self.endpoint("/v1/crawl")).json(&body))
                .await?,
        )
        .map_err(|e| SearchError::Api(format!("unexpected crawl response: {e}")))?;

        let id = match (job.success, job.id) {
            (true, Some(id)) => id,
            (_, _) => {
                return Err(SearchError::Api(
                    job.error.unwrap_or_else(|| "crawl job was not accepted".into()),
                ));
            }
        };

        let deadline = Instant::now() + CRAWL_TIMEOUT;
        loop {
            let status: CrawlStatus = serde_json::from_value(
                self.send(self.client.get(self.endpoint(&format!("/v1/crawl/{id}"))))
                    .await?,
            )
            .map_err(|e| SearchError::Api(format!("unexpected crawl status: {e}")))?;

            debug!(job = %id, status = %status.status, "crawl status");
            match status.status.as_str() {
                "completed" => return Ok(Value::Array(status.data)),
                "failed" | "cancelled" => {
                    return Err(SearchError::Api(format!("crawl job {}", status.status)));
                }
                _ => {}
            }

            if Instant::now() + CRAWL_POLL_INTERVAL > deadline {
                return Err(SearchError::CrawlTimeout(CRAWL_TIMEOUT.as_secs()));
            }
            sleep(CRAWL_POLL_INTERVAL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FIRECRAWL_API_KEY;

    #[test]
    fn google_url_encodes_query() {
        let url = google_search_url("rust & tokio?").unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.google.com/search?q=rust+%26+tokio%3F"
        );
    }

    #[test]
    fn endpoint_joins_base_url() {
        let client = FirecrawlClient::new("key", "http://localhost:3002");
        assert_eq!(
            client.endpoint("/v1/search"),
            "http://localhost:3002/v1/search"
        );
    }

    #[test]
    fn from_config_requires_api_key() {
        assert!(FirecrawlClient::from_config(&Config::from_lookup(|_| None)).is_err());

        let config = Config::from_lookup(|key| (key == FIRECRAWL_API_KEY).then(|| "fc".to_string()));
        let client = FirecrawlClient::from_config(&config).unwrap();
        assert_eq!(client.base_url, "https://api.firecrawl.dev");
    }

    #[tokio::test]
    async fn unreachable_server_is_a_request_error() {
        let client = FirecrawlClient::new("key", "http://127.0.0.1:9");
        let err = client.search("q", 1).await.unwrap_err();
        assert!(matches!(err, SearchError::Request(_)));
    }
}
