//! Web search tool.
//!
//! [`SearchTool`] is registered beside the database tools as
//! `firecrawl_search`. Its parameter list comes from the same schema adapter
//! as the proxied tools, fed with a schema derived from [`SearchRequest`].

pub mod firecrawl;

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{error, info};

use crate::adapter::invoke::{InvocationError, bind_arguments};
use crate::adapter::schema::{BuildError, synthesize};
use crate::agent::{AgentTool, ToolSpec};
use crate::failure::ToolSource;

pub use firecrawl::FirecrawlClient;

/// Most results rendered into one answer.
const MAX_RESULTS: usize = 3;

/// Characters kept from each result's text.
const SNIPPET_CHARS: usize = 500;

const DESCRIPTION: &str = "Search the web via Firecrawl. Use this for current events, news, external information, or anything not in the personal database.";

/// Web search errors.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Firecrawl request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Firecrawl returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Firecrawl search failed: {0}")]
    Api(String),

    #[error("Firecrawl crawl did not complete within {0}s")]
    CrawlTimeout(u64),

    #[error("Invalid search URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Invalid search arguments: {0}")]
    Arguments(String),
}

impl From<InvocationError> for SearchError {
    fn from(e: InvocationError) -> Self {
        Self::Arguments(e.to_string())
    }
}

/// A web-search backend.
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Runs a search and returns the raw response body.
    async fn search(&self, query: &str, limit: u32) -> Result<Value, SearchError>;

    /// Crawl-style fallback for backends without a search endpoint. Returns
    /// a bare list of page records.
    async fn crawl(&self, query: &str, limit: u32) -> Result<Value, SearchError>;
}

/// Which response shape the backend is expected to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchContract {
    /// `{success, data: [{title, url, description|content}], error?}`.
    Rich,
    /// A bare map with `data`, or a bare list of crawled pages.
    Legacy,
}

/// Arguments of the `firecrawl_search` tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchRequest {
    /// Search query string.
    pub query: String,
    /// Maximum pages to return (default 3 for faster response).
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    3
}

/// Renders a search response as a short text answer.
pub fn render(contract: SearchContract, query: &str, response: &Value) -> Result<String, SearchError> {
    let entries = match contract {
        SearchContract::Rich => rich_entries(response)?,
        SearchContract::Legacy => legacy_entries(response),
    };

    if entries.is_empty() {
        return Ok(format!("No web results found for '{query}'"));
    }
    Ok(format!(
        "Web search results for '{query}':\n\n{}",
        entries.join("\n\n")
    ))
}

fn rich_entries(response: &Value) -> Result<Vec<String>, SearchError> {
    if let Some(error) = response.get("error").and_then(Value::as_str) {
        return Err(SearchError::Api(error.to_string()));
    }
    if response.get("success").and_then(Value::as_bool) == Some(false) {
        return Err(SearchError::Api("search was not successful".into()));
    }

    let records = response
        .get("data")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    Ok(records
        .iter()
        .take(MAX_RESULTS)
        .enumerate()
        .map(|(i, record)| {
            let title = text_field(record, &["title"]).unwrap_or("Unknown");
            let body = text_field(record, &["description", "content", "markdown"]).unwrap_or("");
            match text_field(record, &["url"]) {
                Some(url) => format!("**Source {}: {title}**\n{url}\n{}", i + 1, snippet(body)),
                None => format!("**Source {}: {title}**\n{}", i + 1, snippet(body)),
            }
        })
        .collect())
}

fn legacy_entries(response: &Value) -> Vec<String> {
    match response {
        Value::Object(_) => response
            .get("data")
            .and_then(Value::as_array)
            .map(|records| {
                records
                    .iter()
                    .take(MAX_RESULTS)
                    .enumerate()
                    .map(|(i, record)| {
                        let title = text_field(record, &["title"]).unwrap_or("Unknown");
                        let body = text_field(record, &["content", "text"]).unwrap_or("");
                        format!("**Source {}: {title}**\n{}", i + 1, snippet(body))
                    })
                    .collect()
            })
            .unwrap_or_default(),
        Value::Array(pages) => pages
            .iter()
            .take(MAX_RESULTS)
            .enumerate()
            .map(|(i, page)| {
                let body = text_field(page, &["markdown", "content"]).unwrap_or("");
                format!("**Result {}:**\n{}", i + 1, snippet(body))
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// First of `keys` present on `record` as a string.
fn text_field<'a>(record: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| record.get(*key).and_then(Value::as_str))
}

fn snippet(text: &str) -> String {
    let mut out: String = text.chars().take(SNIPPET_CHARS).collect();
    out.push_str("...");
    out
}

/// The `firecrawl_search` tool.
pub struct SearchTool {
    client: Arc<dyn WebSearch>,
    contract: SearchContract,
    spec: ToolSpec,
}

impl SearchTool {
    pub const NAME: &'static str = "firecrawl_search";

    pub fn new(client: Arc<dyn WebSearch>, contract: SearchContract) -> Result<Self, BuildError> {
        let schema = serde_json::to_value(schemars::schema_for!(SearchRequest))
            .unwrap_or_else(|_| Value::Object(Map::new()));
        let parameters = synthesize(Self::NAME, &schema)?;
        Ok(Self {
            client,
            contract,
            spec: ToolSpec {
                name: Self::NAME.into(),
                description: DESCRIPTION.into(),
                parameters,
            },
        })
    }

    /// Searches and renders, answering with a failure sentence on error.
    pub async fn search(&self, query: &str, limit: u32) -> String {
        info!(query, limit, "Searching web");
        match self.try_search(query, limit).await {
            Ok(answer) => answer,
            Err(e) => {
                error!(query, "Firecrawl search failed: {e}");
                ToolSource::WebSearch.describe(&e.to_string())
            }
        }
    }

    async fn try_search(&self, query: &str, limit: u32) -> Result<String, SearchError> {
        let response = match (self.contract, self.client.search(query, limit).await) {
            (SearchContract::Legacy, Err(SearchError::Status { status, .. }))
                if status == reqwest::StatusCode::NOT_FOUND =>
            {
                info!("Search endpoint unavailable, falling back to crawl");
                self.client.crawl(query, limit).await?
            }
            (_, result) => result?,
        };
        info!("Firecrawl returned results");
        render(self.contract, query, &response)
    }

    async fn invoke_inner(&self, arguments: Map<String, Value>) -> Result<String, SearchError> {
        let bound = bind_arguments(&self.spec.parameters, arguments)?;
        let request: SearchRequest = serde_json::from_value(Value::Object(bound))
            .map_err(|e| SearchError::Arguments(e.to_string()))?;
        Ok(self.search(&request.query, request.limit).await)
    }
}

#[async_trait]
impl AgentTool for SearchTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn invoke(&self, arguments: Map<String, Value>) -> Value {
        let answer = match self.invoke_inner(arguments).await {
            Ok(answer) => answer,
            Err(e) => ToolSource::WebSearch.describe(&e.to_string()),
        };
        Value::String(answer)
    }
}
