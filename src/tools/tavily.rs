//! Web search through the Tavily API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{Tool, ToolError};

pub const DEFAULT_TAVILY_BASE_URL: &str = "https://api.tavily.com";

/// Search category understood by Tavily.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchTopic {
    #[default]
    General,
    News,
    Finance,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    max_results: usize,
    topic: SearchTopic,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SearchHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    score: Option<f64>,
}

/// Search the web with Tavily.
///
/// The result bound and the credential are fixed when the tool is built.
pub struct TavilySearch {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    max_results: usize,
    timeout: Duration,
}

impl TavilySearch {
    pub fn new(
        api_key: impl Into<String>,
        max_results: usize,
        timeout: Duration,
    ) -> Result<Self, ToolError> {
        Self::with_base_url(DEFAULT_TAVILY_BASE_URL, api_key, max_results, timeout)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        max_results: usize,
        timeout: Duration,
    ) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("search-agent/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            max_results: max_results.max(1),
            timeout,
        })
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }
}

#[async_trait]
impl Tool for TavilySearch {
    fn name(&self) -> &str {
        "tavily_search"
    }

    fn description(&self) -> &str {
        "A search engine optimized for comprehensive, accurate, and trusted results. Useful for when you need to answer questions about current events. Input should be a search query."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query to look up"
                },
                "topic": {
                    "type": "string",
                    "enum": ["general", "news", "finance"],
                    "description": "Category of the search (default: general)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let query = args["query"]
            .as_str()
            .map(str::trim)
            .ok_or_else(|| ToolError::MissingArgument("query".to_string()))?;
        if query.is_empty() {
            return Err(ToolError::InvalidQuery("query must not be empty".to_string()));
        }

        let topic = match args.get("topic") {
            None | Some(Value::Null) => SearchTopic::default(),
            Some(raw) => serde_json::from_value(raw.clone())
                .map_err(|_| ToolError::InvalidQuery(format!("unsupported topic: {}", raw)))?,
        };

        tracing::info!(query = %query, ?topic, "Running web search");

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&SearchRequest {
                query,
                max_results: self.max_results,
                topic,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ToolError::Timeout(self.timeout.as_secs())
                } else {
                    ToolError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => ToolError::RateLimited,
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    ToolError::Unauthorized(status.as_u16())
                }
                StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                    ToolError::InvalidQuery(body)
                }
                _ => ToolError::Status {
                    status: status.as_u16(),
                    body,
                },
            });
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| ToolError::InvalidResponse(e.to_string()))?;

        let results: Vec<SearchHit> = parsed.results.into_iter().take(self.max_results).collect();
        tracing::debug!(query = %query, hits = results.len(), "Web search finished");

        Ok(json!({
            "query": query,
            "results": results,
        }))
    }
}
