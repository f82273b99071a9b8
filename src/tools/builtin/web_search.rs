//! Web search tool backed by the Exa search API.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::context::ToolContext;
use crate::tools::tool::{Tool, ToolError, ToolOutput, require_str};

pub const WEB_SEARCH_TOOL_NAME: &str = "web_search";

const PROVIDER: &str = "exa";

/// One search hit.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    #[serde(default)]
    pub title: Option<String>,
    pub url: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub published_date: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
}

impl std::fmt::Display for SearchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Title: {}", self.title.as_deref().unwrap_or(""))?;
        write!(f, "URL: {}", self.url)?;
        if let Some(ref id) = self.id {
            write!(f, "\nID: {id}")?;
        }
        if let Some(score) = self.score {
            write!(f, "\nScore: {score}")?;
        }
        if let Some(ref date) = self.published_date {
            write!(f, "\nPublished Date: {date}")?;
        }
        if let Some(ref author) = self.author {
            write!(f, "\nAuthor: {author}")?;
        }
        if !self.highlights.is_empty() {
            write!(f, "\nHighlights: {}", self.highlights.join(" ... "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

/// Minimal client for `POST /search`.
pub struct ExaClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl ExaClient {
    pub fn new(base_url: impl Into<String>, api_key: SecretString) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Run a search, letting the provider pick the search type, with highlights.
    pub async fn search_and_contents(&self, query: &str) -> Result<Vec<SearchResult>, ToolError> {
        let url = format!("{}/search", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("x-api-key", self.api_key.expose_secret())
            .json(&serde_json::json!({
                "query": query,
                "type": "auto",
                "contents": {"highlights": true}
            }))
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("Exa request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::Provider {
                provider: PROVIDER.into(),
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("Invalid Exa response: {e}")))?;
        Ok(parsed.results)
    }
}

pub struct WebSearchTool {
    client: Arc<ExaClient>,
}

impl WebSearchTool {
    pub fn new(client: Arc<ExaClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        WEB_SEARCH_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Perform a search query on the web, and retrieve the most relevant URLs/web data."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query to perform."
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let query = require_str(&params, "query")?;
        let results = self.client.search_and_contents(query).await?;
        tracing::debug!(query, hits = results.len(), "Web search complete");

        let text = results
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join("\n\n");
        Ok(ToolOutput::text(text, start.elapsed()))
    }
}
