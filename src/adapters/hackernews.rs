//! Hacker News story listing through the Algolia search API.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::StoryLister;
use crate::domain::RawStory;

/// Default Algolia endpoint, newest first
pub const ALGOLIA_URL_DEFAULT: &str = "https://hn.algolia.com/api/v1/search_by_date";

/// Message used when the listing cannot be retrieved
pub const LISTING_FAILED: &str = "Failed to fetch stories from Algolia API";

/// Fixed query parameters for the listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HackerNewsParams {
    /// Search endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Algolia tags filter
    #[serde(default = "default_tags")]
    pub tags: String,

    /// Algolia numeric filters
    #[serde(default = "default_numeric_filters")]
    pub numeric_filters: String,
}

fn default_endpoint() -> String {
    ALGOLIA_URL_DEFAULT.to_string()
}
fn default_tags() -> String {
    "story".to_string()
}
fn default_numeric_filters() -> String {
    "points>0".to_string()
}

impl Default for HackerNewsParams {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            tags: default_tags(),
            numeric_filters: default_numeric_filters(),
        }
    }
}

/// Algolia search response
#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: Option<Vec<Hit>>,
}

/// One Algolia hit
#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "objectID")]
    object_id: String,
    title: Option<String>,
    url: Option<String>,
    points: Option<i64>,
    author: Option<String>,
    created_at: Option<String>,
    num_comments: Option<i64>,
    story_text: Option<String>,
}

impl From<Hit> for RawStory {
    fn from(hit: Hit) -> Self {
        Self {
            id: hit.object_id,
            title: hit.title,
            url: hit.url.filter(|u| !u.trim().is_empty()),
            author: hit.author,
            created_at: hit.created_at,
            points: hit.points,
            num_comments: hit.num_comments,
            story_text: hit.story_text,
        }
    }
}

/// Algolia Hacker News client
pub struct HackerNewsClient {
    params: HackerNewsParams,
    client: reqwest::Client,
}

impl HackerNewsClient {
    /// Create a client with a per-request timeout
    pub fn new(params: HackerNewsParams, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent("hackernews-app/1.0")
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { params, client })
    }

    /// The parameters this client queries with
    pub fn params(&self) -> &HackerNewsParams {
        &self.params
    }
}

/// Parse an Algolia response body into stories
fn parse_hits(body: &str) -> Result<Vec<RawStory>> {
    let response: SearchResponse =
        serde_json::from_str(body).context("Failed to parse Algolia response")?;

    let hits = response.hits.context(LISTING_FAILED)?;
    Ok(hits.into_iter().map(RawStory::from).collect())
}

#[async_trait]
impl StoryLister for HackerNewsClient {
    fn name(&self) -> &str {
        "hackernews"
    }

    async fn list(&self, topic: &str, page_size: u32, page: u32) -> Result<Vec<RawStory>> {
        let mut query: Vec<(&str, String)> = vec![
            ("tags", self.params.tags.clone()),
            ("numericFilters", self.params.numeric_filters.clone()),
            ("hitsPerPage", page_size.to_string()),
            ("page", page.to_string()),
        ];
        if !topic.trim().is_empty() {
            query.push(("query", topic.to_string()));
        }

        let response = self
            .client
            .get(&self.params.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&query)
            .send()
            .await
            .context("Algolia request failed")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("{}: HTTP {}", LISTING_FAILED, status);
        }

        let body = response
            .text()
            .await
            .context("Failed to read Algolia response body")?;

        let stories = parse_hits(&body)?;
        debug!(topic, count = stories.len(), "Listed stories");

        Ok(stories)
    }
}
