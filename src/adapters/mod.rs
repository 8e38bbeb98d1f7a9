//! Adapter interfaces for external systems.
//!
//! The job only talks to the outside world through these traits: the
//! story listing, the content resolver (headless render and plain fetch),
//! the text extractor and the summarizer. Concrete clients are constructed
//! by the caller and passed in.

pub mod extractor;
pub mod fabric;
pub mod hackernews;
pub mod headless;
pub mod http_fetch;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use url::Url;

use crate::domain::RawStory;

pub use extractor::HtmlTextExtractor;
pub use fabric::FabricSummarizer;
pub use hackernews::{HackerNewsClient, HackerNewsParams};
pub use headless::HeadlessRenderer;
pub use http_fetch::HttpFetcher;

/// Raw content obtained for a URL, normalized once at the boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawContent {
    /// Markup that still needs extraction
    Html(String),

    /// Already plain text
    Text(String),
}

impl RawContent {
    /// Classify a body by looking for markup
    pub fn sniff(body: impl Into<String>) -> Self {
        let body = body.into();
        if body.contains('<') {
            Self::Html(body)
        } else {
            Self::Text(body)
        }
    }

    /// Normalize the shapes resolvers are known to hand back: a bare
    /// string, or an object carrying `html`, `text` or `content`.
    pub fn from_value(value: serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Some(Self::sniff(s)),
            serde_json::Value::Object(map) => {
                if let Some(html) = map.get("html").and_then(|v| v.as_str()) {
                    return Some(Self::Html(html.to_string()));
                }
                ["text", "content"]
                    .iter()
                    .find_map(|key| map.get(*key).and_then(|v| v.as_str()))
                    .map(Self::sniff)
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Html(s) | Self::Text(s) => s,
        }
    }

    pub fn into_string(self) -> String {
        match self {
            Self::Html(s) | Self::Text(s) => s,
        }
    }

    /// True when there is nothing usable in the content
    pub fn is_blank(&self) -> bool {
        self.as_str().trim().is_empty()
    }
}

/// Lists stories for a topic
#[async_trait]
pub trait StoryLister: Send + Sync {
    /// Human-readable lister name
    fn name(&self) -> &str;

    /// Fetch one page of stories matching the topic
    async fn list(&self, topic: &str, page_size: u32, page: u32) -> Result<Vec<RawStory>>;
}

/// Resolves a URL to raw content using one of two strategies
#[async_trait]
pub trait ContentResolver: Send + Sync {
    /// Render the page in a headless browser
    async fn render(&self, url: &Url, timeout: Duration) -> Result<Option<RawContent>>;

    /// Fetch the page with a plain HTTP GET
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<Option<RawContent>>;
}

/// Turns raw content into clean plain text. Never fails; returns an empty
/// string when nothing can be extracted.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, content: &RawContent) -> String;
}

/// Produces a summary for a story preview
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Human-readable summarizer name
    fn name(&self) -> &str;

    /// Summarize the preview text of a story
    async fn summarize(&self, story_id: &str, preview: &str) -> Result<String>;
}

/// Resolver combining the headless renderer and the plain HTTP fetcher
pub struct WebResolver {
    renderer: Option<HeadlessRenderer>,
    fetcher: HttpFetcher,
}

impl WebResolver {
    /// Create a resolver. Without a renderer, `render` always yields nothing
    /// and every URL goes through the plain fetch.
    pub fn new(renderer: Option<HeadlessRenderer>, fetcher: HttpFetcher) -> Self {
        Self { renderer, fetcher }
    }
}

#[async_trait]
impl ContentResolver for WebResolver {
    async fn render(&self, url: &Url, timeout: Duration) -> Result<Option<RawContent>> {
        match &self.renderer {
            Some(renderer) => renderer.render(url, timeout).await,
            None => Ok(None),
        }
    }

    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<Option<RawContent>> {
        self.fetcher.fetch(url, timeout).await
    }
}
