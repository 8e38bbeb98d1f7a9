//! Plain HTTP fetch strategy.
//!
//! No JavaScript rendering; used after the headless renderer came back
//! empty, or on its own when rendering is disabled.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::debug;
use url::Url;

use super::RawContent;

/// HTTP fetcher with a browser-like identity
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let user_agent = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Fetch a URL. Non-success statuses are errors; an empty body is `None`.
    pub async fn fetch(&self, url: &Url, timeout: Duration) -> Result<Option<RawContent>> {
        let response = self
            .client
            .get(url.as_str())
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml,text/plain;q=0.9,*/*;q=0.8",
            )
            .timeout(timeout)
            .send()
            .await
            .with_context(|| format!("HTTP request failed for {}", url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {} for {}", status, url);
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase);

        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        debug!(%url, bytes = body.len(), "Fetched page");

        if body.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(classify(content_type.as_deref(), body)))
    }
}

/// Turn a response body into content using its declared type
fn classify(content_type: Option<&str>, body: String) -> RawContent {
    match content_type {
        Some(ct) if ct.contains("json") => serde_json::from_str(&body)
            .ok()
            .and_then(RawContent::from_value)
            .unwrap_or(RawContent::Text(body)),
        Some(ct) if ct.contains("html") || ct.contains("xml") => RawContent::Html(body),
        Some(_) => RawContent::Text(body),
        None => RawContent::sniff(body),
    }
}
