//! Headless browser render strategy.
//!
//! Each render launches its own browser, renders one page and closes the
//! browser again, so no browser process outlives the call that needed it.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::time::timeout;
use tracing::{debug, warn};
use url::Url;

use super::RawContent;

/// Renders pages with a headless Chromium
pub struct HeadlessRenderer {
    /// Browser binary; chromiumoxide looks one up when unset
    executable: Option<PathBuf>,
}

impl HeadlessRenderer {
    pub fn new(executable: Option<PathBuf>) -> Self {
        Self { executable }
    }

    fn browser_config(&self) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder().new_headless_mode().args(vec![
            "--disable-gpu",
            "--no-sandbox",
            "--disable-dev-shm-usage",
            "--remote-debugging-port=0",
        ]);

        if let Some(ref path) = self.executable {
            builder = builder.chrome_executable(path);
        }

        builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to configure headless browser: {}", e))
    }

    /// Render a URL and return the resulting DOM as HTML
    pub async fn render(&self, url: &Url, render_timeout: Duration) -> Result<Option<RawContent>> {
        let config = self.browser_config()?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .context("Failed to launch headless browser")?;

        let events = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let rendered = timeout(render_timeout, async {
            let page = browser
                .new_page(url.as_str())
                .await
                .context("Failed to open page")?;
            page.wait_for_navigation()
                .await
                .context("Navigation failed")?;
            page.content().await.context("Failed to read page content")
        })
        .await;

        if let Err(e) = browser.close().await {
            warn!(%url, error = %e, "Failed to close headless browser");
        }
        let _ = browser.wait().await;
        events.abort();

        let html = rendered
            .with_context(|| format!("Render of {} timed out after {:?}", url, render_timeout))??;

        debug!(%url, bytes = html.len(), "Rendered page");

        if html.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(RawContent::Html(html)))
    }
}
