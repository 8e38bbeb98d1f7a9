//! Per-story enrichment pipeline.
//!
//! Drives one story from raw to summarized: resolve the URL (render, then
//! plain fetch), extract text, publish the preview to the job and wait on
//! the story's completion signal until the summary is supplied. Failures
//! at any external step degrade to fallback text instead of failing the
//! job.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::adapters::{ContentResolver, RawContent, TextExtractor};
use crate::domain::{Story, SUMMARY_NOT_AVAILABLE, SUMMARY_SCRAPE_FAILED};

/// Unrecoverable enrichment errors. Any of these makes the story conclude
/// with the scrape-failure placeholder.
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("Invalid story URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Unsupported URL scheme '{scheme}' for {url}")]
    UnsupportedScheme { url: String, scheme: String },

    #[error("Job stopped accepting previews")]
    JobClosed,
}

/// A preview ready to be published, together with the signal the pipeline
/// is parked on
#[derive(Debug)]
pub struct PreviewReady {
    pub generation: u64,
    pub story_id: String,
    pub preview: String,
    pub waiter: oneshot::Sender<String>,
}

/// How a pipeline ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// The summary was supplied through the job
    Summarized,

    /// The pipeline decided the summary itself (placeholder)
    Concluded(String),

    /// The job dropped the completion signal (reset or shutdown)
    Abandoned,
}

/// Final report of one pipeline, tagged with its cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub generation: u64,
    pub story_id: String,
    pub outcome: PipelineOutcome,
}

/// Enrichment of a single story
pub struct Enrichment {
    generation: u64,
    story: Story,
    resolver: Arc<dyn ContentResolver>,
    extractor: Arc<dyn TextExtractor>,
    render_timeout: Duration,
    fetch_timeout: Duration,
    previews: mpsc::UnboundedSender<PreviewReady>,
}

impl Enrichment {
    pub fn new(
        generation: u64,
        story: Story,
        resolver: Arc<dyn ContentResolver>,
        extractor: Arc<dyn TextExtractor>,
        previews: mpsc::UnboundedSender<PreviewReady>,
    ) -> Self {
        Self {
            generation,
            story,
            resolver,
            extractor,
            render_timeout: Duration::from_secs(45),
            fetch_timeout: Duration::from_secs(30),
            previews,
        }
    }

    /// Override the resolver timeouts
    pub fn with_timeouts(mut self, render_timeout: Duration, fetch_timeout: Duration) -> Self {
        self.render_timeout = render_timeout;
        self.fetch_timeout = fetch_timeout;
        self
    }

    /// Run the pipeline. A panic anywhere inside concludes the story with
    /// the scrape-failure placeholder rather than leaving it unfinished.
    pub async fn run(self) -> PipelineReport {
        let generation = self.generation;
        let story_id = self.story.id.clone();

        let outcome = match AssertUnwindSafe(self.drive()).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(%story_id, "Enrichment panicked");
                PipelineOutcome::Concluded(SUMMARY_SCRAPE_FAILED.to_string())
            }
        };

        PipelineReport {
            generation,
            story_id,
            outcome,
        }
    }

    #[instrument(skip(self), fields(story_id = %self.story.id, generation = self.generation))]
    async fn drive(self) -> PipelineOutcome {
        // A persisted preview from before a restart skips straight to waiting
        let preview = match self.story.content_preview.clone() {
            Some(preview) => preview,
            None => match self.build_preview().await {
                Ok(Some(preview)) => preview,
                Ok(None) => {
                    debug!("No URL and no fallback text");
                    return PipelineOutcome::Concluded(SUMMARY_NOT_AVAILABLE.to_string());
                }
                Err(e) => {
                    warn!(error = %e, "Enrichment failed");
                    return PipelineOutcome::Concluded(SUMMARY_SCRAPE_FAILED.to_string());
                }
            },
        };

        match self.publish_and_wait(preview).await {
            Ok(Some(_summary)) => PipelineOutcome::Summarized,
            Ok(None) => PipelineOutcome::Abandoned,
            Err(e) => {
                warn!(error = %e, "Could not publish preview");
                PipelineOutcome::Concluded(SUMMARY_SCRAPE_FAILED.to_string())
            }
        }
    }

    /// Publish the preview and park until the summary arrives. `None` means
    /// the signal was dropped without a summary.
    async fn publish_and_wait(&self, preview: String) -> Result<Option<String>, EnrichError> {
        let (waiter, summary) = oneshot::channel();

        self.previews
            .send(PreviewReady {
                generation: self.generation,
                story_id: self.story.id.clone(),
                preview,
                waiter,
            })
            .map_err(|_| EnrichError::JobClosed)?;

        debug!("Preview published, waiting for summary");
        Ok(summary.await.ok())
    }

    /// Steps 1-3: figure out the preview text. `Ok(None)` means the story has
    /// nothing at all to offer.
    async fn build_preview(&self) -> Result<Option<String>, EnrichError> {
        let raw_url = self
            .story
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty());

        let Some(raw_url) = raw_url else {
            return Ok(self.story.fallback_text().map(str::to_string));
        };

        let url = parse_story_url(raw_url)?;
        let content = self.resolve(&url).await;

        let extracted = match &content {
            Some(content) => self.extract(content.clone()).await,
            None => String::new(),
        };

        if !extracted.trim().is_empty() {
            return Ok(Some(extracted));
        }

        // Fallback chain: story text, then the raw content, then nothing
        let preview = self
            .story
            .fallback_text()
            .map(str::to_string)
            .or_else(|| content.map(RawContent::into_string))
            .unwrap_or_default();

        Ok(Some(preview))
    }

    /// Render first, plain fetch second. Failures and timeouts count as
    /// "no content".
    async fn resolve(&self, url: &Url) -> Option<RawContent> {
        match timeout(self.render_timeout, self.resolver.render(url, self.render_timeout)).await {
            Ok(Ok(Some(content))) if !content.is_blank() => return Some(content),
            Ok(Ok(_)) => debug!(%url, "Render produced no content"),
            Ok(Err(e)) => warn!(%url, error = %e, "Render failed"),
            Err(_) => warn!(%url, timeout = ?self.render_timeout, "Render timed out"),
        }

        match timeout(self.fetch_timeout, self.resolver.fetch(url, self.fetch_timeout)).await {
            Ok(Ok(Some(content))) if !content.is_blank() => Some(content),
            Ok(Ok(_)) => {
                debug!(%url, "Fetch produced no content");
                None
            }
            Ok(Err(e)) => {
                warn!(%url, error = %e, "Fetch failed");
                None
            }
            Err(_) => {
                warn!(%url, timeout = ?self.fetch_timeout, "Fetch timed out");
                None
            }
        }
    }

    /// Extraction runs off the async workers; a crash yields empty text
    async fn extract(&self, content: RawContent) -> String {
        let extractor = Arc::clone(&self.extractor);
        match tokio::task::spawn_blocking(move || extractor.extract(&content)).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Text extraction crashed");
                String::new()
            }
        }
    }
}

/// Parse a story URL, accepting only http(s)
fn parse_story_url(raw: &str) -> Result<Url, EnrichError> {
    let url = Url::parse(raw).map_err(|e| EnrichError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(EnrichError::UnsupportedScheme {
            url: raw.to_string(),
            scheme: scheme.to_string(),
        }),
    }
}
