//! Stories: the items a job lists, enriches and summarizes.
//!
//! A `RawStory` is what the listing returns. Once ingested into a job it
//! becomes a `Story`, which additionally tracks the pending content preview
//! and the final summary.

use serde::{Deserialize, Serialize};

/// Summary for a story with neither a URL nor any fallback text.
pub const SUMMARY_NOT_AVAILABLE: &str = "Summary not available";

/// Summary for a story whose enrichment hit an unrecoverable error.
pub const SUMMARY_SCRAPE_FAILED: &str = "Summary not available — unable to scrape content";

/// A story record as returned by the listing, before ingestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawStory {
    /// External id (Algolia `objectID`)
    pub id: String,

    pub title: Option<String>,

    pub url: Option<String>,

    pub author: Option<String>,

    /// Creation time as reported by the source (ISO 8601 string)
    pub created_at: Option<String>,

    pub points: Option<i64>,

    pub num_comments: Option<i64>,

    /// Self-post text, used when the URL yields nothing
    pub story_text: Option<String>,
}

impl RawStory {
    /// Create a bare record with an id and title (mainly for tests and fixtures)
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: Some(title.into()),
            url: None,
            author: None,
            created_at: None,
            points: None,
            num_comments: None,
            story_text: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_story_text(mut self, text: impl Into<String>) -> Self {
        self.story_text = Some(text.into());
        self
    }
}

/// A story owned by a job.
///
/// Serializes to the externally observable result record. The pending
/// content preview is internal and never part of the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    pub id: String,

    pub title: Option<String>,

    pub url: Option<String>,

    pub points: Option<i64>,

    pub author: Option<String>,

    pub created_at: Option<String>,

    pub num_comments: Option<i64>,

    pub story_text: Option<String>,

    /// Final summary, set exactly once
    pub summary: Option<String>,

    /// Extracted text awaiting a summary; cleared when the summary lands
    #[serde(skip)]
    pub content_preview: Option<String>,
}

impl From<RawStory> for Story {
    fn from(raw: RawStory) -> Self {
        Self {
            id: raw.id,
            title: raw.title,
            url: raw.url,
            points: raw.points,
            author: raw.author,
            created_at: raw.created_at,
            num_comments: raw.num_comments,
            story_text: raw.story_text,
            summary: None,
            content_preview: None,
        }
    }
}

impl Story {
    /// Trimmed fallback text, if there is any
    pub fn fallback_text(&self) -> Option<&str> {
        self.story_text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// True once a summary (real or placeholder) has been recorded
    pub fn is_terminal(&self) -> bool {
        self.summary.is_some()
    }

    /// True while a preview is published and no summary has arrived
    pub fn is_pending(&self) -> bool {
        self.content_preview.is_some() && self.summary.is_none()
    }

    /// Record the final summary, clearing any pending preview
    pub fn apply_summary(&mut self, summary: String) {
        self.content_preview = None;
        self.summary = Some(summary);
    }
}
